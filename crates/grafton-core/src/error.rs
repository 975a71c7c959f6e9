// crates/grafton-core/src/error.rs
// ============================================================================
// Module: Harness Errors
// Description: Error types for graph construction and test execution.
// Purpose: Separate fatal harness failures from assertion failures.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`HarnessError`] is the fatal class: anything that is not an assertion
//! failure inside a test body. It stops the whole run. [`GraphError`] covers
//! feature declarations that cannot be placed in the execution tree.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::identifiers::FeatureLabel;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal harness errors that abort a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    /// A test body hit an unexpected condition that is not an assertion.
    #[error("fatal harness error: {0}")]
    Fatal(String),
    /// The feature graph could not be built.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl HarnessError {
    /// Builds a fatal error from any displayable cause.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }
}

/// Feature declarations that cannot be placed in the execution tree.
///
/// # Invariants
/// - `Unattached` lists every unplaced feature in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Two features were registered under the same label.
    #[error("feature `{0}` is registered more than once")]
    DuplicateLabel(FeatureLabel),
    /// Features whose `runs inside` target never became part of the tree.
    #[error("features declared inside unknown or unreachable parents: {}", describe(.0))]
    Unattached(Vec<UnattachedFeature>),
}

/// A feature that no parent claimed during graph construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnattachedFeature {
    /// Label of the orphaned feature.
    pub label: FeatureLabel,
    /// Parent label it declared.
    pub inside: FeatureLabel,
}

/// Renders unattached features as `label (inside parent)` pairs.
fn describe(features: &[UnattachedFeature]) -> String {
    features
        .iter()
        .map(|feature| format!("`{}` (inside `{}`)", feature.label, feature.inside))
        .collect::<Vec<_>>()
        .join(", ")
}
