// crates/grafton-core/src/validate.rs
// ============================================================================
// Module: Flag Validation
// Description: Checks declared feature flags against supplied configuration.
// Purpose: Report every missing flag across the whole graph in one pass.
// Dependencies: crate::{graph, walker}, thiserror
// ============================================================================

//! ## Overview
//! [`validate`] walks the graph with `descend_on_failure` set and a visitor
//! that never executes anything. Each feature's required flags are checked
//! against the supplied set; one error is kept per (label, name, flag).
//! Results are ordered by that key so output is stable across runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use thiserror::Error;

use crate::error::HarnessError;
use crate::graph::Graph;
use crate::identifiers::FeatureLabel;
use crate::registry::FeatureRegistry;
use crate::walker::walk;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration problems found before a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A feature needs a flag that was not supplied.
    #[error("feature `{label}` requires flag `{flag}` to be set")]
    MissingFlag {
        /// Feature declaring the requirement.
        label: FeatureLabel,
        /// Missing flag name.
        flag: String,
    },
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Returns one error per required flag absent from `provided`.
///
/// # Errors
///
/// Returns [`HarnessError`] when the graph cannot be built.
pub fn validate<C>(
    registry: &FeatureRegistry<C>,
    provided: &BTreeSet<String>,
    exclude: &[FeatureLabel],
) -> Result<Vec<ValidationError>, HarnessError> {
    let mut graph = Graph::build(registry)?;
    let mut errors = BTreeMap::new();
    walk(&mut graph, exclude, true, |feature, _| {
        for flag in feature.flags() {
            if provided.contains(flag) {
                continue;
            }
            let key = (feature.label().clone(), feature.name().to_string(), flag.clone());
            errors.entry(key).or_insert_with(|| ValidationError::MissingFlag {
                label: feature.label().clone(),
                flag: flag.clone(),
            });
        }
        Ok(true)
    })?;
    Ok(errors.into_values().collect())
}
