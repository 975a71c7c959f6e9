// crates/grafton-core/src/registry.rs
// ============================================================================
// Module: Feature Registry
// Description: Explicit, insertion-ordered collection of declared features.
// Purpose: Replace ambient registration state with a value passed by reference.
// Dependencies: crate::{feature, executor, validate}
// ============================================================================

//! ## Overview
//! A [`FeatureRegistry`] is constructed once and filled with [`Feature`]
//! declarations. Registration performs no validation; dangling ordering
//! references surface when the graph is built for a run. The registry is the
//! entry point for both [`run`](FeatureRegistry::run) and
//! [`validate`](FeatureRegistry::validate).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::error::HarnessError;
use crate::executor;
use crate::executor::RunOptions;
use crate::executor::RunSummary;
use crate::feature::Feature;
use crate::identifiers::FeatureLabel;
use crate::report::Reporter;
use crate::validate;
use crate::validate::ValidationError;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Insertion-ordered feature declarations for a harness context `C`.
pub struct FeatureRegistry<C> {
    /// Registered features in declaration order.
    features: Vec<Feature<C>>,
}

impl<C> Default for FeatureRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> FeatureRegistry<C> {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    /// Appends a feature declaration.
    pub fn register(&mut self, feature: Feature<C>) -> &mut Self {
        self.features.push(feature);
        self
    }

    /// Returns the declared features in registration order.
    #[must_use]
    pub fn features(&self) -> &[Feature<C>] {
        &self.features
    }

    /// Looks up a feature by label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&Feature<C>> {
        self.features.iter().find(|feature| feature.label().as_str() == label)
    }

    /// Returns the number of registered features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true when nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Executes every non-excluded feature against `context`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the graph cannot be built or a test body
    /// raises a fatal error.
    pub fn run(
        &self,
        context: &mut C,
        options: &RunOptions,
        reporter: &Reporter,
    ) -> Result<RunSummary, HarnessError> {
        executor::run(self, context, options, reporter)
    }

    /// Reports every required flag missing from `provided`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the graph cannot be built.
    pub fn validate(
        &self,
        provided: &BTreeSet<String>,
        exclude: &[FeatureLabel],
    ) -> Result<Vec<ValidationError>, HarnessError> {
        validate::validate(self, provided, exclude)
    }
}
