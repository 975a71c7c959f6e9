// crates/grafton-acceptance/src/lib.rs
// ============================================================================
// Module: Grafton Acceptance
// Description: The provisioning feature set run against a provider.
// Purpose: Declare features into an explicit registry and run them.
// Dependencies: grafton-client, grafton-config, grafton-connector, grafton-core
// ============================================================================

//! ## Overview
//! [`registry`] builds the fixed feature set:
//!
//! ```text
//! provision
//!   plan-change        (before credentials)
//!   credentials
//!   credentials_rotation
//!   sso
//!   resource-measures
//! cleanup
//! ```
//!
//! Every feature body runs against one [`AcceptanceContext`]; [`run_suite`]
//! walks the graph and reports through the context's reporter.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod checks;
pub mod context;
pub mod credentials;
pub mod measures;
pub mod plan_change;
pub mod provisioning;
pub mod sso;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use grafton_core::FeatureLabel;
use grafton_core::FeatureRegistry;
use grafton_core::HarnessError;
use grafton_core::RunOptions;
use grafton_core::RunSummary;
use grafton_core::ValidationError;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use context::AcceptanceContext;
pub use context::AcceptanceSettings;
pub use context::RunIds;
pub use context::Signing;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Declares every acceptance feature into `registry`.
pub fn register_features(registry: &mut FeatureRegistry<AcceptanceContext>) {
    registry
        .register(provisioning::provision_feature())
        .register(plan_change::plan_change_feature())
        .register(credentials::credentials_feature())
        .register(credentials::rotation_feature())
        .register(sso::sso_feature())
        .register(measures::measures_feature())
        .register(provisioning::cleanup_feature());
}

/// Returns a registry holding the acceptance features.
#[must_use]
pub fn registry() -> FeatureRegistry<AcceptanceContext> {
    let mut registry = FeatureRegistry::new();
    register_features(&mut registry);
    registry
}

/// Runs the acceptance features against `context` and prints the summary.
///
/// # Errors
///
/// Returns [`HarnessError`] for graph errors and fatal failures.
pub fn run_suite(context: &mut AcceptanceContext, options: &RunOptions) -> Result<RunSummary, HarnessError> {
    let reporter = Arc::clone(&context.reporter);
    registry().run(context, options, &reporter)
}

/// Lists the required flags missing from `provided`, skipping `exclude`.
///
/// # Errors
///
/// Returns [`HarnessError`] when the feature graph cannot be built.
pub fn validate_flags(
    provided: &BTreeSet<String>,
    exclude: &[FeatureLabel],
) -> Result<Vec<ValidationError>, HarnessError> {
    registry().validate(provided, exclude)
}
