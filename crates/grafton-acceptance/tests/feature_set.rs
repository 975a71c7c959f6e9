// crates/grafton-acceptance/tests/feature_set.rs
// ============================================================================
// Module: Feature Set Tests
// Description: Shape of the acceptance graph and its flag requirements.
// Purpose: Pin visit order and pre-run validation of the feature set.
// ============================================================================
//! ## Overview
//! Integration tests for [`grafton_acceptance::registry`] and
//! [`grafton_acceptance::validate_flags`].

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod support;

use std::collections::BTreeSet;

use grafton_acceptance::registry;
use grafton_acceptance::validate_flags;
use grafton_config::flags;
use grafton_core::FeatureLabel;
use support::TestResult;
use support::ensure;
use support::walk_order;

// ============================================================================
// SECTION: Order
// ============================================================================

#[test]
fn features_visit_in_dependency_order() -> TestResult {
    let order = walk_order(&registry(), &[])?;
    let expected = [
        "provision",
        "plan-change",
        "plan-change-td",
        "credentials",
        "credentials-td",
        "credentials_rotation",
        "credentials_rotation-td",
        "sso",
        "sso-td",
        "resource-measures",
        "resource-measures-td",
        "provision-td",
        "cleanup",
        "cleanup-td",
    ];
    ensure(order == expected, format!("unexpected order: {order:?}"))
}

#[test]
fn excluding_provision_leaves_only_cleanup() -> TestResult {
    let order = walk_order(&registry(), &["provision"])?;
    ensure(order == ["cleanup", "cleanup-td"], format!("unexpected order: {order:?}"))
}

#[test]
fn registry_holds_seven_features() -> TestResult {
    let registry = registry();
    ensure(registry.len() == 7, "expected seven features")?;
    ensure(registry.get("sso").is_some(), "sso should be registered")
}

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn missing_flags_are_listed_per_feature() -> TestResult {
    let errors = validate_flags(&BTreeSet::new(), &[])?;
    ensure(errors.len() == 8, format!("expected 8 errors, got {}", errors.len()))?;
    let first = errors.first().map(ToString::to_string).unwrap_or_default();
    ensure(
        first == "feature `plan-change` requires flag `new-plan` to be set",
        format!("unexpected first error: {first}"),
    )
}

#[test]
fn excluded_features_need_no_flags() -> TestResult {
    let errors = validate_flags(&BTreeSet::new(), &[FeatureLabel::from("sso")])?;
    ensure(errors.len() == 5, format!("expected 5 errors, got {}", errors.len()))?;
    let mentions_sso = errors.iter().any(|error| error.to_string().contains("`sso`"));
    ensure(!mentions_sso, "excluded feature must not be validated")
}

#[test]
fn complete_flags_validate_cleanly() -> TestResult {
    let provided: BTreeSet<String> = [
        flags::PRODUCT,
        flags::PLAN,
        flags::NEW_PLAN,
        flags::REGION,
        flags::CLIENT_ID,
        flags::CLIENT_SECRET,
        flags::CONNECTOR_PORT,
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    let errors = validate_flags(&provided, &[])?;
    ensure(errors.is_empty(), format!("unexpected errors: {errors:?}"))
}
