// crates/grafton-acceptance/tests/refusing_provider.rs
// ============================================================================
// Module: Refusing Provider Tests
// Description: Runs the feature set against a provider that rejects everything.
// Purpose: Verify failure blocking and store rollback end to end.
// ============================================================================
//! ## Overview
//! A scripted provider answers `500` to every request. The two root features
//! fail at their default case, so nothing inside `provision` runs and no
//! teardown is attempted.

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

use grafton_acceptance::run_suite;
use grafton_core::FeatureLabel;
use grafton_core::RunOptions;
use support::TestResult;
use support::context;
use support::ensure;
use support::scripted_provider;

#[test]
fn root_failures_block_their_children() -> TestResult {
    let provider = scripted_provider(500, r#"{"message":"provider is down"}"#)?;
    let (mut context, sink) = context(provider)?;
    let summary = run_suite(&mut context, &RunOptions::default())?;

    ensure(!summary.passed, "run should fail")?;
    ensure(summary.blocks == 2, format!("expected 2 blocks, got {}", summary.blocks))?;
    ensure(summary.failures == 2, format!("expected 2 failures, got {}", summary.failures))?;

    let output = sink.contents();
    ensure(output.contains("Expected a successful provision of a resource"), "missing failure text")?;
    ensure(output.contains("provider is down"), "missing provider message")?;
    ensure(!output.contains("plan-change"), "children of a failed feature must not run")?;
    ensure(!output.contains("Deprovision a resource"), "teardown of a failed feature must not run")?;
    ensure(output.contains("2 features, 2 failures"), "missing summary line")?;
    ensure(context.ids.resource.is_none(), "no resource should be recorded")
}

#[test]
fn refused_provisions_leave_the_store_empty() -> TestResult {
    let provider = scripted_provider(500, r#"{"message":"provider is down"}"#)?;
    let (mut context, _sink) = context(provider)?;
    let options = RunOptions {
        exclude: vec![FeatureLabel::from("provision")],
        run_error_cases: false,
    };
    let summary = run_suite(&mut context, &options)?;
    ensure(summary.blocks == 1, format!("expected 1 block, got {}", summary.blocks))?;
    ensure(context.connector.store().resource_count() == 0, "refused resource must be withdrawn")
}
