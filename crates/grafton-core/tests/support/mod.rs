// crates/grafton-core/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Shared result helpers and graph fixtures for core tests.
// ============================================================================
//! ## Overview
//! Shared helpers for Result-based assertions and for recording walk order.

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
    dead_code,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::error::Error;
use std::fmt;

use grafton_core::Feature;
use grafton_core::FeatureLabel;
use grafton_core::FeatureRegistry;
use grafton_core::Graph;
use grafton_core::walk;

// ========================================================================
// Test Result Helpers
// ========================================================================

/// Standard result type used across core integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Lightweight error type for test assertions.
#[derive(Debug)]
struct TestError {
    /// Human-readable failure message.
    message: String,
}

impl fmt::Display for TestError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl Error for TestError {}

/// Returns an error when a test condition fails.
///
/// # Errors
/// Returns a `TestError` when the condition is false.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(Box::new(TestError {
            message: message.into(),
        }))
    }
}

// ========================================================================
// Graph Fixtures
// ========================================================================

/// Declares a feature whose bodies always pass.
pub fn passing<C>(label: &str) -> Feature<C> {
    Feature::new(label, format!("{label} feature"), |_| Ok(()))
        .teardown(format!("{label} teardown"), |_| Ok(()))
}

/// Walks the registry's graph and returns `label` / `label-td` in visit order.
///
/// # Errors
/// Returns an error when the graph cannot be built.
pub fn walk_order<C>(registry: &FeatureRegistry<C>, exclude: &[&str]) -> TestResult<Vec<String>> {
    let mut graph = Graph::build(registry)?;
    let exclude: Vec<FeatureLabel> = exclude.iter().map(|label| FeatureLabel::from(*label)).collect();
    let mut order = Vec::new();
    walk(&mut graph, &exclude, false, |feature, state| {
        if state.has_run {
            order.push(format!("{}-td", feature.label()));
        } else {
            state.has_run = true;
            order.push(feature.label().to_string());
        }
        Ok(true)
    })?;
    Ok(order)
}
