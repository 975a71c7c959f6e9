// crates/grafton-core/src/executor.rs
// ============================================================================
// Module: Feature Executor
// Description: Runs default cases, error cases, and teardowns in graph order.
// Purpose: Apply guarded-block semantics and failure propagation to a run.
// Dependencies: crate::{graph, walker, outcome, report}
// ============================================================================

//! ## Overview
//! [`run`] builds a fresh [`Graph`], walks it with stop-on-failure semantics,
//! and executes each visit:
//! - The first visit to a feature runs its default case, then each error case
//!   in its own guarded block. A failed default case fails the feature, which
//!   keeps its children from running and suppresses its teardown.
//! - The second visit (from the paired teardown node) runs the teardown when
//!   the feature did not fail.
//!
//! A guarded block converts assertion failures into a recorded failure and
//! hands fatal errors back to the caller, ending the run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::HarnessError;
use crate::feature::Body;
use crate::feature::Feature;
use crate::graph::Graph;
use crate::graph::RunState;
use crate::identifiers::FeatureLabel;
use crate::outcome::CaseResult;
use crate::outcome::Outcome;
use crate::registry::FeatureRegistry;
use crate::report::Reporter;
use crate::walker::walk;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Block title for a body's default case.
pub const DEFAULT_CASE: &str = "Default case";

/// Options for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Features skipped together with everything inside them.
    pub exclude: Vec<FeatureLabel>,
    /// When false, error cases are not executed.
    pub run_error_cases: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            run_error_cases: true,
        }
    }
}

/// Totals for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// True when every visited feature passed.
    pub passed: bool,
    /// Guarded blocks executed.
    pub blocks: usize,
    /// Guarded blocks that failed.
    pub failures: usize,
}

impl RunSummary {
    /// True when every feature passed and no guarded block failed, error
    /// cases included.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.passed && self.failures == 0
    }
}

/// Per-run execution state shared by all visits.
struct Execution<'r, C> {
    /// Harness context handed to every body.
    context: &'r mut C,
    /// Run options.
    options: &'r RunOptions,
    /// Progress output.
    reporter: &'r Reporter,
    /// Guarded blocks executed.
    blocks: usize,
    /// Guarded blocks that failed.
    failures: usize,
}

// ============================================================================
// SECTION: Run
// ============================================================================

/// Runs every non-excluded feature in `registry` against `context`.
///
/// # Errors
///
/// Returns [`HarnessError`] when the graph cannot be built or a body raises a
/// fatal error.
pub fn run<C>(
    registry: &FeatureRegistry<C>,
    context: &mut C,
    options: &RunOptions,
    reporter: &Reporter,
) -> Result<RunSummary, HarnessError> {
    let mut graph = Graph::build(registry)?;
    let mut execution = Execution {
        context,
        options,
        reporter,
        blocks: 0,
        failures: 0,
    };
    let passed = walk(&mut graph, &options.exclude, false, |feature, state| {
        execution.visit(feature, state)
    })?;
    let summary = RunSummary {
        passed,
        blocks: execution.blocks,
        failures: execution.failures,
    };
    reporter.summary(summary.blocks, summary.failures);
    Ok(summary)
}

impl<C> Execution<'_, C> {
    /// Dispatches on run state: entry on first visit, teardown on second.
    fn visit(&mut self, feature: &Feature<C>, state: &mut RunState) -> Result<bool, HarnessError> {
        if !state.has_run {
            self.reporter.enter(&format!("{}: {}", feature.label(), feature.name()));
            state.has_run = true;
            return self.run_body(feature.body());
        }

        self.reporter.exit();
        match feature.teardown_body() {
            Some(teardown) if !state.failed => {
                self.reporter.enter(&format!("{}: {}", feature.label(), teardown.name()));
                let result = self.run_body(teardown.body());
                self.reporter.exit();
                result
            }
            _ => Ok(true),
        }
    }

    /// Runs a default case and, when it passes, each error case.
    ///
    /// Error case failures are reported but never fail the body.
    fn run_body(&mut self, body: &Body<C>) -> Result<bool, HarnessError> {
        let passed = self.guarded(DEFAULT_CASE, |context| body.run_default(context))?;
        if !passed {
            return Ok(false);
        }
        if self.options.run_error_cases {
            for case in body.error_cases() {
                let title = format!("Error case: {}", case.name());
                self.guarded(&title, |context| case.run(context))?;
            }
        }
        Ok(true)
    }

    /// Runs one guarded block and records its outcome.
    fn guarded<F>(&mut self, title: &str, body: F) -> Result<bool, HarnessError>
    where
        F: FnOnce(&mut C) -> CaseResult,
    {
        self.reporter.enter(title);
        let outcome = Outcome::from(body(&mut *self.context));
        self.blocks += 1;
        let result = match outcome {
            Outcome::Passed => {
                self.reporter.result(title, true);
                Ok(true)
            }
            Outcome::Failed(message) => {
                self.failures += 1;
                self.reporter.failure(&message);
                self.reporter.result(title, false);
                Ok(false)
            }
            Outcome::Fatal(error) => {
                self.failures += 1;
                self.reporter.failure(&error.to_string());
                self.reporter.result(title, false);
                Err(error)
            }
        };
        self.reporter.exit();
        result
    }
}
