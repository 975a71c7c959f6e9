// crates/grafton-core/src/outcome.rs
// ============================================================================
// Module: Case Outcomes
// Description: Failure signalling for test bodies and guarded blocks.
// Purpose: Replace unwinding with explicit, typed assertion results.
// Dependencies: crate::error
// ============================================================================

//! ## Overview
//! Test bodies return [`CaseResult`]. An assertion helper such as [`ensure`]
//! yields [`Failure::Assertion`]; anything unexpected is [`Failure::Fatal`].
//! The guarded-block runner folds a body's result into an [`Outcome`], which
//! is what the executor acts on: `Failed` is recovered at the block boundary,
//! `Fatal` is handed back to the caller and ends the run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use crate::error::HarnessError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of one guarded block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The block ran to completion.
    Passed,
    /// An assertion failed; the message is already rendered for the report.
    Failed(String),
    /// An unexpected error; the run must stop.
    Fatal(HarnessError),
}

impl Outcome {
    /// Returns true when the block passed.
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

impl From<CaseResult> for Outcome {
    fn from(result: CaseResult) -> Self {
        match result {
            Ok(()) => Self::Passed,
            Err(Failure::Assertion(message)) => Self::Failed(message),
            Err(Failure::Fatal(error)) => Self::Fatal(error),
        }
    }
}

/// Failure raised from inside a test body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Expected-versus-actual mismatch.
    Assertion(String),
    /// Unexpected harness condition.
    Fatal(HarnessError),
}

impl Failure {
    /// Builds an assertion failure.
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion(message.into())
    }

    /// Builds a fatal failure.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(HarnessError::fatal(message))
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assertion(message) => f.write_str(message),
            Self::Fatal(error) => fmt::Display::fmt(error, f),
        }
    }
}

impl From<HarnessError> for Failure {
    fn from(error: HarnessError) -> Self {
        Self::Fatal(error)
    }
}

/// Result type returned by every test body.
pub type CaseResult = Result<(), Failure>;

// ============================================================================
// SECTION: Assertion Helpers
// ============================================================================

/// Fails with `message` unless `condition` holds.
///
/// # Errors
///
/// Returns [`Failure::Assertion`] when the condition is false.
pub fn ensure(condition: bool, message: impl Into<String>) -> CaseResult {
    if condition { Ok(()) } else { Err(Failure::assertion(message)) }
}

/// Fails unless `actual == expected`, reporting both values.
///
/// # Errors
///
/// Returns [`Failure::Assertion`] when the values differ.
pub fn ensure_eq<T>(actual: &T, expected: &T, message: &str) -> CaseResult
where
    T: PartialEq + fmt::Display + ?Sized,
{
    if actual == expected {
        Ok(())
    } else {
        Err(Failure::assertion(format!("{message}\nexpected: {expected}\n  actual: {actual}")))
    }
}

/// Unwraps `result`, converting an error into an assertion failure.
///
/// # Errors
///
/// Returns [`Failure::Assertion`] carrying `message` and the error text.
pub fn ensure_ok<T, E: fmt::Display>(result: Result<T, E>, message: &str) -> Result<T, Failure> {
    result.map_err(|error| Failure::assertion(format!("{message}: {error}")))
}
