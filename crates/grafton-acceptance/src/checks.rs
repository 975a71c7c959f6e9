// crates/grafton-acceptance/src/checks.rs
// ============================================================================
// Module: Acceptance Checks
// Description: Step results and the expectations feature bodies apply to them.
// Purpose: Keep provider refusals apart from harness failures.
// Dependencies: grafton-client, grafton-connector, grafton-core
// ============================================================================

//! ## Overview
//! A provisioning step either reaches an answer from the provider (sync or
//! via a resolved callback) or fails inside the harness. [`StepError`] keeps
//! those apart so an error case can expect a specific provider refusal while
//! a harness failure still propagates unchanged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use grafton_client::ProviderError;
use grafton_client::ProviderErrorKind;
use grafton_connector::Callback;
use grafton_connector::CallbackState;
use grafton_core::CaseResult;
use grafton_core::Failure;
use grafton_core::outcome::ensure;
use grafton_core::outcome::ensure_eq;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Shortest acceptable callback message, inclusive.
pub const MIN_MESSAGE_LEN: usize = 3;
/// Longest acceptable callback message, exclusive.
pub const MAX_MESSAGE_LEN: usize = 256;

/// Assertion text for refusals that arrive through a callback.
pub const DEFERRED_VALIDATION: &str = "Validation errors should be returned on the initial request";

// ============================================================================
// SECTION: Step Results
// ============================================================================

/// Answer to one provisioning step.
#[derive(Debug, Clone)]
pub struct Exchange<T> {
    /// Step payload.
    pub value: T,
    /// Resolved callback when the provider answered asynchronously.
    pub callback: Option<Callback>,
}

impl<T> Exchange<T> {
    /// Builds a synchronous answer.
    pub const fn sync(value: T) -> Self {
        Self {
            value,
            callback: None,
        }
    }

    /// Returns true when the provider deferred to a callback.
    pub const fn is_async(&self) -> bool {
        self.callback.is_some()
    }
}

/// Why a step produced no answer.
#[derive(Debug, Clone)]
pub enum StepError {
    /// The provider refused the request.
    Provider(ProviderError),
    /// The harness itself failed.
    Harness(Failure),
}

impl From<Failure> for StepError {
    fn from(failure: Failure) -> Self {
        Self::Harness(failure)
    }
}

impl From<ProviderError> for StepError {
    fn from(error: ProviderError) -> Self {
        Self::Provider(error)
    }
}

/// Result of one provisioning step.
pub type StepResult<T> = Result<Exchange<T>, StepError>;

// ============================================================================
// SECTION: Expectations
// ============================================================================

/// Requires the step to succeed.
///
/// # Errors
///
/// A provider refusal becomes an assertion failure carrying `message`.
pub fn expect_success<T>(result: StepResult<T>, message: &str) -> Result<Exchange<T>, Failure> {
    match result {
        Ok(exchange) => Ok(exchange),
        Err(StepError::Provider(error)) => Err(Failure::assertion(format!("{message}: {error}"))),
        Err(StepError::Harness(failure)) => Err(failure),
    }
}

/// Requires a synchronous provider refusal of `kind`.
///
/// `deferred` is reported when the provider answered through a callback.
///
/// # Errors
///
/// Fails on success, deferral, or a refusal of another kind.
pub fn expect_refusal<T>(result: StepResult<T>, kind: ProviderErrorKind, deferred: &str) -> CaseResult {
    match result {
        Ok(exchange) if exchange.is_async() => Err(Failure::assertion(deferred)),
        Ok(_) => Err(Failure::assertion("Expected an error, got none")),
        Err(StepError::Provider(error)) => match error.kind() {
            Some(actual) => ensure_eq(&actual, &kind, "Unexpected provider error type"),
            None => Err(Failure::assertion(format!("Expected a provider error, got: {error}"))),
        },
        Err(StepError::Harness(failure)) => Err(failure),
    }
}

/// Requires the provider to have answered without a callback.
///
/// # Errors
///
/// Returns an assertion failure carrying `message` for async answers.
pub fn expect_synchronous<T>(exchange: &Exchange<T>, message: &str) -> CaseResult {
    ensure(!exchange.is_async(), message)
}

/// What a resolved callback may carry in its credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRule {
    /// No credentials allowed; the text names the operation.
    Forbidden(&'static str),
    /// At least one credential required.
    Required,
}

/// Checks a resolved callback: `done`, a bounded message, and credentials.
///
/// # Errors
///
/// Returns an assertion failure for the first violated rule.
pub fn check_resolved(callback: &Callback, credentials: CredentialRule) -> CaseResult {
    ensure_eq(&callback.state, &CallbackState::Done, "Expected to receive 'done' as the state")?;
    let length = callback.message.chars().count();
    ensure(
        (MIN_MESSAGE_LEN..MAX_MESSAGE_LEN).contains(&length),
        "Message must be between 3 and 256 characters long.",
    )?;
    match credentials {
        CredentialRule::Forbidden(message) => ensure(callback.credentials.is_empty(), message),
        CredentialRule::Required => ensure(
            !callback.credentials.is_empty(),
            "One or more credential should be returned during provision of a new Credential set",
        ),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
