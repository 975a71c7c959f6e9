// system-tests/src/config/env.rs
// ============================================================================
// Module: System Test Environment
// Description: Environment-backed configuration for system tests.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: grafton-core
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8 fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use grafton_core::LogLevel;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Default upper bound on one callback wait.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment keys for system test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTestEnv {
    /// Optional callback wait override in seconds (positive integer).
    TimeoutSeconds,
    /// Optional delay before the stub resolves a callback, in milliseconds.
    CallbackDelayMs,
    /// Optional reporter level: `off`, `info`, or `verbose`.
    Log,
}

impl SystemTestEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TimeoutSeconds => "GRAFTON_SYSTEM_TEST_TIMEOUT_SEC",
            Self::CallbackDelayMs => "GRAFTON_SYSTEM_TEST_CALLBACK_DELAY_MS",
            Self::Log => "GRAFTON_SYSTEM_TEST_LOG",
        }
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed system test configuration derived from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTestConfig {
    /// Upper bound on one callback wait.
    pub callback_timeout: Duration,
    /// Delay before the stub provider resolves a callback.
    pub callback_delay: Duration,
    /// Reporter level for the acceptance run.
    pub log: LogLevel,
}

impl Default for SystemTestConfig {
    fn default() -> Self {
        Self {
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            callback_delay: Duration::ZERO,
            log: LogLevel::Info,
        }
    }
}

impl SystemTestConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when an environment value is not valid UTF-8, is empty,
    /// or fails validation (for example, an invalid timeout or log level).
    pub fn load() -> Result<Self, String> {
        let defaults = Self::default();
        let callback_timeout = read_env_nonempty(SystemTestEnv::TimeoutSeconds.as_str())?
            .map(|value| parse_timeout_seconds(SystemTestEnv::TimeoutSeconds.as_str(), &value))
            .transpose()?
            .unwrap_or(defaults.callback_timeout);
        let callback_delay = read_env_nonempty(SystemTestEnv::CallbackDelayMs.as_str())?
            .map(|value| parse_millis(SystemTestEnv::CallbackDelayMs.as_str(), &value))
            .transpose()?
            .unwrap_or(defaults.callback_delay);
        let log = read_env_nonempty(SystemTestEnv::Log.as_str())?
            .map(|value| {
                value
                    .trim()
                    .parse::<LogLevel>()
                    .map_err(|err| format!("{}: {err}", SystemTestEnv::Log.as_str()))
            })
            .transpose()?
            .unwrap_or(defaults.log);
        Ok(Self {
            callback_timeout,
            callback_delay,
            log,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, String> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string().map(Some).map_err(|_| format!("{name} must be valid UTF-8"))
    })
}

/// Reads an environment variable and rejects empty values.
///
/// # Errors
///
/// Returns an error when the variable is set but empty or whitespace.
fn read_env_nonempty(name: &str) -> Result<Option<String>, String> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => Err(format!("{name} must not be empty")),
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Parses a positive timeout value from an environment variable string.
///
/// # Errors
///
/// Returns an error when the value is non-numeric or zero.
fn parse_timeout_seconds(name: &str, raw: &str) -> Result<Duration, String> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{name} must be a positive integer number of seconds"))?;
    if secs == 0 {
        return Err(format!("{name} must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

/// Parses a millisecond count; zero is allowed.
///
/// # Errors
///
/// Returns an error when the value is not a non-negative integer.
fn parse_millis(name: &str, raw: &str) -> Result<Duration, String> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| format!("{name} must be a whole number of milliseconds"))
}
