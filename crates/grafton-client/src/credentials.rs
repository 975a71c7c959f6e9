// crates/grafton-client/src/credentials.rs
// ============================================================================
// Module: Credential Names
// Description: Validation of provider-returned credential names.
// Purpose: Enforce portable environment variable names on credential keys.
// Dependencies: regex
// ============================================================================

//! ## Overview
//! Credential names must be usable as POSIX environment variable names:
//! an uppercase letter followed by up to 127 uppercase letters, digits, or
//! underscores.

use std::sync::LazyLock;

use regex::Regex;

/// Accepted credential name pattern.
pub const CREDENTIAL_NAME_PATTERN: &str = "^[A-Z][A-Z0-9_]{0,127}$";

/// Compiled [`CREDENTIAL_NAME_PATTERN`].
static CREDENTIAL_NAME: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(CREDENTIAL_NAME_PATTERN));

/// Returns true when `name` matches [`CREDENTIAL_NAME_PATTERN`].
#[must_use]
pub fn valid_credential_name(name: &str) -> bool {
    CREDENTIAL_NAME.as_ref().is_ok_and(|pattern| pattern.is_match(name))
}
