// crates/grafton-client/src/error.rs
// ============================================================================
// Module: Client Errors
// Description: Provider reply taxonomy, keypair, and signing failures.
// Purpose: Let acceptance features assert on the kind of a provider refusal.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! A provider refusal is classified by HTTP status into a
//! [`ProviderErrorKind`]. Everything else a call can fail with (transport,
//! decoding, a reply missing its `message`) has its own variant so features
//! can tell "the provider said no" apart from "the exchange broke".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use thiserror::Error;

// ============================================================================
// SECTION: Provider Errors
// ============================================================================

/// Classification of a provider error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// 400.
    BadRequest,
    /// 401.
    Unauthorized,
    /// 404.
    NotFound,
    /// 409.
    Conflict,
    /// 5xx.
    Internal,
}

impl ProviderErrorKind {
    /// Maps an error status to its kind; `None` for statuses with no kind.
    #[must_use]
    pub const fn from_status(status: u16) -> Option<Self> {
        match status {
            400 => Some(Self::BadRequest),
            401 => Some(Self::Unauthorized),
            404 => Some(Self::NotFound),
            409 => Some(Self::Conflict),
            500..=599 => Some(Self::Internal),
            _ => None,
        }
    }

    /// Wire label of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a provider API call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider answered with a classified error status.
    #[error("provider returned {kind} ({status}): {message}")]
    Api {
        /// Error classification.
        kind: ProviderErrorKind,
        /// Provider supplied message.
        message: String,
        /// Raw status code.
        status: u16,
    },
    /// The provider answered with a status the operation does not define.
    #[error("unexpected status code '{0}' on response")]
    UnexpectedStatus(u16),
    /// A success reply lacked its `message` field.
    #[error("`message` field was missing from the response")]
    MissingMessage,
    /// The request never completed.
    #[error("provider request failed: {0}")]
    Transport(String),
    /// The reply body could not be decoded.
    #[error("provider response could not be decoded: {0}")]
    Decode(String),
    /// The request URL could not be built.
    #[error("invalid provider url: {0}")]
    Url(String),
}

impl ProviderError {
    /// Returns the classified kind for API errors.
    #[must_use]
    pub const fn kind(&self) -> Option<ProviderErrorKind> {
        match self {
            Self::Api {
                kind, ..
            } => Some(*kind),
            _ => None,
        }
    }

    /// True unless the failure looks transient on the provider's side.
    ///
    /// Internal errors and 5xx statuses are retryable; other API errors are
    /// definitive answers. Exchange failures are not classified as fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Api {
                kind, ..
            } => !matches!(kind, ProviderErrorKind::Internal),
            Self::UnexpectedStatus(status) => !(*status >= 500 && *status < 600),
            Self::MissingMessage | Self::Transport(_) | Self::Decode(_) | Self::Url(_) => false,
        }
    }
}

// ============================================================================
// SECTION: Key Errors
// ============================================================================

/// Master keypair file failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeypairError {
    /// File could not be read or written.
    #[error("keypair io error: {0}")]
    Io(String),
    /// File content is not a keypair document.
    #[error("keypair parse error: {0}")]
    Parse(String),
    /// Keys decoded but do not form a valid pair.
    #[error("invalid keypair: {0}")]
    Invalid(String),
}

/// Request signature verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    /// A required header was absent.
    #[error("missing header: {0}")]
    MissingHeader(String),
    /// The `X-Signature` header is malformed.
    #[error("malformed signature header: {0}")]
    Malformed(String),
    /// The live key is not endorsed by the master key.
    #[error("live key endorsement is invalid")]
    BadEndorsement,
    /// The request signature does not match.
    #[error("request signature is invalid")]
    BadSignature,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
