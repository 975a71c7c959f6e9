// crates/grafton-connector/src/error.rs
// ============================================================================
// Module: Connector Errors
// Description: Callback protocol, OAuth, platform API, and server errors.
// Purpose: Map every connector failure onto a closed, typed taxonomy.
// Dependencies: axum, serde, thiserror
// ============================================================================

//! ## Overview
//! Callback protocol errors are ordinary values returned to callers.
//! [`OAuthError`] and [`ApiError`] each render to one fixed HTTP status and
//! a machine-readable type string, so handlers never answer with a generic
//! failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use grafton_core::ObjectId;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Callback Errors
// ============================================================================

/// Callback registry and rendezvous failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    /// No callback with the given id was ever registered.
    #[error("callback not found: {0}")]
    NotFound(ObjectId),
    /// Callback already resolved with different content.
    #[error("callback already resolved: {0}")]
    AlreadyResolved(ObjectId),
    /// No resolution arrived before the deadline.
    #[error("timed out after {waited:?} waiting for callback {id}")]
    Timeout {
        /// Awaited callback.
        id: ObjectId,
        /// Time spent waiting.
        waited: Duration,
    },
    /// Registry owner is no longer running.
    #[error("callback registry unavailable")]
    Unavailable,
}

// ============================================================================
// SECTION: OAuth Errors
// ============================================================================

/// OAuth error type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorKind {
    /// Malformed request or wrong content type.
    InvalidRequest,
    /// Client id or secret did not match.
    InvalidClient,
    /// Authorization code missing or expired.
    InvalidGrant,
    /// Grant type not recognized.
    UnsupportedGrantType,
    /// Connector-side failure.
    ServerError,
}

impl OAuthErrorKind {
    /// Returns the HTTP status for this kind.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::InvalidClient => StatusCode::UNAUTHORIZED,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequest | Self::InvalidGrant | Self::UnsupportedGrantType => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

/// OAuth failure with its wire description.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{description}")]
pub struct OAuthError {
    /// Machine-readable type.
    #[serde(rename = "error")]
    pub kind: OAuthErrorKind,
    /// Human-readable description.
    #[serde(rename = "error_description")]
    pub description: String,
}

impl OAuthError {
    /// Builds an OAuth error.
    #[must_use]
    pub fn new(kind: OAuthErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    /// Content type other than form encoding.
    #[must_use]
    pub fn invalid_content_type() -> Self {
        Self::new(OAuthErrorKind::InvalidRequest, "Invalid content type")
    }

    /// Client id or secret mismatch.
    #[must_use]
    pub fn invalid_client_credentials() -> Self {
        Self::new(OAuthErrorKind::InvalidClient, "Invalid client credentials")
    }

    /// Code not issued by this connector.
    #[must_use]
    pub fn missing_code() -> Self {
        Self::new(OAuthErrorKind::InvalidGrant, "No code provided")
    }

    /// Code issued but past its validity.
    #[must_use]
    pub fn expired_code() -> Self {
        Self::new(OAuthErrorKind::InvalidGrant, "Authorization code has expired")
    }

    /// Grant type not recognized.
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new(OAuthErrorKind::UnsupportedGrantType, "Unsupported grant type")
    }

    /// Connector-side failure.
    #[must_use]
    pub fn server_error() -> Self {
        Self::new(OAuthErrorKind::ServerError, "Internal server error")
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        (self.kind.status(), Json(self)).into_response()
    }
}

// ============================================================================
// SECTION: Platform API Errors
// ============================================================================

/// Platform error type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// 400.
    BadRequest,
    /// 401.
    Unauthorized,
    /// 404.
    NotFound,
    /// 409.
    Conflict,
    /// 500.
    Internal,
}

impl ApiErrorKind {
    /// Returns the HTTP status for this kind.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Platform API error body `{"type", "message"}`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct ApiError {
    /// Error type.
    #[serde(rename = "type")]
    pub kind: ApiErrorKind,
    /// Error message.
    pub message: String,
}

impl ApiError {
    /// Builds a platform error.
    #[must_use]
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 400 with `message`.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::BadRequest, message)
    }

    /// 401 with `message`.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unauthorized, message)
    }

    /// 404 with `message`.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message)
    }

    /// 409 with `message`.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Conflict, message)
    }

    /// 500 `Internal Server Error`.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(ApiErrorKind::Internal, "Internal Server Error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.kind.status(), Json(self)).into_response()
    }
}

// ============================================================================
// SECTION: Server Errors
// ============================================================================

/// Connector server lifecycle failures.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Listener could not be bound.
    #[error("connector bind failed on port {port}: {message}")]
    Bind {
        /// Requested port.
        port: u16,
        /// Underlying error text.
        message: String,
    },
    /// Runtime or listener setup failed.
    #[error("connector startup failed: {0}")]
    Startup(String),
    /// Audit sink could not be opened.
    #[error("connector audit sink failed: {0}")]
    Audit(String),
}
