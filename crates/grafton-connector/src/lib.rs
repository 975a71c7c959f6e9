// crates/grafton-connector/src/lib.rs
// ============================================================================
// Module: Grafton Connector
// Description: Simulated platform API consumed by the provider under test.
// Purpose: Issue tokens, accept callbacks, and expose provisioned resources.
// Dependencies: axum, ed25519-dalek, grafton-core, tokio
// ============================================================================

//! ## Overview
//! The connector stands in for the marketplace platform during a run. A
//! provider exchanges client credentials or authorization codes for bearers,
//! resolves asynchronous provisioning callbacks, and reads back resources,
//! users, credentials, and usage measures.
//!
//! Callbacks are owned by a single actor thread ([`CallbackRegistry`]); the
//! test thread blocks on [`CallbackRegistry::wait_for_callback`] while the
//! HTTP handlers resolve callbacks through the same owner.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod callbacks;
pub mod capture;
pub mod error;
pub mod oauth;
pub mod rendezvous;
pub mod server;
pub mod store;
pub mod types;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::ConnectorAuditEvent;
pub use audit::ConnectorAuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use callbacks::CallbackRegistry;
pub use capture::CALLBACK_ROUTE;
pub use capture::CapturedRequest;
pub use capture::RequestCapturer;
pub use capture::TOKEN_ROUTE;
pub use error::ApiError;
pub use error::ApiErrorKind;
pub use error::CallbackError;
pub use error::ConnectorError;
pub use error::OAuthError;
pub use error::OAuthErrorKind;
pub use oauth::ClientCredentials;
pub use oauth::CodeStore;
pub use oauth::TokenIssuer;
pub use server::ConnectorSettings;
pub use server::FakeConnector;
pub use store::PlatformStore;
pub use store::now_rfc3339;
pub use types::AccessToken;
pub use types::AccessTokenResponse;
pub use types::AuthorizationCode;
pub use types::Callback;
pub use types::CallbackRequest;
pub use types::CallbackState;
pub use types::CallbackType;
pub use types::Credential;
pub use types::GrantType;
pub use types::MeasureRecord;
pub use types::MeasureReport;
pub use types::Profile;
pub use types::Resource;
pub use types::ResourceUser;
pub use types::TokenRequest;
