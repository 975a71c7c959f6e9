// crates/grafton-connector/src/types.rs
// ============================================================================
// Module: Connector Types
// Description: Wire and state types shared by the connector and its callers.
// Purpose: Give callbacks, grants, tokens, and profiles one typed definition.
// Dependencies: grafton-core, serde, time
// ============================================================================

//! ## Overview
//! Types exchanged between the fake connector's handlers, its state owners,
//! and the acceptance features that inspect what a provider sent. Callback
//! state follows `pending -> done | error`; see
//! [`crate::callbacks::CallbackRegistry`] for the transition rules.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use grafton_core::ObjectId;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Grants
// ============================================================================

/// Grant type presented to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// `authorization_code` grant used by single sign-on.
    AuthorizationCode,
    /// `client_credentials` grant used by provider back channels.
    ClientCredentials,
    /// Any other value; captured for inspection and then rejected.
    #[serde(untagged)]
    Unsupported(String),
}

impl GrantType {
    /// Classifies a raw `grant_type` value.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "authorization_code" => Self::AuthorizationCode,
            "client_credentials" => Self::ClientCredentials,
            other => Self::Unsupported(other.to_string()),
        }
    }

    /// Returns the wire form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::Unsupported(value) => value,
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the token endpoint learned from one request.
///
/// Client credentials come from the body when both halves are present there,
/// otherwise from HTTP Basic auth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRequest {
    /// Accepted body encoding; form and JSON bodies both read as form encoded.
    pub content_type: String,
    /// Authorization code, empty when absent.
    pub code: String,
    /// Whether HTTP Basic credentials were supplied.
    pub auth_header: bool,
    /// Presented client id.
    pub client_id: String,
    /// Presented client secret.
    pub client_secret: String,
    /// Declared grant type.
    pub grant_type: GrantType,
}

/// Authorization code handed to a provider's SSO endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    /// Opaque code value.
    pub code: String,
    /// Instant after which the code is no longer accepted.
    pub expires_at: OffsetDateTime,
}

/// Access token issued by the connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Internal token identity.
    pub id: ObjectId,
    /// Signed bearer value.
    pub bearer: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    /// Grant the token was obtained with.
    pub grant_type: GrantType,
}

/// Token endpoint success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    /// Bearer value.
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    /// Always `bearer`.
    pub token_type: String,
}

impl From<&AccessToken> for AccessTokenResponse {
    fn from(token: &AccessToken) -> Self {
        Self {
            access_token: token.bearer.clone(),
            expires_in: token.expires_in,
            token_type: "bearer".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Callbacks
// ============================================================================

/// Operation a callback stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallbackType {
    /// Resource provisioning.
    #[serde(rename = "resource:provision")]
    ResourceProvision,
    /// Resource deprovisioning.
    #[serde(rename = "resource:deprovision")]
    ResourceDeprovision,
    /// Plan change.
    #[serde(rename = "resource:resize")]
    ResourceResize,
    /// Credential issuance.
    #[serde(rename = "credential:provision")]
    CredentialProvision,
    /// Credential removal.
    #[serde(rename = "credential:deprovision")]
    CredentialDeprovision,
}

/// Callback lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackState {
    /// Not yet resolved by the provider.
    Pending,
    /// Operation completed.
    Done,
    /// Operation failed on the provider side.
    Error,
}

impl CallbackState {
    /// Returns the wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for CallbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a callback owned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Callback {
    /// Callback identity.
    pub id: ObjectId,
    /// Operation kind.
    #[serde(rename = "type")]
    pub kind: CallbackType,
    /// Current state.
    pub state: CallbackState,
    /// Provider message; empty while pending.
    pub message: String,
    /// Credentials delivered with a credential provision.
    #[serde(skip)]
    pub credentials: BTreeMap<String, String>,
}

impl Callback {
    /// Returns true once the provider has resolved the callback.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state != CallbackState::Pending
    }
}

/// Body a provider sends to resolve a callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRequest {
    /// Reported state.
    pub state: CallbackState,
    /// Human readable outcome.
    #[serde(default)]
    pub message: String,
    /// Credentials for credential provisions.
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
}

// ============================================================================
// SECTION: Platform Records
// ============================================================================

/// Resource known to the connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource identity.
    pub id: ObjectId,
    /// Display name.
    pub name: String,
    /// Resource label.
    pub label: String,
    /// Current plan label.
    pub plan: String,
    /// Product label.
    pub product: String,
    /// Region label.
    pub region: String,
    /// Plan features, when the plan is customizable.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, serde_json::Value>,
    /// Creation time, RFC3339.
    pub created_at: String,
    /// Last update time, RFC3339.
    pub updated_at: String,
}

/// Credential set stored against a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Credential identity.
    pub id: ObjectId,
    /// Owning resource, not exposed on the wire.
    #[serde(skip)]
    pub resource_id: Option<ObjectId>,
    /// Credential values.
    pub keys: BTreeMap<String, String>,
    /// Custom display names per key.
    #[serde(default)]
    pub custom_names: BTreeMap<String, String>,
    /// Creation time, RFC3339.
    pub created_on: String,
}

/// Usage report pushed by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureReport {
    /// Period start, RFC3339.
    pub period_start: String,
    /// Period end, RFC3339.
    pub period_end: String,
    /// Feature usage values.
    pub measures: BTreeMap<String, i64>,
}

/// Stored usage report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeasureRecord {
    /// Measured resource.
    pub resource_id: ObjectId,
    /// Reported values.
    #[serde(flatten)]
    pub report: MeasureReport,
    /// Receipt time, RFC3339.
    pub updated_at: String,
}

/// User attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUser {
    /// User identity.
    pub id: ObjectId,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Role on the resource.
    pub role: String,
}

// ============================================================================
// SECTION: Profiles
// ============================================================================

/// `GET /self` body, discriminated by the grant behind the bearer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "target", rename_all = "lowercase")]
pub enum Profile {
    /// Authorization code tokens act for a user.
    User {
        /// User name.
        name: String,
        /// User email.
        email: String,
    },
    /// Client credential tokens act for the product.
    Product {
        /// Product display name.
        name: String,
        /// Product label.
        label: String,
    },
}
