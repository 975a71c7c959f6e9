// crates/grafton-client/src/client.rs
// ============================================================================
// Module: Provider Client
// Description: Signed blocking client for the provider provisioning API.
// Purpose: Drive resource and credential lifecycles on the provider under test.
// Dependencies: grafton-core, reqwest, serde, serde_json, url
// ============================================================================

//! ## Overview
//! Every call is signed (see [`crate::signing`]) and, for lifecycle
//! operations, names the callback the provider may resolve later via
//! `X-Callback-ID` and `X-Callback-URL`. A 201 or 200/204 reply means the
//! provider finished synchronously; 202 means it will call back.
//!
//! Redirects are never followed and every call is bounded by a timeout.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use grafton_core::ObjectId;
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::ProviderError;
use crate::error::ProviderErrorKind;
use crate::signing::Signer;
use crate::signing::signed_headers;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound on any single provider call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// SECTION: Types
// ============================================================================

/// Resource provisioning request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceBody {
    /// Resource identity.
    pub id: ObjectId,
    /// Product label.
    pub product: String,
    /// Plan label.
    pub plan: String,
    /// Region label.
    pub region: String,
    /// Custom plan features.
    pub features: BTreeMap<String, Value>,
}

/// Credential provisioning request body.
#[derive(Debug, Serialize)]
struct CredentialBody {
    /// Credential identity.
    id: ObjectId,
    /// Owning resource.
    resource_id: ObjectId,
}

/// Plan change request body.
#[derive(Debug, Serialize)]
struct PlanChangeBody<'a> {
    /// Target plan.
    plan: &'a str,
    /// Target plan features.
    features: &'a BTreeMap<String, Value>,
}

/// Reply body carrying a message, and credentials on credential provisioning.
#[derive(Debug, Default, Deserialize)]
struct ReplyBody {
    /// Provider message.
    #[serde(default)]
    message: Option<String>,
    /// Credential values.
    #[serde(default)]
    credentials: BTreeMap<String, String>,
}

/// Outcome of a lifecycle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Provider message, possibly empty.
    pub message: String,
    /// True when the provider will resolve the callback later.
    pub callback: bool,
}

/// Outcome of a credential provisioning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialReply {
    /// Credentials returned synchronously; empty for callbacks.
    pub credentials: BTreeMap<String, String>,
    /// Provider message.
    pub message: String,
    /// True when the provider will resolve the callback later.
    pub callback: bool,
}

/// Usage measures reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceMeasures {
    /// Measured resource.
    pub resource_id: ObjectId,
    /// Period start, RFC3339.
    pub period_start: String,
    /// Period end, RFC3339.
    pub period_end: String,
    /// Usage per feature.
    pub measures: BTreeMap<String, i64>,
}

/// Raw provider reply.
struct Exchange {
    /// Status code.
    status: u16,
    /// Response body.
    body: Vec<u8>,
}

/// Receives one line per request and response.
pub type TraceFn = Arc<dyn Fn(&str) + Send + Sync>;

// ============================================================================
// SECTION: Client
// ============================================================================

/// Signed client for one provider.
#[derive(Clone)]
pub struct ProviderClient {
    /// Provider API base, ending in `/v1`.
    base_url: Url,
    /// Connector API base used to derive callback URLs.
    connector_url: Url,
    /// Request signer.
    signer: Arc<dyn Signer>,
    /// Blocking HTTP client.
    http: Client,
    /// Optional exchange tracer.
    trace: Option<TraceFn>,
}

impl ProviderClient {
    /// Builds a client for `base_url` that signs with `signer`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] when the HTTP client cannot be
    /// built.
    pub fn new(base_url: Url, connector_url: Url, signer: Arc<dyn Signer>) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(Policy::none())
            .build()
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        Ok(Self {
            base_url,
            connector_url,
            signer,
            http,
            trace: None,
        })
    }

    /// Sends a line per exchange to `trace`.
    #[must_use]
    pub fn with_trace(mut self, trace: TraceFn) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Provider API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Callback URL the provider should resolve for `callback_id`.
    #[must_use]
    pub fn callback_url(&self, callback_id: ObjectId) -> String {
        format!("{}/callbacks/{callback_id}", self.connector_url.as_str().trim_end_matches('/'))
    }

    /// SSO entry point for `code` on `resource_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Url`] when the URL cannot be built.
    pub fn sso_url(&self, code: &str, resource_id: ObjectId) -> Result<Url, ProviderError> {
        let mut url = self.endpoint("/sso")?;
        url.query_pairs_mut()
            .append_pair("code", code)
            .append_pair("resource_id", &resource_id.to_string());
        Ok(url)
    }

    /// `PUT /resources/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Api`] for provider refusals and
    /// [`ProviderError::MissingMessage`] when the reply has no message.
    pub fn provision_resource(
        &self,
        callback_id: ObjectId,
        body: &ResourceBody,
    ) -> Result<Reply, ProviderError> {
        let path = format!("/resources/{}", body.id);
        let exchange = self.send(Method::PUT, &path, Some(callback_id), Some(encode(body)?))?;
        let callback = match exchange.status {
            201 => false,
            202 => true,
            status => return Err(refusal(status, &exchange.body)),
        };
        let reply = decode_reply(&exchange.body)?;
        Ok(Reply {
            message: reply.message.ok_or(ProviderError::MissingMessage)?,
            callback,
        })
    }

    /// `PUT /credentials/{id}`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::provision_resource`].
    pub fn provision_credentials(
        &self,
        callback_id: ObjectId,
        resource_id: ObjectId,
        credential_id: ObjectId,
    ) -> Result<CredentialReply, ProviderError> {
        let path = format!("/credentials/{credential_id}");
        let body = CredentialBody {
            id: credential_id,
            resource_id,
        };
        let exchange = self.send(Method::PUT, &path, Some(callback_id), Some(encode(&body)?))?;
        let callback = match exchange.status {
            201 => false,
            202 => true,
            status => return Err(refusal(status, &exchange.body)),
        };
        let reply = decode_reply(&exchange.body)?;
        Ok(CredentialReply {
            credentials: if callback { BTreeMap::new() } else { reply.credentials },
            message: reply.message.ok_or(ProviderError::MissingMessage)?,
            callback,
        })
    }

    /// `PATCH /resources/{id}` with the target plan.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Api`] for provider refusals.
    pub fn change_plan(
        &self,
        callback_id: ObjectId,
        resource_id: ObjectId,
        plan: &str,
        features: &BTreeMap<String, Value>,
    ) -> Result<Reply, ProviderError> {
        let path = format!("/resources/{resource_id}");
        let body = PlanChangeBody {
            plan,
            features,
        };
        let exchange = self.send(Method::PATCH, &path, Some(callback_id), Some(encode(&body)?))?;
        let callback = match exchange.status {
            200 | 204 => false,
            202 => true,
            status => return Err(refusal(status, &exchange.body)),
        };
        Ok(Reply {
            message: decode_reply(&exchange.body)?.message.unwrap_or_default(),
            callback,
        })
    }

    /// `DELETE /credentials/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Api`] for provider refusals.
    pub fn deprovision_credentials(
        &self,
        callback_id: ObjectId,
        credential_id: ObjectId,
    ) -> Result<Reply, ProviderError> {
        self.delete(callback_id, &format!("/credentials/{credential_id}"))
    }

    /// `DELETE /resources/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Api`] for provider refusals.
    pub fn deprovision_resource(
        &self,
        callback_id: ObjectId,
        resource_id: ObjectId,
    ) -> Result<Reply, ProviderError> {
        self.delete(callback_id, &format!("/resources/{resource_id}"))
    }

    /// `GET /resources/{id}/measures` for a period.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Api`] for provider refusals and
    /// [`ProviderError::Decode`] for an unreadable body.
    pub fn resource_measures(
        &self,
        resource_id: ObjectId,
        period_start: &str,
        period_end: &str,
    ) -> Result<ResourceMeasures, ProviderError> {
        let path = format!(
            "/resources/{resource_id}/measures?{}",
            url::form_urlencoded::Serializer::new(String::new())
                .append_pair("period_start", period_start)
                .append_pair("period_end", period_end)
                .finish()
        );
        let exchange = self.send(Method::GET, &path, None, None)?;
        if exchange.status != 200 {
            return Err(refusal(exchange.status, &exchange.body));
        }
        serde_json::from_slice(&exchange.body).map_err(|err| ProviderError::Decode(err.to_string()))
    }

    /// Shared deprovisioning exchange: 204 sync, 202 async.
    fn delete(&self, callback_id: ObjectId, path: &str) -> Result<Reply, ProviderError> {
        let exchange = self.send(Method::DELETE, path, Some(callback_id), None)?;
        let callback = match exchange.status {
            204 => false,
            202 => true,
            status => return Err(refusal(status, &exchange.body)),
        };
        Ok(Reply {
            message: decode_reply(&exchange.body)?.message.unwrap_or_default(),
            callback,
        })
    }

    /// Resolves `path` (which may carry a query) against the base URL.
    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        let joined = format!("{}{path}", self.base_url.as_str().trim_end_matches('/'));
        Url::parse(&joined).map_err(|err| ProviderError::Url(err.to_string()))
    }

    /// Signs and sends one request.
    fn send(
        &self,
        method: Method,
        path: &str,
        callback_id: Option<ObjectId>,
        body: Option<Vec<u8>>,
    ) -> Result<Exchange, ProviderError> {
        let url = self.endpoint(path)?;
        let callback = callback_id.map(|id| (id.to_string(), self.callback_url(id)));
        let headers = signed_headers(
            self.signer.as_ref(),
            method.as_str(),
            &url,
            callback.as_ref().map(|(id, callback_url)| (id.as_str(), callback_url.as_str())),
            body.as_deref(),
        );
        self.emit(&format!("--> {method} {url}"));
        let mut request = self.http.request(method, url);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            self.emit(&String::from_utf8_lossy(&body));
            request = request.body(body);
        }
        let response = request.send().map_err(|err| ProviderError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let body =
            response.bytes().map_err(|err| ProviderError::Transport(err.to_string()))?.to_vec();
        self.emit(&format!("<-- {status} {}", String::from_utf8_lossy(&body)));
        Ok(Exchange {
            status,
            body,
        })
    }

    /// Forwards a trace line when tracing is on.
    fn emit(&self, line: &str) {
        if let Some(trace) = &self.trace {
            trace(line);
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Serializes a request body.
fn encode<T: Serialize>(body: &T) -> Result<Vec<u8>, ProviderError> {
    serde_json::to_vec(body).map_err(|err| ProviderError::Decode(err.to_string()))
}

/// Decodes a success reply; an empty body has no message.
fn decode_reply(body: &[u8]) -> Result<ReplyBody, ProviderError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ReplyBody::default());
    }
    serde_json::from_slice(body).map_err(|err| ProviderError::Decode(err.to_string()))
}

/// Maps a non-success status and error body to a [`ProviderError`].
fn refusal(status: u16, body: &[u8]) -> ProviderError {
    if (200..300).contains(&status) {
        return ProviderError::UnexpectedStatus(status);
    }
    let Some(kind) = ProviderErrorKind::from_status(status) else {
        return ProviderError::UnexpectedStatus(status);
    };
    let message = serde_json::from_slice::<ReplyBody>(body)
        .ok()
        .and_then(|reply| reply.message)
        .unwrap_or_else(|| format!("status {status}"));
    ProviderError::Api {
        kind,
        message,
        status,
    }
}
