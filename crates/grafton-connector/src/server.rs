// crates/grafton-connector/src/server.rs
// ============================================================================
// Module: Fake Connector Server
// Description: Axum routes for the simulated platform API and their handle.
// Purpose: Serve OAuth tokens, callbacks, and resource lookups to providers.
// Dependencies: axum, tokio, url
// ============================================================================

//! ## Overview
//! [`FakeConnector::start`] binds a listener, spawns a current-thread runtime
//! on its own thread, and serves the `/v1` routes until the handle is
//! dropped. The test thread keeps talking to the same state through the
//! handle: it registers callbacks, issues authorization codes, swaps the
//! expected client credentials, and switches the token endpoint into a
//! failing mode.
//!
//! Security posture: every route except the token endpoint requires a bearer
//! issued by this connector; inputs are untrusted and checked in a fixed
//! order so error precedence is stable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use base64::engine::general_purpose::URL_SAFE;
use grafton_core::IdKind;
use grafton_core::ObjectId;
use serde::Deserialize;
use time::OffsetDateTime;
use tokio::runtime::Builder;
use tokio::sync::oneshot;

use crate::audit::ConnectorAuditEvent;
use crate::audit::ConnectorAuditSink;
use crate::audit::NoopAuditSink;
use crate::callbacks::CallbackRegistry;
use crate::capture::CALLBACK_ROUTE;
use crate::capture::CapturedRequest;
use crate::capture::RequestCapturer;
use crate::capture::TOKEN_ROUTE;
use crate::error::ApiError;
use crate::error::CallbackError;
use crate::error::ConnectorError;
use crate::error::OAuthError;
use crate::error::OAuthErrorKind;
use crate::oauth::ClientCredentials;
use crate::oauth::CodeStore;
use crate::oauth::FORM_CONTENT_TYPE;
use crate::oauth::TokenIssuer;
use crate::store::PlatformStore;
use crate::types::AccessToken;
use crate::types::AccessTokenResponse;
use crate::types::AuthorizationCode;
use crate::types::CallbackRequest;
use crate::types::GrantType;
use crate::types::MeasureReport;
use crate::types::Profile;
use crate::types::Resource;
use crate::types::ResourceUser;
use crate::types::TokenRequest;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Media type required on callback resolutions.
const JSON_CONTENT_TYPE: &str = "application/json";
/// Product display name returned for client credential tokens.
const PRODUCT_DISPLAY_NAME: &str = "A Great Product";

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Inputs for starting a connector.
#[derive(Clone)]
pub struct ConnectorSettings {
    /// Listen port on 127.0.0.1; `0` picks an ephemeral port.
    pub port: u16,
    /// Product label reported by `GET /self`.
    pub product: String,
    /// Client credentials the provider must present.
    pub credentials: ClientCredentials,
    /// Destination for audit events.
    pub audit: Arc<dyn ConnectorAuditSink>,
}

impl ConnectorSettings {
    /// Builds settings with audit events discarded.
    #[must_use]
    pub fn new(port: u16, product: impl Into<String>, credentials: ClientCredentials) -> Self {
        Self {
            port,
            product: product.into(),
            credentials,
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn ConnectorAuditSink>) -> Self {
        self.audit = audit;
        self
    }
}

// ============================================================================
// SECTION: Shared State
// ============================================================================

/// State shared by the handlers and the test-side handle.
struct ConnectorState {
    /// Product label for `GET /self`.
    product: String,
    /// Expected client credentials; swapped by SSO error cases.
    credentials: RwLock<ClientCredentials>,
    /// When set, every token request fails with `server_error`.
    failing: AtomicBool,
    /// Callback owner handle.
    callbacks: CallbackRegistry,
    /// Issued authorization codes.
    codes: CodeStore,
    /// Bearer issuance and lookup.
    issuer: TokenIssuer,
    /// Provisioned platform objects.
    store: PlatformStore,
    /// Recorded requests.
    capturer: RequestCapturer,
    /// Audit destination.
    audit: Arc<dyn ConnectorAuditSink>,
}

impl ConnectorState {
    /// Builds fresh state from settings.
    fn new(settings: &ConnectorSettings) -> Self {
        Self {
            product: settings.product.clone(),
            credentials: RwLock::new(settings.credentials.clone()),
            failing: AtomicBool::new(false),
            callbacks: CallbackRegistry::spawn(),
            codes: CodeStore::new(),
            issuer: TokenIssuer::generate(),
            store: PlatformStore::new(),
            capturer: RequestCapturer::new(),
            audit: Arc::clone(&settings.audit),
        }
    }

    /// Returns the current expected credentials.
    fn credentials(&self) -> ClientCredentials {
        self.credentials.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Resolves the request's bearer, auditing rejections.
    fn authorize(&self, route: &'static str, headers: &HeaderMap) -> Result<AccessToken, ApiError> {
        let header = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
        self.issuer.authorize(header).inspect_err(|error| {
            self.audit.record(
                &ConnectorAuditEvent::new("request_unauthorized", route).with_detail(&error.message),
            );
        })
    }

    /// Authorizes and loads the resource named in the path.
    fn resource(
        &self,
        route: &'static str,
        headers: &HeaderMap,
        raw_id: &str,
    ) -> Result<Resource, ApiError> {
        self.authorize(route, headers)?;
        let id = ObjectId::parse_kind(raw_id, IdKind::Resource)
            .map_err(|_| ApiError::bad_request("Invalid Resource ID Provided"))?;
        self.store.resource(id).ok_or_else(|| ApiError::not_found("Resource Not Found"))
    }
}

// ============================================================================
// SECTION: Server Handle
// ============================================================================

/// Running fake connector; dropping it stops the server.
pub struct FakeConnector {
    /// Shared handler state.
    state: Arc<ConnectorState>,
    /// Bound port.
    port: u16,
    /// Graceful shutdown trigger.
    shutdown: Option<oneshot::Sender<()>>,
    /// Server thread.
    join: Option<thread::JoinHandle<()>>,
}

impl FakeConnector {
    /// Binds `127.0.0.1:<port>` and starts serving on a background thread.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Bind`] when the port is unavailable and
    /// [`ConnectorError::Startup`] when the runtime cannot be built.
    pub fn start(settings: &ConnectorSettings) -> Result<Self, ConnectorError> {
        let bind_error = |err: std::io::Error| ConnectorError::Bind {
            port: settings.port,
            message: err.to_string(),
        };
        let listener = StdTcpListener::bind(("127.0.0.1", settings.port)).map_err(bind_error)?;
        listener.set_nonblocking(true).map_err(bind_error)?;
        let port = listener.local_addr().map_err(bind_error)?.port();

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| ConnectorError::Startup(err.to_string()))?;
        let listener = {
            let _guard = runtime.enter();
            tokio::net::TcpListener::from_std(listener)
                .map_err(|err| ConnectorError::Startup(err.to_string()))?
        };

        let state = Arc::new(ConnectorState::new(settings));
        let app = router(Arc::clone(&state));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let join = thread::spawn(move || {
            runtime.block_on(async move {
                let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                });
                let _ = server.await;
            });
        });
        Ok(Self {
            state,
            port,
            shutdown: Some(shutdown_tx),
            join: Some(join),
        })
    }

    /// Returns the bound port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the API base URL, `http://127.0.0.1:<port>/v1`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}/v1", self.port)
    }

    /// Returns the callback registry.
    #[must_use]
    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.state.callbacks
    }

    /// Returns the platform store.
    #[must_use]
    pub fn store(&self) -> &PlatformStore {
        &self.state.store
    }

    /// Returns the request capturer.
    #[must_use]
    pub fn capturer(&self) -> &RequestCapturer {
        &self.state.capturer
    }

    /// Issues an authorization code valid for one hour.
    #[must_use]
    pub fn create_code(&self) -> AuthorizationCode {
        self.state.codes.create()
    }

    /// Issues an authorization code with an explicit expiry.
    #[must_use]
    pub fn create_code_expiring_at(&self, expires_at: OffsetDateTime) -> AuthorizationCode {
        self.state.codes.create_expiring_at(expires_at)
    }

    /// Returns the client credentials currently expected.
    #[must_use]
    pub fn client_credentials(&self) -> ClientCredentials {
        self.state.credentials()
    }

    /// Replaces the client credentials the token endpoint expects.
    pub fn set_client_credentials(&self, credentials: ClientCredentials) {
        *self.state.credentials.write().unwrap_or_else(PoisonError::into_inner) = credentials;
    }

    /// Switches the token endpoint between normal and always-failing.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Blocks until the server thread exits.
    pub fn wait(mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for FakeConnector {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

// ============================================================================
// SECTION: Routes
// ============================================================================

/// Builds the `/v1` router over shared state.
fn router(state: Arc<ConnectorState>) -> Router {
    Router::new()
        .route(TOKEN_ROUTE, post(create_token))
        .route("/v1/self", get(get_self))
        .route(CALLBACK_ROUTE, put(resolve_callback))
        .route("/v1/resources/{id}", get(get_resource))
        .route("/v1/resources/{id}/users", get(get_resource_users))
        .route("/v1/resources/{id}/credentials", get(get_resource_credentials))
        .route("/v1/resources/{id}/measures", get(get_resource_measures).put(put_resource_measures))
        .with_state(state)
}

// ============================================================================
// SECTION: Token Endpoint
// ============================================================================

/// JSON token request body.
#[derive(Debug, Default, Deserialize)]
struct TokenBody {
    /// Grant type.
    #[serde(default)]
    grant_type: String,
    /// Client id.
    #[serde(default)]
    client_id: String,
    /// Client secret.
    #[serde(default)]
    client_secret: String,
    /// Authorization code.
    #[serde(default)]
    code: String,
}

/// Handles `POST /v1/oauth/tokens`.
async fn create_token(
    State(state): State<Arc<ConnectorState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if state.failing.load(Ordering::SeqCst) {
        return reject_token(&state, None, OAuthError::server_error());
    }
    let request = match parse_token_request(&headers, &body) {
        Ok(request) => request,
        Err(error) => return reject_token(&state, None, error),
    };
    state.capturer.capture(TOKEN_ROUTE, CapturedRequest::Token(request.clone()));
    match state.issuer.issue(&request, &state.credentials(), &state.codes) {
        Ok(token) => {
            state.audit.record(
                &ConnectorAuditEvent::new("token_issued", TOKEN_ROUTE)
                    .with_grant_type(request.grant_type.as_str())
                    .with_subject(token.id.to_string()),
            );
            (StatusCode::CREATED, Json(AccessTokenResponse::from(&token))).into_response()
        }
        Err(error) => reject_token(&state, Some(&request.grant_type), error),
    }
}

/// Audits and renders a token rejection.
fn reject_token(state: &ConnectorState, grant: Option<&GrantType>, error: OAuthError) -> Response {
    let mut event = ConnectorAuditEvent::new("token_rejected", TOKEN_ROUTE)
        .with_detail(oauth_kind_label(error.kind));
    if let Some(grant) = grant {
        event = event.with_grant_type(grant.as_str());
    }
    state.audit.record(&event);
    error.into_response()
}

/// Wire label for an OAuth error type.
const fn oauth_kind_label(kind: OAuthErrorKind) -> &'static str {
    match kind {
        OAuthErrorKind::InvalidRequest => "invalid_request",
        OAuthErrorKind::InvalidClient => "invalid_client",
        OAuthErrorKind::InvalidGrant => "invalid_grant",
        OAuthErrorKind::UnsupportedGrantType => "unsupported_grant_type",
        OAuthErrorKind::ServerError => "server_error",
    }
}

/// Extracts a [`TokenRequest`] from a form or JSON body plus Basic auth.
fn parse_token_request(headers: &HeaderMap, body: &[u8]) -> Result<TokenRequest, OAuthError> {
    let content_type = media_type(headers);
    let basic = basic_credentials(headers);
    let fields = if content_type == FORM_CONTENT_TYPE {
        let mut fields = TokenBody::default();
        for (key, value) in url::form_urlencoded::parse(body) {
            let slot = match &*key {
                "grant_type" => &mut fields.grant_type,
                "client_id" => &mut fields.client_id,
                "client_secret" => &mut fields.client_secret,
                "code" => &mut fields.code,
                _ => continue,
            };
            *slot = value.into_owned();
        }
        fields
    } else if body.is_empty() {
        return Err(OAuthError::new(OAuthErrorKind::InvalidRequest, "No request body provided"));
    } else {
        serde_json::from_slice::<TokenBody>(body).map_err(|_| {
            OAuthError::new(OAuthErrorKind::InvalidRequest, "Could not parse request body")
        })?
    };

    let (client_id, client_secret) =
        if !fields.client_id.is_empty() && !fields.client_secret.is_empty() {
            (fields.client_id, fields.client_secret)
        } else {
            basic.clone().unwrap_or_default()
        };
    Ok(TokenRequest {
        content_type: accepted_encoding(content_type),
        code: fields.code,
        auth_header: basic.is_some(),
        client_id,
        client_secret,
        grant_type: GrantType::parse(&fields.grant_type),
    })
}

/// Records a decoded JSON body as form encoded; an unlabelled body counts as
/// JSON. Any other media type is kept so grant validation rejects it.
fn accepted_encoding(media_type: String) -> String {
    if media_type.is_empty() || media_type == JSON_CONTENT_TYPE {
        FORM_CONTENT_TYPE.to_string()
    } else {
        media_type
    }
}

/// Returns the request media type without parameters, lowercased.
fn media_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Decodes `Authorization: Basic` credentials when present.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?.trim();
    let decoded = STANDARD.decode(encoded).or_else(|_| URL_SAFE.decode(encoded)).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (id, secret) = text.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

// ============================================================================
// SECTION: Profile Endpoint
// ============================================================================

/// Handles `GET /v1/self`.
async fn get_self(
    State(state): State<Arc<ConnectorState>>,
    headers: HeaderMap,
) -> Result<Json<Profile>, ApiError> {
    let token = state.authorize("/v1/self", &headers)?;
    match token.grant_type {
        GrantType::AuthorizationCode => Ok(Json(Profile::User {
            name: "joe user".to_string(),
            email: "joe@user.com".to_string(),
        })),
        GrantType::ClientCredentials => Ok(Json(Profile::Product {
            name: PRODUCT_DISPLAY_NAME.to_string(),
            label: state.product.clone(),
        })),
        GrantType::Unsupported(_) => Err(ApiError::internal()),
    }
}

// ============================================================================
// SECTION: Callback Endpoint
// ============================================================================

/// Handles `PUT /v1/callbacks/{id}`.
async fn resolve_callback(
    State(state): State<Arc<ConnectorState>>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match resolve_callback_inner(&state, &raw_id, &headers, &body).await {
        Ok(id) => {
            state.audit.record(
                &ConnectorAuditEvent::new("callback_resolved", CALLBACK_ROUTE).with_subject(id.to_string()),
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Err(error) => {
            state.audit.record(
                &ConnectorAuditEvent::new("callback_rejected", CALLBACK_ROUTE)
                    .with_subject(raw_id)
                    .with_detail(&error.message),
            );
            error.into_response()
        }
    }
}

/// Validates and applies a callback resolution.
async fn resolve_callback_inner(
    state: &ConnectorState,
    raw_id: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<ObjectId, ApiError> {
    let token = state.authorize(CALLBACK_ROUTE, headers)?;
    if media_type(headers) != JSON_CONTENT_TYPE {
        return Err(ApiError::bad_request("Invalid Content-Type; expected application/json"));
    }
    if token.grant_type != GrantType::ClientCredentials {
        return Err(ApiError::unauthorized("Invalid Grant"));
    }
    let id = ObjectId::parse_kind(raw_id, IdKind::Callback)
        .map_err(|_| ApiError::bad_request("Invalid Callback ID Provided"))?;
    let known = state.callbacks.get_async(id).await.map_err(|_| ApiError::internal())?;
    if known.is_none() {
        return Err(ApiError::not_found("Callback not found"));
    }
    let request: CallbackRequest =
        serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Could not parse request"))?;
    state.capturer.capture(
        CALLBACK_ROUTE,
        CapturedRequest::Callback {
            id,
            request: request.clone(),
        },
    );
    match state.callbacks.trigger_async(id, request).await {
        Ok(()) => Ok(id),
        Err(CallbackError::NotFound(_)) => Err(ApiError::not_found("Callback not found")),
        Err(CallbackError::AlreadyResolved(_)) => Err(ApiError::conflict("Callback already complete")),
        Err(_) => Err(ApiError::internal()),
    }
}

// ============================================================================
// SECTION: Resource Endpoints
// ============================================================================

/// Handles `GET /v1/resources/{id}`.
async fn get_resource(
    State(state): State<Arc<ConnectorState>>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Resource>, ApiError> {
    state.resource("/v1/resources/{id}", &headers, &raw_id).map(Json)
}

/// Handles `GET /v1/resources/{id}/users`.
async fn get_resource_users(
    State(state): State<Arc<ConnectorState>>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<ResourceUser>>, ApiError> {
    state.resource("/v1/resources/{id}/users", &headers, &raw_id)?;
    Ok(Json(vec![ResourceUser {
        id: ObjectId::generate(IdKind::User),
        name: "Manny Fold".to_string(),
        email: "manny@manifold.co".to_string(),
        role: "owner".to_string(),
    }]))
}

/// Handles `GET /v1/resources/{id}/credentials`.
async fn get_resource_credentials(
    State(state): State<Arc<ConnectorState>>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let resource = state.resource("/v1/resources/{id}/credentials", &headers, &raw_id)?;
    Ok(Json(state.store.credentials_for(resource.id)).into_response())
}

/// Handles `GET /v1/resources/{id}/measures`.
async fn get_resource_measures(
    State(state): State<Arc<ConnectorState>>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let resource = state.resource("/v1/resources/{id}/measures", &headers, &raw_id)?;
    Ok(Json(state.store.measures_for(resource.id)).into_response())
}

/// Handles `PUT /v1/resources/{id}/measures`.
async fn put_resource_measures(
    State(state): State<Arc<ConnectorState>>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let route = "/v1/resources/{id}/measures";
    let resource = state.resource(route, &headers, &raw_id)?;
    let report: MeasureReport =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("Could not parse request"))?;
    state.audit.record(
        &ConnectorAuditEvent::new("measures_recorded", route)
            .with_subject(resource.id.to_string())
            .with_detail(format!("{} features", report.measures.len())),
    );
    state.store.put_measures(resource.id, report);
    Ok(StatusCode::NO_CONTENT)
}
