// system-tests/tests/helpers/provider_stub.rs
// ============================================================================
// Module: Provider Stub
// Description: Signature-checking provider that answers the acceptance suite.
// Purpose: Exercise full runs over HTTP without a real provider.
// Dependencies: axum, grafton-client, grafton-connector, reqwest, tokio
// ============================================================================

//! ## Overview
//! A minimal well-behaved provider. Every resource and credential request
//! must carry a valid signature endorsed by the configured master key. With
//! [`Delivery::Callback`] the stub answers `202`, then obtains a
//! `client_credentials` token from the connector and resolves the callback
//! named in `X-Callback-Url`.

use std::collections::BTreeMap;
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::http::header::CONTENT_TYPE;
use axum::http::header::LOCATION;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::put;
use ed25519_dalek::VerifyingKey;
use grafton_client::signing::CALLBACK_URL_HEADER;
use grafton_client::verify_request;
use grafton_connector::AccessTokenResponse;
use grafton_connector::CallbackRequest;
use grafton_connector::CallbackState;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tokio::time::sleep;

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// How the stub answers operations that change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Final answer in the HTTP response.
    Immediate,
    /// `202` now, callback resolution afterwards.
    Callback,
}

/// Catalog and connector details the stub serves.
#[derive(Debug, Clone)]
pub struct ProviderStubConfig {
    /// Key that must endorse every request signature.
    pub master: VerifyingKey,
    /// Accepted product label.
    pub product: String,
    /// Accepted plan labels.
    pub plans: Vec<String>,
    /// Accepted region label.
    pub region: String,
    /// Connector API base, ending in `/v1`.
    pub connector_url: String,
    /// OAuth client id used against the connector.
    pub client_id: String,
    /// OAuth client secret used against the connector.
    pub client_secret: String,
    /// Answer mode.
    pub delivery: Delivery,
    /// Wait before resolving a callback.
    pub callback_delay: Duration,
    /// Names of the credentials issued per set.
    pub credential_names: Vec<String>,
}

/// Recorded request metadata for provider stub calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubRequest {
    /// Request method.
    pub method: String,
    /// Request path without query.
    pub path: String,
    /// Status the stub answered with.
    pub status: u16,
}

// ============================================================================
// SECTION: State
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct StoredResource {
    plan: String,
    features: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
struct StoredCredentials {
    resource_id: String,
    values: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct Records {
    resources: BTreeMap<String, StoredResource>,
    credentials: BTreeMap<String, StoredCredentials>,
}

#[derive(Clone)]
struct StubState {
    config: Arc<ProviderStubConfig>,
    records: Arc<Mutex<Records>>,
    requests: Arc<Mutex<Vec<StubRequest>>>,
    deliveries: Arc<Mutex<Vec<u16>>>,
    http: reqwest::Client,
}

impl StubState {
    fn records(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the exchange and hands the response back.
    fn finish(&self, method: &Method, uri: &Uri, response: Response) -> Response {
        let entry = StubRequest {
            method: method.to_string(),
            path: uri.path().to_string(),
            status: response.status().as_u16(),
        };
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
        response
    }

    /// Checks the request signature; the refusal is a ready `401`.
    fn verify(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<(), Response> {
        let target = uri.path_and_query().map_or_else(|| uri.path(), |target| target.as_str());
        verify_request(&self.config.master, method.as_str(), target, |name| header(headers, name), body)
            .map_err(|err| refuse(StatusCode::UNAUTHORIZED, &format!("bad signature: {err}")))
    }

    /// Answers a successful operation in the configured mode.
    fn deliver(
        &self,
        headers: &HeaderMap,
        status: StatusCode,
        message: &str,
        credentials: BTreeMap<String, String>,
    ) -> Response {
        if self.config.delivery == Delivery::Immediate {
            return answer(status, message, credentials);
        }
        let Some(callback_url) = header(headers, CALLBACK_URL_HEADER) else {
            return refuse(StatusCode::BAD_REQUEST, "missing X-Callback-Url header");
        };
        let resolution = CallbackRequest {
            state: CallbackState::Done,
            message: message.to_string(),
            credentials,
        };
        let state = self.clone();
        tokio::spawn(async move {
            sleep(state.config.callback_delay).await;
            let status = state.resolve(&callback_url, &resolution).await.unwrap_or_default();
            state.deliveries.lock().unwrap_or_else(PoisonError::into_inner).push(status);
        });
        answer(StatusCode::ACCEPTED, "request accepted, callback to follow", BTreeMap::new())
    }

    /// PUTs `resolution` to the connector; returns the connector's status.
    async fn resolve(&self, callback_url: &str, resolution: &CallbackRequest) -> Result<u16, String> {
        let token = self.client_token().await?;
        let body = serde_json::to_vec(resolution).map_err(|err| err.to_string())?;
        let response = self
            .http
            .put(callback_url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        Ok(response.status().as_u16())
    }

    /// Obtains a `client_credentials` token for the connector API.
    async fn client_token(&self) -> Result<String, String> {
        let config = &self.config;
        self.token(&[
            ("grant_type", "client_credentials"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ])
        .await?
        .ok_or_else(|| "connector refused the client credentials".to_string())
    }

    /// Requests a token; `None` when the connector refuses.
    async fn token(&self, fields: &[(&str, &str)]) -> Result<Option<String>, String> {
        let body = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(fields).finish();
        let response = self
            .http
            .post(format!("{}/oauth/tokens", self.config.connector_url))
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if response.status().as_u16() != 201 {
            return Ok(None);
        }
        let bytes = response.bytes().await.map_err(|err| err.to_string())?;
        let token: AccessTokenResponse = serde_json::from_slice(&bytes).map_err(|err| err.to_string())?;
        Ok(Some(token.access_token))
    }

    /// Latest usage the connector holds for `resource_id` in the period.
    async fn platform_measures(
        &self,
        resource_id: &str,
        period: &PeriodQuery,
    ) -> Result<BTreeMap<String, i64>, String> {
        let token = self.client_token().await?;
        let response = self
            .http
            .get(format!("{}/resources/{resource_id}/measures", self.config.connector_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if response.status().as_u16() != 200 {
            return Ok(BTreeMap::new());
        }
        let bytes = response.bytes().await.map_err(|err| err.to_string())?;
        let records: Vec<PlatformMeasures> = serde_json::from_slice(&bytes).map_err(|err| err.to_string())?;
        Ok(records
            .into_iter()
            .rev()
            .find(|record| record.period_start == period.period_start && record.period_end == period.period_end)
            .map(|record| record.measures)
            .unwrap_or_default())
    }
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Handle for the stub provider server.
pub struct ProviderStubHandle {
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
    state: StubState,
}

impl ProviderStubHandle {
    /// Returns the provider API base, ending in `/v1`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns captured provider requests.
    pub fn requests(&self) -> Vec<StubRequest> {
        self.state.requests.lock().map_or_else(|_| Vec::new(), |entries| entries.clone())
    }

    /// Connector statuses for every callback the stub resolved; `0` when the
    /// resolution never reached the connector.
    pub fn callback_statuses(&self) -> Vec<u16> {
        self.state.deliveries.lock().map_or_else(|_| Vec::new(), |entries| entries.clone())
    }

    /// Waits until at least `count` callback resolutions have returned.
    ///
    /// A resolution is recorded only after the connector's reply arrives, so
    /// the last few may trail the run that waited on them.
    pub fn await_callback_statuses(&self, count: usize, timeout: Duration) -> Vec<u16> {
        let deadline = Instant::now() + timeout;
        loop {
            let statuses = self.callback_statuses();
            if statuses.len() >= count || Instant::now() >= deadline {
                return statuses;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Number of resources the stub still holds.
    pub fn resource_count(&self) -> usize {
        self.state.records().resources.len()
    }
}

impl Drop for ProviderStubHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawn the stub provider on its own runtime thread.
pub fn spawn_provider_stub(config: ProviderStubConfig) -> Result<ProviderStubHandle, String> {
    let listener = StdTcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("provider stub bind failed: {err}"))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("provider stub listener nonblocking failed: {err}"))?;
    let addr =
        listener.local_addr().map_err(|err| format!("provider stub local addr failed: {err}"))?;
    let base_url = format!("http://{addr}/v1");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|err| format!("provider stub http client failed: {err}"))?;
    let state = StubState {
        config: Arc::new(config),
        records: Arc::new(Mutex::new(Records::default())),
        requests: Arc::new(Mutex::new(Vec::new())),
        deliveries: Arc::new(Mutex::new(Vec::new())),
        http,
    };
    let app = Router::new()
        .route("/v1/resources/{id}", put(put_resource).patch(patch_resource).delete(delete_resource))
        .route("/v1/resources/{id}/measures", get(get_measures))
        .route("/v1/credentials/{id}", put(put_credentials).delete(delete_credentials))
        .route("/v1/sso", get(sso))
        .with_state(state.clone());
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = thread::spawn(move || {
        let Ok(runtime) = Builder::new_current_thread().enable_all().build() else {
            return;
        };
        runtime.block_on(async move {
            let Ok(listener) = tokio::net::TcpListener::from_std(listener) else {
                return;
            };
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });
    });
    Ok(ProviderStubHandle {
        base_url,
        shutdown: Some(shutdown_tx),
        join: Some(join),
        state,
    })
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ResourceBody {
    id: String,
    product: String,
    plan: String,
    region: String,
    #[serde(default)]
    features: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct PlanChangeBody {
    plan: String,
    #[serde(default)]
    features: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CredentialBody {
    id: String,
    resource_id: String,
}

#[derive(Debug, Deserialize)]
struct SsoQuery {
    #[serde(default)]
    code: String,
    #[serde(default)]
    resource_id: String,
}

#[derive(Debug, Deserialize)]
struct PeriodQuery {
    period_start: String,
    period_end: String,
}

#[derive(Debug, Deserialize)]
struct PlatformMeasures {
    period_start: String,
    period_end: String,
    #[serde(default)]
    measures: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
struct ReplyBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    credentials: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct MeasuresBody {
    resource_id: String,
    period_start: String,
    period_end: String,
    measures: BTreeMap<String, i64>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
}

fn answer(status: StatusCode, message: &str, credentials: BTreeMap<String, String>) -> Response {
    if status == StatusCode::NO_CONTENT {
        return status.into_response();
    }
    (
        status,
        Json(ReplyBody {
            message,
            credentials,
        }),
    )
        .into_response()
}

fn refuse(status: StatusCode, message: &str) -> Response {
    answer(status, message, BTreeMap::new())
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|_| refuse(StatusCode::BAD_REQUEST, "could not parse request body"))
}

// ============================================================================
// SECTION: Resource Handlers
// ============================================================================

async fn put_resource(
    State(state): State<StubState>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let response = state
        .verify(&method, &uri, &headers, &body)
        .and_then(|()| provision_resource(&state, id, &headers, &body))
        .unwrap_or_else(|refusal| refusal);
    state.finish(&method, &uri, response)
}

fn provision_resource(
    state: &StubState,
    id: String,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, Response> {
    let request: ResourceBody = parse(body)?;
    let config = &state.config;
    if request.id != id {
        return Err(refuse(StatusCode::BAD_REQUEST, "body id does not match the path"));
    }
    if request.product != config.product {
        return Err(refuse(StatusCode::BAD_REQUEST, "unknown product"));
    }
    if !config.plans.contains(&request.plan) {
        return Err(refuse(StatusCode::BAD_REQUEST, "unknown plan"));
    }
    if request.region != config.region {
        return Err(refuse(StatusCode::BAD_REQUEST, "unknown region"));
    }
    let resource = StoredResource {
        plan: request.plan,
        features: request.features,
    };
    {
        let mut records = state.records();
        match records.resources.get(&id) {
            Some(existing) if *existing == resource => {
                return Ok(answer(StatusCode::CREATED, "resource already provisioned", BTreeMap::new()));
            }
            Some(_) => {
                return Err(refuse(StatusCode::CONFLICT, "resource exists with different content"));
            }
            None => {}
        }
        records.resources.insert(id, resource);
    }
    Ok(state.deliver(headers, StatusCode::CREATED, "resource provisioned", BTreeMap::new()))
}

async fn patch_resource(
    State(state): State<StubState>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let response = state
        .verify(&method, &uri, &headers, &body)
        .and_then(|()| change_plan(&state, &id, &headers, &body))
        .unwrap_or_else(|refusal| refusal);
    state.finish(&method, &uri, response)
}

fn change_plan(
    state: &StubState,
    id: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, Response> {
    let request: PlanChangeBody = parse(body)?;
    {
        let mut records = state.records();
        let Some(resource) = records.resources.get_mut(id) else {
            return Err(refuse(StatusCode::NOT_FOUND, "resource not found"));
        };
        if !state.config.plans.contains(&request.plan) {
            return Err(refuse(StatusCode::BAD_REQUEST, "unknown plan"));
        }
        if resource.plan == request.plan && resource.features == request.features {
            return Ok(StatusCode::NO_CONTENT.into_response());
        }
        resource.plan = request.plan;
        resource.features = request.features;
    }
    Ok(state.deliver(headers, StatusCode::OK, "plan changed", BTreeMap::new()))
}

async fn delete_resource(
    State(state): State<StubState>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let response = state
        .verify(&method, &uri, &headers, &body)
        .and_then(|()| {
            let mut records = state.records();
            if records.resources.remove(&id).is_none() {
                return Err(refuse(StatusCode::NOT_FOUND, "resource not found"));
            }
            records.credentials.retain(|_, credentials| credentials.resource_id != id);
            drop(records);
            Ok(state.deliver(&headers, StatusCode::NO_CONTENT, "resource deprovisioned", BTreeMap::new()))
        })
        .unwrap_or_else(|refusal| refusal);
    state.finish(&method, &uri, response)
}

async fn get_measures(
    State(state): State<StubState>,
    Path(id): Path<String>,
    Query(period): Query<PeriodQuery>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(refusal) = state.verify(&method, &uri, &headers, &body) {
        return state.finish(&method, &uri, refusal);
    }
    let known = state.records().resources.contains_key(&id);
    if !known {
        return state.finish(&method, &uri, refuse(StatusCode::NOT_FOUND, "resource not found"));
    }
    let response = match state.platform_measures(&id, &period).await {
        Ok(measures) => (
            StatusCode::OK,
            Json(MeasuresBody {
                resource_id: id,
                period_start: period.period_start,
                period_end: period.period_end,
                measures,
            }),
        )
            .into_response(),
        Err(err) => refuse(StatusCode::INTERNAL_SERVER_ERROR, &err),
    };
    state.finish(&method, &uri, response)
}

// ============================================================================
// SECTION: Credential Handlers
// ============================================================================

async fn put_credentials(
    State(state): State<StubState>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let response = state
        .verify(&method, &uri, &headers, &body)
        .and_then(|()| provision_credentials(&state, id, &headers, &body))
        .unwrap_or_else(|refusal| refusal);
    state.finish(&method, &uri, response)
}

fn provision_credentials(
    state: &StubState,
    id: String,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, Response> {
    let request: CredentialBody = parse(body)?;
    if request.id != id {
        return Err(refuse(StatusCode::BAD_REQUEST, "body id does not match the path"));
    }
    let values = {
        let mut records = state.records();
        if !records.resources.contains_key(&request.resource_id) {
            return Err(refuse(StatusCode::NOT_FOUND, "resource not found"));
        }
        if let Some(existing) = records.credentials.get(&id) {
            if existing.resource_id != request.resource_id {
                return Err(refuse(StatusCode::CONFLICT, "credentials belong to another resource"));
            }
            return Ok(answer(StatusCode::CREATED, "credentials already provisioned", existing.values.clone()));
        }
        let values: BTreeMap<String, String> = state
            .config
            .credential_names
            .iter()
            .map(|name| (name.clone(), format!("{}-{id}", name.to_ascii_lowercase())))
            .collect();
        records.credentials.insert(
            id,
            StoredCredentials {
                resource_id: request.resource_id,
                values: values.clone(),
            },
        );
        values
    };
    Ok(state.deliver(headers, StatusCode::CREATED, "credentials provisioned", values))
}

async fn delete_credentials(
    State(state): State<StubState>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let response = state
        .verify(&method, &uri, &headers, &body)
        .and_then(|()| {
            if state.records().credentials.remove(&id).is_none() {
                return Err(refuse(StatusCode::NOT_FOUND, "credentials not found"));
            }
            Ok(state.deliver(&headers, StatusCode::NO_CONTENT, "credentials deprovisioned", BTreeMap::new()))
        })
        .unwrap_or_else(|refusal| refusal);
    state.finish(&method, &uri, response)
}

// ============================================================================
// SECTION: SSO Handler
// ============================================================================

async fn sso(
    State(state): State<StubState>,
    Query(query): Query<SsoQuery>,
    method: Method,
    uri: Uri,
) -> Response {
    let config = Arc::clone(&state.config);
    let exchange = state
        .token(&[
            ("grant_type", "authorization_code"),
            ("code", query.code.as_str()),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ])
        .await;
    let response = match exchange {
        Ok(Some(_)) => {
            (StatusCode::FOUND, [(LOCATION, format!("/dashboard/{}", query.resource_id))]).into_response()
        }
        Ok(None) => refuse(StatusCode::UNAUTHORIZED, "code exchange refused"),
        Err(err) => refuse(StatusCode::UNAUTHORIZED, &err),
    };
    state.finish(&method, &uri, response)
}
