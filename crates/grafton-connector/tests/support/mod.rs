// crates/grafton-connector/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Connector fixtures and blocking HTTP helpers.
// ============================================================================
//! ## Overview
//! Starts a connector on an ephemeral port and wraps the blocking client
//! calls the integration tests share.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    dead_code,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use grafton_connector::AccessTokenResponse;
use grafton_connector::ClientCredentials;
use grafton_connector::ConnectorSettings;
use grafton_connector::FakeConnector;
use reqwest::blocking::Client;
use reqwest::blocking::Response;

/// Client id every fixture connector expects.
pub const CLIENT_ID: &str = "21jtaatqj8y5t0kctb2ejr6jev5w8";
/// Client secret every fixture connector expects.
pub const CLIENT_SECRET: &str = "3yTKSiJ6f5V5Bq-kWF0hmdrEUep3m3HKPTcPX7CdBZw";
/// Product label every fixture connector reports.
pub const PRODUCT: &str = "bonnets";

/// Starts a connector on an ephemeral port.
pub fn start_connector() -> FakeConnector {
    let settings = ConnectorSettings::new(0, PRODUCT, ClientCredentials::new(CLIENT_ID, CLIENT_SECRET));
    FakeConnector::start(&settings).expect("connector starts")
}

/// Posts a form-encoded token request.
pub fn post_form(connector: &FakeConnector, fields: &[(&str, &str)]) -> Response {
    let body = fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    Client::new()
        .post(format!("{}/oauth/tokens", connector.base_url()))
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(body)
        .send()
        .expect("token request sends")
}

/// Obtains a client credentials bearer.
pub fn product_bearer(connector: &FakeConnector) -> String {
    let response = post_form(
        connector,
        &[
            ("grant_type", "client_credentials"),
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
        ],
    );
    assert_eq!(response.status().as_u16(), 201);
    response.json::<AccessTokenResponse>().expect("token body").access_token
}

/// Obtains an authorization code bearer.
pub fn user_bearer(connector: &FakeConnector) -> String {
    let code = connector.create_code();
    let response = post_form(
        connector,
        &[
            ("grant_type", "authorization_code"),
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
            ("code", &code.code),
        ],
    );
    assert_eq!(response.status().as_u16(), 201);
    response.json::<AccessTokenResponse>().expect("token body").access_token
}

/// Sends a GET with an optional bearer.
pub fn get(connector: &FakeConnector, path: &str, bearer: Option<&str>) -> Response {
    let mut request = Client::new().get(format!("{}{path}", connector.base_url()));
    if let Some(bearer) = bearer {
        request = request.header("Authorization", format!("Bearer {bearer}"));
    }
    request.send().expect("get sends")
}

/// Sends a JSON PUT with a bearer.
pub fn put_json(connector: &FakeConnector, path: &str, bearer: &str, body: &str) -> Response {
    Client::new()
        .put(format!("{}{path}", connector.base_url()))
        .header("Authorization", format!("Bearer {bearer}"))
        .header("Content-Type", "application/json")
        .body(body.to_string())
        .send()
        .expect("put sends")
}

/// Reads an error body's `message` field.
pub fn api_message(response: Response) -> String {
    let body: serde_json::Value = response.json().expect("error body");
    body["message"].as_str().unwrap_or_default().to_string()
}
