// crates/grafton-acceptance/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Result helpers, a scripted provider, and context fixtures.
// ============================================================================
//! ## Overview
//! Builds an [`AcceptanceContext`] wired to a live connector and to a
//! `tiny_http` provider that answers every request the same way.

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

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use grafton_acceptance::AcceptanceContext;
use grafton_acceptance::AcceptanceSettings;
use grafton_client::LiveKeypair;
use grafton_client::MasterKeypair;
use grafton_client::ProviderClient;
use grafton_config::default_resource_measures;
use grafton_connector::ClientCredentials;
use grafton_connector::ConnectorSettings;
use grafton_connector::FakeConnector;
use grafton_core::FeatureLabel;
use grafton_core::FeatureRegistry;
use grafton_core::Graph;
use grafton_core::LogLevel;
use grafton_core::MemorySink;
use grafton_core::Reporter;
use grafton_core::walk;
use tiny_http::Response;
use tiny_http::Server;
use url::Url;

// ========================================================================
// Test Result Helpers
// ========================================================================

/// Standard result type used across acceptance integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Lightweight error type for test assertions.
#[derive(Debug)]
struct TestError {
    /// Human-readable failure message.
    message: String,
}

impl fmt::Display for TestError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl Error for TestError {}

/// Returns an error when a test condition fails.
///
/// # Errors
/// Returns a `TestError` when the condition is false.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(Box::new(TestError {
            message: message.into(),
        }))
    }
}

// ========================================================================
// Fixtures
// ========================================================================

/// Client id the connector expects.
pub const CLIENT_ID: &str = "21jtaatqj8y5t0kctb2ejr6jev5w8";
/// Client secret the connector expects.
pub const CLIENT_SECRET: &str = "3yTKSiJ6f5V5Bq-kWF0hmdrEUep3m3HKPTcPX7CdBZw";

/// Settings for the `bonnets` product.
pub fn settings() -> AcceptanceSettings {
    AcceptanceSettings {
        product: "bonnets".to_string(),
        plan: "small".to_string(),
        plan_features: BTreeMap::new(),
        new_plan: "large".to_string(),
        new_plan_features: BTreeMap::new(),
        region: "aws::us-east-1".to_string(),
        client_id: CLIENT_ID.to_string(),
        client_secret: CLIENT_SECRET.to_string(),
        callback_timeout: Duration::from_secs(2),
        resource_measures: default_resource_measures(),
    }
}

/// Starts a provider answering every request with `status` and `body`.
///
/// Returns the provider's `/v1` base URL.
pub fn scripted_provider(status: u16, body: &'static str) -> TestResult<Url> {
    let server = Server::http("127.0.0.1:0").map_err(|err| err.to_string())?;
    let addr = server.server_addr().to_ip().ok_or("provider has no ip address")?;
    thread::spawn(move || {
        for request in server.incoming_requests() {
            let response = Response::from_string(body)
                .with_status_code(status)
                .with_header(
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .unwrap(),
                );
            let _ = request.respond(response);
        }
    });
    Ok(Url::parse(&format!("http://{addr}/v1"))?)
}

/// Builds a context against `provider` with an info-level buffered reporter.
pub fn context(provider: Url) -> TestResult<(AcceptanceContext, MemorySink)> {
    let (reporter, sink) = Reporter::buffered(LogLevel::Info);
    let connector = FakeConnector::start(&ConnectorSettings::new(
        0,
        "bonnets",
        ClientCredentials::new(CLIENT_ID, CLIENT_SECRET),
    ))?;
    let connector_url = Url::parse(&connector.base_url())?;
    let master = MasterKeypair::generate();
    let api = ProviderClient::new(provider.clone(), connector_url.clone(), Arc::new(master.live_keypair()))?;
    let unauthorized = ProviderClient::new(provider, connector_url, Arc::new(LiveKeypair::unendorsed()))?;
    let context = AcceptanceContext::new(api, unauthorized, connector, settings(), Arc::new(reporter));
    Ok((context, sink))
}

/// Walks the registry's graph and returns `label` / `label-td` in visit order.
pub fn walk_order<C>(registry: &FeatureRegistry<C>, exclude: &[&str]) -> TestResult<Vec<String>> {
    let mut graph = Graph::build(registry)?;
    let exclude: Vec<FeatureLabel> = exclude.iter().map(|label| FeatureLabel::from(*label)).collect();
    let mut order = Vec::new();
    walk(&mut graph, &exclude, false, |feature, state| {
        if state.has_run {
            order.push(format!("{}-td", feature.label()));
        } else {
            state.has_run = true;
            order.push(feature.label().to_string());
        }
        Ok(true)
    })?;
    Ok(order)
}
