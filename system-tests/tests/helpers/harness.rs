// system-tests/tests/helpers/harness.rs
// ============================================================================
// Module: Run Harness
// Description: Wires connector, stub provider, and clients into one context.
// Purpose: Give each suite a ready acceptance context in a single call.
// Dependencies: grafton-acceptance, grafton-client, grafton-connector
// ============================================================================

use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;

use grafton_acceptance::AcceptanceContext;
use grafton_acceptance::AcceptanceSettings;
use grafton_client::LiveKeypair;
use grafton_client::MasterKeypair;
use grafton_client::ProviderClient;
use grafton_config::default_resource_measures;
use grafton_connector::ClientCredentials;
use grafton_connector::ConnectorSettings;
use grafton_connector::FakeConnector;
use grafton_core::MemorySink;
use grafton_core::Reporter;
use serde_json::json;
use system_tests::config::SystemTestConfig;
use url::Url;

use super::provider_stub::Delivery;
use super::provider_stub::ProviderStubConfig;
use super::provider_stub::ProviderStubHandle;
use super::provider_stub::spawn_provider_stub;

/// Boxed error type shared by system-test helpers.
pub type HarnessResult<T> = Result<T, Box<dyn Error>>;

pub const PRODUCT: &str = "bonnets";
pub const PLAN: &str = "small";
pub const NEW_PLAN: &str = "large";
pub const REGION: &str = "aws::us-east-1";
pub const CLIENT_ID: &str = "21jtaatqj8y5t0kctb2ejr6jev5w8";
pub const CLIENT_SECRET: &str = "3yTKSiJ6f5V5Bq-kWF0hmdrEUep3m3HKPTcPX7CdBZw";

/// A wired run: context, its output, and the provider behind it.
pub struct Run {
    /// Context handed to the suite.
    pub context: AcceptanceContext,
    /// Reporter output.
    pub output: MemorySink,
    /// Stub provider; dropped after the context.
    pub provider: ProviderStubHandle,
}

/// Credential names a well-behaved stub issues.
pub fn default_credential_names() -> Vec<String> {
    vec!["DATABASE_URL".to_string(), "PASSWORD".to_string()]
}

/// Settings for the `bonnets` product used by every run.
fn settings(config: &SystemTestConfig) -> AcceptanceSettings {
    AcceptanceSettings {
        product: PRODUCT.to_string(),
        plan: PLAN.to_string(),
        plan_features: BTreeMap::from([("size".to_string(), json!("10GB"))]),
        new_plan: NEW_PLAN.to_string(),
        new_plan_features: BTreeMap::from([("size".to_string(), json!("40GB"))]),
        region: REGION.to_string(),
        client_id: CLIENT_ID.to_string(),
        client_secret: CLIENT_SECRET.to_string(),
        callback_timeout: config.callback_timeout,
        resource_measures: default_resource_measures(),
    }
}

/// Starts a connector and a stub provider answering in `delivery` mode.
pub fn start_run(delivery: Delivery, credential_names: Vec<String>) -> HarnessResult<Run> {
    let config = SystemTestConfig::load()?;
    let master = MasterKeypair::generate();
    let connector = FakeConnector::start(&ConnectorSettings::new(
        0,
        PRODUCT,
        ClientCredentials::new(CLIENT_ID, CLIENT_SECRET),
    ))?;
    let connector_url = connector.base_url();

    let provider = spawn_provider_stub(ProviderStubConfig {
        master: master.verifying_key(),
        product: PRODUCT.to_string(),
        plans: vec![PLAN.to_string(), NEW_PLAN.to_string()],
        region: REGION.to_string(),
        connector_url: connector_url.clone(),
        client_id: CLIENT_ID.to_string(),
        client_secret: CLIENT_SECRET.to_string(),
        delivery,
        callback_delay: config.callback_delay,
        credential_names,
    })?;

    let provider_url = Url::parse(provider.base_url())?;
    let connector_url = Url::parse(&connector_url)?;
    let api =
        ProviderClient::new(provider_url.clone(), connector_url.clone(), Arc::new(master.live_keypair()))?;
    let unauthorized =
        ProviderClient::new(provider_url, connector_url, Arc::new(LiveKeypair::unendorsed()))?;
    let (reporter, output) = Reporter::buffered(config.log);
    let context = AcceptanceContext::new(api, unauthorized, connector, settings(&config), Arc::new(reporter));
    Ok(Run {
        context,
        output,
        provider,
    })
}
