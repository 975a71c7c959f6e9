// crates/grafton-acceptance/src/context.rs
// ============================================================================
// Module: Acceptance Context
// Description: Everything a feature body touches during one run.
// Purpose: Bind the provider clients, the connector, and run settings.
// Dependencies: grafton-client, grafton-config, grafton-connector, grafton-core
// ============================================================================

//! ## Overview
//! Feature bodies receive `&mut AcceptanceContext`. Identifiers produced by
//! one feature (the provisioned resource, issued credential sets) are kept in
//! [`RunIds`] so later features and teardowns can address them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use grafton_client::ProviderClient;
use grafton_config::ConfigError;
use grafton_config::GraftonConfig;
use grafton_connector::Callback;
use grafton_connector::CallbackError;
use grafton_connector::CallbackType;
use grafton_connector::FakeConnector;
use grafton_core::Failure;
use grafton_core::ObjectId;
use grafton_core::Reporter;
use serde_json::Value;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Provider-facing values the features send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceSettings {
    /// Product label under test.
    pub product: String,
    /// Plan label for provisioning.
    pub plan: String,
    /// Features of `plan`.
    pub plan_features: BTreeMap<String, Value>,
    /// Plan label for resizing.
    pub new_plan: String,
    /// Features of `new_plan`.
    pub new_plan_features: BTreeMap<String, Value>,
    /// Region for provisioning.
    pub region: String,
    /// OAuth client id the provider authenticates with.
    pub client_id: String,
    /// OAuth client secret the provider authenticates with.
    pub client_secret: String,
    /// Upper bound on one callback wait.
    pub callback_timeout: Duration,
    /// Usage the platform reports for a provisioned resource.
    pub resource_measures: BTreeMap<String, i64>,
}

impl AcceptanceSettings {
    /// Extracts the settings from a loaded configuration.
    ///
    /// Unset values become empty; flag validation decides whether a feature
    /// that needs them may run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the callback timeout is invalid.
    pub fn from_config(config: &GraftonConfig) -> Result<Self, ConfigError> {
        let provider = &config.provider;
        let connector = &config.connector;
        Ok(Self {
            product: provider.product.clone().unwrap_or_default(),
            plan: provider.plan.clone().unwrap_or_default(),
            plan_features: provider.plan_features(),
            new_plan: provider.new_plan.clone().unwrap_or_default(),
            new_plan_features: provider.new_plan_features(),
            region: provider.region.clone().unwrap_or_default(),
            client_id: connector.client_id.clone().unwrap_or_default(),
            client_secret: connector.client_secret.clone().unwrap_or_default(),
            callback_timeout: connector.callback_timeout()?,
            resource_measures: connector.resource_measures(),
        })
    }
}

// ============================================================================
// SECTION: Run State
// ============================================================================

/// Identifiers created by earlier features in the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunIds {
    /// Resource created by `provision`.
    pub resource: Option<ObjectId>,
    /// Credential set created by `credentials`.
    pub credential: Option<ObjectId>,
    /// Credential set created by `credentials_rotation`.
    pub rotated_credential: Option<ObjectId>,
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// Which client signs a provider request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signing {
    /// Live key endorsed by the master key.
    Endorsed,
    /// Live key with a bogus endorsement.
    Unendorsed,
}

/// Harness state shared by every feature body.
pub struct AcceptanceContext {
    /// Client signing with an endorsed live key.
    pub api: ProviderClient,
    /// Client signing with an unendorsed key.
    pub unauthorized_api: ProviderClient,
    /// Connector the provider calls back into.
    pub connector: FakeConnector,
    /// Values sent to the provider.
    pub settings: AcceptanceSettings,
    /// Run reporter.
    pub reporter: Arc<Reporter>,
    /// Identifiers produced so far.
    pub ids: RunIds,
}

impl AcceptanceContext {
    /// Builds a context with no identifiers recorded.
    #[must_use]
    pub fn new(
        api: ProviderClient,
        unauthorized_api: ProviderClient,
        connector: FakeConnector,
        settings: AcceptanceSettings,
        reporter: Arc<Reporter>,
    ) -> Self {
        Self {
            api,
            unauthorized_api,
            connector,
            settings,
            reporter,
            ids: RunIds::default(),
        }
    }

    /// Logs an info line.
    pub fn info(&self, message: &str) {
        self.reporter.info(message);
    }

    /// Returns the provisioned resource.
    ///
    /// # Errors
    ///
    /// Returns an assertion failure when `provision` recorded nothing.
    pub fn resource_id(&self) -> Result<ObjectId, Failure> {
        self.ids.resource.ok_or_else(|| Failure::assertion("no resource has been provisioned"))
    }

    /// Returns the client for `signing`.
    #[must_use]
    pub const fn client(&self, signing: Signing) -> &ProviderClient {
        match signing {
            Signing::Endorsed => &self.api,
            Signing::Unendorsed => &self.unauthorized_api,
        }
    }

    /// Registers a pending callback for an operation of `kind`.
    ///
    /// # Errors
    ///
    /// Returns a fatal failure when the registry has stopped.
    pub fn open_callback(&self, kind: CallbackType) -> Result<ObjectId, Failure> {
        self.connector
            .callbacks()
            .add(kind)
            .map(|callback| callback.id)
            .map_err(|err| Failure::fatal(format!("could not register callback: {err}")))
    }

    /// Waits out a deferred answer; returns the final message and callback.
    ///
    /// # Errors
    ///
    /// Same as [`Self::await_callback`].
    pub fn settle(
        &self,
        callback_id: ObjectId,
        message: String,
        deferred: bool,
    ) -> Result<(String, Option<Callback>), Failure> {
        if !deferred {
            return Ok((message, None));
        }
        let callback = self.await_callback(callback_id, &message)?;
        Ok((callback.message.clone(), Some(callback)))
    }

    /// Blocks until callback `id` resolves, bounded by the callback timeout.
    ///
    /// # Errors
    ///
    /// A timeout is an assertion failure; a vanished registry is fatal.
    pub fn await_callback(&self, id: ObjectId, message: &str) -> Result<Callback, Failure> {
        let timeout = self.settings.callback_timeout;
        self.info(&format!(
            "Waiting for Callback (max: {:.1} minutes): {message}",
            timeout.as_secs_f64() / 60.0
        ));
        self.connector.callbacks().wait_for_callback(id, timeout).map_err(|err| match err {
            CallbackError::Timeout {
                ..
            } => Failure::assertion("Exceeded Callback Wait time"),
            other => Failure::fatal(format!("callback wait failed: {other}")),
        })
    }
}
