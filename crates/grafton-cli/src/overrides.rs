// crates/grafton-cli/src/overrides.rs
// ============================================================================
// Module: Flag Overrides
// Description: Command-line and environment values layered over the config file.
// Purpose: Keep one precedence order for every subcommand.
// Dependencies: clap, grafton-config, grafton-core
// ============================================================================

//! ## Overview
//! Values arrive from flags, then their environment fallbacks, then the
//! config file. Anything given on the command line replaces the config value;
//! the merged config is validated again before use, so a flag is held to the
//! same rules as its TOML equivalent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use clap::Args;
use grafton_config::ConfigError;
use grafton_config::GraftonConfig;
use grafton_config::flags;
use grafton_config::parse_plan_features;
use grafton_config::parse_resource_measures;
use grafton_core::LogLevel;

// ============================================================================
// SECTION: Run Flags
// ============================================================================

/// Flags shared by `test` and `validate`.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct RunFlags {
    /// The label of the product being provisioned.
    #[arg(long, env = "PRODUCT")]
    pub(crate) product: Option<String>,
    /// The label of the plan for the provisioning resource.
    #[arg(long, env = "PLAN")]
    pub(crate) plan: Option<String>,
    /// A JSON object describing the selected features for the plan.
    #[arg(long = "plan-features", env = "PLAN_FEATURES", value_name = "JSON")]
    pub(crate) plan_features: Option<String>,
    /// The plan to resize the resource to from the original plan.
    #[arg(long = "new-plan", env = "NEW_PLAN")]
    pub(crate) new_plan: Option<String>,
    /// A JSON object describing the selected features for the resize.
    #[arg(long = "new-plan-features", env = "NEW_PLAN_FEATURES", value_name = "JSON")]
    pub(crate) new_plan_features: Option<String>,
    /// The label of the region the resource will be provisioned in.
    #[arg(long, env = "REGION")]
    pub(crate) region: Option<String>,
    /// Skip these features and everything that runs inside them.
    #[arg(long, env = "EXCLUDE", value_delimiter = ',', value_name = "FEATURE")]
    pub(crate) exclude: Vec<String>,
    /// Skip running the error case tests.
    #[arg(long = "no-error-cases", env = "NO_ERROR_CASES")]
    pub(crate) no_error_cases: bool,
    /// Informational logging level during tests: off, info, or verbose.
    #[arg(long, env = "LOG", value_name = "LEVEL")]
    pub(crate) log: Option<LogLevel>,
    /// Connector flags.
    #[command(flatten)]
    pub(crate) connector: ConnectorFlags,
    /// Duration to wait (max. 24 hours) for a callback, e.g. `5m`.
    #[arg(long = "callback-timeout", env = "CALLBACK_TIMEOUT", value_name = "DURATION")]
    pub(crate) callback_timeout: Option<String>,
    /// Measures map returned by resource measures polling.
    #[arg(long = "resource-measures", value_name = "JSON")]
    pub(crate) resource_measures: Option<String>,
}

/// Flags describing the local connector, shared with `serve`.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ConnectorFlags {
    /// Client ID to use for SSO and local Connector API testing.
    #[arg(long = "client-id", env = "OAUTH2_CLIENT_ID")]
    pub(crate) client_id: Option<String>,
    /// Client secret to use for SSO and local Connector API testing.
    #[arg(long = "client-secret", env = "OAUTH2_CLIENT_SECRET")]
    pub(crate) client_secret: Option<String>,
    /// Local port for the fake Connector API.
    #[arg(long = "connector-port", env = "CONNECTOR_PORT", value_name = "PORT")]
    pub(crate) connector_port: Option<u16>,
}

impl ConnectorFlags {
    /// Writes the supplied values into `config`.
    pub(crate) fn overlay(&self, config: &mut GraftonConfig) {
        let connector = &mut config.connector;
        replace(&mut connector.client_id, self.client_id.as_deref());
        replace(&mut connector.client_secret, self.client_secret.as_deref());
        if self.connector_port.is_some() {
            connector.port = self.connector_port;
        }
    }
}

impl RunFlags {
    /// Merges the flags into `config` and revalidates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a JSON flag does not parse or the merged
    /// configuration is invalid.
    pub(crate) fn apply(&self, config: &mut GraftonConfig) -> Result<(), ConfigError> {
        let provider = &mut config.provider;
        replace(&mut provider.product, self.product.as_deref());
        replace(&mut provider.plan, self.plan.as_deref());
        replace(&mut provider.new_plan, self.new_plan.as_deref());
        replace(&mut provider.region, self.region.as_deref());
        if let Some(text) = &self.plan_features {
            provider.plan_features = Some(parse_plan_features(flags::PLAN_FEATURES, text)?);
        }
        if let Some(text) = &self.new_plan_features {
            provider.new_plan_features = Some(parse_plan_features(flags::NEW_PLAN_FEATURES, text)?);
        }

        let run = &mut config.run;
        if !self.exclude.is_empty() {
            run.exclude.clone_from(&self.exclude);
        }
        if self.no_error_cases {
            run.error_cases = false;
        }
        if let Some(level) = self.log {
            run.log = level;
        }

        self.connector.overlay(config);
        replace(&mut config.connector.callback_timeout, self.callback_timeout.as_deref());
        if let Some(text) = &self.resource_measures {
            config.connector.resource_measures = Some(parse_resource_measures(text)?);
        }
        config.validate()
    }
}

/// Replaces `slot` when `value` was supplied.
fn replace(slot: &mut Option<String>, value: Option<&str>) {
    if let Some(value) = value {
        *slot = Some(value.to_string());
    }
}
