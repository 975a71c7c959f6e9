// crates/grafton-config/src/config.rs
// ============================================================================
// Module: Grafton Configuration
// Description: Configuration loading and validation for the harness.
// Purpose: Provide strict config parsing with hard limits and typed accessors.
// Dependencies: grafton-core, serde, serde_json, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional; omitted values fall back to defaults, and unset
//! provider settings stay unset so flag validation can report them. Command
//! line flags are layered on top by overwriting the public fields.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use grafton_core::FeatureLabel;
use grafton_core::LogLevel;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::duration::parse_duration;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "grafton.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "GRAFTON_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default provider API URL.
pub const DEFAULT_PROVIDER_URL: &str = "http://localhost:3000";
/// Default local connector port.
pub const DEFAULT_CONNECTOR_PORT: u16 = 3001;
/// Default callback wait.
pub const DEFAULT_CALLBACK_TIMEOUT: &str = "5m";
/// Hard ceiling for the callback wait.
pub const MAX_CALLBACK_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
/// Default master key filename.
pub const DEFAULT_MASTER_KEY_FILE: &str = "masterkey.json";
/// API version path segment required on the provider URL.
const API_VERSION_SEGMENT: &str = "v1";

// ============================================================================
// SECTION: Flag Names
// ============================================================================

/// External flag names, as features declare them.
pub mod flags {
    /// Product label.
    pub const PRODUCT: &str = "product";
    /// Plan label.
    pub const PLAN: &str = "plan";
    /// Plan features JSON.
    pub const PLAN_FEATURES: &str = "plan-features";
    /// Resize target plan.
    pub const NEW_PLAN: &str = "new-plan";
    /// Resize target plan features JSON.
    pub const NEW_PLAN_FEATURES: &str = "new-plan-features";
    /// Region label.
    pub const REGION: &str = "region";
    /// OAuth client id.
    pub const CLIENT_ID: &str = "client-id";
    /// OAuth client secret.
    pub const CLIENT_SECRET: &str = "client-secret";
    /// Local connector port.
    pub const CONNECTOR_PORT: &str = "connector-port";
    /// Callback wait.
    pub const CALLBACK_TIMEOUT: &str = "callback-timeout";
    /// Resource measures JSON.
    pub const RESOURCE_MEASURES: &str = "resource-measures";
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration Model
// ============================================================================

/// Top-level harness configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraftonConfig {
    /// Provider under test.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Local fake connector.
    #[serde(default)]
    pub connector: ConnectorConfig,
    /// Run selection and output.
    #[serde(default)]
    pub run: RunConfig,
    /// Signing keys.
    #[serde(default)]
    pub keys: KeysConfig,
}

/// Provider settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Provider API root URL.
    #[serde(default = "default_provider_url")]
    pub url: String,
    /// Product label.
    #[serde(default)]
    pub product: Option<String>,
    /// Plan label.
    #[serde(default)]
    pub plan: Option<String>,
    /// Features selected for the plan.
    #[serde(default)]
    pub plan_features: Option<BTreeMap<String, Value>>,
    /// Plan to resize to.
    #[serde(default)]
    pub new_plan: Option<String>,
    /// Features selected for the resize plan.
    #[serde(default)]
    pub new_plan_features: Option<BTreeMap<String, Value>>,
    /// Region label.
    #[serde(default)]
    pub region: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: default_provider_url(),
            product: None,
            plan: None,
            plan_features: None,
            new_plan: None,
            new_plan_features: None,
            region: None,
        }
    }
}

/// Fake connector settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectorConfig {
    /// Local port; unset means the default.
    #[serde(default)]
    pub port: Option<u16>,
    /// OAuth client id.
    #[serde(default)]
    pub client_id: Option<String>,
    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Callback wait as a duration string.
    #[serde(default)]
    pub callback_timeout: Option<String>,
    /// Measures returned by usage polling.
    #[serde(default)]
    pub resource_measures: Option<BTreeMap<String, i64>>,
    /// Audit event output.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Audit event output settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Enables audit events.
    #[serde(default)]
    pub enabled: bool,
    /// Append events to this file instead of stderr.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Run selection and output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Feature labels to skip, with everything inside them.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Runs error cases when true.
    #[serde(default = "default_true")]
    pub error_cases: bool,
    /// Informational log level.
    #[serde(default)]
    pub log: LogLevel,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            error_cases: true,
            log: LogLevel::Off,
        }
    }
}

/// Signing key settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeysConfig {
    /// Master keypair file.
    #[serde(default = "default_master_key")]
    pub master_key: PathBuf,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            master_key: default_master_key(),
        }
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl GraftonConfig {
    /// Loads configuration using the default resolution rules.
    ///
    /// A missing file at the default location yields the default config; a
    /// missing file that was requested explicitly is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, explicit) = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = match fs::read(&resolved) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(err) => return Err(ConfigError::Io(err.to_string())),
        };
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider.validate()?;
        self.connector.validate()?;
        self.run.validate()?;
        self.keys.validate()
    }

    /// Returns the external flags this configuration supplies.
    #[must_use]
    pub fn provided_flags(&self) -> BTreeSet<String> {
        let provider = &self.provider;
        let connector = &self.connector;
        [
            (flags::PRODUCT, provider.product.is_some()),
            (flags::PLAN, provider.plan.is_some()),
            (flags::PLAN_FEATURES, provider.plan_features.is_some()),
            (flags::NEW_PLAN, provider.new_plan.is_some()),
            (flags::NEW_PLAN_FEATURES, provider.new_plan_features.is_some()),
            (flags::REGION, provider.region.is_some()),
            (flags::CLIENT_ID, connector.client_id.is_some()),
            (flags::CLIENT_SECRET, connector.client_secret.is_some()),
            (flags::CONNECTOR_PORT, connector.port.is_some()),
            (flags::CALLBACK_TIMEOUT, connector.callback_timeout.is_some()),
            (flags::RESOURCE_MEASURES, connector.resource_measures.is_some()),
        ]
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(flag, _)| flag.to_string())
        .collect()
    }

    /// Returns the excluded features as labels.
    #[must_use]
    pub fn excluded_labels(&self) -> Vec<FeatureLabel> {
        self.run.exclude.iter().map(|label| FeatureLabel::from(label.as_str())).collect()
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

impl ProviderConfig {
    /// Validates provider settings.
    fn validate(&self) -> Result<(), ConfigError> {
        self.api_url()?;
        for (field, value) in [
            ("provider.product", &self.product),
            ("provider.plan", &self.plan),
            ("provider.new_plan", &self.new_plan),
            ("provider.region", &self.region),
        ] {
            if value.as_deref().is_some_and(|value| value.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
            }
        }
        Ok(())
    }

    /// Returns the provider API URL with the version segment appended.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the URL is malformed.
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.url)
            .map_err(|_| ConfigError::Invalid(format!("unable to parse url: {}", self.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid("provider.url must use http:// or https://".to_string()));
        }
        let trimmed = url.path().trim_end_matches('/');
        if !trimmed.ends_with(&format!("/{API_VERSION_SEGMENT}")) {
            let path = format!("{trimmed}/{API_VERSION_SEGMENT}");
            url.set_path(&path);
        }
        Ok(url)
    }

    /// Returns the plan features, empty when unset.
    #[must_use]
    pub fn plan_features(&self) -> BTreeMap<String, Value> {
        self.plan_features.clone().unwrap_or_default()
    }

    /// Returns the resize plan features, empty when unset.
    #[must_use]
    pub fn new_plan_features(&self) -> BTreeMap<String, Value> {
        self.new_plan_features.clone().unwrap_or_default()
    }
}

// ============================================================================
// SECTION: Connector
// ============================================================================

impl ConnectorConfig {
    /// Validates connector settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == Some(0) {
            return Err(ConfigError::Invalid("connector.port must be non-zero".to_string()));
        }
        for (field, value) in
            [("connector.client_id", &self.client_id), ("connector.client_secret", &self.client_secret)]
        {
            if value.as_deref().is_some_and(str::is_empty) {
                return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
            }
        }
        self.callback_timeout()?;
        if let Some(path) = &self.audit.path {
            validate_path_string("connector.audit.path", &path.to_string_lossy())?;
        }
        Ok(())
    }

    /// Returns the configured port or the default.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_CONNECTOR_PORT)
    }

    /// Returns the connector API URL, `http://localhost:<port>/v1`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the URL cannot be formed.
    pub fn connector_url(&self) -> Result<Url, ConfigError> {
        let text = format!("http://localhost:{}/{API_VERSION_SEGMENT}", self.port());
        Url::parse(&text).map_err(|err| ConfigError::Invalid(format!("connector url: {err}")))
    }

    /// Returns the parsed callback wait, enforcing the 24 hour ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the duration is malformed or too
    /// long.
    pub fn callback_timeout(&self) -> Result<Duration, ConfigError> {
        let text = self.callback_timeout.as_deref().unwrap_or(DEFAULT_CALLBACK_TIMEOUT);
        let timeout = parse_duration(text)
            .map_err(|err| ConfigError::Invalid(format!("connector.callback_timeout: {err}")))?;
        if timeout > MAX_CALLBACK_TIMEOUT {
            return Err(ConfigError::Invalid("callback timeout cannot exceed 24hrs".to_string()));
        }
        Ok(timeout)
    }

    /// Returns the measures served for usage polling.
    #[must_use]
    pub fn resource_measures(&self) -> BTreeMap<String, i64> {
        self.resource_measures.clone().unwrap_or_else(default_resource_measures)
    }
}

/// Parses a JSON measures object such as `{"feature-a": 0}`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the text is not a JSON object of
/// integers.
pub fn parse_resource_measures(text: &str) -> Result<BTreeMap<String, i64>, ConfigError> {
    serde_json::from_str(text).map_err(|err| {
        ConfigError::Invalid(format!("failed to parse resource measures json: {err}"))
    })
}

/// Parses a JSON plan features object.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] naming `flag` when the text is not a JSON
/// object.
pub fn parse_plan_features(flag: &str, text: &str) -> Result<BTreeMap<String, Value>, ConfigError> {
    serde_json::from_str(text).map_err(|err| {
        ConfigError::Invalid(format!("the supplied {flag} does not appear to be valid JSON: {err}"))
    })
}

// ============================================================================
// SECTION: Run and Keys
// ============================================================================

impl RunConfig {
    /// Validates run settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.exclude.iter().any(|label| label.trim().is_empty()) {
            return Err(ConfigError::Invalid("run.exclude entries must be non-empty".to_string()));
        }
        Ok(())
    }
}

impl KeysConfig {
    /// Validates key settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("keys.master_key", &self.master_key.to_string_lossy())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default provider URL.
fn default_provider_url() -> String {
    DEFAULT_PROVIDER_URL.to_string()
}

/// Default master key path.
fn default_master_key() -> PathBuf {
    PathBuf::from(DEFAULT_MASTER_KEY_FILE)
}

/// Serde helper for `true` defaults.
const fn default_true() -> bool {
    true
}

/// Measures served when none are configured: `{"feature-a": 0, "feature-b": 1000}`.
#[must_use]
pub fn default_resource_measures() -> BTreeMap<String, i64> {
    BTreeMap::from([("feature-a".to_string(), 0), ("feature-b".to_string(), 1000)])
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path; the flag reports whether it was requested.
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}
