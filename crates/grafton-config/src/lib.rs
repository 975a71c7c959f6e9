// crates/grafton-config/src/lib.rs
// ============================================================================
// Module: Grafton Config
// Description: Configuration model and loader for the conformance harness.
// Purpose: Keep config parsing and limits in one place for the CLI and tests.
// Dependencies: grafton-core, serde, serde_json, toml, url
// ============================================================================

//! ## Overview
//! Loads `grafton.toml` (or the file named by `GRAFTON_CONFIG`) into a
//! [`GraftonConfig`], enforcing path, size, and encoding limits before
//! parsing, then validating every section.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod duration;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AuditConfig;
pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::ConnectorConfig;
pub use config::DEFAULT_MASTER_KEY_FILE;
pub use config::GraftonConfig;
pub use config::KeysConfig;
pub use config::MAX_CALLBACK_TIMEOUT;
pub use config::ProviderConfig;
pub use config::RunConfig;
pub use config::default_resource_measures;
pub use config::flags;
pub use config::parse_plan_features;
pub use config::parse_resource_measures;
pub use duration::DurationError;
pub use duration::parse_duration;
