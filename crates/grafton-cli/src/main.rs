// crates/grafton-cli/src/main.rs
// ============================================================================
// Module: Grafton CLI Entry Point
// Description: Command dispatcher for provider acceptance testing.
// Purpose: Run the acceptance suite, serve the fake connector, manage keys.
// Dependencies: clap, grafton-acceptance, grafton-client, grafton-config,
//               grafton-connector, grafton-core, thiserror
// ============================================================================

//! ## Overview
//! `grafton test` drives the acceptance features against a provider and
//! exits non-zero when any of them fails. `grafton serve` runs only the fake
//! connector, `grafton generate` writes a master keypair, and
//! `grafton validate` reports which required flags are missing.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub(crate) mod overrides;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use grafton_acceptance::AcceptanceContext;
use grafton_acceptance::AcceptanceSettings;
use grafton_acceptance::run_suite;
use grafton_acceptance::validate_flags;
use grafton_client::LiveKeypair;
use grafton_client::MasterKeypair;
use grafton_client::ProviderClient;
use grafton_client::Signer;
use grafton_client::TraceFn;
use grafton_config::AuditConfig;
use grafton_config::GraftonConfig;
use grafton_connector::ClientCredentials;
use grafton_connector::ConnectorAuditSink;
use grafton_connector::ConnectorSettings;
use grafton_connector::FakeConnector;
use grafton_connector::FileAuditSink;
use grafton_connector::NoopAuditSink;
use grafton_connector::StderrAuditSink;
use grafton_core::Reporter;
use grafton_core::RunOptions;
use grafton_core::RunSummary;
use thiserror::Error;

use crate::overrides::ConnectorFlags;
use crate::overrides::RunFlags;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "grafton", version, about = "Acceptance testing for platform providers")]
struct Cli {
    /// Config file path (defaults to grafton.toml or `GRAFTON_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Tests the API endpoints required to integrate with the platform.
    Test(TestCommand),
    /// Serves a local version of the Connector API.
    Serve(ServeCommand),
    /// Generates the master keypair used to sign provider requests.
    Generate,
    /// Reports required flags that are missing for the selected features.
    Validate(ValidateCommand),
}

/// Arguments for `test`.
#[derive(Args, Debug)]
struct TestCommand {
    /// Provider API root; `/v1` is appended when absent.
    #[arg(value_name = "URL")]
    url: Option<String>,
    /// Feature and connector flags.
    #[command(flatten)]
    flags: RunFlags,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
struct ValidateCommand {
    /// Feature and connector flags.
    #[command(flatten)]
    flags: RunFlags,
}

/// Arguments for `serve`.
#[derive(Args, Debug)]
struct ServeCommand {
    /// The label of the product being provisioned.
    #[arg(long, env = "PRODUCT")]
    product: Option<String>,
    /// Connector flags.
    #[command(flatten)]
    connector: ConnectorFlags,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying the message shown to the user.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Message shown when `test` runs without a master key.
const MISSING_MASTER_KEY: &str =
    "master key file does not exist; generate one using 'grafton generate'";

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Test(command) => command_test(&command, config_path),
        Commands::Serve(command) => command_serve(&command, config_path),
        Commands::Generate => command_generate(config_path),
        Commands::Validate(command) => command_validate(&command, config_path),
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Loads the config file and layers `flags` and `url` over it.
fn load_config(path: Option<&Path>, flags: &RunFlags, url: Option<&str>) -> CliResult<GraftonConfig> {
    let mut config = load_file(path)?;
    if let Some(url) = url {
        url.clone_into(&mut config.provider.url);
    }
    flags.apply(&mut config).map_err(|err| CliError::new(err.to_string()))?;
    Ok(config)
}

/// Loads the config file alone.
fn load_file(path: Option<&Path>) -> CliResult<GraftonConfig> {
    GraftonConfig::load(path).map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

/// Returns the missing-flag errors for `config`, joined one per line.
fn missing_flags(config: &GraftonConfig) -> CliResult<Option<String>> {
    let errors = validate_flags(&config.provided_flags(), &config.excluded_labels())
        .map_err(|err| CliError::new(err.to_string()))?;
    if errors.is_empty() {
        return Ok(None);
    }
    let lines: Vec<String> = errors.iter().map(ToString::to_string).collect();
    Ok(Some(lines.join("\n")))
}

/// Loads the master keypair, explaining how to create a missing one.
fn load_master_key(path: &Path) -> CliResult<MasterKeypair> {
    if !path.exists() {
        return Err(CliError::new(MISSING_MASTER_KEY));
    }
    MasterKeypair::load(path)
        .map_err(|err| CliError::new(format!("could not load master key file: {err}")))
}

/// Builds the audit sink selected by `audit`.
fn audit_sink(audit: &AuditConfig) -> CliResult<Arc<dyn ConnectorAuditSink>> {
    if !audit.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &audit.path {
        Some(path) => {
            let sink = FileAuditSink::new(path).map_err(|err| {
                CliError::new(format!("could not open audit log {}: {err}", path.display()))
            })?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Test Command
// ============================================================================

/// Executes the `test` command.
fn command_test(command: &TestCommand, config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path, &command.flags, command.url.as_deref())?;
    if let Some(errors) = missing_flags(&config)? {
        return Err(CliError::new(errors));
    }
    let master = load_master_key(&config.keys.master_key)?;
    let settings =
        AcceptanceSettings::from_config(&config).map_err(|err| CliError::new(err.to_string()))?;
    let reporter = Arc::new(Reporter::stdout(config.run.log));

    let api_url = config.provider.api_url().map_err(|err| CliError::new(err.to_string()))?;
    let connector_url =
        config.connector.connector_url().map_err(|err| CliError::new(err.to_string()))?;
    let trace: TraceFn = {
        let reporter = Arc::clone(&reporter);
        Arc::new(move |line: &str| reporter.verbose(line))
    };
    let client = |signer: Arc<dyn Signer>| {
        ProviderClient::new(api_url.clone(), connector_url.clone(), signer)
            .map(|client| client.with_trace(Arc::clone(&trace)))
            .map_err(|err| CliError::new(format!("could not build provider client: {err}")))
    };
    let api = client(Arc::new(master.live_keypair()))?;
    let unauthorized_api = client(Arc::new(LiveKeypair::unendorsed()))?;

    let connector_settings = ConnectorSettings::new(
        config.connector.port(),
        settings.product.clone(),
        ClientCredentials::new(settings.client_id.clone(), settings.client_secret.clone()),
    )
    .with_audit(audit_sink(&config.connector.audit)?);
    let connector = FakeConnector::start(&connector_settings).map_err(|err| {
        CliError::new(format!("error while configuring connector service: {err}"))
    })?;

    report_configuration(&reporter, &config, &settings);
    let options = RunOptions {
        exclude: config.excluded_labels(),
        run_error_cases: config.run.error_cases,
    };
    let mut context = AcceptanceContext::new(api, unauthorized_api, connector, settings, reporter);
    let summary = run_suite(&mut context, &options).map_err(|err| CliError::new(err.to_string()))?;
    Ok(exit_code(&summary))
}

/// Any failed guarded block fails the process, including error cases that
/// left the walk untouched.
fn exit_code(summary: &RunSummary) -> ExitCode {
    if summary.succeeded() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

/// Logs the effective run configuration at `info` level.
fn report_configuration(reporter: &Reporter, config: &GraftonConfig, settings: &AcceptanceSettings) {
    let resizing = !settings.new_plan.is_empty();
    reporter.info("Configuration");
    reporter.info(&format!("  URL:              {}", config.provider.url));
    reporter.info(&format!("  Product:          {}", settings.product));
    reporter.info(&format!("  Plan:             {}", settings.plan));
    reporter.info(&format!("  Region:           {}", settings.region));
    reporter.info(&format!("  Resizing?         {}", if resizing { "yes" } else { "no" }));
    if resizing {
        reporter.info(&format!("  New Plan:         {}", settings.new_plan));
    }
    if !config.run.exclude.is_empty() {
        reporter.info(&format!("  Excluded Features: {}", config.run.exclude.join(" ")));
    }
    reporter.info(&format!("  Client ID:        {}", settings.client_id));
    reporter.info(&format!("  Connector Port:   {}", config.connector.port()));
}

// ============================================================================
// SECTION: Validate Command
// ============================================================================

/// Executes the `validate` command.
fn command_validate(command: &ValidateCommand, config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path, &command.flags, None)?;
    match missing_flags(&config)? {
        Some(errors) => Err(CliError::new(errors)),
        None => {
            write_stdout_line("All required flags are set.")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command; blocks until the connector stops.
fn command_serve(command: &ServeCommand, config_path: Option<&Path>) -> CliResult<ExitCode> {
    let mut config = load_file(config_path)?;
    command.connector.overlay(&mut config);
    if let Some(product) = &command.product {
        config.provider.product = Some(product.clone());
    }
    config.validate().map_err(|err| CliError::new(err.to_string()))?;

    let product = config
        .provider
        .product
        .clone()
        .ok_or_else(|| CliError::new("the 'product' flag is required and was not provided"))?;
    let credentials = serve_credentials(&config)?;
    let settings = ConnectorSettings::new(config.connector.port(), product, credentials)
        .with_audit(audit_sink(&config.connector.audit)?);
    let connector = FakeConnector::start(&settings).map_err(|err| {
        CliError::new(format!("error while configuring connector service: {err}"))
    })?;
    write_stdout_line(&format!("Starting Connector server on {}", connector.base_url()))?;
    connector.wait();
    Ok(ExitCode::SUCCESS)
}

/// Client credentials for `serve`, inferred from the master key when neither
/// half is configured.
fn serve_credentials(config: &GraftonConfig) -> CliResult<ClientCredentials> {
    let connector = &config.connector;
    match (&connector.client_id, &connector.client_secret) {
        (Some(id), Some(secret)) => Ok(ClientCredentials::new(id.clone(), secret.clone())),
        (None, None) => {
            let master = MasterKeypair::load(&config.keys.master_key).map_err(|err| {
                CliError::new(format!(
                    "error reading the keypair file, while attempting to infer client-id and secret: {err}"
                ))
            })?;
            let id = master.public_key_base64();
            let secret = master.private_key_base64();
            write_stdout_line("Inferred OAuth keys from key file:")?;
            write_stdout_line(&format!("'client-id': {id}"))?;
            write_stdout_line(&format!("'client-secret': {secret}"))?;
            Ok(ClientCredentials::new(id, secret))
        }
        (None, Some(_)) => Err(CliError::new("the 'client-id' flag is required and was not provided")),
        (Some(_), None) => {
            Err(CliError::new("the 'client-secret' flag is required and was not provided"))
        }
    }
}

// ============================================================================
// SECTION: Generate Command
// ============================================================================

/// Executes the `generate` command.
fn command_generate(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_file(config_path)?;
    let path = &config.keys.master_key;
    write_stdout_line("Generating Master Keypair")?;
    let master = MasterKeypair::generate();
    write_stdout_line(&format!("Writing master keypair to file: {}", path.display()))?;
    master.save(path).map_err(|err| CliError::new(format!("could not write to file: {err}")))?;
    write_stdout_line("Success.")?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
        .map_err(|err| CliError::new(format!("failed to write to stdout: {err}")))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
