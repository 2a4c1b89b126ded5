//! # Vault Services
//!
//! HTTP host for the vault services.
//!
//! ## Overview
//!
//! On start the binary:
//!
//! 1. **Installs the rustls crypto provider** - ring, before any TLS client is built
//! 2. **Initializes tracing** - `RUST_LOG`, falling back to `LOG_LEVEL`, in text or JSON
//! 3. **Registers metrics** - served on `/metrics` unless `ENABLE_METRICS=false`
//! 4. **Loads configuration** - `.env` file, JSON settings file, then environment variables
//! 5. **Builds the vault services** - one Key Vault client shared by both services
//! 6. **Serves HTTP** - logging endpoints and probes until Ctrl-C
//!
//! The port comes from `--port` or `VAULT_SERVICES_PORT`, then `PORT`, then 7071.
//!
//! ## Usage
//!
//! ```bash
//! vault-services --port 7071
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vault_services::config::{
    DotenvConfigSource, EnvConfigSource, JsonFileConfigSource, LayeredConfigSource,
    ServiceConfiguration, ServiceSettings,
};
use vault_services::constants::DEFAULT_LOG_FILTER;
use vault_services::observability::metrics;
use vault_services::server::{start_server, ServerState};
use vault_services::services::VaultServices;

/// Vault services HTTP host
#[derive(Parser, Debug)]
#[command(name = "vault-services", version, about = "Vault services HTTP host", long_about = None)]
struct Cli {
    /// HTTP port, taking precedence over `PORT`
    #[arg(short, long, env = "VAULT_SERVICES_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any reqwest client is created
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| panic!("Failed to install rustls crypto provider"));

    let cli = Cli::parse();
    let settings = ServiceSettings::from_env();

    init_tracing(&settings);

    info!("Starting Vault Services");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(environment = %settings.environment, "Execution environment");

    metrics::register_metrics()?;

    let mut server_state = ServerState::new(settings.enable_metrics);
    let vault = load_configuration(&settings).and_then(|configuration| {
        VaultServices::from_configuration(&configuration)
            .context("Failed to create vault services")
    });
    match vault {
        Ok(vault) => server_state = server_state.with_vault(vault),
        Err(e) => warn!("Vault services are disabled: {e:#}"),
    }

    let port = cli.port.unwrap_or(settings.port);
    let server_state = Arc::new(server_state);
    start_server(port, server_state).await?;

    info!("Vault Services stopped");
    Ok(())
}

fn init_tracing(settings: &ServiceSettings) {
    let level = settings.log_level.to_lowercase();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("vault_services={level},tower_http={level}")))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if settings.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(settings.log_enable_color)
            .init();
    }
}

/// `.env` file, then JSON settings file, then environment variables (last wins)
fn load_configuration(settings: &ServiceSettings) -> Result<ServiceConfiguration> {
    let mut layered = LayeredConfigSource::new();
    if let Some(path) = &settings.dotenv_file {
        layered = layered.with(
            DotenvConfigSource::new(path)
                .with_context(|| format!("Failed to load dotenv file {path}"))?,
        );
    }
    if let Some(path) = &settings.settings_file {
        layered = layered.with(
            JsonFileConfigSource::new(path, false)
                .with_context(|| format!("Failed to load settings file {path}"))?,
        );
    }
    layered = layered.with(EnvConfigSource::new(None));

    ServiceConfiguration::with_environment(Arc::new(layered), settings.environment)
        .context("Failed to initialize service configuration")
}
