use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tether_config::{ConfigLoader, LogLevel, TetherConfig};
use tether_http::{ApiClient, ClientConfig, InMemorySession, RequestDescriptor};
use tracing::{debug, error, info, warn};

mod cli;

use cli::{Cli, Commands, ConfigCommands};

/// Load configuration from file or use defaults
fn load_config(config_path: Option<&PathBuf>) -> Result<TetherConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if path.exists() {
                loader
                    .from_file(path)
                    .context(format!("Failed to load configuration from {:?}", path))
            } else {
                // Logging is not up yet, so this goes straight to stderr
                eprintln!("Configuration file not found: {:?}. Using defaults.", path);
                loader
                    .from_env()
                    .context("Failed to load configuration from environment")
            }
        }
        None => loader
            .from_env()
            .context("Failed to load configuration from environment"),
    }
}

/// Initialize logging from configuration, letting the CLI level win
fn init_logging(config: &TetherConfig, log_level: Option<&String>) -> Result<()> {
    let mut logging_config = config.logging.clone();
    if let Some(level_str) = log_level {
        logging_config.level = level_str
            .parse::<LogLevel>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }

    match tether_logging::init_logging_from_config(&logging_config) {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!(
                "Failed to initialize structured logging: {}, falling back to simple tracing",
                e
            );
            tether_logging::init_simple_tracing(&logging_config.level.to_string())
        }
    }
}

fn reachability_label(reachable: bool) -> &'static str {
    if reachable {
        "online"
    } else {
        "offline"
    }
}

async fn handle_probe(
    config: &TetherConfig,
    path: &str,
    token: Option<&String>,
    timeout: Option<u64>,
) -> Result<()> {
    let session = Arc::new(match token {
        Some(token) => InMemorySession::with_token(token.as_str()),
        None => InMemorySession::new(),
    });

    let client = ApiClient::builder(ClientConfig::from(config))
        .session(session)
        .on_session_expired(|| warn!("Credential rejected; sign in again"))
        .build()
        .context("Failed to build API client")?;

    let _subscription = client.on_connection_change(|reachable: bool| {
        println!("reachability changed: {}", reachability_label(reachable));
    });

    let mut descriptor = RequestDescriptor::get(path);
    if let Some(seconds) = timeout {
        descriptor = descriptor.with_timeout(Duration::from_secs(seconds));
    }

    let outcome = client.execute(descriptor).await;
    let online = reachability_label(client.is_online());

    match outcome {
        Ok(response) => {
            println!("{} {} ({} bytes)", response.status(), online, response.body().len());
            Ok(())
        }
        Err(e) => {
            match e.status() {
                Some(status) => println!("{} {}", status, online),
                None => println!("no response {}", online),
            }
            Err(e).context(format!("GET {} failed", path))
        }
    }
}

fn handle_config_validate(file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", file);

    if !file.exists() {
        return Err(anyhow::anyhow!("Configuration file not found: {:?}", file));
    }

    match ConfigLoader::new().from_file(file) {
        Ok(_) => {
            println!("Configuration file is valid");
            Ok(())
        }
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            Err(e).context(format!("Invalid configuration in {:?}", file))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    init_logging(&config, cli.log_level.as_ref())?;
    debug!("Tether CLI starting");

    match &cli.command {
        Commands::Probe {
            path,
            token,
            timeout,
        } => handle_probe(&config, path, token.as_ref(), *timeout).await,
        Commands::Config { config_cmd } => match config_cmd {
            ConfigCommands::Sample => {
                print!("{}", TetherConfig::generate_sample());
                Ok(())
            }
            ConfigCommands::Validate { file } => handle_config_validate(file),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_accepts_sample() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TetherConfig::generate_sample().as_bytes())
            .unwrap();

        handle_config_validate(file.path()).unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_retry_budget() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"retry:\n  max_retries: 99\n").unwrap();

        assert!(handle_config_validate(file.path()).is_err());
    }

    #[test]
    fn test_reachability_label() {
        assert_eq!(reachability_label(true), "online");
        assert_eq!(reachability_label(false), "offline");
    }

    #[test]
    fn test_validate_missing_file() {
        assert!(handle_config_validate(Path::new("/nonexistent/tether.yaml")).is_err());
    }
}
