//! cloudcred CLI
//!
//! Command-line interface for inspecting how service credentials resolve.
//!
//! # Usage
//!
//! ```bash
//! # Show the properties resolved for a service
//! cloudcred resolve assistant
//!
//! # Show which source they came from
//! cloudcred sources assistant
//!
//! # Build the authenticator and wait until it can authenticate
//! cloudcred check assistant
//!
//! # Print the access token
//! cloudcred token assistant --format json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use cloudcred_core::model::props;
use cloudcred_core::{Authenticator, CredentialResolver, PropertyMap};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

mod config;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "cloudcred")]
#[command(about = "Resolve cloud service credentials and test authentication")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the properties resolved for a service
    Resolve {
        /// Service name (e.g., assistant, discovery)
        service: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Print secret values instead of redacting them
        #[arg(long)]
        show_secrets: bool,
    },

    /// Show which source supplies a service's credentials
    Sources {
        /// Service name
        service: String,
    },

    /// Validate the authenticator and wait until it can authenticate
    Check {
        /// Service name
        service: String,
    },

    /// Print the access token for a service
    Token {
        /// Service name
        service: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    init_logging(&config, cli.verbose);
    debug!("Loaded configuration from {:?}", config.config_path);

    let resolver = build_resolver(&config);

    match cli.command {
        Commands::Resolve { service, format, show_secrets } => {
            resolve(&resolver, &service, format, show_secrets)
        }
        Commands::Sources { service } => sources(&resolver, &service),
        Commands::Check { service } => check(&resolver, &config, &service).await,
        Commands::Token { service, format } => token(&resolver, &config, &service, format).await,
    }
}

fn init_logging(config: &CliConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_resolver(config: &CliConfig) -> CredentialResolver {
    CredentialResolver::from_env()
        .with_priority_paths(config.credential_files.iter().cloned())
        .with_catalog_variable(&config.catalog_variable)
}

fn display_properties(properties: &PropertyMap, show_secrets: bool) -> Vec<(String, String)> {
    properties
        .iter()
        .map(|(key, value)| {
            let value = if show_secrets || !props::is_secret(key) {
                value.to_string()
            } else {
                "[REDACTED]".to_string()
            };
            (key.to_string(), value)
        })
        .collect()
}

fn resolve(resolver: &CredentialResolver, service: &str, format: Format, show_secrets: bool) -> Result<()> {
    let properties = resolver.resolve(service);
    let shown = display_properties(&properties, show_secrets);

    match format {
        Format::Json => {
            let map: serde_json::Map<String, serde_json::Value> = shown
                .into_iter()
                .map(|(key, value)| (key, serde_json::Value::String(value)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
        Format::Text => {
            if shown.is_empty() {
                println!("No credentials found for {}", service);
            }
            for (key, value) in shown {
                println!("{}={}", key, value);
            }
        }
    }
    Ok(())
}

fn sources(resolver: &CredentialResolver, service: &str) -> Result<()> {
    println!("Credential files searched:");
    for path in resolver.search_paths() {
        let marker = if path.is_file() { "found" } else { "missing" };
        println!("  {} ({})", path.display(), marker);
    }
    println!("Catalog variable: {}", resolver.catalog_variable());

    match resolver.resolve_with_source(service) {
        Some(resolved) => {
            let keys: Vec<&str> = resolved.properties.keys().collect();
            println!("{} resolved from {}: {}", service, resolved.source, keys.join(", "));
        }
        None => println!("{} not found in any source", service),
    }
    Ok(())
}

fn build_authenticator(resolver: &CredentialResolver, service: &str) -> Result<Authenticator> {
    let authenticator = resolver
        .authenticator(service)
        .with_context(|| format!("Invalid credentials for {}", service))?;
    info!("Using {} authentication for {}", authenticator.auth_type(), service);
    Ok(authenticator)
}

async fn check(resolver: &CredentialResolver, config: &CliConfig, service: &str) -> Result<()> {
    let authenticator = build_authenticator(resolver, service)?;
    authenticator.validate()?;

    let deadline = tokio::time::Instant::now() + config.token_timeout();
    while !authenticator.can_authenticate() {
        if tokio::time::Instant::now() >= deadline {
            bail!(
                "{} authenticator for {} was not ready after {}s",
                authenticator.auth_type(),
                service,
                config.token_timeout_secs
            );
        }
        tokio::time::sleep(config.poll_interval()).await;
    }

    println!("{}: {} authentication ready", service, authenticator.auth_type());
    Ok(())
}

async fn token(resolver: &CredentialResolver, config: &CliConfig, service: &str, format: Format) -> Result<()> {
    let authenticator = build_authenticator(resolver, service)?;

    let token = tokio::time::timeout(config.token_timeout(), authenticator.access_token())
        .await
        .with_context(|| format!("Timed out waiting for a token for {}", service))?
        .with_context(|| format!("Failed to obtain a token for {}", service))?;

    let Some(token) = token else {
        bail!("{} authentication does not use an access token", authenticator.auth_type());
    };

    match format {
        Format::Json => {
            let output = json!({
                "service": service,
                "auth_type": authenticator.auth_type().as_str(),
                "access_token": token.access_token.expose(),
                "expires_at_millis": token.expires_at_millis,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Format::Text => println!("{}", token.access_token.expose()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_are_redacted_by_default() {
        let properties = PropertyMap::new()
            .with("APIKEY", "my-key")
            .with("URL", "https://example.com");

        assert_eq!(
            display_properties(&properties, false),
            vec![
                ("APIKEY".to_string(), "[REDACTED]".to_string()),
                ("URL".to_string(), "https://example.com".to_string()),
            ]
        );
        assert_eq!(display_properties(&properties, true)[0].1, "my-key");
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["cloudcred", "-v", "token", "assistant", "--format", "json"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Token { service, format } => {
                assert_eq!(service, "assistant");
                assert_eq!(format, Format::Json);
            }
            _ => panic!("expected token command"),
        }
    }
}
