//! extprov CLI
//!
//! Command-line interface for provisioning SAML2 and DocuSign external
//! providers on a platform environment.
//!
//! # Usage
//!
//! ```bash
//! # Register an IdP from its metadata file
//! extprov setup --env-id acme --saml-xml idp-metadata.xml
//!
//! # Register a DocuSign integration (pending until a secret is set)
//! extprov setup --env-id acme \
//!     --docusign-account-id 1234 --docusign-base-url account-d.docusign.net \
//!     --docusign-env testing
//!
//! # Check that CLIENT_ID / SECRET_KEY from .env can obtain a token
//! extprov check-token
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

mod commands;
mod config;

use commands::{SetupArgs, TargetArgs};
use config::EnvCredentials;

#[derive(Parser)]
#[command(name = "extprov")]
#[command(about = "Provision SAML2 and DocuSign external providers")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to config.toml in the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update SAML2 and/or DocuSign providers
    Setup(SetupArgs),

    /// Request an OAuth2 token with CLIENT_ID / SECRET_KEY and report on it
    CheckToken(TargetArgs),

    /// Check ENV_ID, CLIENT_ID and SECRET_KEY for common mistakes
    CheckEnv,

    /// Print the fields extracted from SAML IdP metadata
    ParseSaml {
        /// Metadata file path or inline XML
        xml: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let dotenv = dotenvy::dotenv();
    let config = config::load_config(cli.config.as_deref())?;
    init_logging(&config.log_level, cli.verbose);

    match &dotenv {
        Ok(path) => debug!("Loaded environment from {:?}", path),
        Err(e) => debug!("No .env loaded: {}", e),
    }
    if let Some(path) = &config.config_path {
        debug!("Loaded configuration from {:?}", path);
    }

    match cli.command {
        Commands::Setup(args) => {
            let env = EnvCredentials::from_env();
            commands::setup(args, &config, &env).await
        }
        Commands::CheckToken(target) => {
            let env = EnvCredentials::from_env();
            commands::check_token(target, &config, &env).await
        }
        Commands::CheckEnv => Ok(commands::check_env()),
        Commands::ParseSaml { xml } => commands::parse_saml(&xml),
    }
}

/// Log to stderr; stdout is reserved for command output.
fn init_logging(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
