//! CLI configuration handling.
//!
//! Settings come from an optional TOML file; credentials come from the
//! process environment after `.env` has been loaded.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use extprov_core::{
    NumericIdPolicy, ResolverConfig, Secret, SessionOptions, environment::DEFAULT_PLATFORM_DOMAIN,
    session::DEFAULT_TIMEOUT_SECS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder shipped in the sample `.env`.
pub const ENV_ID_PLACEHOLDER: &str = "your-env-id-here";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Platform domain used when expanding short environment IDs.
    pub domain: String,

    /// Expansion rule for six-digit numeric environment IDs.
    pub numeric_host: NumericIdPolicy,

    /// Verify TLS certificates.
    pub verify_tls: bool,

    /// Per-request timeout.
    pub timeout_secs: u64,

    /// Logging level when `RUST_LOG` is unset.
    pub log_level: String,

    /// Fixed base URI, bypassing identifier resolution.
    pub base_uri: Option<String>,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_PLATFORM_DOMAIN.to_string(),
            numeric_host: NumericIdPolicy::Support,
            verify_tls: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_level: "info".to_string(),
            base_uri: None,
            config_path: None,
        }
    }
}

impl CliConfig {
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::new(self.numeric_host).with_domain(self.domain.clone())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::default()
            .with_verify_tls(self.verify_tls)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// Load configuration from `explicit`, else the default location, else defaults.
///
/// An explicit path must exist; the default one is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig> {
    let (config_path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (default_config_path(), false),
    };

    if !config_path.exists() {
        if required {
            anyhow::bail!("Config file {:?} does not exist", config_path);
        }
        return Ok(CliConfig::default());
    }

    let contents = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config from {:?}", config_path))?;
    let mut config: CliConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config from {:?}", config_path))?;

    config.config_path = Some(config_path);
    Ok(config)
}

fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("extprov.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "luminance", "extprov")
}

/// Credential-related environment values, trimmed, empty treated as unset.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials {
    pub env_id: Option<String>,
    pub client_id: Option<String>,
    pub secret_key: Option<Secret>,
    pub username: Option<String>,
    pub password: Option<Secret>,
}

impl EnvCredentials {
    /// Read from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            env_id: read("ENV_ID"),
            client_id: read("CLIENT_ID"),
            secret_key: read("SECRET_KEY").map(Secret::new),
            username: read("USERNAME"),
            password: read("PASSWORD").map(Secret::new),
        }
    }
}
