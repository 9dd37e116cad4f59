//! Subcommand implementations.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use extprov_core::{
    AccountId, BaseUri, Capability, Credentials, DocusignEnvironment, DocusignProviderRequest,
    NumericIdPolicy, ProviderRecord, SamlProviderRequest, Secret, SessionOptions, environment, saml,
    session::{self, exchange_client_credentials},
    upsert,
};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::process::ExitCode;
use tracing::{info, warn};

use crate::config::{CliConfig, ENV_ID_PLACEHOLDER, EnvCredentials};

/// Which login flow `setup` uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthMode {
    /// OAuth2 client credentials (`CLIENT_ID` / `SECRET_KEY`).
    Oauth,
    /// Username/password login with CSRF handshake.
    Session,
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Platform environment ID, hostname or URL (defaults to ENV_ID)
    #[arg(long)]
    pub env_id: Option<String>,

    /// Use this base URI as-is instead of resolving the environment ID
    #[arg(long)]
    pub base_uri: Option<String>,

    /// Host used for six-digit numeric environment IDs
    #[arg(long)]
    pub numeric_host: Option<NumericIdPolicy>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,
}

#[derive(Debug, Args)]
pub struct SetupArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Platform API secret key (defaults to SECRET_KEY)
    #[arg(long)]
    pub secret: Option<String>,

    /// Login flow
    #[arg(long, value_enum, default_value_t = AuthMode::Oauth)]
    pub auth: AuthMode,

    /// Base64 `user:password` token for session login
    #[arg(long)]
    pub basic_token: Option<String>,

    /// Platform account ID (discovered when omitted)
    #[arg(long)]
    pub account_id: Option<AccountId>,

    /// SAML metadata XML, as a file path or inline XML
    #[arg(long)]
    pub saml_xml: Option<String>,

    /// Name for the SAML provider
    #[arg(long, default_value = "SAML SSO")]
    pub saml_name: String,

    /// SAML provider capabilities
    #[arg(long, num_args = 1.., default_value = "auth")]
    pub saml_provides: Vec<Capability>,

    /// SAML attribute holding the display name
    #[arg(long)]
    pub saml_name_key: Option<String>,

    /// SAML attribute holding the email address
    #[arg(long)]
    pub saml_email_key: Option<String>,

    /// DocuSign account ID
    #[arg(long)]
    pub docusign_account_id: Option<String>,

    /// DocuSign base URL (e.g. account.docusign.net)
    #[arg(long)]
    pub docusign_base_url: Option<String>,

    /// Name for the DocuSign provider
    #[arg(long, default_value = "DocuSign Integration")]
    pub docusign_name: String,

    /// DocuSign secret (optional, can be set later)
    #[arg(long)]
    pub docusign_secret: Option<String>,

    /// DocuSign environment
    #[arg(long, default_value_t = DocusignEnvironment::Production)]
    pub docusign_env: DocusignEnvironment,

    /// DocuSign integration key (required for development)
    #[arg(long)]
    pub integration_key: Option<String>,
}

/// Resolve the environment the command talks to.
pub fn resolve_target(target: &TargetArgs, config: &CliConfig, env: &EnvCredentials) -> Result<BaseUri> {
    let identifier = target.env_id.as_deref().or(env.env_id.as_deref()).unwrap_or_default();
    let explicit = target.base_uri.as_deref().or(config.base_uri.as_deref());

    if explicit.is_none() {
        if identifier.is_empty() {
            anyhow::bail!("ENV_ID is not set; pass --env-id or add it to .env");
        }
        if identifier == ENV_ID_PLACEHOLDER {
            anyhow::bail!("ENV_ID still has the placeholder value '{}'", ENV_ID_PLACEHOLDER);
        }
    }

    let mut resolver = config.resolver_config();
    if let Some(policy) = target.numeric_host {
        resolver.numeric_policy = policy;
    }

    let base = environment::resolve(identifier, explicit, &resolver)?;
    Ok(base)
}

fn session_options(target: &TargetArgs, config: &CliConfig) -> SessionOptions {
    let mut options = config.session_options();
    if target.insecure {
        options = options.with_verify_tls(false);
    }
    if !options.verify_tls {
        warn!("TLS certificate verification disabled");
    }
    options
}

fn setup_credentials(args: &SetupArgs, env: &EnvCredentials) -> Result<Credentials> {
    match args.auth {
        AuthMode::Oauth => {
            let client_id = env
                .client_id
                .clone()
                .context("CLIENT_ID is not set; add it to .env")?;
            let client_secret = args
                .secret
                .as_deref()
                .map(Secret::from)
                .or_else(|| env.secret_key.clone())
                .context("SECRET_KEY is not set; pass --secret or add it to .env")?;
            Ok(Credentials::ClientCredentials {
                client_id,
                client_secret,
            })
        }
        AuthMode::Session => {
            if let Some(token) = &args.basic_token {
                return Credentials::from_basic_token(token).context("Invalid --basic-token");
            }
            let username = env.username.clone().context("USERNAME is not set; add it to .env")?;
            let password = env.password.clone().context("PASSWORD is not set; add it to .env")?;
            Ok(Credentials::Password { username, password })
        }
    }
}

/// Read SAML metadata from a file, or take the argument as inline XML.
pub fn read_saml_source(source: &str) -> Result<String> {
    let path = Path::new(source);
    if path.is_file() {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read SAML metadata from {:?}", path));
    }
    Ok(source.to_string())
}

fn error_report(message: impl std::fmt::Display) -> Value {
    json!({ "error": message.to_string() })
}

fn summary_entry<E: std::fmt::Display>(result: Result<ProviderRecord, E>) -> (Value, bool) {
    match result {
        Ok(record) => (serde_json::to_value(&record).unwrap_or(Value::Null), true),
        Err(e) => (error_report(e), false),
    }
}

/// `extprov setup`: provision the requested providers and print a summary.
pub async fn setup(args: SetupArgs, config: &CliConfig, env: &EnvCredentials) -> Result<ExitCode> {
    let base = resolve_target(&args.target, config, env)?;
    let credentials = setup_credentials(&args, env)?;
    let options = session_options(&args.target, config);

    info!("Authenticating against {}", base);
    let session = match session::connect(base, credentials, &options).await {
        Ok(session) => session,
        Err(e) => {
            let message = format!("Authentication failed: {}", e);
            warn!("{}", message);
            println!("{}", serde_json::to_string_pretty(&error_report(message))?);
            return Ok(ExitCode::FAILURE);
        }
    };
    info!("Authentication successful");

    let mut summary = Map::new();
    let mut all_ok = true;

    if let Some(source) = &args.saml_xml {
        info!("Setting up SAML provider '{}'", args.saml_name);
        let result = match read_saml_source(source) {
            Ok(xml) => {
                let request = SamlProviderRequest {
                    name: args.saml_name.clone(),
                    account_id: args.account_id.clone(),
                    provides: args.saml_provides.clone(),
                    name_key: args.saml_name_key.clone(),
                    email_key: args.saml_email_key.clone(),
                    provider_id: None,
                };
                upsert::setup_saml_provider(&*session, &xml, request)
                    .await
                    .map_err(anyhow::Error::from)
            }
            Err(e) => Err(e),
        };
        match &result {
            Ok(record) => info!("SAML provider created/updated: ID {:?}", record.id),
            Err(e) => warn!("Failed to set up SAML provider: {:#}", e),
        }
        let (entry, ok) = summary_entry(result.map_err(|e| format!("{:#}", e)));
        all_ok &= ok;
        summary.insert("saml".to_string(), entry);
    }

    match (&args.docusign_account_id, &args.docusign_base_url) {
        (Some(account_id), Some(base_url)) => {
            info!("Setting up DocuSign provider '{}'", args.docusign_name);
            let mut request = DocusignProviderRequest::new(account_id.clone(), base_url.clone());
            request.name = args.docusign_name.clone();
            request.environment = args.docusign_env;
            request.integration_key = args.integration_key.clone();
            request.account_id = args.account_id.clone();
            request.secret = args.docusign_secret.as_deref().map(Secret::from);

            let result = upsert::setup_docusign_provider(&*session, request).await;
            match &result {
                Ok(record) => info!("DocuSign provider created/updated: ID {:?}", record.id),
                Err(e) => warn!("Failed to set up DocuSign provider: {}", e),
            }
            let (entry, ok) = summary_entry(result);
            all_ok &= ok;
            summary.insert("docusign".to_string(), entry);
        }
        (None, None) => {}
        _ => warn!("DocuSign setup needs both --docusign-account-id and --docusign-base-url; skipped"),
    }

    if summary.is_empty() {
        warn!("Nothing to set up; pass --saml-xml and/or the DocuSign flags");
    }

    println!("{}", serde_json::to_string_pretty(&Value::Object(summary))?);
    Ok(if all_ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// `extprov check-token`: run only the client-credentials exchange.
pub async fn check_token(target: TargetArgs, config: &CliConfig, env: &EnvCredentials) -> Result<ExitCode> {
    let base = resolve_target(&target, config, env)?;
    let client_id = env.client_id.as_deref().context("CLIENT_ID is not set; add it to .env")?;
    let secret = env.secret_key.as_ref().context("SECRET_KEY is not set; add it to .env")?;
    let options = session_options(&target, config);

    println!("Environment: {}", base);
    println!("Client ID:   {}", Secret::from(client_id).masked(8));

    match exchange_client_credentials(&base, client_id, secret, &options).await {
        Ok(token) => {
            println!("Token type:  {}", token.token_type);
            match token.expires_in {
                Some(seconds) => println!("Expires in:  {} seconds", seconds),
                None => println!("Expires in:  unknown"),
            }
            if let Some(at) = token.expires_at {
                println!("Expires at:  {}", at.to_rfc3339());
            }
            println!("Token:       {}", token.access_token.masked(12));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Token request failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// One line of `check-env` output plus any problems found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvCheck {
    pub name: &'static str,
    pub display: String,
    pub issues: Vec<String>,
}

/// Inspect raw (untrimmed) credential variables.
pub fn inspect_env(lookup: impl Fn(&str) -> Option<String>) -> Vec<EnvCheck> {
    [("ENV_ID", false), ("CLIENT_ID", true), ("SECRET_KEY", true)]
        .into_iter()
        .map(|(name, secret)| {
            let raw = lookup(name);
            let mut issues = Vec::new();

            let display = match raw.as_deref() {
                None | Some("") => {
                    issues.push(format!("{} is not set", name));
                    "NOT SET".to_string()
                }
                Some(value) => {
                    if value != value.trim() {
                        issues.push(format!("{} has leading or trailing whitespace", name));
                    }
                    if name == "ENV_ID" && value.trim() == ENV_ID_PLACEHOLDER {
                        issues.push(format!("{} still has the placeholder value", name));
                    }
                    let shown = if secret {
                        Secret::from(value).masked(8)
                    } else {
                        format!("'{}'", value)
                    };
                    format!("{} (length {})", shown, value.len())
                }
            };

            EnvCheck { name, display, issues }
        })
        .collect()
}

/// `extprov check-env`: report on the credential variables.
pub fn check_env() -> ExitCode {
    let checks = inspect_env(|name| std::env::var(name).ok());

    for check in &checks {
        println!("{:<11} {}", format!("{}:", check.name), check.display);
    }

    let issues: Vec<&String> = checks.iter().flat_map(|c| c.issues.iter()).collect();
    if issues.is_empty() {
        println!("\nAll credentials are set.");
        return ExitCode::SUCCESS;
    }

    println!("\nIssues found:");
    for issue in issues {
        println!("  - {}", issue);
    }
    ExitCode::FAILURE
}

/// `extprov parse-saml`: print extracted metadata as JSON.
pub fn parse_saml(source: &str) -> Result<ExitCode> {
    let xml = read_saml_source(source)?;
    let metadata = saml::parse(&xml)?;
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(ExitCode::SUCCESS)
}
