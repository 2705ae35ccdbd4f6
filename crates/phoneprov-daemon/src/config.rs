//! Daemon configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use phoneprov_core::Permission;
use phoneprov_http::ProvisionSettings;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Provisioning endpoint settings
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    /// Download token settings
    #[serde(default)]
    pub tokens: TokensConfig,
    /// Operator accounts for the `/api` surface
    #[serde(default)]
    pub operators: Vec<OperatorEntry>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Database path (optional, uses default if not set)
    pub path: Option<PathBuf>,
}

/// Provisioning endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Shared Basic username for the staging endpoint
    #[serde(default = "default_staging_user")]
    pub staging_user: String,
    /// Shared Basic password for the staging endpoint
    #[serde(default)]
    pub staging_pass: String,
    /// Filenames the staging endpoint may serve
    #[serde(default = "default_staging_files")]
    pub staging_files: Vec<String>,
    /// Directory holding the staging artifacts
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    /// Secret for the user-agent allowlist bypass; disabled when unset
    pub test_token: Option<String>,
    /// Vendor substrings accepted as device user agents
    #[serde(default = "default_allowed_agents")]
    pub allowed_agents: Vec<String>,
    /// Page size for attempt and audit listings
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            staging_user: default_staging_user(),
            staging_pass: String::new(),
            staging_files: default_staging_files(),
            artifact_dir: default_artifact_dir(),
            test_token: None,
            allowed_agents: default_allowed_agents(),
            list_limit: default_list_limit(),
        }
    }
}

fn default_staging_user() -> String {
    "provision".to_string()
}

fn default_staging_files() -> Vec<String> {
    vec!["bootstrap.cfg".to_string(), "ca.pem".to_string(), "server.pem".to_string()]
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("/var/lib/phoneprov/artifacts")
}

fn default_allowed_agents() -> Vec<String> {
    vec![
        "Yealink".to_string(),
        "snom".to_string(),
        "Polycom".to_string(),
        "Cisco".to_string(),
        "Grandstream".to_string(),
    ]
}

fn default_list_limit() -> usize {
    200
}

/// Download token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensConfig {
    /// Default lifetime of minted tokens in seconds
    #[serde(default = "default_token_ttl")]
    pub default_ttl_secs: u32,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self { default_ttl_secs: default_token_ttl() }
    }
}

fn default_token_ttl() -> u32 {
    3600
}

/// One operator account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorEntry {
    /// Principal presented in the request headers
    pub name: String,
    /// Request-bound secret the principal must present
    pub secret: String,
    /// Capabilities granted to the principal
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Config {
    /// Map the configuration onto the HTTP crate's settings.
    #[must_use]
    pub fn provision_settings(&self) -> ProvisionSettings {
        ProvisionSettings {
            staging_user: self.provisioning.staging_user.clone(),
            staging_pass: self.provisioning.staging_pass.clone(),
            staging_files: self.provisioning.staging_files.clone(),
            artifact_dir: self.provisioning.artifact_dir.clone(),
            test_token: self.provisioning.test_token.clone(),
            allowed_agents: self.provisioning.allowed_agents.clone(),
            token_ttl_secs: self.tokens.default_ttl_secs,
            list_limit: self.provisioning.list_limit,
        }
    }
}

/// Load configuration from file or defaults.
pub fn load_config() -> Result<Config> {
    let config_path = config_path()?;

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {config_path:?}"))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {config_path:?}"))?;
        Ok(config)
    } else {
        info!(?config_path, "Config file not found, using defaults");
        Ok(Config::default())
    }
}

/// Get the configuration file path.
fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "phoneprov", "Phoneprov")
        .context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}
