//! Configuration resolution for cfwg.
//!
//! Implements layered config resolution (lowest to highest priority):
//! 1. Built-in defaults
//! 2. Config file: explicit path (`--config` / `CFWG_CONFIG_FILE`), else the
//!    first of `./config.toml`, `/etc/cfwg-zt/config.toml`,
//!    `~/.cfwg-zt/config.toml` that exists
//! 3. Environment variables (`CFWG_` + upper-cased key path, dots become `_`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Prefix for every environment override.
pub const ENV_PREFIX: &str = "CFWG";

/// Environment variable naming an explicit config file.
pub const CONFIG_FILE_ENV: &str = "CFWG_CONFIG_FILE";

/// File name looked up in each search directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// System-wide config directory.
pub const SYSTEM_CONFIG_DIR: &str = "/etc/cfwg-zt";

/// Per-user config directory, relative to the home directory.
pub const USER_CONFIG_DIR: &str = ".cfwg-zt";

/// Where `setup` and `config-wizard` write when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cfwg-zt/config.toml";

/// Complete cfwg configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minutes between reconciliation cycles.
    pub refresh_interval_minutes: u64,
    pub debug: bool,
    pub identity: IdentityConfig,
    pub tunnel: TunnelConfig,
    pub service: ServiceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: 60,
            debug: false,
            identity: IdentityConfig::default(),
            tunnel: TunnelConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

/// Identity-service credentials and endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub client_id: String,
    pub client_secret: String,
    pub team_name: String,
    pub account_id: String,
    pub api_base_url: String,
    /// Device name reported at registration.
    pub device_name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            team_name: String::new(),
            account_id: String::new(),
            api_base_url: "https://api.cloudflare.com/client/v4".to_string(),
            device_name: "UDM-Pro-WARP".to_string(),
        }
    }
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("client_id", &self.client_id)
            .field("has_client_secret", &!self.client_secret.is_empty())
            .field("team_name", &self.team_name)
            .field("account_id", &self.account_id)
            .field("api_base_url", &self.api_base_url)
            .field("device_name", &self.device_name)
            .finish()
    }
}

/// Tunnel interface settings. Must match the UI-created configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    pub interface_name: String,
    pub config_path: PathBuf,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            interface_name: "wg0".to_string(),
            config_path: PathBuf::from("/etc/wireguard/wg0.conf"),
        }
    }
}

/// Host service-manager settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub unit_name: String,
    pub backup_dir: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            unit_name: "wg-quick@wg0".to_string(),
            backup_dir: PathBuf::from("/etc/wireguard/backup"),
        }
    }
}

impl Config {
    /// Interval between reconciliation cycles.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes.saturating_mul(60))
    }

    /// Check the fields the daemon cannot run without.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.identity.client_id.trim().is_empty() {
            missing.push("identity.client_id");
        }
        if self.identity.client_secret.trim().is_empty() {
            missing.push("identity.client_secret");
        }
        if self.identity.account_id.trim().is_empty() {
            missing.push("identity.account_id");
        }
        if self.tunnel.config_path.as_os_str().is_empty() {
            missing.push("tunnel.config_path");
        }
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        if self.refresh_interval_minutes == 0 {
            return Err(Error::Config(
                "refresh_interval_minutes must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// A resolved configuration plus the file it came from, if any.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: Option<PathBuf>,
}

/// Load configuration from the process environment and standard search paths.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with(explicit, &search_paths(), |key| std::env::var(key).ok())
}

/// Load configuration with an explicit search list and environment lookup.
///
/// An explicit path (argument or `CFWG_CONFIG_FILE`) must exist. A missing file
/// on the search list is not an error; a malformed one is.
pub fn load_config_with<F>(
    explicit: Option<&Path>,
    search: &[PathBuf],
    lookup: F,
) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| lookup(CONFIG_FILE_ENV).filter(|v| !v.is_empty()).map(PathBuf::from));

    let source = match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            Some(path)
        }
        None => search.iter().find(|p| p.is_file()).cloned(),
    };

    let mut config = match &source {
        Some(path) => load_config_file(path)?,
        None => {
            tracing::info!("No config file found; using defaults and environment variables");
            Config::default()
        }
    };

    apply_env_overrides(&mut config, &lookup)?;

    Ok(LoadedConfig { config, source })
}

/// Standard config search order: current directory, system, per-user.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from(CONFIG_FILE_NAME),
        Path::new(SYSTEM_CONFIG_DIR).join(CONFIG_FILE_NAME),
    ];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(USER_CONFIG_DIR).join(CONFIG_FILE_NAME));
    }
    paths
}

/// Environment variable name for a dotted key path.
///
/// `identity.client_id` becomes `CFWG_IDENTITY_CLIENT_ID`.
pub fn env_var_name(key_path: &str) -> String {
    format!(
        "{ENV_PREFIX}_{}",
        key_path.replace('.', "_").to_ascii_uppercase()
    )
}

/// Parse a config file body.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| Error::Config(format!("invalid config: {e}")))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    toml::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides<F>(config: &mut Config, lookup: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key_path: &str| lookup(&env_var_name(key_path)).filter(|v| !v.is_empty());

    if let Some(val) = var("identity.client_id") {
        config.identity.client_id = val;
    }
    if let Some(val) = var("identity.client_secret") {
        config.identity.client_secret = val;
    }
    if let Some(val) = var("identity.team_name") {
        config.identity.team_name = val;
    }
    if let Some(val) = var("identity.account_id") {
        config.identity.account_id = val;
    }
    if let Some(val) = var("identity.api_base_url") {
        config.identity.api_base_url = val;
    }
    if let Some(val) = var("identity.device_name") {
        config.identity.device_name = val;
    }
    if let Some(val) = var("tunnel.interface_name") {
        config.tunnel.interface_name = val;
    }
    if let Some(val) = var("tunnel.config_path") {
        config.tunnel.config_path = PathBuf::from(val);
    }
    if let Some(val) = var("service.unit_name") {
        config.service.unit_name = val;
    }
    if let Some(val) = var("service.backup_dir") {
        config.service.backup_dir = PathBuf::from(val);
    }
    if let Some(val) = var("refresh_interval_minutes") {
        config.refresh_interval_minutes = val.trim().parse().map_err(|_| {
            Error::Config(format!(
                "{} must be a whole number of minutes, got {val:?}",
                env_var_name("refresh_interval_minutes")
            ))
        })?;
    }
    if let Some(val) = var("debug") {
        config.debug = parse_bool(&val).ok_or_else(|| {
            Error::Config(format!(
                "{} must be a boolean, got {val:?}",
                env_var_name("debug")
            ))
        })?;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Serialize `config` to `path` (owner read/write only, it holds the client secret).
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let body = toml::to_string_pretty(config)?;
    let content = format!("# cfwg configuration (written by config-wizard)\n\n{body}");
    crate::backup::write_atomic(path, &content)?;
    tracing::info!(path = %path.display(), "Saved configuration");
    Ok(())
}

/// Commented configuration template written by `setup`.
pub fn default_config_text() -> &'static str {
    DEFAULT_CONFIG_TEMPLATE
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# cfwg configuration
#
# Keeps a WireGuard tunnel that was created in the management UI authenticated
# against the identity service. Every key can be overridden from the
# environment: CFWG_<KEY PATH>, e.g. CFWG_IDENTITY_CLIENT_SECRET.

# How often to refresh credentials, in minutes
refresh_interval_minutes = 60
debug = false

[identity]
client_id = "your_client_id_here"
client_secret = "your_client_secret_here"
team_name = "your_team_name_here"
account_id = "your_account_id_here"
api_base_url = "https://api.cloudflare.com/client/v4"
device_name = "UDM-Pro-WARP"

# Must match the UI-created WireGuard configuration
[tunnel]
interface_name = "wg0"
config_path = "/etc/wireguard/wg0.conf"

[service]
# Must match the interface name
unit_name = "wg-quick@wg0"
backup_dir = "/etc/wireguard/backup"
"#;
