//! Application configuration management.
//!
//! Holds the OAuth2 authority settings handed to the platform authenticator,
//! the BI API base URL, and the settings keys the token is cached under.
//!
//! Configuration is read from `~/.config/pbilink/config.json` when present and
//! then overridden by `PBILINK_*` environment variables (a `.env` file is
//! honoured).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{RefreshMode, TokenKeys};

/// Application name used for config/settings directory paths
pub const APP_NAME: &str = "pbilink";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// HTTP request timeout for BI API calls, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

const DEFAULT_AUTHORITY: &str = "https://login.windows.net/common/oauth2/authorize";
const DEFAULT_RESOURCE: &str = "https://analysis.windows.net/powerbi/api";
const DEFAULT_API_BASE_URL: &str = "https://api.powerbi.com/v1.0/myorg/";

const ENV_AUTHORITY: &str = "PBILINK_AUTHORITY";
const ENV_RESOURCE: &str = "PBILINK_RESOURCE";
const ENV_CLIENT_ID: &str = "PBILINK_CLIENT_ID";
const ENV_REDIRECT_URL: &str = "PBILINK_REDIRECT_URL";
const ENV_API_BASE_URL: &str = "PBILINK_API_BASE_URL";

/// Static parameters passed to the platform authenticator.
/// None of these are secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityConfig {
    pub authority: String,
    pub resource: String,
    pub client_id: String,
    pub redirect_url: String,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            resource: DEFAULT_RESOURCE.to_string(),
            client_id: String::new(),
            redirect_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub authority: AuthorityConfig,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub token_keys: TokenKeys,
    pub refresh_mode: RefreshMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            authority: AuthorityConfig::default(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_keys: TokenKeys::default(),
            refresh_mode: RefreshMode::default(),
        }
    }
}

impl Config {
    /// Load from the default config file (if any), then apply environment overrides
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load from a specific file, falling back to defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Override fields from variables returned by `lookup` (normally the process environment).
    /// Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_AUTHORITY) {
            self.authority.authority = v;
        }
        if let Some(v) = get(ENV_RESOURCE) {
            self.authority.resource = v;
        }
        if let Some(v) = get(ENV_CLIENT_ID) {
            self.authority.client_id = v;
        }
        if let Some(v) = get(ENV_REDIRECT_URL) {
            self.authority.redirect_url = v;
        }
        if let Some(v) = get(ENV_API_BASE_URL) {
            self.api_base_url = v;
        }
    }

    /// Reject configurations the authenticator or gateway can't work with
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("authority", &self.authority.authority),
            ("resource", &self.authority.resource),
            ("client_id", &self.authority.client_id),
            ("redirect_url", &self.authority.redirect_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("Missing required setting: {}", name);
            }
        }

        reqwest::Url::parse(&self.api_base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api_base_url))?;

        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
