//! Configuration loading and secret resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (handled by the binary)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Contents of `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub bind: Option<String>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub dataforseo_login: Option<String>,
    pub dataforseo_password: Option<String>,
    pub jina_reader_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub llm_referer: Option<String>,
    pub llm_title: Option<String>,
    #[serde(default)]
    pub upstream: UpstreamTable,
}

/// `[upstream]` table overriding third-party base URLs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamTable {
    pub sheets: Option<String>,
    pub dataforseo: Option<String>,
    pub search_console: Option<String>,
    pub jina_reader: Option<String>,
    pub openrouter: Option<String>,
}

/// Default config file location: `<config_dir>/leadgen/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("leadgen").join("config.toml"))
}

/// Load the TOML config file
///
/// A missing file is not an error: a warning is logged and defaults are
/// returned. A file that exists but cannot be parsed is a `Config` error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found at {} (using defaults)", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config file {}", path.display());
    Ok(config)
}

/// Validate a secret value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve one setting from the environment, falling back to the TOML value
pub fn resolve_setting(env_name: &str, toml_value: Option<&String>) -> Option<String> {
    if let Ok(value) = std::env::var(env_name) {
        if is_valid_key(&value) {
            return Some(value);
        }
    }

    toml_value.filter(|v| is_valid_key(v)).cloned()
}

/// Fail if any of the named secrets is absent
///
/// Produces one error naming every missing variable, so an operator can fix
/// them all in one pass.
pub fn require_secrets(secrets: &[(&str, Option<&str>)]) -> Result<()> {
    let missing: Vec<&str> = secrets
        .iter()
        .filter(|(_, value)| !value.is_some_and(is_valid_key))
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Missing required environment variables: {}",
            missing.join(", ")
        )))
    }
}
