//! Gateway configuration
//!
//! Merges CLI arguments, environment variables and the TOML file into one
//! [`GatewayConfig`]. Secrets stay optional here; each router checks the ones
//! it needs when it is constructed, so a missing secret stops startup instead
//! of surfacing on the first request.

use leadgen_common::config::{resolve_setting, TomlConfig};
use leadgen_common::{Error, Result};
use std::net::SocketAddr;
use tracing::info;

pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

pub const DEFAULT_SHEETS_URL: &str = "https://sheets.googleapis.com";
pub const DEFAULT_DATAFORSEO_URL: &str = "https://api.dataforseo.com";
pub const DEFAULT_SEARCH_CONSOLE_URL: &str = "https://www.googleapis.com";
pub const DEFAULT_JINA_READER_URL: &str = "https://r.jina.ai";
pub const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";

pub const DEFAULT_LLM_REFERER: &str = "https://greater.agency";
pub const DEFAULT_LLM_TITLE: &str = "PitchedBy";

/// Third-party secrets
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub dataforseo_login: Option<String>,
    pub dataforseo_password: Option<String>,
    pub jina_reader_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
}

impl Credentials {
    /// Resolve each secret from its environment variable, then the TOML file
    pub fn resolve(toml: &TomlConfig) -> Self {
        Self {
            google_client_id: resolve_setting("GOOGLE_CLIENT_ID", toml.google_client_id.as_ref()),
            google_client_secret: resolve_setting(
                "GOOGLE_CLIENT_SECRET",
                toml.google_client_secret.as_ref(),
            ),
            dataforseo_login: resolve_setting("DATAFORSEO_LOGIN", toml.dataforseo_login.as_ref()),
            dataforseo_password: resolve_setting(
                "DATAFORSEO_PASSWORD",
                toml.dataforseo_password.as_ref(),
            ),
            jina_reader_api_key: resolve_setting(
                "JINA_READER_API_KEY",
                toml.jina_reader_api_key.as_ref(),
            ),
            openrouter_api_key: resolve_setting(
                "OPENROUTER_API_KEY",
                toml.openrouter_api_key.as_ref(),
            ),
        }
    }

    /// Log which secrets are present without revealing them
    pub fn log_presence(&self) {
        let presence = |v: &Option<String>| if v.is_some() { "present" } else { "missing" };
        info!(
            google_client_id = presence(&self.google_client_id),
            google_client_secret = presence(&self.google_client_secret),
            dataforseo_login = presence(&self.dataforseo_login),
            dataforseo_password = presence(&self.dataforseo_password),
            jina_reader_api_key = presence(&self.jina_reader_api_key),
            openrouter_api_key = presence(&self.openrouter_api_key),
            "Credentials resolved"
        );
    }
}

/// Base URLs of the proxied services
#[derive(Debug, Clone)]
pub struct UpstreamUrls {
    pub sheets: String,
    pub dataforseo: String,
    pub search_console: String,
    pub jina_reader: String,
    pub openrouter: String,
}

impl Default for UpstreamUrls {
    fn default() -> Self {
        Self {
            sheets: DEFAULT_SHEETS_URL.to_string(),
            dataforseo: DEFAULT_DATAFORSEO_URL.to_string(),
            search_console: DEFAULT_SEARCH_CONSOLE_URL.to_string(),
            jina_reader: DEFAULT_JINA_READER_URL.to_string(),
            openrouter: DEFAULT_OPENROUTER_URL.to_string(),
        }
    }
}

impl UpstreamUrls {
    /// Same host for every service; used to point all adapters at one fake
    pub fn all(base: &str) -> Self {
        Self {
            sheets: base.to_string(),
            dataforseo: base.to_string(),
            search_console: base.to_string(),
            jina_reader: base.to_string(),
            openrouter: base.to_string(),
        }
    }
}

/// Fully resolved gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind: SocketAddr,
    pub credentials: Credentials,
    pub upstream: UpstreamUrls,
    /// Fallback `HTTP-Referer` for LLM calls when the client sends no Origin
    pub llm_referer: String,
    /// `X-Title` sent with LLM calls
    pub llm_title: String,
}

impl GatewayConfig {
    /// Build configuration from an optional CLI bind address and the TOML file
    pub fn resolve(cli_bind: Option<&str>, toml: &TomlConfig) -> Result<Self> {
        let bind = cli_bind
            .map(str::to_string)
            .or_else(|| resolve_setting("LEADGEN_BIND", toml.bind.as_ref()))
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind, e)))?;

        let defaults = UpstreamUrls::default();
        let pick = |value: &Option<String>, default: String| {
            value
                .as_deref()
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default)
        };
        let upstream = UpstreamUrls {
            sheets: pick(&toml.upstream.sheets, defaults.sheets),
            dataforseo: pick(&toml.upstream.dataforseo, defaults.dataforseo),
            search_console: pick(&toml.upstream.search_console, defaults.search_console),
            jina_reader: pick(&toml.upstream.jina_reader, defaults.jina_reader),
            openrouter: pick(&toml.upstream.openrouter, defaults.openrouter),
        };

        Ok(Self {
            bind,
            credentials: Credentials::resolve(toml),
            upstream,
            llm_referer: toml
                .llm_referer
                .clone()
                .unwrap_or_else(|| DEFAULT_LLM_REFERER.to_string()),
            llm_title: toml
                .llm_title
                .clone()
                .unwrap_or_else(|| DEFAULT_LLM_TITLE.to_string()),
        })
    }

    /// Configuration with every secret set and all upstreams at `base`
    pub fn for_upstream(base: &str) -> Self {
        Self {
            bind: DEFAULT_BIND.parse().unwrap_or_else(|_| ([127, 0, 0, 1], 8787).into()),
            credentials: Credentials {
                google_client_id: Some("test-client-id".to_string()),
                google_client_secret: Some("test-client-secret".to_string()),
                dataforseo_login: Some("login".to_string()),
                dataforseo_password: Some("password".to_string()),
                jina_reader_api_key: Some("jina-key".to_string()),
                openrouter_api_key: Some("openrouter-key".to_string()),
            },
            upstream: UpstreamUrls::all(base),
            llm_referer: DEFAULT_LLM_REFERER.to_string(),
            llm_title: DEFAULT_LLM_TITLE.to_string(),
        }
    }
}
