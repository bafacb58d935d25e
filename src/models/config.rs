//! Application configuration structures.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listening address
    #[serde(default)]
    pub server: ServerConfig,

    /// Gazette site and companion services
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Outbound HTTP client behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Local cache location
    #[serde(default)]
    pub cache: CacheConfig,

    /// Internal endpoint protection
    #[serde(default)]
    pub auth: AuthConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Override file values with environment variables.
    pub fn apply_env(mut self) -> Self {
        self.apply_vars(|key| env::var(key).ok());
        self
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        let set = |key: &str| var(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = set("INTERNAL_API_KEY") {
            self.auth.internal_api_key = Some(key.trim().to_string());
        }
        if let Some(base) = set("SCRAPER_API_BASE") {
            self.upstream.scraper_api_base = base;
        }
        if let Some(base) = set("PDF2TEXT_BASE") {
            self.upstream.pdf2text_base = base;
        }
        if let Some(base) = set("SGG_BASE_URL") {
            self.upstream.sgg_base_url = base;
        }
        if let Some(dir) = set("BO_CACHE_DIR") {
            self.cache.dir = PathBuf::from(dir);
        }
        if let Some(host) = set("HOST") {
            self.server.host = host;
        }
        if let Some(port) = set("PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(e) => log::warn!("Ignoring invalid PORT '{}': {}", port, e),
            }
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0
            || self.http.ajax_timeout_secs == 0
            || self.http.pdf_timeout_secs == 0
        {
            return Err(AppError::validation("http timeouts must be > 0"));
        }
        for (name, value) in [
            ("upstream.sgg_base_url", &self.upstream.sgg_base_url),
            ("upstream.scraper_api_base", &self.upstream.scraper_api_base),
            ("upstream.pdf2text_base", &self.upstream.pdf2text_base),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::validation(format!("{name} '{value}': {e}")))?;
        }
        if self
            .auth
            .internal_api_key
            .as_deref()
            .is_some_and(|key| key.trim().is_empty())
        {
            return Err(AppError::validation("auth.internal_api_key is blank"));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::host")]
    pub host: String,

    #[serde(default = "defaults::port")]
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
        }
    }
}

/// How the listing page scripts are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverMode {
    /// Through the companion scraping service
    #[default]
    Proxy,
    /// Straight from the gazette site
    Direct,
}

/// Gazette site and companion service locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Origin of the gazette portal
    #[serde(default = "defaults::sgg_base_url")]
    pub sgg_base_url: String,

    /// Path of the AJAX listing method, relative to the portal origin
    #[serde(default = "defaults::ajax_path")]
    pub ajax_path: String,

    /// Companion scraping proxy
    #[serde(default = "defaults::scraper_api_base")]
    pub scraper_api_base: String,

    /// PDF-to-text service
    #[serde(default = "defaults::pdf2text_base")]
    pub pdf2text_base: String,

    #[serde(default)]
    pub resolver_mode: ResolverMode,

    /// How long resolved identifiers are reused; 0 disables reuse
    #[serde(default = "defaults::identifier_ttl")]
    pub identifier_ttl_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            sgg_base_url: defaults::sgg_base_url(),
            ajax_path: defaults::ajax_path(),
            scraper_api_base: defaults::scraper_api_base(),
            pdf2text_base: defaults::pdf2text_base(),
            resolver_mode: ResolverMode::default(),
            identifier_ttl_secs: defaults::identifier_ttl(),
        }
    }
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Timeout for listing page and scraping proxy requests
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Timeout for the gazette AJAX listing
    #[serde(default = "defaults::ajax_timeout")]
    pub ajax_timeout_secs: u64,

    /// PDF extraction is slow on large issues
    #[serde(default = "defaults::pdf_timeout")]
    pub pdf_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            ajax_timeout_secs: defaults::ajax_timeout(),
            pdf_timeout_secs: defaults::pdf_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "defaults::cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: defaults::cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token for internal endpoints; unset disables them
    #[serde(default)]
    pub internal_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            json: false,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Server defaults
    pub fn host() -> String {
        "0.0.0.0".into()
    }
    pub fn port() -> u16 {
        8000
    }

    // Upstream defaults
    pub fn sgg_base_url() -> String {
        "https://www.sgg.gov.ma".into()
    }
    pub fn ajax_path() -> String {
        "/DesktopModules/MVC/TableListBO/BO/AjaxMethod".into()
    }
    pub fn scraper_api_base() -> String {
        "https://scraper-api-py.vercel.app".into()
    }
    pub fn pdf2text_base() -> String {
        "https://pdf2text-api-py.vercel.app".into()
    }
    pub fn identifier_ttl() -> u64 {
        600
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; bulletin/0.1)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn ajax_timeout() -> u64 {
        15
    }
    pub fn pdf_timeout() -> u64 {
        60
    }

    pub fn cache_dir() -> PathBuf {
        PathBuf::from("data/cache")
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
