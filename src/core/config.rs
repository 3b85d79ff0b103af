//! # Configuration Module
//!
//! Service configuration for the interceptor binary and for building the
//! token resolver.
//!
//! ## Key Features
//! - YAML configuration parsing with serde
//! - Environment variable override support (`INTERCEPTOR_<SECTION>_<FIELD>`)
//! - Validation with detailed error messages

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::core::error::{RestError, RestResult};

/// Host the introspection service historically ran on
pub const DEFAULT_OAUTH_BASE_URL: &str = "http://orchestration_oauth_1:8081";

/// Top-level interceptor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Listener settings for the binary
    pub server: ServerConfig,

    /// Remote token introspection service
    pub oauth: OAuthServiceConfig,

    /// Log level and output format
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Where and how to reach the token introspection endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OAuthServiceConfig {
    /// Base URL; `/oauth/access_token/{id}` is appended to it
    pub base_url: String,

    /// Whole-request timeout applied on the HTTP client
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for OAuthServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OAUTH_BASE_URL.to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl OAuthServiceConfig {
    /// Parse and check the base URL
    pub fn base_url(&self) -> RestResult<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| RestError::config(format!("Invalid oauth base_url {}: {}", self.base_url, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RestError::config(format!(
                "Unsupported oauth base_url scheme: {}",
                url.scheme()
            )));
        }
        if url.cannot_be_a_base() {
            return Err(RestError::config(format!(
                "oauth base_url cannot carry a path: {}",
                self.base_url
            )));
        }

        Ok(url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub level: String,

    /// `json` or `pretty`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl InterceptorConfig {
    /// Load configuration from a YAML file, then apply env overrides
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> RestResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RestError::config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_yaml(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the file if it exists, otherwise start from defaults
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> RestResult<Self> {
        if tokio::fs::try_exists(path.as_ref()).await.unwrap_or(false) {
            return Self::load_from_file(path).await;
        }

        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> RestResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| RestError::config(format!("Failed to parse config: {}", e)))
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) -> RestResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> RestResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("INTERCEPTOR_SERVER_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }

        if let Some(port) = lookup("INTERCEPTOR_SERVER_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| RestError::config(format!("Invalid INTERCEPTOR_SERVER_PORT: {}", e)))?;
        }

        if let Some(base_url) = lookup("INTERCEPTOR_OAUTH_BASE_URL") {
            self.oauth.base_url = base_url;
        }

        if let Some(timeout) = lookup("INTERCEPTOR_OAUTH_TIMEOUT") {
            self.oauth.timeout = humantime::parse_duration(&timeout)
                .map_err(|e| RestError::config(format!("Invalid INTERCEPTOR_OAUTH_TIMEOUT: {}", e)))?;
        }

        if let Some(level) = lookup("INTERCEPTOR_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("INTERCEPTOR_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> RestResult<()> {
        self.oauth.base_url()?;

        if self.oauth.timeout.is_zero() {
            return Err(RestError::config("oauth timeout must be greater than zero"));
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(RestError::config(format!(
                "Invalid log format: {} (expected json or pretty)",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Socket address string for the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}
