//! Configuration using Figment
//!
//! Configuration is loaded from:
//! 1. `config/recap.toml` (optional base configuration)
//! 2. Environment variables prefixed with `RECAP_`, with `__` separating
//!    nested keys (e.g. `RECAP_FETCH__PENDING_DELAY_MS=250`)
//!
//! # Example
//! ```no_run
//! use recap_client::config::RecapConfig;
//!
//! let config = RecapConfig::load()?;
//! println!("Server: {}", config.server.url);
//! # Ok::<(), recap_client::ClientError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::client::ChannelConfig;
use crate::connection::{ServerAddress, DEFAULT_SERVER_URL};
use crate::error::{ClientError, Result};
use crate::fetch::{PollConfig, DEFAULT_MAX_POLLS};
use crate::session::Credentials;

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/recap.toml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RecapConfig {
    /// Server connection settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Login credentials
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Poll loop settings
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server URL (bare `host:port` accepted)
    #[serde(default = "default_url")]
    pub url: String,
    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

/// Login credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Login name
    #[serde(default = "default_name")]
    pub name: String,
    /// Initial key; the server may answer with the key it expects instead
    #[serde(default = "default_key")]
    pub key: i32,
}

/// Poll loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Delay after a PENDING response in milliseconds
    #[serde(default = "default_pending_delay")]
    pub pending_delay_ms: u64,
    /// Maximum fetch calls per session
    #[serde(default = "default_max_polls")]
    pub max_polls: u64,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format (pretty, compact, json)
    #[serde(default = "default_format")]
    pub format: String,
}

// Default value functions
fn default_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_name() -> String {
    "novelins".to_string()
}

fn default_key() -> i32 {
    123
}

fn default_pending_delay() -> u64 {
    100
}

fn default_max_polls() -> u64 {
    DEFAULT_MAX_POLLS
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            key: default_key(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            pending_delay_ms: default_pending_delay(),
            max_polls: default_max_polls(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

impl RecapConfig {
    /// Load configuration from `config/recap.toml` and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and environment apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The layered provider stack used by [`load_from`](Self::load_from).
    #[must_use]
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("RECAP_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<()> {
        ServerAddress::parse(&self.server.url)?;

        if self.server.connect_timeout_ms == 0 || self.server.request_timeout_ms == 0 {
            return Err(ClientError::InvalidConfig(
                "server timeouts must be greater than zero".to_string(),
            ));
        }

        if self.fetch.max_polls == 0 {
            return Err(ClientError::InvalidConfig(
                "fetch.max_polls must be greater than zero".to_string(),
            ));
        }

        let level = self.logging.level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return Err(ClientError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                VALID_LEVELS.join(", ")
            )));
        }

        let format = self.logging.format.to_lowercase();
        if !VALID_FORMATS.contains(&format.as_str()) {
            return Err(ClientError::InvalidConfig(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                VALID_FORMATS.join(", ")
            )));
        }

        Ok(())
    }

    /// Normalized server address.
    pub fn server_address(&self) -> Result<ServerAddress> {
        Ok(ServerAddress::parse(&self.server.url)?)
    }

    /// Channel settings derived from the server section.
    #[must_use]
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            connect_timeout: Duration::from_millis(self.server.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.server.request_timeout_ms),
            ..ChannelConfig::default()
        }
    }

    /// Poll loop settings.
    #[must_use]
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            pending_delay: Duration::from_millis(self.fetch.pending_delay_ms),
            max_polls: self.fetch.max_polls,
        }
    }

    /// Login credentials.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            name: self.credentials.name.clone(),
            key: self.credentials.key,
        }
    }
}
