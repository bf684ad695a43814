//! Server address parsing and URL normalization.
//!
//! The record server is reached over a single gRPC channel. Addresses come
//! from the config file, the `RECAP_SERVER__URL` environment variable or the
//! `--url` flag, and are normalized here before the channel is built:
//! - Bare host:port (e.g., `lab.example.org:5001` → `http://lab.example.org:5001`)
//! - Missing port (e.g., `http://localhost` → `http://localhost:5000`)
//! - IPv6 addresses (e.g., `[::1]:5000` → `http://[::1]:5000`)
//!
//! # Example
//!
//! ```
//! use recap_client::connection::ServerAddress;
//!
//! let addr = ServerAddress::parse("10.0.0.7:5001")?;
//! assert_eq!(addr.as_str(), "http://10.0.0.7:5001/");
//! assert!(!addr.is_tls());
//! # Ok::<(), recap_client::connection::AddressError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Default port of the record server.
pub const DEFAULT_SERVER_PORT: u16 = 5000;

/// Default server address when no configuration is provided.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

/// Validated server address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAddress {
    /// The normalized URL (always has scheme and port)
    url: String,
    /// Original input string (for display/debugging)
    original: String,
}

impl ServerAddress {
    /// Parse and normalize a server URL.
    ///
    /// Accepts bare `host:port`, URLs without a port, and `http`/`https` URLs.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let normalized = normalize_url(input)?;
        Ok(Self {
            url: normalized.to_string(),
            original: input.to_string(),
        })
    }

    /// Returns the normalized URL string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Returns the original input string before normalization.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Returns `true` if this address uses TLS (https scheme).
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.url.starts_with("https://")
    }
}

impl FromStr for ServerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// URL validation error with user-friendly messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Input was empty or whitespace-only
    EmptyInput,
    /// URL parsing failed
    InvalidUrl(String),
    /// No host was found in the URL
    MissingHost,
    /// Port could not be set
    InvalidPort(String),
    /// Unsupported URL scheme (only http/https allowed)
    UnsupportedScheme(String),
}

impl std::error::Error for AddressError {}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "Address cannot be empty"),
            Self::InvalidUrl(e) => write!(f, "Invalid URL: {e}"),
            Self::MissingHost => write!(f, "URL must include a host"),
            Self::InvalidPort(e) => write!(f, "Invalid port: {e}"),
            Self::UnsupportedScheme(s) => write!(f, "Unsupported scheme '{s}' (use http or https)"),
        }
    }
}

/// Normalize a server URL string.
///
/// - Adds `http://` scheme if missing
/// - Adds default port (5000) if missing
/// - Trims whitespace
pub fn normalize_url(input: &str) -> Result<Url, AddressError> {
    let input = input.trim();

    if input.is_empty() {
        return Err(AddressError::EmptyInput);
    }

    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("http://{input}")
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| AddressError::InvalidUrl(e.to_string()))?;

    let scheme = url.scheme().to_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(AddressError::UnsupportedScheme(scheme));
    }

    if url.host().is_none() {
        return Err(AddressError::MissingHost);
    }

    if url.port().is_none() {
        url.set_port(Some(DEFAULT_SERVER_PORT))
            .map_err(|()| AddressError::InvalidPort("Cannot set port on this URL".to_string()))?;
    }

    Ok(url)
}
