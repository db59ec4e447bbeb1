//! Application configuration.
//!
//! Configuration is read from a TOML file. Durations are written as
//! human-friendly strings (`"30 days"`, `"15m"`) and parsed with
//! [`humantime`].

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use subtle::ConstantTimeEq;
use thiserror::Error;
use url::Url;

use crate::error::impl_into_error;

/// Top-level configuration for the application.
///
/// # Examples
///
/// ```
/// use tally::config::ProjectConfig;
///
/// let config = ProjectConfig::from_toml(
///     r#"
///     backend_url = "http://127.0.0.1:8000/"
///
///     [session]
///     secret_key = "s3cr3t"
///     ttl = "30 days"
///     "#,
/// )
/// .unwrap();
/// assert!(!config.debug);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Debug mode: error pages include error details. Must stay disabled in
    /// production.
    pub debug: bool,
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// Base URL of the backend REST API.
    pub backend_url: Url,
    /// Timeout for calls to the backend API.
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
    /// Session cookie settings.
    pub session: SessionConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            debug: false,
            listen_addr: ([127, 0, 0, 1], 3000).into(),
            backend_url: Url::parse("http://127.0.0.1:8000/").expect("valid default URL"),
            request_timeout: Duration::from_secs(30),
            session: SessionConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or a value is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse { source })
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Returns a configuration suitable for local development: debug mode on,
    /// a fixed secret key, and a relaxed cookie policy for plain-HTTP hosts.
    #[must_use]
    pub fn dev_default() -> Self {
        Self {
            debug: true,
            session: SessionConfig {
                secret_key: SecretKey::from("dev-only-secret"),
                cookie_secure: false,
                ..SessionConfig::default()
            },
            ..Self::default()
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Key used to authenticate the session cookie payload.
    pub secret_key: SecretKey,
    /// Session lifetime, counted from creation.
    #[serde(deserialize_with = "deserialize_duration")]
    pub ttl: Duration,
    /// Whether the cookie is marked `Secure`. Disable only for local
    /// plain-HTTP development.
    pub cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret_key: SecretKey::default(),
            ttl: Duration::from_secs(60 * 60 * 24 * 30),
            cookie_secure: true,
        }
    }
}

/// A secret key.
///
/// The key is redacted in `Debug` output and compared in constant time.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
    /// Creates a new secret key.
    #[must_use]
    pub fn new<T: Into<String>>(key: T) -> Self {
        Self(key.into())
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for SecretKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(\"**********\")")
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for SecretKey {}

/// An error that occurred while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file")]
    Parse {
        #[source]
        source: toml::de::Error,
    },
}
impl_into_error!(ConfigError);

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    humantime::parse_duration(&value).map_err(D::Error::custom)
}
