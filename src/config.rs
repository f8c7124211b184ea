//! Configuration management for the exporter.
//!
//! Settings are layered: built-in defaults first, then an optional TOML file,
//! then command-line flags (each of which can also be supplied through its
//! environment variable, see `main.rs`).
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (specified with --config)
//! 3. Command-line arguments / environment variables (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! bucket = "backups"
//! remote = "selectel"
//! interval = 60
//! port = 9337
//!
//! [auth]
//! user = "prometheus"
//! password = "secret"
//!
//! [tls]
//! cert = "/etc/s3exporter/cert.pem"
//! key = "/etc/s3exporter/key.pem"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Remote used when none is configured.
pub const DEFAULT_REMOTE: &str = "selectel";
/// Seconds between two listing cycles.
pub const DEFAULT_INTERVAL: u64 = 60;
/// Port of the scrape endpoint.
pub const DEFAULT_PORT: u16 = 9337;
/// Address the scrape endpoint listens on.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
/// Listing tool invoked for every cycle.
pub const DEFAULT_RCLONE_BINARY: &str = "rclone";

/// Main configuration structure.
///
/// All fields are optional to support partial configuration and merging.
/// [`Config::resolve`] turns a merged configuration into [`Settings`].
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    /// Bucket whose objects are exported
    pub bucket: Option<String>,
    /// Remote name known to the listing tool
    pub remote: Option<String>,
    /// Seconds to sleep between two listing cycles
    pub interval: Option<u64>,
    /// Port of the scrape endpoint
    pub port: Option<u16>,
    /// Address of the scrape endpoint
    pub bind_address: Option<String>,
    /// Listing tool executable
    pub rclone_binary: Option<String>,
    /// Kill the listing tool after this many seconds
    pub listing_timeout: Option<u64>,
    /// Export process_* metrics next to the bucket metrics
    pub process_metrics: Option<bool>,
    /// Basic authentication credentials
    pub auth: Option<AuthConfig>,
    /// Certificate and key for the scrape endpoint
    pub tls: Option<TlsConfig>,
}

/// Expected Basic authentication credentials.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AuthConfig {
    pub user: Option<String>,
    pub password: Option<String>,
}

/// PEM files used to terminate TLS.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct TlsConfig {
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

/// Fully resolved settings the exporter runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bucket: String,
    pub remote: String,
    pub interval: Duration,
    pub port: u16,
    pub bind_address: IpAddr,
    pub rclone_binary: String,
    pub listing_timeout: Option<Duration>,
    pub process_metrics: bool,
    pub auth_user: String,
    pub auth_password: String,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

impl Settings {
    /// Socket address of the scrape endpoint.
    pub fn listen_address(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Configuration holding every built-in default.
    ///
    /// The bucket has no default and credentials and TLS paths stay unset.
    pub fn with_defaults() -> Self {
        Config {
            bucket: None,
            remote: Some(DEFAULT_REMOTE.to_string()),
            interval: Some(DEFAULT_INTERVAL),
            port: Some(DEFAULT_PORT),
            bind_address: Some(DEFAULT_BIND_ADDRESS.to_string()),
            rclone_binary: Some(DEFAULT_RCLONE_BINARY.to_string()),
            listing_timeout: None,
            process_metrics: Some(false),
            auth: None,
            tls: None,
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, if the `other` config has a value (Some), it overrides
    /// this config's value. If the `other` value is None, keeps the current value.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.bucket.is_some() {
            self.bucket = other.bucket;
        }
        if other.remote.is_some() {
            self.remote = other.remote;
        }
        if other.interval.is_some() {
            self.interval = other.interval;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.bind_address.is_some() {
            self.bind_address = other.bind_address;
        }
        if other.rclone_binary.is_some() {
            self.rclone_binary = other.rclone_binary;
        }
        if other.listing_timeout.is_some() {
            self.listing_timeout = other.listing_timeout;
        }
        if other.process_metrics.is_some() {
            self.process_metrics = other.process_metrics;
        }
        if let Some(other_auth) = other.auth {
            let auth = self.auth.get_or_insert_with(AuthConfig::default);
            if other_auth.user.is_some() {
                auth.user = other_auth.user;
            }
            if other_auth.password.is_some() {
                auth.password = other_auth.password;
            }
        }
        if let Some(other_tls) = other.tls {
            let tls = self.tls.get_or_insert_with(TlsConfig::default);
            if other_tls.cert.is_some() {
                tls.cert = other_tls.cert;
            }
            if other_tls.key.is_some() {
                tls.key = other_tls.key;
            }
        }
        self
    }

    /// Validates the merged configuration and fills in what is still unset.
    ///
    /// Fails when the bucket or remote is missing or empty, when the
    /// interval is zero, or when the bind address is not an IP literal.
    /// Missing credentials resolve to empty strings.
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let bucket = non_empty(self.bucket)
            .ok_or_else(|| ConfigError::Validation("BUCKET_NAME is not set".to_string()))?;
        let remote = non_empty(self.remote)
            .ok_or_else(|| ConfigError::Validation("RCLONE_REMOTE is not set".to_string()))?;

        let interval = self.interval.unwrap_or(DEFAULT_INTERVAL);
        if interval == 0 {
            return Err(ConfigError::Validation(
                "interval must be at least one second".to_string(),
            ));
        }

        let bind_address = self
            .bind_address
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDRESS)
            .trim();
        let bind_address: IpAddr = bind_address.parse().map_err(|e| {
            ConfigError::Validation(format!("invalid bind address {}: {}", bind_address, e))
        })?;

        let auth = self.auth.unwrap_or_default();
        let tls = self.tls.unwrap_or_default();

        Ok(Settings {
            bucket,
            remote,
            interval: Duration::from_secs(interval),
            port: self.port.unwrap_or(DEFAULT_PORT),
            bind_address,
            rclone_binary: self
                .rclone_binary
                .unwrap_or_else(|| DEFAULT_RCLONE_BINARY.to_string()),
            listing_timeout: self.listing_timeout.map(Duration::from_secs),
            process_metrics: self.process_metrics.unwrap_or(false),
            auth_user: auth.user.unwrap_or_default(),
            auth_password: auth.password.unwrap_or_default(),
            tls_cert: tls.cert,
            tls_key: tls.key,
        })
    }

    /// Generates an example configuration file in TOML format.
    pub fn example_toml() -> String {
        let example = Config {
            bucket: Some("backups".to_string()),
            remote: Some(DEFAULT_REMOTE.to_string()),
            interval: Some(DEFAULT_INTERVAL),
            port: Some(DEFAULT_PORT),
            bind_address: Some(DEFAULT_BIND_ADDRESS.to_string()),
            rclone_binary: Some(DEFAULT_RCLONE_BINARY.to_string()),
            listing_timeout: Some(300),
            process_metrics: Some(false),
            auth: Some(AuthConfig {
                user: Some("prometheus".to_string()),
                password: Some("change-me".to_string()),
            }),
            tls: Some(TlsConfig {
                cert: Some(PathBuf::from("/etc/s3exporter/cert.pem")),
                key: Some(PathBuf::from("/etc/s3exporter/key.pem")),
            }),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    Parse(String),
    /// Validation error (missing required fields, invalid values, etc.)
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO Error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse Error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
