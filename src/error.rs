//! Error types for the exporter.
//!
//! Only startup can fail hard: configuration, TLS material and the listening
//! socket. Everything that goes wrong while the exporter is running (a failed
//! listing, a malformed line, a rejected scrape) is logged and skipped instead
//! of being surfaced through these types.

use std::fmt;
use std::io;

use crate::config::ConfigError;

/// Error type for exporter startup and metric export failures.
#[derive(Debug)]
pub enum ExporterError {
    /// Configuration could not be loaded or is incomplete
    Config {
        /// The underlying configuration error
        source: ConfigError,
    },

    /// TLS certificate or private key could not be loaded
    Tls {
        /// Details about what could not be loaded
        details: String,
    },

    /// The listening socket could not be bound or served
    Bind {
        /// The address the server tried to listen on
        address: String,
        /// The underlying I/O error
        source: io::Error,
    },

    /// Metric registration or encoding failed
    Metrics {
        /// Details from the prometheus crate
        details: String,
    },

    /// Generic I/O error
    Io {
        /// The underlying I/O error
        source: io::Error,
    },

    /// A generic error with a custom message
    Other {
        /// Error message
        message: String,
    },
}

impl fmt::Display for ExporterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { source } => write!(f, "Configuration error: {}", source),
            Self::Tls { details } => write!(f, "TLS setup failed: {}", details),
            Self::Bind { address, .. } => {
                write!(
                    f,
                    "Failed to listen on {}. Check that the port is free and the address is local.",
                    address
                )
            }
            Self::Metrics { details } => write!(f, "Metrics error: {}", details),
            Self::Io { source } => write!(f, "I/O error: {}", source),
            Self::Other { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for ExporterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config { source } => Some(source),
            Self::Bind { source, .. } => Some(source),
            Self::Io { source } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for ExporterError {
    fn from(e: ConfigError) -> Self {
        Self::Config { source: e }
    }
}

impl From<io::Error> for ExporterError {
    fn from(e: io::Error) -> Self {
        Self::Io { source: e }
    }
}

impl From<openssl::error::ErrorStack> for ExporterError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::Tls {
            details: e.to_string(),
        }
    }
}

impl From<prometheus::Error> for ExporterError {
    fn from(e: prometheus::Error) -> Self {
        Self::Metrics {
            details: e.to_string(),
        }
    }
}

impl From<&str> for ExporterError {
    fn from(s: &str) -> Self {
        Self::Other {
            message: s.to_string(),
        }
    }
}

impl From<String> for ExporterError {
    fn from(s: String) -> Self {
        Self::Other { message: s }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = ExporterError::Tls {
            details: "no certificate path configured".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "TLS setup failed: no certificate path configured"
        );
    }

    #[test]
    fn test_error_from_str() {
        let err: ExporterError = "test error".into();
        assert_eq!(err.to_string(), "test error");
    }

    #[test]
    fn test_config_error_is_source() {
        let err: ExporterError = ConfigError::Validation("bucket is not set".to_string()).into();
        assert!(err.to_string().contains("bucket is not set"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_bind_error_mentions_address() {
        let err = ExporterError::Bind {
            address: "0.0.0.0:9337".to_string(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("0.0.0.0:9337"));
    }
}
