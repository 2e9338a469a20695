//! Error handling for registrar API operations.
//!
//! This module defines the single error type surfaced by the client, from
//! transport failures through malformed payloads to application-level
//! error codes reported by the registrar.

use std::fmt;
use std::time::Duration;

/// Main error type for registrar API operations.
#[derive(Debug, Clone)]
pub enum MetunicError {
    /// Transport-level failure (DNS, TLS, refused connection, ...)
    ConnectionError {
        message: String,
        source: Option<String>,
    },

    /// The request did not complete within the configured timeout
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The body was not JSON, or its root was not an object
    MalformedResponse {
        status: u16,
        message: String,
        content: Option<String>,
    },

    /// The registrar reported that the session must log in again (code 3).
    ///
    /// Only raised internally; the orchestrator turns it into a single
    /// login-and-retry cycle.
    SessionExpired {
        message: String,
    },

    /// Any other non-success `messageCode`
    ApiError {
        code: i64,
        message: String,
    },

    /// An expected identifier was absent from a successful response
    NotFound {
        what: String,
    },

    /// Invalid domain name passed to a helper operation
    InvalidDomain {
        domain: String,
        reason: String,
    },

    /// Invalid argument passed to a helper operation
    InvalidArgument {
        argument: String,
        reason: String,
    },

    /// Configuration errors (invalid settings, missing credentials, etc.)
    ConfigError {
        message: String,
    },

    /// File I/O errors on configuration or session files
    FileError {
        path: String,
        message: String,
    },

    /// Generic internal errors that don't fit other categories
    Internal {
        message: String,
    },
}

impl MetunicError {
    /// Create a new connection error.
    pub fn connection<M: Into<String>>(message: M) -> Self {
        Self::ConnectionError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new connection error with source information.
    pub fn connection_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::ConnectionError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new malformed response error, keeping a short snippet of the body.
    pub fn malformed<M: Into<String>>(status: u16, message: M, body: &str) -> Self {
        let content = if body.is_empty() {
            None
        } else {
            Some(body.chars().take(200).collect())
        };
        Self::MalformedResponse {
            status,
            message: message.into(),
            content,
        }
    }

    /// Create a new application-level error.
    pub fn api<M: Into<String>>(code: i64, message: M) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
        }
    }

    /// Create a new not-found error.
    pub fn not_found<W: Into<String>>(what: W) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<A: Into<String>, R: Into<String>>(argument: A, reason: R) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for failures that never reached the application layer.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionError { .. } | Self::Timeout { .. })
    }

    /// True when the registrar asked for a fresh login.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// Convert the internal session-expired signal into the `ApiError` callers see.
    pub(crate) fn surface(self) -> Self {
        match self {
            Self::SessionExpired { message } => Self::ApiError {
                code: crate::envelope::SESSION_EXPIRED_CODE,
                message,
            },
            other => other,
        }
    }

    /// Check if this error suggests the operation could be retried by a caller.
    ///
    /// The client itself never retries these.
    pub fn is_retryable(&self) -> bool {
        self.is_connection_error()
    }
}

impl fmt::Display for MetunicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Metunic connection error: {} (source: {})", message, source)
                } else {
                    write!(f, "Metunic connection error: {}", message)
                }
            }
            Self::Timeout { operation, duration } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::MalformedResponse {
                status, message, ..
            } => {
                write!(f, "Metunic API bad response (HTTP {}): {}", status, message)
            }
            Self::SessionExpired { message } => {
                write!(f, "Session expired: {}", message)
            }
            Self::ApiError { message, .. } => write!(f, "{}", message),
            Self::NotFound { what } => write!(f, "Not found: {}", what),
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::InvalidArgument { argument, reason } => {
                write!(f, "Invalid argument '{}': {}", argument, reason)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for MetunicError {}

impl From<reqwest::Error> for MetunicError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::connection_with_source("Connection failed", err.to_string())
        } else {
            Self::connection_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<serde_json::Error> for MetunicError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("JSON serialization failed: {}", err),
        }
    }
}

impl From<std::io::Error> for MetunicError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}
