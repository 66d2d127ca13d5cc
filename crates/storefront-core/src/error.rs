//! Error types for the storefront pipeline.
//!
//! Every failure the pipeline can surface is an [`Error`]. The variants are
//! explicit so callers can branch on them, and [`Error::kind`] folds them onto
//! the five-way classification the pipeline reacts to.

use std::fmt;
use thiserror::Error;

/// The unified error type for storefront operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The backend rejected the access credential (HTTP 401).
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// A 401 could not be recovered because the credential refresh failed.
    ///
    /// The session has already been cleared when this is returned.
    #[error("session expired: {0}")]
    SessionExpired(#[source] RefreshError),

    /// The backend denied access to the resource (HTTP 403).
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// Timeout, network failure or server-side 5xx.
    #[error("transient failure: {0}")]
    Transient(#[from] TransientError),

    /// Business-rule rejection carried in the response envelope.
    #[error("application error (code {code}): {message}")]
    Application { code: i64, message: String },

    /// Unexpected response shape or status.
    #[error("{0}")]
    Other(OtherError),

    /// The envelope payload could not be converted into the requested type.
    #[error("failed to decode response data: {message}")]
    Decode { message: String },

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid caller-supplied input (URLs, header values).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

/// The classification the pipeline uses to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Expired or invalid credential; recoverable once via refresh.
    Unauthorized,
    /// Authorization denied; terminal for the request.
    Forbidden,
    /// Recoverable via bounded retry.
    Transient,
    /// Non-zero application code in the envelope.
    Application,
    /// Anything else; terminal.
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Transient => "transient",
            ErrorKind::Application => "application",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Create an [`Error::Other`] from a message and optional HTTP status.
    pub fn other(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::Other(OtherError {
            status,
            message: message.into(),
        })
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthorized { .. } | Error::SessionExpired(_) => ErrorKind::Unauthorized,
            Error::Forbidden { .. } => ErrorKind::Forbidden,
            Error::Transient(_) => ErrorKind::Transient,
            Error::Application { .. } => ErrorKind::Application,
            Error::Other(_) | Error::Decode { .. } | Error::Config(_) | Error::InvalidInput(_) => {
                ErrorKind::Other
            }
        }
    }

    /// Returns a message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthorized { message }
            | Error::Forbidden { message }
            | Error::Application { message, .. } => message.clone(),
            Error::SessionExpired(_) => "Your session has expired. Please log in again.".into(),
            Error::Transient(err) => err.user_message(),
            Error::Other(err) => err.message.clone(),
            Error::Decode { .. } | Error::Config(_) | Error::InvalidInput(_) => {
                DEFAULT_ERROR_MESSAGE.to_string()
            }
        }
    }
}

/// Fallback message used when the backend did not supply one.
pub const DEFAULT_ERROR_MESSAGE: &str = "Error occurred";

/// Unexpected-response details.
#[derive(Debug, Clone)]
pub struct OtherError {
    /// HTTP status, if a response was received.
    pub status: Option<u16>,
    /// Message extracted from the response, or a generic one.
    pub message: String,
}

impl fmt::Display for OtherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "unexpected response (HTTP {}): {}", status, self.message),
            None => write!(f, "unexpected response: {}", self.message),
        }
    }
}

/// Failures that bounded retry may recover from.
#[derive(Debug, Clone, Error)]
pub enum TransientError {
    /// No response within the configured timeout.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// No response at all (connection refused, DNS, TLS, reset).
    #[error("network error: {message}")]
    Network { message: String },

    /// The server answered with a 5xx status.
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },
}

impl TransientError {
    fn user_message(&self) -> String {
        match self {
            TransientError::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Transport-level failures, reported when no HTTP response was received.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Any other failure while sending or reading the response.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

impl From<TransportError> for TransientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { duration_ms } => TransientError::Timeout { duration_ms },
            TransportError::Connection { message } | TransportError::Http { message } => {
                TransientError::Network { message }
            }
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Error::Transient(err.into())
    }
}

/// Failures of the credential refresh call.
///
/// Cloneable so one outcome can be delivered to every concurrent waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The refresh endpoint answered but did not issue a token.
    #[error("refresh rejected: {message}")]
    Rejected { message: String },

    /// The ambient refresh context (cookie) is missing or no longer valid.
    #[error("refresh context invalid")]
    Unauthorized,

    /// The refresh call never got a response.
    #[error("refresh transport failure: {message}")]
    Transport { message: String },

    /// The refresh task ended without producing a result.
    #[error("refresh aborted")]
    Aborted,
}

impl From<TransportError> for RefreshError {
    fn from(err: TransportError) -> Self {
        RefreshError::Transport {
            message: err.to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable could not be parsed.
    #[error("invalid value for {name}: {value}")]
    InvalidEnvVar { name: String, value: String },

    /// A configured value is out of range.
    #[error("{0}")]
    Invalid(String),
}

/// Input validation errors.
#[derive(Debug, Clone, Error)]
pub enum InvalidInputError {
    /// Invalid base URL.
    #[error("invalid base URL '{value}': {reason}")]
    BaseUrl { value: String, reason: String },

    /// Invalid request target.
    #[error("invalid target '{value}': {reason}")]
    Target { value: String, reason: String },
}
