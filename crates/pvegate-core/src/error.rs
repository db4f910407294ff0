//! Error types for pvegate.

use std::fmt;

use thiserror::Error;

/// Low-level reason a request never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCode {
    ConnectionRefused,
    TimedOut,
    NameNotFound,
    Other(String),
}

impl fmt::Display for TransportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportCode::ConnectionRefused => write!(f, "ECONNREFUSED"),
            TransportCode::TimedOut => write!(f, "ETIMEDOUT"),
            TransportCode::NameNotFound => write!(f, "ENOTFOUND"),
            TransportCode::Other(code) => write!(f, "{}", code),
        }
    }
}

/// A failed call against the management API.
///
/// Exactly one shape per failure: the server answered with a non-success
/// status, the request never got a response, or a success body could not
/// be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiFailure {
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        body: Option<String>,
        message: String,
    },

    #[error("{code}: {message}")]
    Transport { code: TransportCode, message: String },

    #[error("Invalid response body: {message}")]
    Decode { message: String },
}

impl ApiFailure {
    /// HTTP status code, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transport failure code, when no response was received.
    pub fn transport_code(&self) -> Option<&TransportCode> {
        match self {
            ApiFailure::Transport { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Core error type for all pvegate operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("API failure: {0}")]
    Api(#[from] ApiFailure),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    pub fn invalid(tool: &str, message: impl Into<String>) -> Self {
        GatewayError::InvalidArguments {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
