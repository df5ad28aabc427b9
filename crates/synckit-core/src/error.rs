//! Error types for the sync framework
//!
//! Two families live here:
//!
//! - [`Error`]: failures raised to the caller (programmer misuse,
//!   misconfiguration, local I/O).
//! - [`ErrorPayload`]: the wire-shaped error a remote call resolves to. These
//!   are captured in the [`ErrorLedger`](crate::ledger::ErrorLedger) and never
//!   thrown from a selector.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the sync framework
#[derive(Error, Debug)]
pub enum Error {
    /// Caller misuse: missing required parameter, wrong shape
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Remote call resolved to an error payload
    #[error("Remote error: {0}")]
    Remote(ErrorPayload),

    /// Store misconfiguration (e.g. unknown comparison predicate)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport construction or setup errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// Snapshot provider errors
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Local I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a snapshot error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Whether this is caller misuse that must reach the caller unchanged
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<ErrorPayload> for Error {
    fn from(payload: ErrorPayload) -> Self {
        Self::Remote(payload)
    }
}

/// Error data attached to an [`ErrorPayload`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    /// HTTP status, when the failure came from a response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Any additional fields the server sent
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Wire-shaped remote error: `{ code, message, data: { status } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Status and extra data
    #[serde(default)]
    pub data: ErrorData,
}

impl ErrorPayload {
    /// Create a payload without a status
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: ErrorData::default(),
        }
    }

    /// Attach an HTTP status
    pub fn with_status(mut self, status: u16) -> Self {
        self.data.status = Some(status);
        self
    }

    /// Payload for a response that could not be decoded into the expected shape
    pub fn invalid_response(msg: impl fmt::Display) -> Self {
        Self::new("invalid_response", format!("Invalid response: {}", msg))
    }

    /// Payload for a request that never produced a response
    pub fn fetch_error(msg: impl fmt::Display) -> Self {
        Self::new("fetch_error", msg.to_string())
    }

    /// Try to read a payload from an arbitrary JSON body
    ///
    /// Returns `None` unless the body has string `code` and `message` fields.
    pub fn from_body(body: &Value) -> Option<Self> {
        let object = body.as_object()?;
        object.get("code")?.as_str()?;
        object.get("message")?.as_str()?;
        serde_json::from_value(body.clone()).ok()
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data.status {
            Some(status) => write!(f, "{} ({}): {}", self.code, status, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}
