use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use crate::protocol::frame::FrameError;

// Stable RPC error codes. These are wire ABI: new kinds get new codes.
/// Frame body was not valid JSON
pub const PARSE_ERROR: i32 = 1000;
/// Body parsed but the required shape was missing
pub const INVALID_REQUEST: i32 = 1001;
/// No handler registered for the requested method
pub const METHOD_NOT_FOUND: i32 = 1002;
/// The caller's local deadline elapsed before a response arrived
pub const TIMEOUT: i32 = 1003;
/// The connection failed or was closed with the call outstanding
pub const CONNECTION_LOST: i32 = 1004;
/// The handler failed in an unexpected way
pub const INTERNAL_ERROR: i32 = 1005;

/// RPC-level error surfaced to callers and carried in response bodies.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[error("rpc error {code}: {message}")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> RpcError {
        RpcError {
            code,
            message: message.into(),
        }
    }

    /// Parse error (1000)
    pub fn parse_error(message: impl Into<String>) -> RpcError {
        RpcError::new(PARSE_ERROR, message)
    }

    /// Invalid request (1001)
    pub fn invalid_request(message: impl Into<String>) -> RpcError {
        RpcError::new(INVALID_REQUEST, message)
    }

    /// Method not found (1002)
    pub fn method_not_found() -> RpcError {
        RpcError::new(METHOD_NOT_FOUND, "method_not_found")
    }

    /// Timeout (1003)
    pub fn timeout() -> RpcError {
        RpcError::new(TIMEOUT, "timeout")
    }

    /// Connection lost (1004)
    pub fn connection_lost(message: impl Into<String>) -> RpcError {
        RpcError::new(CONNECTION_LOST, message)
    }

    /// Internal error (1005)
    pub fn internal_error() -> RpcError {
        RpcError::new(INTERNAL_ERROR, "internal_error")
    }
}

/// Outcome of one RPC: the handler's data object, or an [`RpcError`].
pub type RpcOutcome = std::result::Result<Value, RpcError>;

/// Library-level failures from the transport and codec layers.
#[derive(Error, Debug)]
pub enum DipcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, DipcError>;
