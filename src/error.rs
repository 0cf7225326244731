//! Client error taxonomy
//!
//! A single closed set of tagged variants so every call site can match
//! exhaustively. Validation failures, transport failures and server-side
//! protocol exceptions are distinct kinds; none of them are retried and none
//! are logged here — the caller decides how to surface them.

use thiserror::Error;

use crate::frame::ExceptionCode;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Local request validation failures, detected before any network activity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Address does not fit the 2-byte wire field
    #[error("address {0} out of range (0-65535)")]
    AddressOutOfRange(u64),

    /// Count outside the limit for the requested register kind
    #[error("count {count} out of range (1-{max})")]
    CountOutOfRange { count: u32, max: u16 },

    /// Register kind token is not one of holding/input/coil/discrete
    #[error("unknown register kind '{0}'")]
    UnknownRegisterKind(String),

    /// Write value outside the target kind's value domain
    #[error("value {value} out of range: {reason}")]
    ValueOutOfRange { value: u64, reason: &'static str },
}

/// Everything a single request/response exchange can fail with.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Request rejected locally; no bytes were sent
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// TCP connect or socket I/O failure, including a connect attempt that
    /// exhausted its deadline
    #[error("connect to {endpoint} failed: {detail}")]
    Connect { endpoint: String, detail: String },

    /// No correlated response within the configured deadline
    #[error("no response within {0} ms")]
    Timeout(u64),

    /// Peer closed the connection mid-exchange
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Received bytes do not parse as a legal Modbus frame
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Server answered with a protocol exception. The exchange itself
    /// succeeded; the request was refused at the application level.
    #[error("server rejected function {function:#04x}: {exception}")]
    ServerRejected { function: u8, exception: ExceptionCode },
}

impl ClientError {
    pub fn connect(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        ClientError::Connect {
            endpoint: endpoint.into(),
            detail: detail.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        ClientError::MalformedFrame(reason.into())
    }
}
