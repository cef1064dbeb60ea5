//! GTP Error types

use std::net::SocketAddr;

use thiserror::Error;

/// GTP Error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GtpError {
    /// Buffer too short for operation
    #[error("Buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort { needed: usize, available: usize },

    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    /// Typed accessor used on an IE of another type
    #[error("Wrong IE type: expected {expected}, got {actual}")]
    WrongType { expected: u8, actual: u8 },

    /// Mandatory IE absent from a message
    #[error("Required IE missing: type {ie_type}")]
    RequiredFieldMissing { ie_type: u8 },

    /// Peer answered with a non-success cause
    #[error("Cause not accepted: {cause}")]
    CauseNotAccepted { cause: u8 },

    /// No session indexed under this IMSI
    #[error("Unknown IMSI: {0}")]
    UnknownImsi(String),

    /// TEID does not resolve to a session owned by the sender
    #[error("Invalid TEID: {0:#010x}")]
    InvalidTeid(u32),

    /// Lookup inside a session failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Session activation without subscriber identity
    #[error("Session has no IMSI")]
    MissingIdentity,

    /// No handler registered for an inbound message type
    #[error("No handler for message type {0}")]
    HandlerNotFound(u8),

    /// Correlated message did not arrive in time
    #[error("Timed out")]
    Timeout,

    /// Delivered message does not carry the awaited sequence number
    #[error("Sequence mismatch: expected {expected:#08x}, got {actual:#08x}")]
    SequenceMismatch { expected: u32, actual: u32 },

    /// Invalid version
    #[error("Invalid GTP version: {0}")]
    InvalidVersion(u8),

    /// Invalid message type
    #[error("Invalid message type: {0}")]
    InvalidMessageType(u8),

    /// Message body is not of the requested type
    #[error("Unexpected message: expected type {expected}, got {actual}")]
    UnexpectedMessage { expected: u8, actual: u8 },

    /// Invalid PDN type
    #[error("Invalid PDN type: {0}")]
    InvalidPdnType(u8),

    /// Encoding error
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Every session keeps its default bearer
    #[error("The default bearer cannot be removed")]
    DefaultBearerRemoval,

    /// Session was removed from its Conn and cannot be indexed again
    #[error("Session already removed")]
    SessionRemoved,

    /// Endpoint configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Conn socket is not bound yet
    #[error("Conn is not bound")]
    NotBound,

    /// Socket error
    #[error("I/O error: {0}")]
    Io(String),

    /// Handler failure with dispatch context
    #[error("Handler for message type {message_type} from {peer} failed: {source}")]
    Handler {
        message_type: u8,
        peer: SocketAddr,
        source: Box<GtpError>,
    },
}

impl From<std::io::Error> for GtpError {
    fn from(e: std::io::Error) -> Self {
        GtpError::Io(e.to_string())
    }
}

impl GtpError {
    /// Wrap a handler error with the message type and sender.
    pub fn in_handler(self, message_type: u8, peer: SocketAddr) -> Self {
        GtpError::Handler {
            message_type,
            peer,
            source: Box::new(self),
        }
    }

    /// Error carried by a handler wrapper, or the error itself.
    pub fn root(&self) -> &GtpError {
        match self {
            GtpError::Handler { source, .. } => source.root(),
            other => other,
        }
    }
}

/// GTP Result type
pub type GtpResult<T> = Result<T, GtpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_wrap_keeps_root() {
        let peer: SocketAddr = "127.0.0.1:2123".parse().unwrap();
        let err = GtpError::RequiredFieldMissing { ie_type: 1 }.in_handler(32, peer);

        assert_eq!(err.root(), &GtpError::RequiredFieldMissing { ie_type: 1 });
        let text = err.to_string();
        assert!(text.contains("message type 32"));
        assert!(text.contains("127.0.0.1:2123"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "busy");
        let err: GtpError = io.into();
        assert!(matches!(err, GtpError::Io(ref s) if s.contains("busy")));
    }
}
