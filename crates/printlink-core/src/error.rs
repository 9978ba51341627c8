//! Error handling for printlink
//!
//! Provides error types for the layers that can actually fail:
//! - Connection errors (device link, listener socket, WebSocket upgrade)
//! - Session errors (talking to a session that has already stopped)
//!
//! Expected protocol conditions (queue idle, no reply yet, backlog empty) are
//! ordinary state-machine outcomes and never show up here.
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents failures of the device link and of the client-facing network
/// side. None of these are retried by the core; they are logged and handed
/// to the caller.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Failed to open the device endpoint
    #[error("Failed to open device {path}: {reason}")]
    DeviceOpen {
        /// The device path that failed to open.
        path: String,
        /// The reason the device failed to open.
        reason: String,
    },

    /// The device stream reached end-of-file or was closed
    #[error("Device connection closed")]
    DeviceClosed,

    /// Failed to bind the client listener
    #[error("Failed to bind {address}: {reason}")]
    Bind {
        /// The address that could not be bound.
        address: String,
        /// The reason the bind failed.
        reason: String,
    },

    /// WebSocket handshake or framing error
    #[error("WebSocket error: {reason}")]
    WebSocket {
        /// The reason for the WebSocket error.
        reason: String,
    },

    /// I/O error on an established connection
    #[error("I/O error: {reason}")]
    Io {
        /// The reason for the I/O error.
        reason: String,
    },
}

/// Session error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session task has stopped and no longer accepts commands
    #[error("Session closed")]
    Closed,

    /// A command contained a line terminator and would split on the wire
    #[error("Invalid command {command:?}: commands must be a single line")]
    InvalidCommand {
        /// The rejected command text.
        command: String,
    },
}

/// Main error type for printlink
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Session error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Io(_))
    }

    /// Check if this is a session error
    pub fn is_session_error(&self) -> bool {
        matches!(self, Error::Session(_))
    }

    /// Check if the device side went away
    pub fn is_device_closed(&self) -> bool {
        matches!(self, Error::Connection(ConnectionError::DeviceClosed))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::DeviceOpen {
            path: "/tmp/printer".to_string(),
            reason: "No such file or directory".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to open device /tmp/printer: No such file or directory"
        );
    }

    #[test]
    fn test_error_classification() {
        let err: Error = ConnectionError::DeviceClosed.into();
        assert!(err.is_connection_error());
        assert!(err.is_device_closed());
        assert!(!err.is_session_error());

        let err: Error = SessionError::Closed.into();
        assert!(err.is_session_error());
        assert_eq!(err.to_string(), "Session closed");

        let err: Error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(err.is_connection_error());
        assert!(!err.is_device_closed());
    }
}
