//! Error types for the echo server

use std::fmt;
use std::io;

/// Result type alias for protocol and I/O operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the protocol core and the connection loop
#[derive(Debug)]
pub enum Error {
    /// I/O error from the underlying socket
    Io(io::Error),
    /// Protocol violation in a parsed frame or frame sequence
    Protocol(&'static str),
    /// Invalid or incomplete upgrade request
    Handshake(&'static str),
    /// Frame payload exceeds the configured frame limit
    FrameTooLarge,
    /// Reassembled message exceeds the configured message limit
    MessageTooLarge,
    /// Peer closed the connection
    ConnectionClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Error::Handshake(msg) => write!(f, "handshake failed: {}", msg),
            Error::FrameTooLarge => write!(f, "frame too large"),
            Error::MessageTooLarge => write!(f, "message too large"),
            Error::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            io::ErrorKind::BrokenPipe => Error::ConnectionClosed,
            io::ErrorKind::ConnectionReset => Error::ConnectionClosed,
            _ => Error::Io(e),
        }
    }
}
