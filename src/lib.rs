//! # Echoplex: RFC 6455 WebSocket echo server
//!
//! A single-host WebSocket server that accepts TCP connections, performs
//! the HTTP/1.1 upgrade handshake, and echoes text and binary messages
//! back to their sender. Ping/pong/close control frames follow the
//! protocol.
//!
//! The protocol core is sans-I/O:
//!
//! - **Receive buffer**: fixed-capacity buffer with read/write cursors
//!   and a compacting shift ([`buffer::RecvBuffer`])
//! - **Frame codec**: pure parser ([`frame::parse`]) and serializer
//!   ([`generator`])
//! - **Handshake**: upgrade-request validation and accept-key
//!   computation ([`handshake`])
//! - **Protocol engine**: per-connection state machine driving
//!   handshake, reassembly, control frames, and echo ([`engine::Engine`])
//!
//! I/O lives at the edges: [`server::EchoServer`] accepts connections
//! and [`connection::Connection`] runs the read/process/write loop, one
//! tokio task per client.
//!
//! ## Example
//!
//! ```ignore
//! use echoplex::{Config, EchoServer};
//!
//! let server = EchoServer::bind("127.0.0.1:8000", Config::default()).await?;
//! server.run().await?;
//! ```

pub mod buffer;
pub mod connection;
pub mod engine;
pub mod error;
pub mod frame;
pub mod generator;
pub mod handshake;
pub mod mask;
pub mod server;
pub mod strutil;

pub use error::{Error, Result};
pub use frame::{Frame, OpCode};
pub use server::EchoServer;

/// WebSocket GUID appended to the client key when computing the accept key
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Minimum frame header size (2 base bytes)
pub const MIN_FRAME_HEADER_SIZE: usize = 2;

/// Maximum frame header size (2 base + 8 extended length + 4 mask)
pub const MAX_FRAME_HEADER_SIZE: usize = 14;

/// Largest payload encodable with the 7-bit length field
pub const SMALL_PAYLOAD_MAX: usize = 125;

/// Largest payload encodable with the 16-bit extended length field
pub const MEDIUM_PAYLOAD_MAX: usize = 65535;

/// Default receive buffer capacity (1 MiB)
pub const RECV_BUFFER_SIZE: usize = 1024 * 1024;

/// Minimum receive buffer capacity (64 KiB)
pub const MIN_RECV_BUFFER_SIZE: usize = 64 * 1024;

/// Default close code (normal closure)
pub const CLOSE_NORMAL: u16 = 1000;

/// Configuration for the echo server and its connections
///
/// # Example
///
/// ```
/// use echoplex::Config;
///
/// let config = Config::builder()
///     .recv_buffer_size(256 * 1024)
///     .max_message_size(4 * 1024 * 1024)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Receive buffer capacity per connection (default: 1 MiB, min 64 KiB).
    /// Caps the largest single frame that can ever complete.
    pub recv_buffer_size: usize,
    /// Maximum frame payload size (default: buffer capacity minus the
    /// largest header)
    pub max_frame_size: usize,
    /// Maximum reassembled message size (default: 16 MiB). Bounds the
    /// fragmentation accumulator.
    pub max_message_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recv_buffer_size: RECV_BUFFER_SIZE,
            max_frame_size: RECV_BUFFER_SIZE - MAX_FRAME_HEADER_SIZE,
            max_message_size: 16 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Frame size limit actually enforced for the configured buffer.
    ///
    /// A frame larger than `capacity - MAX_FRAME_HEADER_SIZE` could
    /// never be fully buffered, so the parser would report
    /// need-more-data forever.
    pub fn effective_max_frame_size(&self) -> usize {
        self.max_frame_size
            .min(self.recv_buffer_size - MAX_FRAME_HEADER_SIZE)
    }
}

/// Builder for [`Config`]
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the per-connection receive buffer capacity.
    ///
    /// Values below 64 KiB are raised to 64 KiB.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size.max(MIN_RECV_BUFFER_SIZE);
        self
    }

    /// Set the maximum frame payload size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set the maximum reassembled message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
