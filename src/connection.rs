//! Per-client connection state and I/O loop
//!
//! One connection owns one socket, one receive buffer, and one protocol
//! engine; a single task drives all three. Nothing here is shared, so
//! nothing here is locked.

use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::buffer::RecvBuffer;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::Config;

/// Lifecycle of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// TCP accepted, nothing read yet
    TcpConnected,
    /// Reading and validating the HTTP upgrade request
    HttpUpgrade,
    /// Upgrade complete, exchanging frames
    WebSocket,
    /// Close frame sent or received, draining and shutting down
    WebSocketClosing,
}

/// A single client connection
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buf: RecvBuffer,
    engine: Engine,
    out: BytesMut,
}

impl Connection {
    /// Wrap an accepted socket
    pub fn new(stream: TcpStream, peer: SocketAddr, config: &Config) -> Self {
        Self {
            stream,
            peer,
            buf: RecvBuffer::new(config.recv_buffer_size),
            engine: Engine::new(config),
            out: BytesMut::new(),
        }
    }

    /// Read, process, and write until the connection ends.
    ///
    /// Returns `Ok(())` on a clean teardown (peer closed, or the close
    /// handshake completed); any error means the socket was torn down
    /// mid-protocol.
    pub async fn run(mut self) -> Result<()> {
        loop {
            // compact before the free tail gets tight
            if self.buf.free_tail() < self.buf.capacity() / 4 {
                self.buf.shift();
            }
            if self.buf.free_tail() == 0 {
                // a frame this large can never complete
                return Err(Error::FrameTooLarge);
            }

            let n = self.stream.read(self.buf.write_region()).await?;
            if n == 0 {
                tracing::info!(peer = %self.peer, "peer closed the connection");
                return Ok(());
            }
            self.buf.commit(n);

            let consumed = self.engine.advance(self.buf.read_region(), &mut self.out)?;
            self.buf.consume(consumed);

            if !self.out.is_empty() {
                self.stream.write_all(&self.out).await?;
                self.out.clear();
            }

            if self.engine.is_closing() {
                tracing::debug!(peer = %self.peer, "close handshake complete");
                return Ok(());
            }
        }
    }

    /// Peer address, for logging
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}
