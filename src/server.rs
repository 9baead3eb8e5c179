//! Accept loop
//!
//! Binds the listening socket and spawns one task per accepted
//! connection. Errors on a connection never affect its siblings; the
//! loop itself only stops if the listener fails.

use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, ToSocketAddrs};

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::Config;

/// WebSocket echo server
pub struct EchoServer {
    listener: TcpListener,
    config: Config,
}

impl EchoServer {
    /// Bind the listening socket.
    ///
    /// The socket is non-blocking under the tokio reactor; accepted
    /// sockets inherit that.
    pub async fn bind(addr: impl ToSocketAddrs, config: Config) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, config })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Error::Io)
    }

    /// Accept connections forever.
    ///
    /// Returns only when the listener itself fails with a
    /// non-retryable error.
    pub async fn run(self) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "listening");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) if is_transient_accept_error(&e) => {
                    tracing::warn!(error = %e, "transient accept error");
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, "listener failed");
                    return Err(e.into());
                }
            };

            stream.set_nodelay(true).ok();
            tracing::info!(%peer, "client connected");

            let connection = Connection::new(stream, peer, &self.config);
            tokio::spawn(async move {
                match connection.run().await {
                    Ok(()) => tracing::info!(%peer, "client disconnected"),
                    Err(e) => tracing::warn!(%peer, error = %e, "connection terminated"),
                }
            });
        }
    }
}

/// Accept failures caused by the remote end racing us (aborted before
/// accept, reset during accept) are not listener failures.
fn is_transient_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    )
}
