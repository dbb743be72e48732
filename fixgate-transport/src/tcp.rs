/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! TCP helpers for initiators and acceptors.
//!
//! Reconnection scheduling belongs to the caller; these functions establish
//! one connection each.

use fixgate_core::error::TransportError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info};

/// Connects to `addr`, giving up after `timeout`.
///
/// # Errors
/// `TransportError::ConnectTimeout` or the underlying I/O error.
pub async fn connect(addr: &str, timeout: Duration) -> Result<TcpStream, TransportError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| TransportError::ConnectTimeout {
            addr: addr.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })??;
    stream.set_nodelay(true)?;
    info!(addr, "connected");
    Ok(stream)
}

/// Listening socket for acceptor sessions.
#[derive(Debug)]
pub struct Acceptor {
    listener: TcpListener,
}

impl Acceptor {
    /// Binds to `addr`.
    ///
    /// # Errors
    /// Returns the bind error.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "listening");
        Ok(Self { listener })
    }

    /// Address actually bound, useful after binding port 0.
    ///
    /// # Errors
    /// Returns the socket error.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Waits for the next inbound connection.
    ///
    /// # Errors
    /// Returns the accept error.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), TransportError> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted connection");
        Ok((stream, peer))
    }
}
