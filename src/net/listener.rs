//! TCP listener for the liveness link.
//!
//! # Responsibilities
//! - Bind to the instance's advertised host and liveness port
//! - Accept incoming stand-by connections
//! - Report the port actually bound (port 0 is allowed for tests)

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address. Fatal at startup.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// The liveness listener.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to `host:port`.
    pub async fn bind(host: &str, port: u16) -> Result<Self, ListenerError> {
        let address = format!("{}:{}", host, port);
        let bind_err = |source| ListenerError::Bind {
            address: address.clone(),
            source,
        };

        let inner = TcpListener::bind(&address).await.map_err(bind_err)?;
        let local_addr = inner.local_addr().map_err(bind_err)?;

        tracing::info!(address = %local_addr, "Liveness listener bound");

        Ok(Self { inner, local_addr })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(peer_addr = %addr, "Liveness connection accepted");
        Ok((stream, addr))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
