//! Stand-by side of the liveness link.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// The dial never produced a connection.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("timed out connecting after {0:?}")]
    Timeout(Duration),
    #[error("connect failed: {0}")]
    Io(#[from] io::Error),
}

/// Why an established link ended.
#[derive(Debug)]
pub enum LinkLoss {
    /// No marker within the read timeout.
    TimedOut,
    /// The active closed the socket.
    Closed,
    /// The socket failed.
    Error(io::Error),
}

impl LinkLoss {
    /// Metric label for this loss.
    pub fn kind(&self) -> &'static str {
        match self {
            LinkLoss::TimedOut => "timed_out",
            LinkLoss::Closed => "closed",
            LinkLoss::Error(_) => "error",
        }
    }
}

impl std::fmt::Display for LinkLoss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkLoss::TimedOut => write!(f, "timed out waiting for liveness marker"),
            LinkLoss::Closed => write!(f, "socket closed by peer"),
            LinkLoss::Error(e) => write!(f, "socket error: {}", e),
        }
    }
}

/// How an established link ended.
#[derive(Debug)]
pub struct LinkEnd {
    pub loss: LinkLoss,
    /// At least one marker arrived before the loss.
    pub heard: bool,
}

/// Open the link to `address` within `connect_timeout`.
pub async fn dial(address: &str, connect_timeout: Duration) -> Result<TcpStream, DialError> {
    match timeout(connect_timeout, TcpStream::connect(address)).await {
        Ok(Ok(stream)) => {
            stream.set_nodelay(true)?;
            Ok(stream)
        }
        Ok(Err(e)) => Err(DialError::Io(e)),
        Err(_) => Err(DialError::Timeout(connect_timeout)),
    }
}

/// Consume markers until the link goes quiet for `read_timeout` or ends.
pub async fn watch_markers(mut stream: TcpStream, read_timeout: Duration) -> LinkEnd {
    let mut buf = [0u8; 64];
    let mut heard = false;
    let loss = loop {
        match timeout(read_timeout, stream.read(&mut buf)).await {
            Ok(Ok(0)) => break LinkLoss::Closed,
            Ok(Ok(_)) => heard = true,
            Ok(Err(e)) => break LinkLoss::Error(e),
            Err(_) => break LinkLoss::TimedOut,
        }
    };
    LinkEnd { loss, heard }
}
