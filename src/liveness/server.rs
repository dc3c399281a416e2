//! Active side of the liveness link.
//!
//! # Responsibilities
//! - Accept stand-by connections on the liveness listener
//! - Broadcast the marker on every tick while this instance is active
//! - Drop connections once their close is observed
//!
//! The server task exclusively owns the connection registry. Close events
//! arrive as completed reader tasks, so removal never races a broadcast.

use tokio::io::AsyncReadExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HeartbeatConfig;
use crate::liveness::MARKER;
use crate::net::{ConnectionId, ConnectionRegistry, Listener};
use crate::observability::metrics;

/// Liveness listener plus marker broadcaster.
pub struct LivenessServer {
    listener: Listener,
    config: HeartbeatConfig,
}

impl LivenessServer {
    pub fn new(listener: Listener, config: HeartbeatConfig) -> Self {
        Self { listener, config }
    }

    /// Serve until shutdown. Markers flow only while `broadcasting` is true.
    pub async fn run(
        self,
        broadcasting: watch::Receiver<bool>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let local_addr = self.listener.local_addr();
        tracing::info!(address = %local_addr, "Liveness server starting");

        let mut connections: ConnectionRegistry<OwnedWriteHalf> = ConnectionRegistry::new();
        let mut readers: JoinSet<ConnectionId> = JoinSet::new();
        let mut ticker = time::interval(self.config.broadcast_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            if let Err(e) = stream.set_nodelay(true) {
                                tracing::debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
                            }
                            let id = ConnectionId::new();
                            let (read_half, write_half) = stream.into_split();
                            connections.insert(id, peer, write_half);
                            readers.spawn(wait_for_close(id, read_half));
                            metrics::record_liveness_connections(connections.len());
                            tracing::info!(connection_id = %id, peer = %peer, "New liveness connection");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Liveness accept failed");
                        }
                    }
                }
                Some(joined) = readers.join_next() => {
                    if let Ok(id) = joined {
                        if let Some(peer) = connections.remove(id) {
                            tracing::info!(connection_id = %id, peer = %peer, "Liveness connection closed");
                        }
                        metrics::record_liveness_connections(connections.len());
                    }
                }
                _ = ticker.tick() => {
                    if *broadcasting.borrow() && !connections.is_empty() {
                        let report = connections.broadcast(MARKER, self.config.write_timeout()).await;
                        if report.failed > 0 {
                            tracing::debug!(delivered = report.delivered, failed = report.failed, "Marker broadcast");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!(address = %local_addr, "Liveness server received shutdown signal, exiting loop");
                    break;
                }
            }
        }
        // Dropping the JoinSet aborts the readers; dropping the registry closes the sockets.
    }
}

/// Resolve with `id` once the peer closes or the socket fails.
async fn wait_for_close(id: ConnectionId, mut read_half: OwnedReadHalf) -> ConnectionId {
    let mut buf = [0u8; 64];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) | Err(_) => return id,
            Ok(_) => continue,
        }
    }
}
