//! Connection ids and the live-connection registry.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing and close events
//! - Hold the write half of every connected stand-by
//! - Broadcast the liveness marker over a snapshot of the entries
//!
//! The registry is owned by the liveness server task. A failed write marks
//! the entry dead; only the close event removes it.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Liveness of one registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Markers are being written.
    Live,
    /// A write failed; waiting for the close event.
    Dead,
}

struct Entry<W> {
    peer: SocketAddr,
    writer: W,
    state: ConnectionState,
}

/// Outcome of one broadcast round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Indexed set of connected stand-bys.
pub struct ConnectionRegistry<W> {
    entries: BTreeMap<ConnectionId, Entry<W>>,
}

impl<W> ConnectionRegistry<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register a newly accepted connection.
    pub fn insert(&mut self, id: ConnectionId, peer: SocketAddr, writer: W) {
        self.entries.insert(
            id,
            Entry {
                peer,
                writer,
                state: ConnectionState::Live,
            },
        );
    }

    /// Drop a connection once its close has been observed.
    pub fn remove(&mut self, id: ConnectionId) -> Option<SocketAddr> {
        self.entries.remove(&id).map(|entry| entry.peer)
    }

    /// Number of registered connections, dead ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.entries.get(&id).map(|entry| entry.state)
    }

    /// Write `marker` to every live connection.
    ///
    /// Each write is bounded by `write_timeout`; a failure marks that entry
    /// dead and never affects the others.
    pub async fn broadcast(&mut self, marker: &[u8], write_timeout: Duration) -> BroadcastReport {
        let snapshot: Vec<ConnectionId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.state == ConnectionState::Live)
            .map(|(id, _)| *id)
            .collect();

        let mut report = BroadcastReport::default();
        for id in snapshot {
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            match timeout(write_timeout, entry.writer.write_all(marker)).await {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    tracing::debug!(connection_id = %id, peer = %entry.peer, error = %e, "Marker write failed");
                    entry.state = ConnectionState::Dead;
                    report.failed += 1;
                }
                Err(_) => {
                    tracing::debug!(connection_id = %id, peer = %entry.peer, "Marker write timed out");
                    entry.state = ConnectionState::Dead;
                    report.failed += 1;
                }
            }
        }
        report
    }
}

impl<W> Default for ConnectionRegistry<W>
where
    W: AsyncWrite + Unpin,
{
    fn default() -> Self {
        Self::new()
    }
}
