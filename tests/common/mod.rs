//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use standby_pair::config::HeartbeatConfig;
use standby_pair::election::{ElectionController, Role};
use standby_pair::kube::{KubeError, KubeResult, PodInventory, PodRecord, RoleAnnouncer};
use standby_pair::registry::MemoryRegistry;
use standby_pair::resilience::RetryPolicy;

/// Heartbeat timings shortened for socket tests.
pub fn fast_heartbeat() -> HeartbeatConfig {
    HeartbeatConfig {
        broadcast_interval_ms: 50,
        connect_timeout_ms: 500,
        retry_timeout_ms: 300,
        read_timeout_ms: 400,
        write_timeout_ms: 100,
        reassign_delay_ms: 100,
        registry_refresh_ms: 200,
        jitter_min_ms: 50,
        jitter_max_ms: 100,
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 5,
        max_delay_ms: 20,
    }
}

/// Controller on loopback sharing `registry`.
pub fn instance(
    registry: Arc<MemoryRegistry>,
    announcer: Arc<RecordingAnnouncer>,
) -> ElectionController {
    ElectionController::new("127.0.0.1", fast_heartbeat(), fast_retry(), registry, announcer)
}

/// Poll `condition` every 10 ms until it holds or `limit` passes.
pub async fn eventually<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(limit, poll).await.is_ok()
}

/// Await `future` or fail the test after `limit`.
pub async fn within<T>(limit: Duration, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(limit, future)
        .await
        .expect("timed out")
}

/// Announcer that remembers every role in order.
#[derive(Default)]
pub struct RecordingAnnouncer {
    roles: Mutex<Vec<Role>>,
}

impl RecordingAnnouncer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn roles(&self) -> Vec<Role> {
        self.roles.lock().unwrap().clone()
    }
}

#[async_trait]
impl RoleAnnouncer for RecordingAnnouncer {
    async fn announce(&self, role: Role) -> KubeResult<()> {
        self.roles.lock().unwrap().push(role);
        Ok(())
    }
}

/// Inventory replaying a script of fleet snapshots.
///
/// Each `list` consumes the next snapshot; the last one repeats forever.
/// `None` in the script is a failed listing.
#[derive(Default)]
pub struct ScriptedInventory {
    script: Mutex<VecDeque<Option<Vec<PodRecord>>>>,
    last: Mutex<Option<Vec<PodRecord>>>,
    failing_deletes: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
    lists: AtomicUsize,
}

impl ScriptedInventory {
    pub fn new(script: Vec<Option<Vec<PodRecord>>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    /// A fleet that never changes.
    pub fn fixed(pods: Vec<PodRecord>) -> Arc<Self> {
        Self::new(vec![Some(pods)])
    }

    pub fn fail_delete(&self, name: &str) {
        self.failing_deletes.lock().unwrap().insert(name.to_string());
    }

    pub fn deleted(&self) -> Vec<String> {
        let mut names = self.deleted.lock().unwrap().clone();
        names.sort();
        names
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PodInventory for ScriptedInventory {
    async fn list(&self, _role: Option<Role>) -> KubeResult<Vec<PodRecord>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let snapshot = match next {
            Some(snapshot) => {
                *self.last.lock().unwrap() = snapshot.clone();
                snapshot
            }
            None => self.last.lock().unwrap().clone(),
        };
        snapshot.ok_or(KubeError::Status {
            status: 503,
            body: "scripted failure".into(),
        })
    }

    async fn delete(&self, name: &str) -> KubeResult<()> {
        if self.failing_deletes.lock().unwrap().contains(name) {
            return Err(KubeError::Status {
                status: 500,
                body: "scripted delete failure".into(),
            });
        }
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

pub fn active(name: &str) -> PodRecord {
    PodRecord::new(name, Some(Role::Active), true)
}

pub fn stand_by(name: &str) -> PodRecord {
    PodRecord::new(name, Some(Role::StandBy), true)
}
