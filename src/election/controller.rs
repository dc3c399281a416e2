//! Election controller.
//!
//! # Responsibilities
//! - Bind the liveness listener and start its server
//! - Drive the connect / check / claim cycle until this instance is active
//! - Keep the registry pointing at this instance once active
//!
//! # Steps
//! ```text
//! Resolve   read registry: empty → Claim, self → Active, other → Dial
//! Dial      connect; never connected or no marker heard → CheckForNewActive,
//!           markers heard then lost → Dial (same address, retry timeout)
//! Check     wait jitter, re-read: unchanged → Claim, changed → wait → Resolve
//! Claim     write self, wait jitter, re-read: self → Active, other → wait → Resolve
//! ```
//!
//! Everything runs on one task, so a new dial never starts while another
//! is pending.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{HeartbeatConfig, PairConfig};
use crate::election::activation::{activation_signal, ActivationListener, ActivationTrigger};
use crate::election::state::{ElectionState, InstanceAddress, Role};
use crate::kube::RoleAnnouncer;
use crate::lifecycle::Shutdown;
use crate::liveness::{self, LivenessServer};
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::registry::{ActiveRegistry, RegistryError};
use crate::resilience::{claim_jitter, retry_with_backoff, RetryPolicy};

/// Failures that end the election task.
#[derive(Debug, Error)]
pub enum ElectionError {
    /// The liveness listener could not be bound.
    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// The registry stayed unreachable through every retry.
    #[error("registry {operation} failed after {attempts} attempts: {source}")]
    RegistryUnavailable {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: RegistryError,
    },

    /// The election task panicked or was cancelled.
    #[error("election task aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

/// Everything needed to run one instance's election.
///
/// `initialize` consumes the controller, so an instance is initialised once.
pub struct ElectionController {
    host: String,
    heartbeat: HeartbeatConfig,
    retry: RetryPolicy,
    registry: Arc<dyn ActiveRegistry>,
    announcer: Arc<dyn RoleAnnouncer>,
}

impl ElectionController {
    pub fn new(
        host: impl Into<String>,
        heartbeat: HeartbeatConfig,
        retry: RetryPolicy,
        registry: Arc<dyn ActiveRegistry>,
        announcer: Arc<dyn RoleAnnouncer>,
    ) -> Self {
        Self {
            host: host.into(),
            heartbeat,
            retry,
            registry,
            announcer,
        }
    }

    pub fn from_config(
        config: &PairConfig,
        registry: Arc<dyn ActiveRegistry>,
        announcer: Arc<dyn RoleAnnouncer>,
    ) -> Self {
        let host = config
            .node
            .host
            .clone()
            .unwrap_or_else(|| "127.0.0.1".to_string());
        Self::new(
            host,
            config.heartbeat.clone(),
            RetryPolicy::from(&config.registry),
            registry,
            announcer,
        )
    }

    /// Start the instance.
    ///
    /// Without a port the instance is active at once and never touches the
    /// registry. With a port it binds the liveness listener (a bind failure is
    /// the only error returned here), announces stand-by and starts looking
    /// for the active instance in the background.
    pub async fn initialize(
        self,
        port: Option<u16>,
        shutdown: &Shutdown,
    ) -> Result<InstanceHandle, ElectionError> {
        let (trigger, listener) = activation_signal();
        let (state_tx, state_rx) = watch::channel(ElectionState::Initializing);
        let (announce_tx, announce_rx) = mpsc::unbounded_channel();
        tokio::spawn(announce_roles(self.announcer.clone(), announce_rx));

        let Some(port) = port else {
            tracing::info!("No liveness port configured, running standalone");
            let mut machine = Machine {
                address: None,
                heartbeat: self.heartbeat,
                retry: self.retry,
                jitter: Duration::ZERO,
                registry: self.registry,
                state: state_tx,
                activation: trigger,
                announce: announce_tx,
            };
            machine.become_active();
            let mut stop = shutdown.subscribe();
            let task = tokio::spawn(async move {
                let _ = stop.recv().await;
                Ok(())
            });
            return Ok(InstanceHandle {
                address: None,
                state: state_rx,
                activation: listener,
                task,
            });
        };

        let bound = Listener::bind(&self.host, port).await?;
        let address = InstanceAddress::new(self.host.clone(), bound.local_addr().port());
        tracing::info!(address = %address, "Starting liveness server");

        let server = LivenessServer::new(bound, self.heartbeat.clone());
        tokio::spawn(server.run(trigger.flag(), shutdown.subscribe()));

        let _ = announce_tx.send(Role::StandBy);
        metrics::record_role(Role::StandBy);

        let jitter = claim_jitter(self.heartbeat.jitter_min_ms, self.heartbeat.jitter_max_ms);
        tracing::debug!(jitter = ?jitter, "Claim jitter chosen");

        let machine = Machine {
            address: Some(address.clone()),
            heartbeat: self.heartbeat,
            retry: self.retry,
            jitter,
            registry: self.registry,
            state: state_tx,
            activation: trigger,
            announce: announce_tx,
        };
        let task = tokio::spawn(machine.run(shutdown.subscribe()));

        Ok(InstanceHandle {
            address: Some(address),
            state: state_rx,
            activation: listener,
            task,
        })
    }
}

/// Observer for a running instance.
pub struct InstanceHandle {
    address: Option<InstanceAddress>,
    state: watch::Receiver<ElectionState>,
    activation: ActivationListener,
    task: JoinHandle<Result<(), ElectionError>>,
}

impl InstanceHandle {
    /// Liveness address; `None` in standalone mode.
    pub fn address(&self) -> Option<&InstanceAddress> {
        self.address.as_ref()
    }

    pub fn state(&self) -> ElectionState {
        *self.state.borrow()
    }

    pub fn role(&self) -> Role {
        self.state().role()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ElectionState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`, returning that state.
    /// `None` once the election task has ended without reaching it.
    pub async fn wait_for_state<F>(&self, predicate: F) -> Option<ElectionState>
    where
        F: FnMut(&ElectionState) -> bool,
    {
        let mut rx = self.state.clone();
        let reached = rx.wait_for(predicate).await.ok().map(|state| *state);
        reached
    }

    pub fn activation(&self) -> ActivationListener {
        self.activation.clone()
    }

    /// Run `callback` once this instance becomes active.
    pub fn on_active<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.activation.on_active(callback);
    }

    /// Wait for the election task to end (shutdown or fatal error).
    ///
    /// A standalone instance's task ends on shutdown only.
    pub async fn join(self) -> Result<(), ElectionError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Election task aborted");
                Err(ElectionError::Aborted(e))
            }
        }
    }
}

enum Step {
    Resolve { retry: bool },
    Dial { address: String, retry: bool },
    CheckForNewActive { previous: String },
    Claim,
}

enum Outcome {
    Next(Step),
    Active,
}

struct Machine {
    address: Option<InstanceAddress>,
    heartbeat: HeartbeatConfig,
    retry: RetryPolicy,
    jitter: Duration,
    registry: Arc<dyn ActiveRegistry>,
    state: watch::Sender<ElectionState>,
    activation: ActivationTrigger,
    announce: mpsc::UnboundedSender<Role>,
}

impl Machine {
    async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ElectionError> {
        let mut step = Step::Resolve { retry: false };
        loop {
            let outcome = tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(state = %self.current(), "Election stopping");
                    return Ok(());
                }
                outcome = self.advance(step) => outcome?,
            };
            match outcome {
                Outcome::Next(next) => step = next,
                Outcome::Active => break,
            }
        }

        self.become_active();
        self.hold_active(shutdown).await;
        Ok(())
    }

    async fn advance(&mut self, step: Step) -> Result<Outcome, ElectionError> {
        match step {
            Step::Resolve { retry } => self.resolve(retry).await,
            Step::Dial { address, retry } => Ok(self.dial(address, retry).await),
            Step::CheckForNewActive { previous } => self.check_for_new_active(previous).await,
            Step::Claim => self.claim().await,
        }
    }

    async fn resolve(&mut self, retry: bool) -> Result<Outcome, ElectionError> {
        self.set_state(ElectionState::AwaitingConnection);
        match self.read_active().await? {
            None => {
                tracing::info!("Active process is not set");
                Ok(Outcome::Next(Step::Claim))
            }
            Some(recorded) if self.is_self(&recorded) => Ok(Outcome::Active),
            Some(recorded) => Ok(Outcome::Next(Step::Dial {
                address: recorded,
                retry,
            })),
        }
    }

    async fn dial(&mut self, address: String, retry: bool) -> Outcome {
        self.set_state(ElectionState::Connecting);
        if retry {
            tracing::info!(active = %address, "Retry connecting to active process");
        } else {
            tracing::info!(active = %address, "Connect to active process");
        }

        let stream = match liveness::dial(&address, self.heartbeat.connect_timeout(retry)).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(active = %address, error = %e, "Failed connecting to active process");
                metrics::record_liveness_loss("never_connected");
                return Outcome::Next(Step::CheckForNewActive { previous: address });
            }
        };

        self.set_state(ElectionState::Connected);
        tracing::info!(active = %address, "Connected to active process");

        let end = liveness::watch_markers(stream, self.heartbeat.read_timeout()).await;
        metrics::record_liveness_loss(end.loss.kind());
        if !end.heard {
            tracing::warn!(active = %address, reason = %end.loss, "Recorded process sent no liveness marker");
            return Outcome::Next(Step::CheckForNewActive { previous: address });
        }

        tracing::warn!(active = %address, reason = %end.loss, "Lost liveness link. Retry connection.");
        Outcome::Next(Step::Dial {
            address,
            retry: true,
        })
    }

    async fn check_for_new_active(&mut self, previous: String) -> Result<Outcome, ElectionError> {
        tokio::time::sleep(self.jitter).await;
        let current = self.read_active().await?;
        if current.as_deref() == Some(previous.as_str()) {
            return Ok(Outcome::Next(Step::Claim));
        }

        tracing::warn!(active = ?current, "There is a new active process");
        tokio::time::sleep(self.heartbeat.reassign_delay()).await;
        Ok(Outcome::Next(Step::Resolve { retry: false }))
    }

    async fn claim(&mut self) -> Result<Outcome, ElectionError> {
        self.set_state(ElectionState::ClaimingActive);
        tracing::info!("Take over as active process");

        self.write_self().await?;
        tokio::time::sleep(self.jitter).await;

        let recorded = self.read_active().await?;
        if recorded.as_deref().is_some_and(|r| self.is_self(r)) {
            metrics::record_claim(true);
            return Ok(Outcome::Active);
        }

        metrics::record_claim(false);
        tracing::warn!(active = ?recorded, "Possible race condition. Active process has been reassigned");
        tokio::time::sleep(self.heartbeat.reassign_delay()).await;
        Ok(Outcome::Next(Step::Resolve { retry: false }))
    }

    /// Enter the terminal state. Only the first call has any effect.
    fn become_active(&mut self) {
        if !self.activation.fire() {
            return;
        }
        self.set_state(ElectionState::Active);
        let _ = self.announce.send(Role::Active);
        metrics::record_role(Role::Active);
        match &self.address {
            Some(address) => tracing::info!(address = %address, "This is the new active process"),
            None => tracing::info!("Standalone process is active"),
        }
    }

    /// Re-assert this instance in the registry until shutdown.
    async fn hold_active(&self, mut shutdown: broadcast::Receiver<()>) {
        let Some(address) = self.address.as_ref().map(ToString::to_string) else {
            return;
        };
        let mut refresh = tokio::time::interval(self.heartbeat.registry_refresh());
        loop {
            tokio::select! {
                _ = refresh.tick() => {
                    if let Err(e) = self.registry.set_active(&address).await {
                        metrics::record_registry_error("set");
                        tracing::warn!(error = %e, "Failed to refresh active record");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Active process stopping");
                    return;
                }
            }
        }
    }

    async fn read_active(&self) -> Result<Option<String>, ElectionError> {
        let registry = &self.registry;
        retry_with_backoff(self.retry, "registry get", move || async move {
            let result = registry.get_active().await;
            if result.is_err() {
                metrics::record_registry_error("get");
            }
            result
        })
        .await
        .map_err(|e| ElectionError::RegistryUnavailable {
            operation: "get",
            attempts: e.attempts,
            source: e.last_error,
        })
    }

    async fn write_self(&self) -> Result<(), ElectionError> {
        let Some(address) = self.address.as_ref().map(ToString::to_string) else {
            return Ok(());
        };
        let registry = &self.registry;
        let address = address.as_str();
        retry_with_backoff(self.retry, "registry set", move || async move {
            let result = registry.set_active(address).await;
            if result.is_err() {
                metrics::record_registry_error("set");
            }
            result
        })
        .await
        .map_err(|e| ElectionError::RegistryUnavailable {
            operation: "set",
            attempts: e.attempts,
            source: e.last_error,
        })
    }

    fn is_self(&self, recorded: &str) -> bool {
        self.address
            .as_ref()
            .is_some_and(|address| address.matches(recorded))
    }

    fn current(&self) -> ElectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ElectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            metrics::record_transition(next);
            tracing::info!(from = %previous, to = %next, "Election state changed");
        }
    }
}

/// Apply role announcements in order, off the election task.
async fn announce_roles(announcer: Arc<dyn RoleAnnouncer>, mut roles: mpsc::UnboundedReceiver<Role>) {
    while let Some(role) = roles.recv().await {
        if let Err(e) = announcer.announce(role).await {
            tracing::warn!(role = %role, error = %e, "Failed to announce role");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::DetachedAnnouncer;
    use crate::registry::MemoryRegistry;

    fn fast_heartbeat() -> HeartbeatConfig {
        HeartbeatConfig {
            broadcast_interval_ms: 20,
            connect_timeout_ms: 200,
            retry_timeout_ms: 100,
            read_timeout_ms: 150,
            write_timeout_ms: 50,
            reassign_delay_ms: 50,
            registry_refresh_ms: 100,
            jitter_min_ms: 5,
            jitter_max_ms: 10,
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    fn controller(registry: Arc<MemoryRegistry>) -> ElectionController {
        ElectionController::new(
            "127.0.0.1",
            fast_heartbeat(),
            fast_retry(),
            registry,
            Arc::new(DetachedAnnouncer),
        )
    }

    #[tokio::test]
    async fn standalone_is_active_without_registry() {
        let registry = Arc::new(MemoryRegistry::new());
        registry.fail_next(u32::MAX);
        let shutdown = Shutdown::new();

        let handle = controller(registry.clone())
            .initialize(None, &shutdown)
            .await
            .unwrap();

        assert_eq!(handle.state(), ElectionState::Active);
        assert!(handle.activation().is_active());
        assert!(handle.address().is_none());
        assert_eq!(registry.peek(), None);
    }

    #[tokio::test]
    async fn recorded_self_becomes_active_without_claim() {
        let registry = Arc::new(MemoryRegistry::new());
        let shutdown = Shutdown::new();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        registry.force(Some(format!("127.0.0.1:{}", port)));

        let handle = controller(registry.clone())
            .initialize(Some(port), &shutdown)
            .await
            .unwrap();
        let reached = tokio::time::timeout(
            Duration::from_secs(2),
            handle.wait_for_state(|s| *s == ElectionState::Active),
        )
        .await
        .unwrap();
        assert_eq!(reached, Some(ElectionState::Active));
        shutdown.trigger();
    }

    #[tokio::test]
    async fn panicked_election_task_is_an_error() {
        let (_trigger, activation) = activation_signal();
        let (_state_tx, state) = watch::channel(ElectionState::Initializing);
        let handle = InstanceHandle {
            address: None,
            state,
            activation,
            task: tokio::spawn(async { panic!("election task failed") }),
        };

        let err = handle.join().await.unwrap_err();
        assert!(matches!(err, ElectionError::Aborted(_)));
    }

    #[tokio::test]
    async fn bind_conflict_is_fatal() {
        let registry = Arc::new(MemoryRegistry::new());
        let shutdown = Shutdown::new();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = controller(registry)
            .initialize(Some(port), &shutdown)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ElectionError::Listener(_)));
    }
}
