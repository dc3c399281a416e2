//! Periodic fleet reconciliation.
//!
//! # Responsibilities
//! - Poll the inventory on a fixed period
//! - Confirm a violation on a short re-check before acting
//! - Delete every violating instance independently

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;

use crate::audit::classify::{classify, Verdict};
use crate::config::AuditConfig;
use crate::kube::PodInventory;
use crate::observability::metrics;

/// What a cycle did about its verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleAction {
    None,
    /// First sighting of a violation; re-check after the verification delay.
    VerificationScheduled,
    /// The violation survived verification.
    Deleted {
        deleted: Vec<String>,
        failed: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub verdict: Verdict,
    pub action: CycleAction,
    /// Delay before the next cycle.
    pub next_delay: Duration,
}

pub struct Reconciler {
    inventory: Arc<dyn PodInventory>,
    config: AuditConfig,
    pending_verification: bool,
}

impl Reconciler {
    pub fn new(inventory: Arc<dyn PodInventory>, config: AuditConfig) -> Self {
        Self {
            inventory,
            config,
            pending_verification: false,
        }
    }

    pub fn is_verifying(&self) -> bool {
        self.pending_verification
    }

    /// Run cycles until shutdown. The first cycle runs one period after start.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            period_secs = self.config.period_secs,
            verification_secs = self.config.verification_secs,
            "Starting audit checking timer"
        );

        let mut delay = self.config.period();
        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    delay = self.cycle().await.next_delay;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Reconciler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One audit pass.
    pub async fn cycle(&mut self) -> CycleOutcome {
        tracing::debug!("Audit starting");

        let pods = match self.inventory.list(None).await {
            Ok(pods) => pods,
            Err(e) => {
                tracing::error!(error = %e, "Error listing pods");
                Vec::new()
            }
        };

        let verdict = classify(&pods);
        metrics::record_audit_cycle(verdict.label());

        let action = match verdict.violators() {
            None => {
                if let Verdict::TooSmall { running } = verdict {
                    tracing::debug!(running, "Fewer than two running instances");
                }
                self.pending_verification = false;
                CycleAction::None
            }
            Some(names) if !self.pending_verification => {
                tracing::warn!(
                    verdict = verdict.label(),
                    pods = ?names,
                    "Inconsistent fleet, verifying in {}s",
                    self.config.verification_secs
                );
                self.pending_verification = true;
                CycleAction::VerificationScheduled
            }
            Some(names) => {
                tracing::warn!(verdict = verdict.label(), pods = ?names, "Inconsistency persisted, deleting pods");
                self.pending_verification = false;
                self.delete_all(names).await
            }
        };

        let next_delay = if action == CycleAction::VerificationScheduled {
            self.config.verification_delay()
        } else {
            self.config.period()
        };

        CycleOutcome {
            verdict,
            action,
            next_delay,
        }
    }

    async fn delete_all(&self, names: &[String]) -> CycleAction {
        let results = join_all(names.iter().map(|name| async move {
            let result = self.inventory.delete(name).await;
            (name.clone(), result)
        }))
        .await;

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for (name, result) in results {
            match result {
                Ok(()) => {
                    tracing::info!(pod = %name, "Pod deleted");
                    metrics::record_deletion(true);
                    deleted.push(name);
                }
                Err(e) => {
                    tracing::error!(pod = %name, error = %e, "Error deleting pod");
                    metrics::record_deletion(false);
                    failed.push(name);
                }
            }
        }
        CycleAction::Deleted { deleted, failed }
    }
}
