//! Fleet inventory for the audit.

use async_trait::async_trait;

use crate::config::KubernetesConfig;
use crate::election::Role;
use crate::kube::client::KubeClient;
use crate::kube::types::{KubeResult, PodRecord};

/// Lists and removes application instances.
#[async_trait]
pub trait PodInventory: Send + Sync {
    /// Running instances, optionally only those carrying `role`.
    async fn list(&self, role: Option<Role>) -> KubeResult<Vec<PodRecord>>;

    async fn delete(&self, name: &str) -> KubeResult<()>;
}

/// Pod inventory backed by the Kubernetes API.
pub struct KubePodInventory {
    client: KubeClient,
    app_selector: String,
    role_label: String,
    phase: String,
}

impl KubePodInventory {
    pub fn new(client: KubeClient, config: &KubernetesConfig) -> Self {
        Self {
            client,
            app_selector: config.app_selector.clone(),
            role_label: config.role_label.clone(),
            phase: config.running_phase.clone(),
        }
    }

    fn label_selector(&self, role: Option<Role>) -> String {
        match role {
            Some(role) if self.app_selector.is_empty() => {
                format!("{}={}", self.role_label, role.as_label())
            }
            Some(role) => format!("{},{}={}", self.app_selector, self.role_label, role.as_label()),
            None => self.app_selector.clone(),
        }
    }

    fn field_selector(&self) -> Option<String> {
        if self.phase.is_empty() {
            None
        } else {
            Some(format!("status.phase={}", self.phase))
        }
    }
}

#[async_trait]
impl PodInventory for KubePodInventory {
    async fn list(&self, role: Option<Role>) -> KubeResult<Vec<PodRecord>> {
        let labels = self.label_selector(role);
        let fields = self.field_selector();
        let pods = self.client.list_pods(&labels, fields.as_deref()).await?;

        let records: Vec<PodRecord> = pods
            .iter()
            .map(|pod| pod.record(&self.role_label))
            .inspect(|record| {
                tracing::debug!(pod = %record.name, role = ?record.role, running = record.running, "Observed pod");
            })
            .filter(|record| record.running)
            .collect();
        Ok(records)
    }

    async fn delete(&self, name: &str) -> KubeResult<()> {
        tracing::debug!(pod = %name, "Deleting pod");
        self.client.delete_pod(name).await
    }
}
