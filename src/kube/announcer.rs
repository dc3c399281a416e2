//! Role label announcements.

use async_trait::async_trait;

use crate::election::Role;
use crate::kube::client::KubeClient;
use crate::kube::types::KubeResult;

/// Stamps this instance's externally visible role. Failures are never fatal.
#[async_trait]
pub trait RoleAnnouncer: Send + Sync {
    async fn announce(&self, role: Role) -> KubeResult<()>;
}

/// Patches the role label on this instance's own pod.
pub struct PodLabelAnnouncer {
    client: KubeClient,
    pod_name: String,
    role_label: String,
}

impl PodLabelAnnouncer {
    pub fn new(client: KubeClient, pod_name: impl Into<String>, role_label: impl Into<String>) -> Self {
        Self {
            client,
            pod_name: pod_name.into(),
            role_label: role_label.into(),
        }
    }
}

#[async_trait]
impl RoleAnnouncer for PodLabelAnnouncer {
    async fn announce(&self, role: Role) -> KubeResult<()> {
        tracing::info!(pod = %self.pod_name, label = %self.role_label, role = %role, "Patching pod role label");
        self.client
            .patch_pod_label(&self.pod_name, &self.role_label, role.as_label())
            .await?;
        tracing::info!(pod = %self.pod_name, role = %role, "Pod patched");
        Ok(())
    }
}

/// Used outside Kubernetes: announcements are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedAnnouncer;

#[async_trait]
impl RoleAnnouncer for DetachedAnnouncer {
    async fn announce(&self, role: Role) -> KubeResult<()> {
        tracing::debug!(role = %role, "Not running in Kubernetes, role label not set");
        Ok(())
    }
}
