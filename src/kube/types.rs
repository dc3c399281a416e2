//! Pod API types and error definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::election::Role;

/// Errors that can occur talking to the Kubernetes API.
#[derive(Debug, Error)]
pub enum KubeError {
    /// Transport failure or timeout.
    #[error("Kubernetes request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("Kubernetes API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Malformed API URL.
    #[error("Invalid Kubernetes API URL: {0}")]
    Url(#[from] url::ParseError),

    /// Could not read the service account credentials.
    #[error("Failed to read {path}: {source}")]
    Credentials {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Request body could not be encoded.
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for Kubernetes operations.
pub type KubeResult<T> = Result<T, KubeError>;

/// `GET /api/v1/namespaces/{ns}/pods` response, trimmed to what the audit reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodList {
    #[serde(default)]
    pub items: Vec<Pod>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerStatus {
    #[serde(default)]
    pub state: ContainerState,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerState {
    #[serde(default)]
    pub running: Option<RunningState>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningState {
    #[serde(default)]
    pub started_at: Option<String>,
}

impl Pod {
    /// The first container has a recorded start time.
    pub fn is_running(&self) -> bool {
        self.status
            .container_statuses
            .first()
            .and_then(|status| status.state.running.as_ref())
            .and_then(|running| running.started_at.as_ref())
            .is_some()
    }

    pub fn record(&self, role_label: &str) -> PodRecord {
        PodRecord {
            name: self.metadata.name.clone(),
            role: self
                .metadata
                .labels
                .get(role_label)
                .and_then(|value| Role::from_label(value)),
            running: self.is_running(),
        }
    }
}

/// One instance as seen by the fleet audit. Never cached across polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRecord {
    pub name: String,
    /// `None` when the label is missing or not a known role.
    pub role: Option<Role>,
    pub running: bool,
}

impl PodRecord {
    pub fn new(name: impl Into<String>, role: Option<Role>, running: bool) -> Self {
        Self {
            name: name.into(),
            role,
            running,
        }
    }
}

/// A single JSON-patch (RFC 6902) operation.
#[derive(Debug, Clone, Serialize)]
pub struct PatchOperation {
    pub op: &'static str,
    pub path: String,
    pub value: String,
}

impl PatchOperation {
    /// Set `labels[label] = value`, creating the label if absent.
    pub fn set_label(label: &str, value: &str) -> Self {
        Self {
            op: "add",
            path: format!("/metadata/labels/{}", escape_pointer(label)),
            value: value.to_string(),
        }
    }
}

/// JSON pointer escaping for a single path segment.
fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
