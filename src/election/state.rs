//! Election data model.

use std::fmt;

use serde::Serialize;

/// Externally visible role of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    #[serde(rename = "stand-by")]
    StandBy,
    #[serde(rename = "active")]
    Active,
}

impl Role {
    /// Label value stamped on the pod.
    pub fn as_label(&self) -> &'static str {
        match self {
            Role::StandBy => "stand-by",
            Role::Active => "active",
        }
    }

    /// Parse a pod label value. Unknown values are not a role.
    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "stand-by" => Some(Role::StandBy),
            "active" => Some(Role::Active),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Position of this instance in the election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElectionState {
    #[default]
    Initializing,
    /// Reading the registry to find the active instance.
    AwaitingConnection,
    /// Dialing the recorded active.
    Connecting,
    /// Receiving markers from the active.
    Connected,
    /// Own address written, waiting out the jitter window.
    ClaimingActive,
    /// Terminal.
    Active,
}

impl ElectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElectionState::Initializing => "initializing",
            ElectionState::AwaitingConnection => "awaiting_connection",
            ElectionState::Connecting => "connecting",
            ElectionState::Connected => "connected",
            ElectionState::ClaimingActive => "claiming_active",
            ElectionState::Active => "active",
        }
    }

    pub fn role(&self) -> Role {
        match self {
            ElectionState::Active => Role::Active,
            _ => Role::StandBy,
        }
    }
}

impl fmt::Display for ElectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `host:port` identity of an instance's liveness listener.
///
/// This is both the registry value and the dial target for stand-bys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct InstanceAddress {
    host: String,
    port: u16,
}

impl InstanceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// True when `recorded` names this instance.
    pub fn matches(&self, recorded: &str) -> bool {
        match recorded.rsplit_once(':') {
            Some((host, port)) => host == self.host && port.parse() == Ok(self.port),
            None => false,
        }
    }
}

impl fmt::Display for InstanceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl From<InstanceAddress> for String {
    fn from(address: InstanceAddress) -> Self {
        address.to_string()
    }
}
