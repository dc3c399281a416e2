//! Fleet classification.

use crate::election::Role;
use crate::kube::PodRecord;

/// What one snapshot of the fleet says about the single-active invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Fewer than two running instances: nothing to violate.
    TooSmall { running: usize },
    /// At most one active and not everyone on stand-by.
    Consistent,
    /// Every running instance is on stand-by.
    NoActive(Vec<String>),
    /// More than one running instance claims to be active.
    SplitBrain(Vec<String>),
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::TooSmall { .. } => "too_small",
            Verdict::Consistent => "consistent",
            Verdict::NoActive(_) => "no_active",
            Verdict::SplitBrain(_) => "split_brain",
        }
    }

    /// Instances to remove if this verdict survives verification.
    pub fn violators(&self) -> Option<&[String]> {
        match self {
            Verdict::NoActive(names) | Verdict::SplitBrain(names) => Some(names),
            _ => None,
        }
    }
}

/// Classify the running part of `pods`.
pub fn classify(pods: &[PodRecord]) -> Verdict {
    let running: Vec<&PodRecord> = pods.iter().filter(|pod| pod.running).collect();
    if running.len() < 2 {
        return Verdict::TooSmall {
            running: running.len(),
        };
    }

    let with_role = |role: Role| -> Vec<String> {
        running
            .iter()
            .filter(|pod| pod.role == Some(role))
            .map(|pod| pod.name.clone())
            .collect()
    };

    let stand_by = with_role(Role::StandBy);
    if stand_by.len() == running.len() {
        return Verdict::NoActive(stand_by);
    }

    let active = with_role(Role::Active);
    if active.len() > 1 {
        return Verdict::SplitBrain(active);
    }

    Verdict::Consistent
}
