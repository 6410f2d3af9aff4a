//! Node status types shared by the runtime and its observers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime status of one graph node
///
/// Lifecycle: `Idle → Pending → Scheduled → Active`, with `Muted` and
/// `Error` reachable from any state. `Unknown` is only ever reported for
/// nodes the runtime has not seen; it is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Idle,
    Pending,
    Scheduled,
    Active,
    Error,
    Muted,
    Unknown,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Idle => "idle",
            NodeStatus::Pending => "pending",
            NodeStatus::Scheduled => "scheduled",
            NodeStatus::Active => "active",
            NodeStatus::Error => "error",
            NodeStatus::Muted => "muted",
            NodeStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest status of a node plus optional human-readable detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub status: NodeStatus,
    pub detail: Option<String>,
}

impl NodeState {
    pub fn new(status: NodeStatus, detail: Option<String>) -> Self {
        Self { status, detail }
    }

    pub fn idle() -> Self {
        Self::new(NodeStatus::Idle, None)
    }

    pub fn unknown() -> Self {
        Self::new(NodeStatus::Unknown, None)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({})", self.status, detail),
            None => write!(f, "{}", self.status),
        }
    }
}
