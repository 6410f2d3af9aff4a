//! Runtime status store
//!
//! Holds the latest [`NodeState`] per node and announces every write on the
//! [`EventBus`]. Only the latest status is retained.

use chrono::Utc;
use mind_common::events::{EventBus, MindEvent};
use mind_common::{NodeState, NodeStatus};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

pub struct RuntimeStore {
    nodes: Mutex<HashMap<String, NodeState>>,
    event_bus: EventBus,
}

impl RuntimeStore {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            nodes: Mutex::new(HashMap::new()),
            event_bus,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Register a node as `idle`; no effect if it is already known
    pub fn init_node(&self, node_id: &str) {
        let mut nodes = self.nodes.lock();
        if nodes.contains_key(node_id) {
            return;
        }
        let state = NodeState::idle();
        self.announce(node_id, &state);
        nodes.insert(node_id.to_string(), state);
    }

    /// Overwrite the node status, registering the node if needed
    pub fn set_status(&self, node_id: &str, status: NodeStatus, detail: Option<&str>) {
        let state = NodeState::new(status, detail.map(str::to_string));
        let mut nodes = self.nodes.lock();
        // Announced under the lock so per-node events keep write order
        self.announce(node_id, &state);
        nodes.insert(node_id.to_string(), state);
    }

    /// Latest status, or `unknown` for nodes never seen
    pub fn get_status(&self, node_id: &str) -> NodeState {
        self.nodes
            .lock()
            .get(node_id)
            .cloned()
            .unwrap_or_else(NodeState::unknown)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.lock().contains_key(node_id)
    }

    /// All known nodes, ordered by id
    pub fn snapshot(&self) -> BTreeMap<String, NodeState> {
        self.nodes
            .lock()
            .iter()
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect()
    }

    fn announce(&self, node_id: &str, state: &NodeState) {
        info!("[Node:{}] {}", node_id, state);
        self.event_bus.emit_lossy(MindEvent::NodeStatusChanged {
            node_id: node_id.to_string(),
            status: state.status,
            detail: state.detail.clone(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RuntimeStore {
        RuntimeStore::new(EventBus::new(16))
    }

    #[test]
    fn test_unknown_for_unseen_node() {
        let store = store();
        assert_eq!(store.get_status("ghost"), NodeState::unknown());
        // reading must not register the node
        assert!(!store.contains("ghost"));
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_init_is_idempotent() {
        let store = store();
        store.init_node("n1");
        assert_eq!(store.get_status("n1").status, NodeStatus::Idle);

        store.set_status("n1", NodeStatus::Pending, None);
        store.init_node("n1");
        assert_eq!(store.get_status("n1").status, NodeStatus::Pending);
    }

    #[test]
    fn test_set_status_overwrites_and_initializes() {
        let store = store();
        store.set_status("n2", NodeStatus::Error, Some("Backend error"));
        let state = store.get_status("n2");
        assert_eq!(state.status, NodeStatus::Error);
        assert_eq!(state.detail.as_deref(), Some("Backend error"));

        store.set_status("n2", NodeStatus::Active, Some("swap complete"));
        assert_eq!(store.get_status("n2").detail.as_deref(), Some("swap complete"));
    }

    #[test]
    fn test_every_write_is_announced() {
        let store = store();
        let mut rx = store.event_bus().subscribe();

        store.init_node("n1");
        store.init_node("n1");
        store.set_status("n1", NodeStatus::Pending, None);
        store.set_status("n1", NodeStatus::Pending, None);

        let mut statuses = Vec::new();
        while let Ok(MindEvent::NodeStatusChanged { status, .. }) = rx.try_recv() {
            statuses.push(status);
        }
        assert_eq!(
            statuses,
            vec![NodeStatus::Idle, NodeStatus::Pending, NodeStatus::Pending]
        );
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let store = store();
        store.init_node("b");
        store.init_node("a");
        let ids: Vec<String> = store.snapshot().into_keys().collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
