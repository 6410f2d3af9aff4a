//! Event types for the Mind event system
//!
//! Provides the shared event definitions and the EventBus used to observe the
//! runtime (status changes, part swaps, published outputs, resolution
//! failures). Events are broadcast via EventBus and can be serialized for SSE
//! transmission.

use crate::status::NodeStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// What a quantized swap does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapAction {
    /// Promote the staged part to active
    Swap,
    /// Stop and release the active part
    Stop,
}

/// Where a node's output Thought came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSource {
    /// Generated from the node's own intent
    Generated,
    /// Merged from upstream Thoughts by conflict resolution
    Resolved,
}

/// Mind event types
///
/// All runtime observability flows through this enum for type safety and
/// exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MindEvent {
    /// A node status was written (emitted on every write, even if unchanged)
    NodeStatusChanged {
        node_id: String,
        status: NodeStatus,
        detail: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A swap or stop was armed for the next bar boundary
    ///
    /// Re-arming before the boundary replaces the earlier timer, so only the
    /// last `PartSwapScheduled` for a node is ever followed by `PartSwapped`.
    PartSwapScheduled {
        node_id: String,
        action: SwapAction,
        /// Transport time of the boundary, in seconds
        at_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// A swap or stop fired on a bar boundary
    PartSwapped {
        node_id: String,
        action: SwapAction,
        timestamp: DateTime<Utc>,
    },

    /// A node published a new output Thought
    ThoughtPublished {
        node_id: String,
        source: OutputSource,
        loop_bars: u32,
        event_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Conflict resolution failed; the node keeps its previous output
    ResolutionFailed {
        node_id: String,
        error_code: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl MindEvent {
    /// Variant name, used as the SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            MindEvent::NodeStatusChanged { .. } => "NodeStatusChanged",
            MindEvent::PartSwapScheduled { .. } => "PartSwapScheduled",
            MindEvent::PartSwapped { .. } => "PartSwapped",
            MindEvent::ThoughtPublished { .. } => "ThoughtPublished",
            MindEvent::ResolutionFailed { .. } => "ResolutionFailed",
        }
    }

    /// Node the event refers to
    pub fn node_id(&self) -> &str {
        match self {
            MindEvent::NodeStatusChanged { node_id, .. }
            | MindEvent::PartSwapScheduled { node_id, .. }
            | MindEvent::PartSwapped { node_id, .. }
            | MindEvent::ThoughtPublished { node_id, .. }
            | MindEvent::ResolutionFailed { node_id, .. } => node_id,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use mind_common::events::{EventBus, MindEvent};
/// use mind_common::NodeStatus;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(MindEvent::NodeStatusChanged {
///     node_id: "node_1".to_string(),
///     status: NodeStatus::Pending,
///     detail: None,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "NodeStatusChanged");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MindEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<MindEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: MindEvent) -> Result<usize, broadcast::error::SendError<MindEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: MindEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
