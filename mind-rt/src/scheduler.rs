//! Quantized part swap scheduler
//!
//! Turns Thoughts into looping parts and swaps them in only on bar
//! boundaries, so playback never changes mid-bar.
//!
//! **Responsibilities:**
//! - Per-node audio state: voice, `active_part`, staged `next_part`, pending timer
//! - At most one pending swap/stop timer per node; re-scheduling replaces it
//! - Status transitions `scheduled` → `active` / `muted`
//! - Starting the transport when it is not running
//!
//! Each armed timer carries the node's swap sequence number. A callback whose
//! number no longer matches was superseded and does nothing.

use crate::status::RuntimeStore;
use crate::transport::{AudioEngine, PartCallback, Playable, TimerHandle, Transport, Voice};
use chrono::Utc;
use mind_common::events::{MindEvent, SwapAction};
use mind_common::{Meter, MusicalTime, NodeStatus, Thought, ThoughtEvent};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

struct NodeAudioState {
    voice: Arc<dyn Voice>,
    active_part: Option<Box<dyn Playable>>,
    next_part: Option<Box<dyn Playable>>,
    pending_swap: Option<TimerHandle>,
    swap_seq: u64,
}

/// Read-only view of a node's audio state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioStateSummary {
    pub has_active_part: bool,
    pub has_next_part: bool,
    pub has_pending_swap: bool,
}

pub struct PartSwapScheduler {
    transport: Arc<dyn Transport>,
    engine: Arc<dyn AudioEngine>,
    store: Arc<RuntimeStore>,
    meter: Meter,
    nodes: Mutex<HashMap<String, NodeAudioState>>,
    self_ref: Weak<PartSwapScheduler>,
}

impl PartSwapScheduler {
    pub fn new(
        transport: Arc<dyn Transport>,
        engine: Arc<dyn AudioEngine>,
        store: Arc<RuntimeStore>,
        meter: Meter,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            transport,
            engine,
            store,
            meter,
            nodes: Mutex::new(HashMap::new()),
            self_ref: self_ref.clone(),
        })
    }

    /// Stage `thought` for the next bar boundary
    ///
    /// A Thought whose status is not `active` is a stop request.
    pub fn schedule_thought(&self, node_id: &str, thought: Arc<Thought>) {
        if !thought.is_active() {
            debug!(node_id, status = %thought.status, "Inactive thought, queueing stop");
            self.queue_stop(node_id);
            return;
        }

        let mut nodes = self.nodes.lock();
        let state = self.ensure_node(&mut nodes, node_id);
        let part = self.build_part(Arc::clone(&state.voice), &thought);

        if let Some(superseded) = state.next_part.replace(part) {
            superseded.release();
        }
        let at = self.arm(node_id, state, SwapAction::Swap);

        self.store
            .set_status(node_id, NodeStatus::Scheduled, Some(&format!("swap at {:.3}s", at)));
        self.start_transport();
    }

    /// Stop the node's active part at the next bar boundary
    pub fn queue_stop(&self, node_id: &str) {
        let mut nodes = self.nodes.lock();
        let state = self.ensure_node(&mut nodes, node_id);

        // A staged part can no longer be promoted
        if let Some(staged) = state.next_part.take() {
            staged.release();
        }
        let at = self.arm(node_id, state, SwapAction::Stop);

        self.store
            .set_status(node_id, NodeStatus::Scheduled, Some(&format!("stop at {:.3}s", at)));
        self.start_transport();
    }

    pub fn summary(&self, node_id: &str) -> Option<AudioStateSummary> {
        self.nodes.lock().get(node_id).map(|state| AudioStateSummary {
            has_active_part: state.active_part.is_some(),
            has_next_part: state.next_part.is_some(),
            has_pending_swap: state.pending_swap.is_some(),
        })
    }

    /// Stop and release every part; pending timers are cleared
    pub fn shutdown(&self) {
        let mut nodes = self.nodes.lock();
        for (node_id, state) in nodes.iter_mut() {
            state.swap_seq += 1;
            if let Some(timer) = state.pending_swap.take() {
                self.transport.clear(timer);
            }
            for part in [state.active_part.take(), state.next_part.take()]
                .into_iter()
                .flatten()
            {
                part.stop();
                part.release();
            }
            debug!(node_id = %node_id, "Audio state released");
        }
    }

    fn ensure_node<'a>(
        &self,
        nodes: &'a mut HashMap<String, NodeAudioState>,
        node_id: &str,
    ) -> &'a mut NodeAudioState {
        nodes.entry(node_id.to_string()).or_insert_with(|| {
            self.store.init_node(node_id);
            NodeAudioState {
                voice: self.engine.create_voice(node_id),
                active_part: None,
                next_part: None,
                pending_swap: None,
                swap_seq: 0,
            }
        })
    }

    fn build_part(&self, voice: Arc<dyn Voice>, thought: &Thought) -> Box<dyn Playable> {
        let meter = self.meter;
        let default_length = MusicalTime::SIXTEENTH.to_seconds(&meter);

        let callback: PartCallback = Arc::new(move |time: f64, event: &ThoughtEvent| match event {
            ThoughtEvent::Note {
                midi,
                velocity,
                duration,
                ..
            } => {
                let length = duration
                    .as_ref()
                    .map_or(default_length, |d| d.to_seconds(&meter));
                voice.trigger(*midi, length, time, velocity.level());
            }
            ThoughtEvent::Mute { .. } => voice.mute(time),
            ThoughtEvent::Cc { cc, value, .. } => voice.control_change(*cc, *value, time),
        });

        self.engine
            .create_part(thought.sequence.clone(), thought.loop_end(), callback)
    }

    /// Replace the node's pending timer with one for the next bar boundary
    fn arm(&self, node_id: &str, state: &mut NodeAudioState, action: SwapAction) -> f64 {
        if let Some(previous) = state.pending_swap.take() {
            self.transport.clear(previous);
        }
        state.swap_seq += 1;
        let seq = state.swap_seq;
        let at = self.transport.next_bar();

        let scheduler = self.self_ref.clone();
        let id = node_id.to_string();
        let handle = self.transport.schedule_once(
            at,
            Box::new(move || {
                if let Some(scheduler) = scheduler.upgrade() {
                    scheduler.fire(&id, seq, at, action);
                }
            }),
        );
        state.pending_swap = Some(handle);

        debug!(node_id, seq, ?action, "Armed for {:.3}s", at);
        self.store.event_bus().emit_lossy(MindEvent::PartSwapScheduled {
            node_id: node_id.to_string(),
            action,
            at_seconds: at,
            timestamp: Utc::now(),
        });
        at
    }

    fn fire(&self, node_id: &str, seq: u64, at: f64, action: SwapAction) {
        let mut nodes = self.nodes.lock();
        let Some(state) = nodes.get_mut(node_id) else {
            return;
        };
        if state.swap_seq != seq {
            debug!(node_id, seq, current = state.swap_seq, "Superseded timer ignored");
            return;
        }
        state.pending_swap = None;

        if let Some(old) = state.active_part.take() {
            old.stop();
            old.release();
        }

        match action {
            SwapAction::Swap => {
                if let Some(next) = state.next_part.take() {
                    next.start(at);
                    state.active_part = Some(next);
                }
                info!(node_id, "Part swapped at {:.3}s", at);
                self.store
                    .set_status(node_id, NodeStatus::Active, Some("swap complete"));
            }
            SwapAction::Stop => {
                info!(node_id, "Part stopped at {:.3}s", at);
                self.store
                    .set_status(node_id, NodeStatus::Muted, Some("stop scheduled"));
            }
        }

        self.store.event_bus().emit_lossy(MindEvent::PartSwapped {
            node_id: node_id.to_string(),
            action,
            timestamp: Utc::now(),
        });
    }

    fn start_transport(&self) {
        if !self.transport.is_running() {
            self.transport.start();
        }
    }
}
