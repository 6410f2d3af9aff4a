//! Per-node request tracking and debouncing
//!
//! **Responsibilities:**
//! - [`RequestTracker`]: one in-flight request per node. Starting a request
//!   cancels the previous one and bumps the node's generation counter.
//!   Completions are applied only while their generation is still current.
//! - [`Debouncer`]: trailing-edge debounce per node. Only the sleep phase is
//!   abortable; once the work has started it is governed by the tracker.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What happened to a dispatched request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Result accepted and forwarded
    Applied,
    /// Response failed validation; node status set to `error`
    Rejected,
    /// Transport or backend failure
    Failed,
    /// Superseded while in flight
    Cancelled,
    /// Completed after a newer request was issued; discarded
    Stale,
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestOutcome::Applied => "applied",
            RequestOutcome::Rejected => "rejected",
            RequestOutcome::Failed => "failed",
            RequestOutcome::Cancelled => "cancelled",
            RequestOutcome::Stale => "stale",
        };
        f.write_str(s)
    }
}

struct RequestSlot {
    generation: u64,
    token: CancellationToken,
}

/// Handle on one issued request
#[derive(Debug, Clone)]
pub struct RequestTicket {
    node_id: String,
    generation: u64,
    token: CancellationToken,
}

impl RequestTicket {
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive `work` until it completes or the request is superseded
    ///
    /// Returns `None` on cancellation; the dropped future aborts any
    /// network call it was awaiting.
    pub async fn run<F: Future>(&self, work: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            output = work => Some(output),
        }
    }
}

#[derive(Default)]
pub struct RequestTracker {
    slots: Mutex<HashMap<String, RequestSlot>>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new request for `node_id`, cancelling the one in flight
    pub fn begin(&self, node_id: &str) -> RequestTicket {
        let mut slots = self.slots.lock();
        let slot = slots
            .entry(node_id.to_string())
            .or_insert_with(|| RequestSlot {
                generation: 0,
                token: CancellationToken::new(),
            });

        slot.token.cancel();
        slot.generation += 1;
        slot.token = CancellationToken::new();

        RequestTicket {
            node_id: node_id.to_string(),
            generation: slot.generation,
            token: slot.token.clone(),
        }
    }

    /// Current generation of `node_id` (0 if no request was ever issued)
    pub fn generation(&self, node_id: &str) -> u64 {
        self.slots
            .lock()
            .get(node_id)
            .map_or(0, |slot| slot.generation)
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.slots
            .lock()
            .get(&ticket.node_id)
            .is_some_and(|slot| slot.generation == ticket.generation)
    }

    /// Run `apply` only if `ticket` is still the node's latest request
    ///
    /// The check and `apply` happen under the tracker lock, so a newer
    /// request cannot begin in between.
    pub fn apply_if_current<R>(&self, ticket: &RequestTicket, apply: impl FnOnce() -> R) -> Option<R> {
        let slots = self.slots.lock();
        let current = slots
            .get(&ticket.node_id)
            .is_some_and(|slot| slot.generation == ticket.generation);
        if current {
            Some(apply())
        } else {
            None
        }
    }

    /// Cancel whatever is in flight for `node_id`
    pub fn cancel(&self, node_id: &str) {
        if let Some(slot) = self.slots.lock().get_mut(node_id) {
            slot.token.cancel();
            slot.generation += 1;
        }
    }
}

/// Trailing-edge debounce keyed by node id
pub struct Debouncer {
    delay: Duration,
    state: Arc<Mutex<DebounceState>>,
}

#[derive(Default)]
struct DebounceState {
    next_id: u64,
    pending: HashMap<String, (u64, JoinHandle<()>)>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `work` after the delay unless another call for `node_id` arrives first
    pub fn schedule<F>(&self, node_id: &str, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Held across spawn so the task always finds its own entry
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;

        let shared = Arc::clone(&self.state);
        let key = node_id.to_string();
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let due = {
                let mut state = shared.lock();
                let due = state
                    .pending
                    .get(&key)
                    .is_some_and(|(current, _)| *current == id);
                if due {
                    state.pending.remove(&key);
                }
                due
            };
            if due {
                work.await;
            }
        });

        if let Some((_, previous)) = state.pending.insert(node_id.to_string(), (id, handle)) {
            previous.abort();
        }
    }

    /// Drop a waiting call for `node_id`
    pub fn cancel(&self, node_id: &str) {
        if let Some((_, handle)) = self.state.lock().pending.remove(node_id) {
            handle.abort();
        }
    }

    pub fn is_pending(&self, node_id: &str) -> bool {
        self.state.lock().pending.contains_key(node_id)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        for (_, (_, handle)) in self.state.lock().pending.drain() {
            handle.abort();
        }
    }
}
