//! Conflict resolution coordinator
//!
//! Merges the Thoughts arriving at a gate node through the remote resolver.
//! Inputs are taken in slot order: the first available one plays the `bass`
//! role and every later one `lead`. Debounced and cancelled like generation.
//!
//! Only `resolved[0]` is committed as the gate's output. Failures never touch
//! node status: they are logged and announced as `ResolutionFailed`, and the
//! gate keeps its previous output.

use crate::client::ThoughtService;
use crate::graph::ThoughtSink;
use crate::request::{Debouncer, RequestOutcome, RequestTracker};
use crate::status::RuntimeStore;
use chrono::Utc;
use mind_common::api::{ResolveInput, ResolveRequest, Role, RESOLVE_SCHEMA_VERSION};
use mind_common::events::{MindEvent, OutputSource};
use mind_common::{validate, Thought};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Error code announced when the resolver's output fails validation
pub const INVALID_THOUGHT: &str = "INVALID_THOUGHT";

/// Error code announced when the resolver returns nothing to commit
pub const EMPTY_RESOLUTION: &str = "EMPTY_RESOLUTION";

/// Inputs of one resolution request
#[derive(Debug, Clone)]
pub struct ResolveJob {
    pub node_id: String,
    pub style_profile: String,
    /// Input slots in order; `None` for unconnected or silent slots
    pub inputs: Vec<Option<Arc<Thought>>>,
}

impl ResolveJob {
    /// Available inputs with their positional roles
    pub fn roles(&self) -> Vec<(Role, &Arc<Thought>)> {
        self.inputs
            .iter()
            .flatten()
            .enumerate()
            .map(|(index, thought)| (Role::for_position(index), thought))
            .collect()
    }
}

pub struct ResolutionCoordinator {
    service: Arc<dyn ThoughtService>,
    store: Arc<RuntimeStore>,
    tracker: RequestTracker,
    debouncer: Debouncer,
    sink: Weak<dyn ThoughtSink>,
}

impl ResolutionCoordinator {
    pub fn new(
        service: Arc<dyn ThoughtService>,
        store: Arc<RuntimeStore>,
        debounce: Duration,
        sink: Weak<dyn ThoughtSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            service,
            store,
            tracker: RequestTracker::new(),
            debouncer: Debouncer::new(debounce),
            sink,
        })
    }

    /// Debounced resolution; the last call within the window wins
    pub fn request(self: &Arc<Self>, job: ResolveJob) {
        let coordinator = Arc::downgrade(self);
        let node_id = job.node_id.clone();
        debug!(node_id = %node_id, "Resolution requested");

        self.debouncer.schedule(&node_id, async move {
            let Some(coordinator) = coordinator.upgrade() else {
                return;
            };
            if let Some(outcome) = coordinator.dispatch(&job).await {
                debug!(node_id = %job.node_id, %outcome, "Resolution finished");
            }
        });
    }

    /// Issue a resolution request immediately
    ///
    /// Returns `None` without side effects when no input is available.
    pub async fn dispatch(&self, job: &ResolveJob) -> Option<RequestOutcome> {
        let node_id = job.node_id.as_str();
        let roles = job.roles();
        if roles.is_empty() {
            debug!(node_id, "No inputs to resolve");
            return None;
        }

        let ticket = self.tracker.begin(node_id);
        let request = ResolveRequest {
            schema_version: RESOLVE_SCHEMA_VERSION.to_string(),
            style_profile: job.style_profile.clone(),
            inputs: roles
                .into_iter()
                .map(|(role, thought)| ResolveInput {
                    node_id: thought.node_id.clone(),
                    role,
                    thought: Thought::clone(thought),
                })
                .collect(),
        };

        let Some(result) = ticket.run(self.service.resolve(&request)).await else {
            debug!(node_id, generation = ticket.generation(), "Resolution cancelled");
            return Some(RequestOutcome::Cancelled);
        };

        let outcome = match result {
            Ok(response) => match response.resolved.into_iter().next() {
                Some(first) => match validate(&first.thought) {
                    Ok(thought) => self.tracker.apply_if_current(&ticket, || {
                        info!(
                            node_id,
                            inputs = request.inputs.len(),
                            events = thought.sequence.len(),
                            "Resolution committed"
                        );
                        if let Some(sink) = self.sink.upgrade() {
                            sink.publish(node_id, Arc::new(thought), OutputSource::Resolved);
                        }
                        RequestOutcome::Applied
                    }),
                    Err(e) => self.tracker.apply_if_current(&ticket, || {
                        self.report_failure(node_id, INVALID_THOUGHT, e.reason());
                        RequestOutcome::Rejected
                    }),
                },
                None => self.tracker.apply_if_current(&ticket, || {
                    self.report_failure(node_id, EMPTY_RESOLUTION, "Resolver returned no output");
                    RequestOutcome::Rejected
                }),
            },
            Err(e) => self.tracker.apply_if_current(&ticket, || {
                self.report_failure(node_id, e.code(), e.status_message());
                RequestOutcome::Failed
            }),
        };

        Some(outcome.unwrap_or_else(|| {
            debug!(node_id, generation = ticket.generation(), "Stale resolution discarded");
            RequestOutcome::Stale
        }))
    }

    pub fn cancel(&self, node_id: &str) {
        self.debouncer.cancel(node_id);
        self.tracker.cancel(node_id);
    }

    pub fn is_debouncing(&self, node_id: &str) -> bool {
        self.debouncer.is_pending(node_id)
    }

    pub fn generation(&self, node_id: &str) -> u64 {
        self.tracker.generation(node_id)
    }

    fn report_failure(&self, node_id: &str, error_code: &str, message: &str) {
        warn!(node_id, error_code, "TheoryGate resolve error: {}", message);
        self.store.event_bus().emit_lossy(MindEvent::ResolutionFailed {
            node_id: node_id.to_string(),
            error_code: error_code.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        });
    }
}
