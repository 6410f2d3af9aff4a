//! Generation request coordinator
//!
//! Turns a node's intent text into a playing Thought:
//! debounce → `pending` → service call → validate → scheduler + output.
//!
//! Per node only the latest request counts. A newer request cancels the one
//! in flight, and any completion whose generation is no longer current is
//! discarded without touching status or audio state.

use crate::client::ThoughtService;
use crate::graph::ThoughtSink;
use crate::request::{Debouncer, RequestOutcome, RequestTracker};
use crate::scheduler::PartSwapScheduler;
use crate::status::RuntimeStore;
use mind_common::api::{GenerateContext, GenerateRequest};
use mind_common::config::TomlConfig;
use mind_common::events::OutputSource;
use mind_common::thought::THOUGHT_SCHEMA_VERSION;
use mind_common::{validate, NodeStatus};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Inputs of one generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub node_id: String,
    pub intent_text: String,
    pub style_profile: String,
}

/// Musical context sent with every request
pub fn context_from_config(config: &TomlConfig) -> GenerateContext {
    GenerateContext {
        tempo: config.tempo,
        time_signature: config.time_signature.clone(),
        anchor_midi: config.anchor_midi,
        role: config.role.clone(),
    }
}

pub struct GenerationCoordinator {
    service: Arc<dyn ThoughtService>,
    store: Arc<RuntimeStore>,
    scheduler: Arc<PartSwapScheduler>,
    tracker: RequestTracker,
    debouncer: Debouncer,
    context: GenerateContext,
    sink: Weak<dyn ThoughtSink>,
}

impl GenerationCoordinator {
    pub fn new(
        service: Arc<dyn ThoughtService>,
        store: Arc<RuntimeStore>,
        scheduler: Arc<PartSwapScheduler>,
        context: GenerateContext,
        debounce: Duration,
        sink: Weak<dyn ThoughtSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            service,
            store,
            scheduler,
            tracker: RequestTracker::new(),
            debouncer: Debouncer::new(debounce),
            context,
            sink,
        })
    }

    /// Debounced generation; the last call within the window wins
    pub fn request(self: &Arc<Self>, job: GenerationJob) {
        let coordinator = Arc::downgrade(self);
        let node_id = job.node_id.clone();
        debug!(node_id = %node_id, "Generation requested");

        self.debouncer.schedule(&node_id, async move {
            let Some(coordinator) = coordinator.upgrade() else {
                return;
            };
            let outcome = coordinator.dispatch(&job).await;
            debug!(node_id = %job.node_id, %outcome, "Generation finished");
        });
    }

    /// Issue a generation request immediately
    pub async fn dispatch(&self, job: &GenerationJob) -> RequestOutcome {
        let node_id = job.node_id.as_str();
        let ticket = self.tracker.begin(node_id);
        self.store.set_status(node_id, NodeStatus::Pending, None);

        let request = GenerateRequest {
            schema_version: THOUGHT_SCHEMA_VERSION.to_string(),
            node_id: job.node_id.clone(),
            style_profile: job.style_profile.clone(),
            intent_text: job.intent_text.clone(),
            context: self.context.clone(),
        };

        let Some(result) = ticket.run(self.service.generate(&request)).await else {
            debug!(node_id, generation = ticket.generation(), "Generation cancelled");
            return RequestOutcome::Cancelled;
        };

        let outcome = match result {
            Ok(body) => match validate(&body) {
                Ok(thought) => {
                    let thought = Arc::new(thought);
                    self.tracker.apply_if_current(&ticket, || {
                        info!(
                            node_id,
                            events = thought.sequence.len(),
                            loop_bars = thought.meta.loop_bars,
                            "Thought generated"
                        );
                        self.scheduler.schedule_thought(node_id, Arc::clone(&thought));
                        if let Some(sink) = self.sink.upgrade() {
                            sink.publish(node_id, thought, OutputSource::Generated);
                        }
                        RequestOutcome::Applied
                    })
                }
                Err(e) => self.tracker.apply_if_current(&ticket, || {
                    warn!(node_id, "Invalid thought: {}", e);
                    self.store
                        .set_status(node_id, NodeStatus::Error, Some(e.reason()));
                    RequestOutcome::Rejected
                }),
            },
            Err(e) => self.tracker.apply_if_current(&ticket, || {
                warn!(node_id, code = e.code(), "Generation failed: {}", e);
                self.store
                    .set_status(node_id, NodeStatus::Error, Some(e.status_message()));
                RequestOutcome::Failed
            }),
        };

        outcome.unwrap_or_else(|| {
            debug!(node_id, generation = ticket.generation(), "Stale generation discarded");
            RequestOutcome::Stale
        })
    }

    /// Drop any waiting or in-flight request for `node_id`
    pub fn cancel(&self, node_id: &str) {
        self.debouncer.cancel(node_id);
        self.tracker.cancel(node_id);
    }

    pub fn is_debouncing(&self, node_id: &str) -> bool {
        self.debouncer.is_pending(node_id)
    }

    /// Requests issued so far for `node_id`
    pub fn generation(&self, node_id: &str) -> u64 {
        self.tracker.generation(node_id)
    }
}
