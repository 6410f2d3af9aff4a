//! Graph host adapter
//!
//! Hosts the node graph the coordinators serve:
//! - **MusicalThought** nodes: intent text + style profile → generated Thought
//! - **TheoryGate** nodes: N input slots → resolved Thought
//!
//! Node lifecycle events drive the coordinators. Adding a thought node or
//! editing its intent/profile requests generation; connecting or
//! disconnecting a gate input, editing a gate's profile, or a new output on
//! any connected upstream node requests resolution. Outputs are written back
//! through [`ThoughtSink`].

use crate::client::ThoughtService;
use crate::error::{Error, Result};
use crate::generation::{context_from_config, GenerationCoordinator, GenerationJob};
use crate::profiles::ProfileCatalog;
use crate::resolution::{ResolutionCoordinator, ResolveJob};
use crate::scheduler::PartSwapScheduler;
use crate::status::RuntimeStore;
use chrono::Utc;
use mind_common::api::GenerateContext;
use mind_common::config::TomlConfig;
use mind_common::events::{MindEvent, OutputSource};
use mind_common::{NodeState, Thought};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info};

/// Intent text of newly created thought nodes
pub const DEFAULT_INTENT_TEXT: &str = "[0 7 12]";

/// Receives the output Thoughts of graph nodes
pub trait ThoughtSink: Send + Sync {
    fn publish(&self, node_id: &str, thought: Arc<Thought>, source: OutputSource);
}

/// Coordinator timing and gate shape
#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub generate_debounce: Duration,
    pub resolve_debounce: Duration,
    pub gate_inputs: usize,
    pub context: GenerateContext,
}

impl GraphSettings {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            generate_debounce: config.generate_debounce(),
            resolve_debounce: config.resolve_debounce(),
            gate_inputs: config.gate_inputs,
            context: context_from_config(config),
        }
    }
}

/// Properties of a new MusicalThought node; unset fields take defaults
#[derive(Debug, Clone, Default)]
pub struct ThoughtNodeProps {
    pub node_id: Option<String>,
    pub intent_text: Option<String>,
    pub style_profile: Option<String>,
}

/// Properties of a new TheoryGate node
#[derive(Debug, Clone, Default)]
pub struct GateNodeProps {
    pub node_id: Option<String>,
    pub inputs: Option<usize>,
    pub style_profile: Option<String>,
}

/// Widget edits; `intent_text` only applies to thought nodes
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub intent_text: Option<String>,
    pub style_profile: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Thought,
    Gate,
}

#[derive(Debug, Clone)]
enum NodeBody {
    Thought { intent_text: String },
    Gate { inputs: Vec<Option<String>> },
}

#[derive(Debug, Clone)]
struct GraphNode {
    style_profile: String,
    body: NodeBody,
    output: Option<Arc<Thought>>,
}

/// Serializable view of one node
#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub node_id: String,
    pub kind: NodeKind,
    pub style_profile: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_text: Option<String>,
    /// Upstream node per input slot (gates only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<Option<String>>>,
    #[serde(flatten)]
    pub state: NodeState,
    pub output: Option<Arc<Thought>>,
}

pub struct Graph {
    nodes: Mutex<HashMap<String, GraphNode>>,
    store: Arc<RuntimeStore>,
    catalog: ProfileCatalog,
    generation: Arc<GenerationCoordinator>,
    resolution: Arc<ResolutionCoordinator>,
    gate_inputs: usize,
}

impl Graph {
    pub fn new(
        service: Arc<dyn ThoughtService>,
        store: Arc<RuntimeStore>,
        scheduler: Arc<PartSwapScheduler>,
        catalog: ProfileCatalog,
        settings: GraphSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|graph: &Weak<Graph>| {
            let sink: Weak<dyn ThoughtSink> = graph.clone();
            let generation = GenerationCoordinator::new(
                Arc::clone(&service),
                Arc::clone(&store),
                scheduler,
                settings.context,
                settings.generate_debounce,
                sink.clone(),
            );
            let resolution = ResolutionCoordinator::new(
                service,
                Arc::clone(&store),
                settings.resolve_debounce,
                sink,
            );
            Graph {
                nodes: Mutex::new(HashMap::new()),
                store,
                catalog,
                generation,
                resolution,
                gate_inputs: settings.gate_inputs,
            }
        })
    }

    pub fn catalog(&self) -> &ProfileCatalog {
        &self.catalog
    }

    pub fn generation(&self) -> &Arc<GenerationCoordinator> {
        &self.generation
    }

    pub fn resolution(&self) -> &Arc<ResolutionCoordinator> {
        &self.resolution
    }

    /// Add a MusicalThought node and request its first generation
    pub fn add_thought_node(&self, props: ThoughtNodeProps) -> Result<NodeView> {
        let style_profile = self.profile_or_default(props.style_profile)?;
        let intent_text = props
            .intent_text
            .unwrap_or_else(|| DEFAULT_INTENT_TEXT.to_string());

        let node_id = {
            let mut nodes = self.nodes.lock();
            let node_id = claim_id(&nodes, props.node_id, "node")?;
            nodes.insert(
                node_id.clone(),
                GraphNode {
                    style_profile: style_profile.clone(),
                    body: NodeBody::Thought {
                        intent_text: intent_text.clone(),
                    },
                    output: None,
                },
            );
            node_id
        };

        info!(node_id = %node_id, "MusicalThought added");
        self.store.init_node(&node_id);
        self.generation.request(GenerationJob {
            node_id: node_id.clone(),
            intent_text,
            style_profile,
        });
        self.view(&node_id)
    }

    /// Add a TheoryGate node with all slots unconnected
    pub fn add_gate_node(&self, props: GateNodeProps) -> Result<NodeView> {
        let style_profile = self.profile_or_default(props.style_profile)?;
        let slots = props.inputs.unwrap_or(self.gate_inputs);
        if slots == 0 {
            return Err(Error::BadRequest("a gate needs at least one input".to_string()));
        }

        let node_id = {
            let mut nodes = self.nodes.lock();
            let node_id = claim_id(&nodes, props.node_id, "gate")?;
            nodes.insert(
                node_id.clone(),
                GraphNode {
                    style_profile,
                    body: NodeBody::Gate {
                        inputs: vec![None; slots],
                    },
                    output: None,
                },
            );
            node_id
        };

        info!(node_id = %node_id, slots, "TheoryGate added");
        self.store.init_node(&node_id);
        self.view(&node_id)
    }

    /// Apply widget edits and request regeneration or re-resolution
    pub fn update_node(&self, node_id: &str, update: NodeUpdate) -> Result<NodeView> {
        if let Some(profile) = &update.style_profile {
            self.check_profile(profile)?;
        }

        let kind = {
            let mut nodes = self.nodes.lock();
            let node = nodes
                .get_mut(node_id)
                .ok_or_else(|| Error::NodeNotFound(node_id.to_string()))?;

            match &mut node.body {
                NodeBody::Thought { intent_text } => {
                    if let Some(text) = update.intent_text {
                        *intent_text = text;
                    }
                }
                NodeBody::Gate { .. } => {
                    if update.intent_text.is_some() {
                        return Err(Error::BadRequest(
                            "intent_text only applies to MusicalThought nodes".to_string(),
                        ));
                    }
                }
            }
            if let Some(profile) = update.style_profile {
                node.style_profile = profile;
            }
            kind_of(node)
        };

        match kind {
            NodeKind::Thought => self.request_generation(node_id),
            NodeKind::Gate => self.request_resolution(node_id),
        }
        self.view(node_id)
    }

    /// Connect `upstream_id`'s output to input `slot` of gate `gate_id`
    pub fn connect(&self, gate_id: &str, slot: usize, upstream_id: &str) -> Result<NodeView> {
        {
            let mut nodes = self.nodes.lock();
            if !nodes.contains_key(upstream_id) {
                return Err(Error::NodeNotFound(upstream_id.to_string()));
            }
            if upstream_id == gate_id || feeds_into(&nodes, gate_id, upstream_id) {
                return Err(Error::BadRequest(format!(
                    "connecting {} to {} would create a cycle",
                    upstream_id, gate_id
                )));
            }
            let inputs = gate_inputs_mut(&mut nodes, gate_id)?;
            let input = inputs.get_mut(slot).ok_or_else(|| {
                Error::BadRequest(format!("gate {} has no input slot {}", gate_id, slot))
            })?;
            *input = Some(upstream_id.to_string());
        }

        info!(node_id = %gate_id, slot, upstream = %upstream_id, "Input connected");
        self.request_resolution(gate_id);
        self.view(gate_id)
    }

    /// Clear input `slot` of gate `gate_id`
    pub fn disconnect(&self, gate_id: &str, slot: usize) -> Result<NodeView> {
        {
            let mut nodes = self.nodes.lock();
            let inputs = gate_inputs_mut(&mut nodes, gate_id)?;
            let input = inputs.get_mut(slot).ok_or_else(|| {
                Error::BadRequest(format!("gate {} has no input slot {}", gate_id, slot))
            })?;
            *input = None;
        }

        info!(node_id = %gate_id, slot, "Input disconnected");
        self.request_resolution(gate_id);
        self.view(gate_id)
    }

    pub fn output(&self, node_id: &str) -> Option<Arc<Thought>> {
        self.nodes
            .lock()
            .get(node_id)
            .and_then(|node| node.output.clone())
    }

    pub fn view(&self, node_id: &str) -> Result<NodeView> {
        let node = self
            .nodes
            .lock()
            .get(node_id)
            .cloned()
            .ok_or_else(|| Error::NodeNotFound(node_id.to_string()))?;
        Ok(self.make_view(node_id, node))
    }

    /// All nodes, ordered by id
    pub fn views(&self) -> Vec<NodeView> {
        let mut nodes: Vec<(String, GraphNode)> = self
            .nodes
            .lock()
            .iter()
            .map(|(id, node)| (id.clone(), node.clone()))
            .collect();
        nodes.sort_by(|a, b| a.0.cmp(&b.0));
        nodes
            .into_iter()
            .map(|(id, node)| self.make_view(&id, node))
            .collect()
    }

    fn make_view(&self, node_id: &str, node: GraphNode) -> NodeView {
        let kind = kind_of(&node);
        let (intent_text, inputs) = match node.body {
            NodeBody::Thought { intent_text } => (Some(intent_text), None),
            NodeBody::Gate { inputs } => (None, Some(inputs)),
        };
        NodeView {
            node_id: node_id.to_string(),
            kind,
            style_profile: node.style_profile,
            intent_text,
            inputs,
            state: self.store.get_status(node_id),
            output: node.output,
        }
    }

    fn request_generation(&self, node_id: &str) {
        let job = {
            let nodes = self.nodes.lock();
            match nodes.get(node_id) {
                Some(GraphNode {
                    style_profile,
                    body: NodeBody::Thought { intent_text },
                    ..
                }) => GenerationJob {
                    node_id: node_id.to_string(),
                    intent_text: intent_text.clone(),
                    style_profile: style_profile.clone(),
                },
                _ => return,
            }
        };
        self.generation.request(job);
    }

    fn request_resolution(&self, gate_id: &str) {
        let job = resolve_job(&self.nodes.lock(), gate_id);
        if let Some(job) = job {
            self.resolution.request(job);
        }
    }

    fn profile_or_default(&self, profile: Option<String>) -> Result<String> {
        match profile {
            Some(profile) => {
                self.check_profile(&profile)?;
                Ok(profile)
            }
            None => Ok(self.catalog.default_profile().to_string()),
        }
    }

    fn check_profile(&self, profile: &str) -> Result<()> {
        if self.catalog.contains(profile) {
            Ok(())
        } else {
            Err(Error::BadRequest(format!("unknown style profile: {}", profile)))
        }
    }
}

impl ThoughtSink for Graph {
    fn publish(&self, node_id: &str, thought: Arc<Thought>, source: OutputSource) {
        let downstream: Vec<ResolveJob> = {
            let mut nodes = self.nodes.lock();
            let Some(node) = nodes.get_mut(node_id) else {
                debug!(node_id, "Output for removed node dropped");
                return;
            };
            node.output = Some(Arc::clone(&thought));

            let gates: Vec<String> = nodes
                .iter()
                .filter(|(_, node)| match &node.body {
                    NodeBody::Gate { inputs } => {
                        inputs.iter().flatten().any(|upstream| upstream == node_id)
                    }
                    NodeBody::Thought { .. } => false,
                })
                .map(|(id, _)| id.clone())
                .collect();
            gates
                .iter()
                .filter_map(|gate_id| resolve_job(&nodes, gate_id))
                .collect()
        };

        self.store.event_bus().emit_lossy(MindEvent::ThoughtPublished {
            node_id: node_id.to_string(),
            source,
            loop_bars: thought.meta.loop_bars,
            event_count: thought.sequence.len(),
            timestamp: Utc::now(),
        });

        for job in downstream {
            self.resolution.request(job);
        }
    }
}

fn kind_of(node: &GraphNode) -> NodeKind {
    match node.body {
        NodeBody::Thought { .. } => NodeKind::Thought,
        NodeBody::Gate { .. } => NodeKind::Gate,
    }
}

/// Use the requested id, or draw a free `<prefix>_<0..9999>` one
fn claim_id(
    nodes: &HashMap<String, GraphNode>,
    requested: Option<String>,
    prefix: &str,
) -> Result<String> {
    if let Some(id) = requested {
        if id.trim().is_empty() {
            return Err(Error::BadRequest("node_id must not be empty".to_string()));
        }
        if nodes.contains_key(&id) {
            return Err(Error::InvalidState(format!("node {} already exists", id)));
        }
        return Ok(id);
    }

    let mut rng = rand::thread_rng();
    for _ in 0..64 {
        let id = format!("{}_{}", prefix, rng.gen_range(0..10000));
        if !nodes.contains_key(&id) {
            return Ok(id);
        }
    }
    // Dense id space; widen instead of failing
    let mut n = 10000;
    loop {
        let id = format!("{}_{}", prefix, n);
        if !nodes.contains_key(&id) {
            return Ok(id);
        }
        n += 1;
    }
}

fn gate_inputs_mut<'a>(
    nodes: &'a mut HashMap<String, GraphNode>,
    gate_id: &str,
) -> Result<&'a mut Vec<Option<String>>> {
    match nodes.get_mut(gate_id) {
        Some(GraphNode {
            body: NodeBody::Gate { inputs },
            ..
        }) => Ok(inputs),
        Some(_) => Err(Error::BadRequest(format!("{} is not a TheoryGate", gate_id))),
        None => Err(Error::NodeNotFound(gate_id.to_string())),
    }
}

/// True if `from`'s output reaches `to` through gate connections
fn feeds_into(nodes: &HashMap<String, GraphNode>, from: &str, to: &str) -> bool {
    let mut stack = vec![to.to_string()];
    let mut seen = std::collections::HashSet::new();
    while let Some(current) = stack.pop() {
        if !seen.insert(current.clone()) {
            continue;
        }
        if let Some(GraphNode {
            body: NodeBody::Gate { inputs },
            ..
        }) = nodes.get(&current)
        {
            for upstream in inputs.iter().flatten() {
                if upstream == from {
                    return true;
                }
                stack.push(upstream.clone());
            }
        }
    }
    false
}

/// Snapshot the gate's inputs in slot order
fn resolve_job(nodes: &HashMap<String, GraphNode>, gate_id: &str) -> Option<ResolveJob> {
    let gate = nodes.get(gate_id)?;
    let NodeBody::Gate { inputs } = &gate.body else {
        return None;
    };
    Some(ResolveJob {
        node_id: gate_id.to_string(),
        style_profile: gate.style_profile.clone(),
        inputs: inputs
            .iter()
            .map(|upstream| {
                upstream
                    .as_ref()
                    .and_then(|id| nodes.get(id))
                    .and_then(|node| node.output.clone())
            })
            .collect(),
    })
}
