//! HTTP request handlers

use crate::api::server::AppContext;
use crate::error::Result;
use crate::graph::{GateNodeProps, NodeUpdate, NodeView, ThoughtNodeProps};
use crate::scheduler::AudioStateSummary;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mind_common::api::ProfilesResponse;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub nodes: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateThoughtRequest {
    pub node_id: Option<String>,
    pub intent_text: Option<String>,
    pub style_profile: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateGateRequest {
    pub node_id: Option<String>,
    pub inputs: Option<usize>,
    pub style_profile: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateNodeRequest {
    pub intent_text: Option<String>,
    pub style_profile: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectInputRequest {
    /// Upstream node whose output feeds the slot
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct NodeDetail {
    #[serde(flatten)]
    pub node: NodeView,
    pub audio: Option<AudioStateSummary>,
}

// ============================================================================
// Health & Profiles
// ============================================================================

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "mind-rt".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        nodes: ctx.store.snapshot().len(),
    })
}

/// GET /profiles
pub async fn list_profiles(State(ctx): State<AppContext>) -> Json<ProfilesResponse> {
    Json(ProfilesResponse {
        profiles: ctx.graph.catalog().profiles().to_vec(),
    })
}

// ============================================================================
// Nodes
// ============================================================================

/// GET /nodes
pub async fn list_nodes(State(ctx): State<AppContext>) -> Json<Vec<NodeView>> {
    Json(ctx.graph.views())
}

/// GET /nodes/:node_id
pub async fn get_node(
    State(ctx): State<AppContext>,
    Path(node_id): Path<String>,
) -> Result<Json<NodeDetail>> {
    let node = ctx.graph.view(&node_id)?;
    Ok(Json(NodeDetail {
        node,
        audio: ctx.scheduler.summary(&node_id),
    }))
}

/// POST /nodes/thought
pub async fn create_thought_node(
    State(ctx): State<AppContext>,
    Json(req): Json<CreateThoughtRequest>,
) -> Result<(StatusCode, Json<NodeView>)> {
    debug!(?req, "Create MusicalThought");
    let view = ctx.graph.add_thought_node(ThoughtNodeProps {
        node_id: req.node_id,
        intent_text: req.intent_text,
        style_profile: req.style_profile,
    })?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// POST /nodes/gate
pub async fn create_gate_node(
    State(ctx): State<AppContext>,
    Json(req): Json<CreateGateRequest>,
) -> Result<(StatusCode, Json<NodeView>)> {
    debug!(?req, "Create TheoryGate");
    let view = ctx.graph.add_gate_node(GateNodeProps {
        node_id: req.node_id,
        inputs: req.inputs,
        style_profile: req.style_profile,
    })?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// PATCH /nodes/:node_id
pub async fn update_node(
    State(ctx): State<AppContext>,
    Path(node_id): Path<String>,
    Json(req): Json<UpdateNodeRequest>,
) -> Result<Json<NodeView>> {
    let view = ctx.graph.update_node(
        &node_id,
        NodeUpdate {
            intent_text: req.intent_text,
            style_profile: req.style_profile,
        },
    )?;
    Ok(Json(view))
}

/// PUT /nodes/:node_id/inputs/:slot
pub async fn connect_input(
    State(ctx): State<AppContext>,
    Path((node_id, slot)): Path<(String, usize)>,
    Json(req): Json<ConnectInputRequest>,
) -> Result<Json<NodeView>> {
    let view = ctx.graph.connect(&node_id, slot, &req.source)?;
    Ok(Json(view))
}

/// DELETE /nodes/:node_id/inputs/:slot
pub async fn disconnect_input(
    State(ctx): State<AppContext>,
    Path((node_id, slot)): Path<(String, usize)>,
) -> Result<Json<NodeView>> {
    let view = ctx.graph.disconnect(&node_id, slot)?;
    Ok(Json(view))
}
