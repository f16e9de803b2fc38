//! OpenAPI document, served as JSON at `/api/openapi.json`.

use axum::Json;
use utoipa::OpenApi;

use crate::{
    agents::{AgentId, Capability},
    api::handlers::{agents::AgentInfo, health::HealthResponse},
    telemetry::{ModelStats, TelemetrySnapshot},
    types::{
        AgentSummary, ConversationRecord, DeleteResponse, FlowStep, InteractionAction,
        InteractionRecord, Message, MessageRole, ResetRequest, ResetResponse, TurnRequest,
        TurnResponse, TurnState, Usage,
    },
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mioo API",
        description = "Multi-agent orchestration server.

Every turn is classified by the router agent, optionally enriched by the
retriever agent and answered by exactly one responder agent. Conversations
are kept per user and per agent."
    ),
    paths(
        crate::api::handlers::health::health,
        crate::api::handlers::agents::list_agents,
        crate::api::handlers::turns::process_turn,
        crate::api::handlers::conversations::get_conversation,
        crate::api::handlers::conversations::reset_conversation,
        crate::api::handlers::conversations::delete_conversation,
        crate::api::handlers::usage::get_usage,
    ),
    components(schemas(
        AgentId,
        Capability,
        AgentInfo,
        HealthResponse,
        TurnRequest,
        TurnResponse,
        TurnState,
        FlowStep,
        ResetRequest,
        ResetResponse,
        AgentSummary,
        DeleteResponse,
        ConversationRecord,
        InteractionRecord,
        InteractionAction,
        Message,
        MessageRole,
        Usage,
        TelemetrySnapshot,
        ModelStats,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "agents", description = "Agent registry"),
        (name = "turns", description = "Turn processing"),
        (name = "conversations", description = "Per-agent conversation state"),
        (name = "usage", description = "Usage accounting")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
