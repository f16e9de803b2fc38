//! Conversation management handlers.
//!
//! Inspect, reset and delete the per-agent conversations of a user.

use crate::{
    agents::{AgentId, AgentSelector},
    types::{
        AgentSummary, AppError, ConversationRecord, DeleteResponse, ResetRequest, ResetResponse,
        Result,
    },
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct DeleteQuery {
    /// Agent id or `all`; defaults to `all`
    pub agent: Option<String>,
}

/// Get the stored conversation between a user and one agent.
#[utoipa::path(
    get,
    path = "/api/conversations/{user_id}/{agent}",
    params(
        ("user_id" = String, Path, description = "User ID"),
        ("agent" = String, Path, description = "Agent ID")
    ),
    responses(
        (status = 200, description = "Conversation record", body = ConversationRecord),
        (status = 404, description = "Unknown agent or no conversation yet")
    ),
    tag = "conversations"
)]
pub async fn get_conversation(
    State(state): State<AppState>,
    Path((user_id, agent)): Path<(String, String)>,
) -> Result<Json<ConversationRecord>> {
    let agent: AgentId = agent.parse()?;
    state
        .orchestrator
        .load_conversation(&user_id, agent)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no {} conversation for user {}", agent, user_id)))
}

/// Summarize and collapse one or all conversations of a user.
#[utoipa::path(
    post,
    path = "/api/conversations/{user_id}/reset",
    params(
        ("user_id" = String, Path, description = "User ID")
    ),
    request_body = ResetRequest,
    responses(
        (status = 200, description = "Summaries per agent", body = ResetResponse),
        (status = 404, description = "Unknown agent"),
        (status = 502, description = "Summarization call failed")
    ),
    tag = "conversations"
)]
pub async fn reset_conversation(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<ResetRequest>,
) -> Result<Json<ResetResponse>> {
    let selector: AgentSelector = payload.agent.parse()?;
    let _guard = state.user_locks.acquire(&user_id).await;

    let summaries = state
        .orchestrator
        .reset_conversation(&user_id, selector)
        .await?
        .into_iter()
        .map(|(agent, summary)| AgentSummary { agent, summary })
        .collect();

    Ok(Json(ResetResponse { summaries }))
}

/// Delete one or all conversations of a user.
#[utoipa::path(
    delete,
    path = "/api/conversations/{user_id}",
    params(
        ("user_id" = String, Path, description = "User ID"),
        DeleteQuery
    ),
    responses(
        (status = 200, description = "Number of deleted conversations", body = DeleteResponse),
        (status = 404, description = "Unknown agent")
    ),
    tag = "conversations"
)]
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteResponse>> {
    let selector: AgentSelector = query.agent.as_deref().unwrap_or("all").parse()?;
    let _guard = state.user_locks.acquire(&user_id).await;

    let deleted = state
        .orchestrator
        .delete_conversation(&user_id, selector)
        .await?;

    Ok(Json(DeleteResponse { deleted }))
}
