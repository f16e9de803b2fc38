use crate::{
    types::{Result, TurnRequest, TurnResponse},
    AppState,
};
use axum::{extract::State, Json};
use tracing::info;
use uuid::Uuid;

/// Process one user message through the agent pipeline.
///
/// Turns of the same user are handled one at a time.
#[utoipa::path(
    post,
    path = "/api/turns",
    request_body = TurnRequest,
    responses(
        (status = 200, description = "Turn processed", body = TurnResponse),
        (status = 400, description = "Empty user id or message"),
        (status = 404, description = "Router named an agent that is not configured"),
        (status = 502, description = "Classification call failed")
    ),
    tag = "turns"
)]
pub async fn process_turn(
    State(state): State<AppState>,
    Json(payload): Json<TurnRequest>,
) -> Result<Json<TurnResponse>> {
    let turn_id = Uuid::new_v4().to_string();
    let _guard = state.user_locks.acquire(&payload.user_id).await;

    let output = state
        .orchestrator
        .process_turn(&payload.user_id, &payload.message)
        .await?;

    info!(
        turn_id = %turn_id,
        user_id = %payload.user_id,
        state = ?output.state,
        steps = output.flow.len(),
        "Turn completed"
    );

    Ok(Json(TurnResponse {
        turn_id,
        payload: output.payload,
        flow: output.flow,
        state: output.state,
    }))
}
