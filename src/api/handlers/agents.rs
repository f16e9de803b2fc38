use crate::{
    agents::{AgentId, Capability},
    AppState,
};
use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

/// Public view of one registered agent.
#[derive(Debug, Serialize, ToSchema)]
pub struct AgentInfo {
    pub id: AgentId,
    pub capability: Capability,
    pub model: String,
    pub temperature: f32,
    /// Name of the response contract, when replies are structured
    pub response_contract: Option<String>,
    pub include_history: bool,
}

/// List the agents loaded at startup.
#[utoipa::path(
    get,
    path = "/api/agents",
    responses(
        (status = 200, description = "Registered agents", body = Vec<AgentInfo>)
    ),
    tag = "agents"
)]
pub async fn list_agents(State(state): State<AppState>) -> Json<Vec<AgentInfo>> {
    let agents = state
        .orchestrator
        .registry()
        .agents()
        .map(|spec| AgentInfo {
            id: spec.id,
            capability: spec.capability,
            model: spec.model_policy.model.clone(),
            temperature: spec.model_policy.temperature,
            response_contract: spec.response_contract.as_ref().map(|c| c.name.clone()),
            include_history: spec.include_history,
        })
        .collect();

    Json(agents)
}
