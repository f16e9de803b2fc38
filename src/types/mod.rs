use crate::agents::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============= API Request/Response Types =============

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TurnRequest {
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TurnResponse {
    pub turn_id: String,
    #[schema(value_type = Object)]
    pub payload: DisplayPayload,
    pub flow: Vec<FlowStep>,
    pub state: TurnState,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResetRequest {
    /// Agent id or `"all"`
    pub agent: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResetResponse {
    pub summaries: Vec<AgentSummary>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AgentSummary {
    pub agent: AgentId,
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub deleted: u64,
}

// ============= Conversation Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Token accounting for one remote generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Usage {
    pub prompt_units: u32,
    pub completion_units: u32,
    pub total_units: u32,
    pub latency_seconds: f64,
    pub model_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InteractionAction {
    ConversationReset,
}

/// One entry of the append-only audit trail of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InteractionRecord {
    pub query: String,
    pub response: String,
    pub usage: Usage,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<InteractionAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Durable state of one (user, agent) conversation.
///
/// `messages` is the bounded working window fed back to the model;
/// `interaction_log` only ever grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConversationRecord {
    pub user_id: String,
    pub agent_id: AgentId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub interaction_log: Vec<InteractionRecord>,
}

impl ConversationRecord {
    pub fn new(user_id: impl Into<String>, agent_id: AgentId) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            agent_id,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            interaction_log: Vec::new(),
        }
    }
}

// ============= Turn Types =============

/// One entry of the per-turn trace. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FlowStep {
    /// `"user"` or the id of the agent that produced `content`
    pub role: String,
    #[schema(value_type = Object)]
    pub content: serde_json::Value,
}

impl FlowStep {
    pub fn user(message: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: serde_json::Value::String(message.to_string()),
        }
    }

    pub fn agent(agent: AgentId, content: serde_json::Value) -> Self {
        Self {
            role: agent.as_str().to_string(),
            content,
        }
    }
}

/// What the caller shows to the end user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DisplayPayload {
    Text(String),
    Structured(serde_json::Value),
}

impl DisplayPayload {
    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            DisplayPayload::Structured(value) => Some(value),
            DisplayPayload::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DisplayPayload::Text(text) => Some(text),
            DisplayPayload::Structured(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Start,
    Classified,
    Retrieved,
    Routed,
    Done,
    Errored,
}

// ============= Error Types =============

/// Structured output that did not satisfy its response contract.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("response violates contract '{contract}': {reason}")]
pub struct ContractViolation {
    pub contract: String,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors the orchestrator degrades around instead of aborting the turn.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AppError::Generation(_) | AppError::ContractViolation(_))
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Generation(_) => axum::http::StatusCode::BAD_GATEWAY,
            AppError::ContractViolation(_) => axum::http::StatusCode::BAD_GATEWAY,
            AppError::UnknownAgent(_) => axum::http::StatusCode::NOT_FOUND,
            AppError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            AppError::Store(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidInput(_) => axum::http::StatusCode::BAD_REQUEST,
            AppError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
