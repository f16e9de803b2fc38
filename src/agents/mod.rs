pub mod orchestrator;
pub mod presenter;
pub mod registry;
pub mod router;

use crate::llm::ResponseContract;
use crate::types::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

// Re-export commonly used types
pub use orchestrator::{Orchestrator, TurnOutput};
pub use registry::{AgentRegistry, AgentRegistryBuilder};
pub use router::Classification;

/// Closed set of agent identities known to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    /// Classifier that is always consulted first
    Zene,
    /// Retrieval aggregator
    Finn,
    /// Casual chat responder
    Commet,
    /// Concept explanation responder
    Milo,
    /// Problem solving responder
    Thalia,
    /// Conversation summarizer used by resets
    Summary,
}

impl AgentId {
    pub const ALL: [AgentId; 6] = [
        AgentId::Zene,
        AgentId::Finn,
        AgentId::Commet,
        AgentId::Milo,
        AgentId::Thalia,
        AgentId::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Zene => "zene",
            AgentId::Finn => "finn",
            AgentId::Commet => "commet",
            AgentId::Milo => "milo",
            AgentId::Thalia => "thalia",
            AgentId::Summary => "summary",
        }
    }

    /// Capability an agent with this identity must be configured with.
    pub fn expected_capability(&self) -> Capability {
        match self {
            AgentId::Zene => Capability::Router,
            AgentId::Finn => Capability::Retriever,
            AgentId::Commet | AgentId::Milo | AgentId::Thalia => Capability::Responder,
            AgentId::Summary => Capability::Summarizer,
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        AgentId::ALL
            .into_iter()
            .find(|id| id.as_str() == lowered)
            .ok_or_else(|| AppError::UnknownAgent(s.to_string()))
    }
}

/// Responder identities the router may hand a turn to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Responder {
    Commet,
    Milo,
    Thalia,
}

impl Responder {
    pub const ALL: [Responder; 3] = [Responder::Commet, Responder::Milo, Responder::Thalia];

    /// Parse a router-produced agent name. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "commet" | "comet" => Some(Responder::Commet),
            "milo" => Some(Responder::Milo),
            "thalia" => Some(Responder::Thalia),
            _ => None,
        }
    }

    pub fn agent_id(&self) -> AgentId {
        match self {
            Responder::Commet => AgentId::Commet,
            Responder::Milo => AgentId::Milo,
            Responder::Thalia => AgentId::Thalia,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Router,
    Retriever,
    Responder,
    Summarizer,
}

/// Which conversations an operator command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentSelector {
    All,
    One(AgentId),
}

impl FromStr for AgentSelector {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(AgentSelector::All)
        } else {
            s.parse().map(AgentSelector::One)
        }
    }
}

/// Model routing policy of an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPolicy {
    pub model: String,
    pub temperature: f32,
}

/// Immutable description of one agent, loaded at startup.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub id: AgentId,
    pub capability: Capability,
    pub instructions: String,
    pub response_contract: Option<ResponseContract>,
    pub model_policy: ModelPolicy,
    /// Whether the agent's own bounded history is sent with each call
    pub include_history: bool,
}
