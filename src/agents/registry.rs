//! Agent Registry
//!
//! Static catalog of the agents this process can dispatch to. It is built once
//! from `mioo.toml` (instructions and contracts may live in separate files) and
//! is read-only afterwards.

use crate::agents::{AgentId, AgentSpec, Capability, ModelPolicy};
use crate::llm::ResponseContract;
use crate::types::{AppError, Result};
use crate::utils::toml_config::{AgentConfig, ConfigError, MiooConfig};
use std::collections::BTreeMap;
use std::fs;

/// Registry of immutable agent specifications
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentId, AgentSpec>,
}

impl AgentRegistry {
    /// Build the registry from configuration, loading referenced files
    pub fn from_config(config: &MiooConfig) -> std::result::Result<Self, ConfigError> {
        let mut builder = AgentRegistryBuilder::new();
        for (name, agent_config) in &config.agents {
            let id: AgentId = name
                .parse()
                .map_err(|_| ConfigError::UnknownAgent(name.clone()))?;
            let spec = Self::load_spec(config, id, agent_config)?;
            builder = builder.with_agent(spec);
        }
        builder.build()
    }

    fn load_spec(
        config: &MiooConfig,
        id: AgentId,
        agent_config: &AgentConfig,
    ) -> std::result::Result<AgentSpec, ConfigError> {
        let instructions = match (&agent_config.instructions, &agent_config.instructions_file) {
            (Some(text), _) => text.clone(),
            (None, Some(file)) => fs::read_to_string(config.resolve_path(file))?,
            (None, None) => return Err(ConfigError::MissingInstructions(id.to_string())),
        };

        let contract_text = match (
            &agent_config.response_contract,
            &agent_config.response_contract_file,
        ) {
            (Some(inline), _) => Some(inline.clone()),
            (None, Some(file)) => Some(fs::read_to_string(config.resolve_path(file))?),
            (None, None) => None,
        };
        let default_contract_name = format!("{}_response", id);
        let response_contract = contract_text
            .map(|text| ResponseContract::from_json(&text, &default_contract_name))
            .transpose()
            .map_err(|reason| ConfigError::InvalidContract {
                agent: id.to_string(),
                reason,
            })?;

        Ok(AgentSpec {
            id,
            capability: agent_config.capability,
            instructions,
            response_contract,
            model_policy: ModelPolicy {
                model: agent_config.model.clone(),
                temperature: agent_config
                    .temperature
                    .unwrap_or(config.gateway.temperature),
            },
            include_history: agent_config.include_history,
        })
    }

    /// Look up an agent
    pub fn get(&self, id: AgentId) -> Result<&AgentSpec> {
        self.agents
            .get(&id)
            .ok_or_else(|| AppError::UnknownAgent(id.to_string()))
    }

    pub fn has_agent(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    /// The router, always consulted first
    pub fn router(&self) -> Result<&AgentSpec> {
        self.by_capability(Capability::Router)
    }

    pub fn retriever(&self) -> Result<&AgentSpec> {
        self.by_capability(Capability::Retriever)
    }

    pub fn summarizer(&self) -> Result<&AgentSpec> {
        self.by_capability(Capability::Summarizer)
    }

    fn by_capability(&self, capability: Capability) -> Result<&AgentSpec> {
        self.agents
            .values()
            .find(|spec| spec.capability == capability)
            .ok_or_else(|| {
                AppError::UnknownAgent(format!("no {:?} agent configured", capability).to_lowercase())
            })
    }

    /// All agents in id order
    pub fn agents(&self) -> impl Iterator<Item = &AgentSpec> {
        self.agents.values()
    }

    /// Agents that keep a conversation record, in id order
    pub fn conversational_agents(&self) -> Vec<AgentId> {
        self.agents
            .values()
            .filter(|spec| spec.capability != Capability::Summarizer)
            .map(|spec| spec.id)
            .collect()
    }
}

/// Builder for assembling a registry by hand
#[derive(Debug, Default)]
pub struct AgentRegistryBuilder {
    agents: BTreeMap<AgentId, AgentSpec>,
}

impl AgentRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, spec: AgentSpec) -> Self {
        self.agents.insert(spec.id, spec);
        self
    }

    /// Validate and build the registry
    pub fn build(self) -> std::result::Result<AgentRegistry, ConfigError> {
        let mut routers = 0;
        for spec in self.agents.values() {
            let expected = spec.id.expected_capability();
            if spec.capability != expected {
                return Err(ConfigError::CapabilityMismatch {
                    agent: spec.id.to_string(),
                    expected,
                    found: spec.capability,
                });
            }
            if spec.instructions.trim().is_empty() {
                return Err(ConfigError::MissingInstructions(spec.id.to_string()));
            }
            if spec.capability == Capability::Router {
                routers += 1;
            }
        }

        if routers == 0 {
            return Err(ConfigError::MissingRouter);
        }

        Ok(AgentRegistry {
            agents: self.agents,
        })
    }
}
