//! # Mioo - multi-agent orchestration server
//!
//! Mioo routes each user message through a small pipeline of generative-text
//! agents and keeps one durable conversation per (user, agent) pair.
//!
//! ## Overview
//!
//! A turn is handled in four steps:
//!
//! 1. the **router** (`zene`) classifies the message
//! 2. the **retriever** (`finn`) optionally gathers context for it
//! 3. exactly one **responder** (`commet`, `milo` or `thalia`) answers
//! 4. the answer is shaped for display and returned with a flow trace
//!
//! Mioo can be used in two ways:
//!
//! 1. **As a standalone server** - run the `mioo-server` binary
//! 2. **As a library** - embed the [`Orchestrator`] directly
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use mioo::{AppState, MiooConfig};
//!
//! let config = MiooConfig::load("mioo.toml")?;
//! let state = AppState::from_config(config).await?;
//! let output = state.orchestrator.process_turn("user-1", "What is fiscal deficit?").await?;
//! println!("{:?}", output.payload);
//! ```
//!
//! ## Modules
//!
//! - [`agents`] - agent identities, registry and the turn orchestrator
//! - [`api`] - REST API handlers and routes
//! - [`db`] - conversation store (libsql: memory, SQLite file, Turso)
//! - [`llm`] - provider clients and the completion gateway
//! - [`memory`] - bounded conversation history
//! - [`telemetry`] - per-model usage accounting
//! - [`types`] - common types and error handling
//! - [`utils`] - TOML configuration

#![warn(rustdoc::missing_crate_level_docs)]

/// Agent identities, registry and orchestration.
pub mod agents;
/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Conversation storage.
pub mod db;
/// LLM provider clients and the completion gateway.
pub mod llm;
/// Bounded conversation history.
pub mod memory;
/// Usage accounting.
pub mod telemetry;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use agents::{AgentId, AgentRegistry, AgentSelector, Orchestrator, TurnOutput};
pub use db::{ConversationStore, DatabaseProvider, TursoClient};
pub use llm::{CompletionGateway, LLMClient, ProviderRegistry};
pub use telemetry::Telemetry;
pub use types::{AppError, Result};
pub use utils::toml_config::{ConfigError, MiooConfig};

use crate::api::locks::UserLocks;
use crate::memory::HistoryManager;
use std::sync::Arc;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Configuration loaded at startup
    pub config: Arc<MiooConfig>,
    /// The turn engine
    pub orchestrator: Arc<Orchestrator>,
    /// Usage accounting shared with the gateway
    pub telemetry: Telemetry,
    /// Serializes concurrent requests of the same user
    pub user_locks: Arc<UserLocks>,
}

impl AppState {
    /// Wire every component described by the configuration
    pub async fn from_config(config: MiooConfig) -> Result<Self> {
        let telemetry = Telemetry::new();

        let providers = Arc::new(ProviderRegistry::from_config(&config)?);
        let gateway = Arc::new(CompletionGateway::new(
            providers,
            config.gateway.retry.policy(),
            telemetry.clone(),
        ));

        let database = config.database_provider()?;
        let store = database.create_store().await?;
        info!(database = %database.describe(), "Conversation store ready");

        let registry = Arc::new(AgentRegistry::from_config(&config)?);
        info!(agents = registry.agents().count(), "Agent registry loaded");

        let orchestrator = Orchestrator::new(
            registry,
            gateway,
            store,
            HistoryManager::new(config.history.token_limit),
            telemetry.clone(),
            config.orchestrator.clone(),
        );

        Ok(Self::new(Arc::new(config), Arc::new(orchestrator), telemetry))
    }

    /// Assemble state from already built parts
    pub fn new(config: Arc<MiooConfig>, orchestrator: Arc<Orchestrator>, telemetry: Telemetry) -> Self {
        Self {
            config,
            orchestrator,
            telemetry,
            user_locks: Arc::new(UserLocks::default()),
        }
    }
}
