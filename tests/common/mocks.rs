//! Mock implementations for testing.
//!
//! This module provides a scripted LLM client, store wrappers and a harness
//! that wires them into a real orchestrator, so test files do not duplicate
//! the setup.

use async_trait::async_trait;
use mioo::agents::{AgentId, AgentRegistryBuilder, AgentSpec, ModelPolicy, Orchestrator};
use mioo::db::{ConversationStore, TursoClient};
use mioo::llm::client::{ChatRequest, ChatResponse, LLMClient, ProviderError};
use mioo::llm::{CompletionGateway, ProviderRegistry, ResponseContract, RetryPolicy};
use mioo::memory::HistoryManager;
use mioo::telemetry::Telemetry;
use mioo::types::{AppError, ConversationRecord, Result};
use mioo::utils::toml_config::OrchestratorConfig;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const TEST_MODEL: &str = "test-model";

/// Instructions of the test agent with this id. The scripted client tells
/// agents apart by their system message.
pub fn instructions_for(agent: AgentId) -> String {
    format!("You are the {} test agent.", agent)
}

/// LLM client whose replies are scripted per agent.
///
/// Queued replies are consumed first; after that the agent's standing reply is
/// returned. An agent with neither gets a provider error.
#[derive(Default)]
pub struct ScriptedClient {
    queued: Mutex<HashMap<String, VecDeque<std::result::Result<String, ProviderError>>>>,
    standing: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `content` every time `agent` is called
    pub fn reply(&self, agent: AgentId, content: impl Into<String>) -> &Self {
        self.standing
            .lock()
            .insert(instructions_for(agent), content.into());
        self
    }

    /// Reply with `value` serialized as JSON every time `agent` is called
    pub fn reply_json(&self, agent: AgentId, value: Value) -> &Self {
        self.reply(agent, value.to_string())
    }

    /// Queue one outcome for the next call of `agent`
    pub fn enqueue(
        &self,
        agent: AgentId,
        outcome: std::result::Result<String, ProviderError>,
    ) -> &Self {
        self.queued
            .lock()
            .entry(instructions_for(agent))
            .or_default()
            .push_back(outcome);
        self
    }

    /// Every request received, in order
    pub fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().clone()
    }

    /// Requests sent on behalf of `agent`
    pub fn calls_for(&self, agent: AgentId) -> Vec<ChatRequest> {
        let instructions = instructions_for(agent);
        self.calls
            .lock()
            .iter()
            .filter(|request| request.instructions() == instructions)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LLMClient for ScriptedClient {
    async fn chat(&self, request: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
        self.calls.lock().push(request.clone());
        let key = request.instructions().to_string();

        let queued = self
            .queued
            .lock()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front());
        let outcome = match queued {
            Some(outcome) => outcome,
            None => self
                .standing
                .lock()
                .get(&key)
                .cloned()
                .ok_or_else(|| ProviderError::Other(format!("no scripted reply for '{}'", key))),
        };

        outcome.map(|content| ChatResponse {
            content,
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
            model: request.model.clone(),
        })
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

/// Store wrapper counting every write
pub struct CountingStore {
    inner: Arc<dyn ConversationStore>,
    saves: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn ConversationStore>) -> Self {
        Self {
            inner,
            saves: AtomicUsize::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationStore for CountingStore {
    async fn load(&self, user_id: &str, agent: AgentId) -> Result<Option<ConversationRecord>> {
        self.inner.load(user_id, agent).await
    }

    async fn save(&self, record: &ConversationRecord) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(record).await
    }

    async fn delete(&self, user_id: &str, agent: Option<AgentId>) -> Result<u64> {
        self.inner.delete(user_id, agent).await
    }
}

/// Store whose writes always fail
pub struct FailingStore;

#[async_trait]
impl ConversationStore for FailingStore {
    async fn load(&self, _user_id: &str, _agent: AgentId) -> Result<Option<ConversationRecord>> {
        Ok(None)
    }

    async fn save(&self, _record: &ConversationRecord) -> Result<()> {
        Err(AppError::Store("disk full".to_string()))
    }

    async fn delete(&self, _user_id: &str, _agent: Option<AgentId>) -> Result<u64> {
        Err(AppError::Store("disk full".to_string()))
    }
}

/// Contract requiring the given top-level fields
pub fn contract(name: &str, required: &[&str]) -> ResponseContract {
    ResponseContract::new(
        name,
        json!({
            "type": "object",
            "required": required,
        }),
    )
}

fn spec(id: AgentId, contract: Option<ResponseContract>, include_history: bool) -> AgentSpec {
    AgentSpec {
        id,
        capability: id.expected_capability(),
        instructions: instructions_for(id),
        response_contract: contract,
        model_policy: ModelPolicy {
            model: TEST_MODEL.to_string(),
            temperature: 0.0,
        },
        include_history,
    }
}

/// The six standard agents with contracts shaped like the shipped ones
pub fn standard_agents() -> Vec<AgentSpec> {
    vec![
        spec(
            AgentId::Zene,
            Some(contract("classification", &["next_agent", "user_intent"])),
            true,
        ),
        spec(AgentId::Finn, Some(contract("sections", &["sections"])), false),
        spec(AgentId::Commet, Some(contract("chat_response", &["response"])), true),
        spec(
            AgentId::Milo,
            Some(contract("teaching_notes", &["textbook_chapter"])),
            true,
        ),
        spec(AgentId::Thalia, None, true),
        spec(AgentId::Summary, None, false),
    ]
}

/// Everything a test needs to drive and inspect an orchestrator
pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub client: Arc<ScriptedClient>,
    pub store: Arc<dyn ConversationStore>,
    pub telemetry: Telemetry,
}

pub struct HarnessBuilder {
    agents: Vec<AgentSpec>,
    store: Option<Arc<dyn ConversationStore>>,
    settings: OrchestratorConfig,
    token_limit: usize,
    max_attempts: u32,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            agents: standard_agents(),
            store: None,
            settings: OrchestratorConfig::default(),
            token_limit: 10,
            max_attempts: 3,
        }
    }
}

impl HarnessBuilder {
    pub fn without_agent(mut self, id: AgentId) -> Self {
        self.agents.retain(|agent| agent.id != id);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_max_retrieval_queries(mut self, max: usize) -> Self {
        self.settings.max_retrieval_queries = max;
        self
    }

    pub fn with_token_limit(mut self, limit: usize) -> Self {
        self.token_limit = limit;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub async fn build(self) -> Harness {
        let client = Arc::new(ScriptedClient::new());
        let mut providers = ProviderRegistry::new();
        providers.register("scripted", client.clone(), vec![], true);

        let telemetry = Telemetry::new();
        let gateway = Arc::new(CompletionGateway::new(
            Arc::new(providers),
            RetryPolicy::immediate(self.max_attempts),
            telemetry.clone(),
        ));

        let store: Arc<dyn ConversationStore> = match self.store {
            Some(store) => store,
            None => Arc::new(TursoClient::new_memory().await.expect("in-memory store")),
        };

        let registry = self
            .agents
            .into_iter()
            .fold(AgentRegistryBuilder::new(), |builder, spec| builder.with_agent(spec))
            .build()
            .expect("valid registry");

        let orchestrator = Orchestrator::new(
            Arc::new(registry),
            gateway,
            store.clone(),
            HistoryManager::new(self.token_limit),
            telemetry.clone(),
            self.settings,
        );

        Harness {
            orchestrator: Arc::new(orchestrator),
            client,
            store,
            telemetry,
        }
    }
}

pub fn harness() -> HarnessBuilder {
    HarnessBuilder::default()
}

/// A router reply sending the turn to `next_agent`
pub fn classification(next_agent: &str, queries: &[&str]) -> Value {
    json!({
        "topics": ["Indian Economy"],
        "core_topic": "fiscal deficit",
        "user_intent": "understand fiscal deficit",
        "query_category": "concept",
        "next_agent": next_agent,
        "vector_database_retrieval_queries": queries,
    })
}

/// A retriever reply with one section
pub fn sections(report: &str) -> Value {
    json!({
        "sections": [{
            "section_sequential_id": 1,
            "topic": "Public Finance",
            "sub_topic": "Deficits",
            "goals": ["define fiscal deficit"],
            "content": ["Fiscal deficit = total expenditure - total receipts excluding borrowings"],
            "section_250_word_report": report,
            "references": ["Indian Economy, Ramesh Singh"]
        }]
    })
}
