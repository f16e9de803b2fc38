//! Turn orchestration.
//!
//! One turn walks `Start → Classified → Retrieved (optional) → Routed → Done`.
//! `Errored` is terminal and means the router's own output is what the user
//! gets back. Every agent call is persisted as soon as it returns, so an
//! abandoned turn keeps the dispatches that already happened.

use crate::agents::presenter::present;
use crate::agents::router::Classification;
use crate::agents::{AgentId, AgentRegistry, AgentSelector, AgentSpec};
use crate::db::ConversationStore;
use crate::llm::{Completion, CompletionGateway};
use crate::memory::{HistoryManager, ResetOutcome};
use crate::telemetry::Telemetry;
use crate::types::{
    AppError, ConversationRecord, DisplayPayload, FlowStep, InteractionRecord, Message, Result,
    TurnState, Usage,
};
use crate::utils::toml_config::OrchestratorConfig;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of one processed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutput {
    pub payload: DisplayPayload,
    /// Every agent that answered, in call order, after the user's message
    pub flow: Vec<FlowStep>,
    pub state: TurnState,
}

pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    gateway: Arc<CompletionGateway>,
    store: Arc<dyn ConversationStore>,
    history: HistoryManager,
    telemetry: Telemetry,
    settings: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<AgentRegistry>,
        gateway: Arc<CompletionGateway>,
        store: Arc<dyn ConversationStore>,
        history: HistoryManager,
        telemetry: Telemetry,
        settings: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            gateway,
            store,
            history,
            telemetry,
            settings,
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Run one user message through classify, retrieve, route and respond.
    ///
    /// Fails only when the classification call itself fails, when the store
    /// fails, or when the router names a responder that is not configured.
    #[instrument(skip(self, message))]
    pub async fn process_turn(&self, user_id: &str, message: &str) -> Result<TurnOutput> {
        if user_id.trim().is_empty() {
            return Err(AppError::InvalidInput("user_id must not be empty".to_string()));
        }
        if message.trim().is_empty() {
            return Err(AppError::InvalidInput("message must not be empty".to_string()));
        }

        let result = self.run_turn(user_id, message).await;
        match &result {
            Ok(output) => self.telemetry.record_turn(output.state == TurnState::Errored),
            Err(_) => self.telemetry.record_turn(true),
        }
        result
    }

    async fn run_turn(&self, user_id: &str, message: &str) -> Result<TurnOutput> {
        let mut state = TurnState::Start;
        let mut flow = vec![FlowStep::user(message)];

        let router = self.registry.router()?;
        let routed = self.dispatch(user_id, router, message.to_string()).await?;
        let classifier_payload = routed.payload();
        flow.push(FlowStep::agent(router.id, classifier_payload.clone()));

        let classification = match routed.parsed().and_then(|value| Classification::parse(&value)) {
            Ok(classification) => classification,
            Err(violation) => {
                warn!(%violation, "Classification unusable, returning router output");
                advance(&mut state, TurnState::Errored);
                return Ok(TurnOutput {
                    payload: DisplayPayload::Structured(classifier_payload),
                    flow,
                    state,
                });
            }
        };
        advance(&mut state, TurnState::Classified);

        let context = self
            .retrieve(user_id, &classification.retrieval_queries, &mut flow)
            .await?;
        if !context.is_empty() {
            advance(&mut state, TurnState::Retrieved);
        }

        let Some(responder) = classification.next_agent else {
            if let Some(ref name) = classification.raw_next_agent {
                warn!(next_agent = %name, "Router named an unknown responder");
            }
            advance(&mut state, TurnState::Done);
            return Ok(TurnOutput {
                payload: DisplayPayload::Structured(classifier_payload),
                flow,
                state,
            });
        };
        let spec = self.registry.get(responder.agent_id())?;
        let prompt = augmented_prompt(message, &context, &classification.user_intent);
        advance(&mut state, TurnState::Routed);

        let reply = match self.dispatch(user_id, spec, prompt).await {
            Ok(completion) => completion.parsed(),
            Err(e) if e.is_recoverable() => {
                warn!(responder = %spec.id, error = %e, "Responder failed, returning router output");
                advance(&mut state, TurnState::Errored);
                return Ok(TurnOutput {
                    payload: DisplayPayload::Structured(classifier_payload),
                    flow,
                    state,
                });
            }
            Err(e) => return Err(e),
        };

        let shaped = reply.and_then(|value| {
            flow.push(FlowStep::agent(spec.id, value.clone()));
            present(responder, &value)
        });

        let payload = match shaped {
            Ok(payload) => {
                advance(&mut state, TurnState::Done);
                payload
            }
            Err(violation) => {
                warn!(responder = %spec.id, %violation, "Responder reply unusable, returning router output");
                advance(&mut state, TurnState::Errored);
                DisplayPayload::Structured(classifier_payload)
            }
        };

        Ok(TurnOutput {
            payload,
            flow,
            state,
        })
    }

    /// Send up to `max_retrieval_queries` queries to the retriever and collect
    /// their context. Generation failures are logged and skipped.
    async fn retrieve(
        &self,
        user_id: &str,
        queries: &[String],
        flow: &mut Vec<FlowStep>,
    ) -> Result<Vec<Value>> {
        let mut context = Vec::new();
        if queries.is_empty() || self.settings.max_retrieval_queries == 0 {
            return Ok(context);
        }

        let retriever = match self.registry.retriever() {
            Ok(spec) => spec,
            Err(e) => {
                warn!(error = %e, "Retrieval requested but no retriever is configured");
                return Ok(context);
            }
        };

        for query in queries.iter().take(self.settings.max_retrieval_queries) {
            let completion = match self.dispatch(user_id, retriever, query.clone()).await {
                Ok(completion) => completion,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "Retrieval failed, continuing without context");
                    continue;
                }
                Err(e) => return Err(e),
            };

            match completion.parsed() {
                Ok(reply) => {
                    context.push(retrieval_summary(
                        &reply,
                        &self.settings.retrieval_summary_field,
                    ));
                    flow.push(FlowStep::agent(retriever.id, reply));
                }
                Err(violation) => {
                    warn!(%violation, "Retriever reply unusable, continuing without context");
                }
            }
        }

        Ok(context)
    }

    /// Call one agent and persist the exchange, successful or not.
    async fn dispatch(&self, user_id: &str, spec: &AgentSpec, prompt: String) -> Result<Completion> {
        let mut record = self
            .store
            .load(user_id, spec.id)
            .await?
            .unwrap_or_else(|| ConversationRecord::new(user_id, spec.id));

        let mut window = if spec.include_history {
            record.messages.clone()
        } else {
            Vec::new()
        };
        window.push(Message::user(prompt.as_str()));

        let result = self
            .gateway
            .complete(
                &spec.instructions,
                &window,
                spec.response_contract.as_ref(),
                &spec.model_policy,
            )
            .await;

        match &result {
            Ok(completion) => {
                record.interaction_log.push(InteractionRecord {
                    query: prompt.clone(),
                    response: completion.content.clone(),
                    usage: completion.usage.clone(),
                    timestamp: Utc::now(),
                    action: None,
                    error: completion.parsed().err().map(|v| v.to_string()),
                });
                self.history.append(
                    &mut record,
                    Message::user(prompt),
                    Message::assistant(completion.content.as_str()),
                );
            }
            Err(e) => {
                record.interaction_log.push(InteractionRecord {
                    query: prompt,
                    response: String::new(),
                    usage: Usage {
                        model_id: spec.model_policy.model.clone(),
                        ..Usage::default()
                    },
                    timestamp: Utc::now(),
                    action: None,
                    error: Some(e.to_string()),
                });
                record.updated_at = Utc::now();
            }
        }

        self.store.save(&record).await?;
        info!(
            agent = %spec.id,
            ok = result.is_ok(),
            messages = record.messages.len(),
            "Dispatch persisted"
        );

        result
    }

    /// Collapse the selected conversations into summaries.
    ///
    /// Empty conversations are reported with a sentinel text and not written.
    /// Agents are reset one at a time and each is saved as soon as it is
    /// summarized. If a summary call fails the error is returned, and the
    /// agents reset before it stay reset.
    #[instrument(skip(self))]
    pub async fn reset_conversation(
        &self,
        user_id: &str,
        selector: AgentSelector,
    ) -> Result<Vec<(AgentId, String)>> {
        let summarizer = self.registry.summarizer()?;
        let mut summaries = Vec::new();

        for agent in self.selected_agents(selector)? {
            let mut record = self
                .store
                .load(user_id, agent)
                .await?
                .unwrap_or_else(|| ConversationRecord::new(user_id, agent));

            let outcome = self
                .history
                .reset_and_summarize(&mut record, &self.gateway, summarizer)
                .await?;
            if let ResetOutcome::Summarized(_) = outcome {
                self.store.save(&record).await?;
            }
            summaries.push((agent, outcome.into_text()));
        }

        Ok(summaries)
    }

    /// Delete the selected conversations. Returns the number of records removed.
    #[instrument(skip(self))]
    pub async fn delete_conversation(&self, user_id: &str, selector: AgentSelector) -> Result<u64> {
        let agent = match selector {
            AgentSelector::All => None,
            AgentSelector::One(agent) => Some(agent),
        };
        let deleted = self.store.delete(user_id, agent).await?;
        info!(deleted, "Conversations deleted");
        Ok(deleted)
    }

    pub async fn load_conversation(
        &self,
        user_id: &str,
        agent: AgentId,
    ) -> Result<Option<ConversationRecord>> {
        self.store.load(user_id, agent).await
    }

    fn selected_agents(&self, selector: AgentSelector) -> Result<Vec<AgentId>> {
        match selector {
            AgentSelector::All => Ok(self.registry.conversational_agents()),
            AgentSelector::One(agent) => {
                self.registry.get(agent)?;
                Ok(vec![agent])
            }
        }
    }
}

/// The responder prompt: the user's message plus retrieval context and the
/// router's reading of the intent, when there are any.
pub fn augmented_prompt(message: &str, context: &[Value], user_intent: &str) -> String {
    let mut prompt = message.to_string();
    if !context.is_empty() {
        prompt.push_str("\nAdditional context: ");
        prompt.push_str(&Value::Array(context.to_vec()).to_string());
    }
    if !user_intent.trim().is_empty() {
        prompt.push_str("\nUser intent: ");
        prompt.push_str(user_intent);
    }
    prompt
}

/// The `field` of a retriever reply, looked up at the top level and then
/// inside `sections`; the whole reply when absent.
pub fn retrieval_summary(reply: &Value, field: &str) -> Value {
    if let Some(summary) = reply.get(field) {
        return summary.clone();
    }

    let nested: Vec<Value> = reply
        .get("sections")
        .and_then(Value::as_array)
        .map(|sections| {
            sections
                .iter()
                .filter_map(|section| section.get(field).cloned())
                .collect()
        })
        .unwrap_or_default();
    if nested.is_empty() {
        reply.clone()
    } else {
        Value::Array(nested)
    }
}

fn advance(state: &mut TurnState, next: TurnState) {
    debug!(from = ?state, to = ?next, "Turn state");
    *state = next;
}
