//! Completion gateway
//!
//! The single entry point the rest of the crate uses to talk to a model. It
//! hides provider selection, retries transient failures and checks structured
//! replies against the agent's response contract.

use crate::agents::ModelPolicy;
use crate::llm::client::{ChatRequest, ProviderError};
use crate::llm::contract::{fallback_payload, ResponseContract};
use crate::llm::provider_registry::ProviderRegistry;
use crate::llm::retry::{retry_with_backoff, RetryPolicy};
use crate::telemetry::Telemetry;
use crate::types::{AppError, ContractViolation, Message, Result, Usage};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of checking a reply against its contract.
#[derive(Debug, Clone, PartialEq)]
pub enum Structured {
    /// The agent has no contract
    Unstructured,
    Valid(Value),
    /// The reply broke its contract; `payload` replaces it
    Fallback {
        payload: Value,
        violation: ContractViolation,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Raw text returned by the provider
    pub content: String,
    pub usage: Usage,
    pub latency: Duration,
    pub structured: Structured,
}

impl Completion {
    /// The contract-checked reply, or the violation that replaced it.
    ///
    /// Replies of agents without a contract must still be a JSON object.
    pub fn parsed(&self) -> std::result::Result<Value, ContractViolation> {
        match &self.structured {
            Structured::Valid(value) => Ok(value.clone()),
            Structured::Fallback { violation, .. } => Err(violation.clone()),
            Structured::Unstructured => ResponseContract::new("none", Value::Null).check(&self.content),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.structured, Structured::Fallback { .. })
    }

    /// Best JSON rendering of the reply: the checked object, the fallback
    /// payload, or the raw text.
    pub fn payload(&self) -> Value {
        match &self.structured {
            Structured::Valid(value) => value.clone(),
            Structured::Fallback { payload, .. } => payload.clone(),
            Structured::Unstructured => serde_json::from_str(&self.content)
                .unwrap_or_else(|_| Value::String(self.content.clone())),
        }
    }
}

pub struct CompletionGateway {
    providers: Arc<ProviderRegistry>,
    retry: RetryPolicy,
    telemetry: Telemetry,
}

impl CompletionGateway {
    pub fn new(providers: Arc<ProviderRegistry>, retry: RetryPolicy, telemetry: Telemetry) -> Self {
        Self {
            providers,
            retry,
            telemetry,
        }
    }

    /// Run one completion. Transient provider failures are retried; a
    /// contract violation is not an error at this level.
    pub async fn complete(
        &self,
        instructions: &str,
        messages: &[Message],
        contract: Option<&ResponseContract>,
        policy: &ModelPolicy,
    ) -> Result<Completion> {
        let client = self.providers.client_for_model(&policy.model)?;
        let request = ChatRequest::new(&policy.model, instructions, messages)
            .with_temperature(policy.temperature)
            .with_response_format(contract.map(ResponseContract::to_response_format));

        debug!(
            model = %policy.model,
            provider = client.provider_name(),
            messages = request.messages.len(),
            "Dispatching completion"
        );

        let started = Instant::now();
        let outcome = retry_with_backoff(
            &self.retry,
            || client.chat(&request),
            ProviderError::is_retryable,
            |_| self.telemetry.record_retry(&policy.model),
        )
        .await;
        let latency = started.elapsed();

        let (response, attempts) = match outcome {
            Ok(ok) => ok,
            Err(failure) => {
                self.telemetry.record_failure(&policy.model);
                warn!(
                    model = %policy.model,
                    attempts = failure.attempts,
                    kind = failure.last_error.kind(),
                    "Completion failed"
                );
                return Err(AppError::Generation(format!(
                    "{} (after {} attempt{})",
                    failure.last_error,
                    failure.attempts,
                    if failure.attempts == 1 { "" } else { "s" }
                )));
            }
        };

        let usage = Usage {
            prompt_units: response.prompt_tokens,
            completion_units: response.completion_tokens,
            total_units: response.total_tokens,
            latency_seconds: latency.as_secs_f64(),
            model_id: response.model.clone(),
        };
        self.telemetry.record_call(
            &policy.model,
            usage.prompt_units,
            usage.completion_units,
            usage.total_units,
            usage.latency_seconds,
        );

        let structured = match contract {
            None => Structured::Unstructured,
            Some(contract) => match contract.check(&response.content) {
                Ok(value) => Structured::Valid(value),
                Err(violation) => {
                    warn!(model = %policy.model, %violation, "Reply broke its contract");
                    self.telemetry.record_contract_fallback(&policy.model);
                    Structured::Fallback {
                        payload: fallback_payload(&violation),
                        violation,
                    }
                }
            },
        };

        debug!(model = %policy.model, attempts, latency_ms = latency.as_millis() as u64, "Completion done");

        Ok(Completion {
            content: response.content,
            usage,
            latency,
            structured,
        })
    }
}
