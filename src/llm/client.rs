//! LLM client abstraction and provider selection
//!
//! Every remote text-generation backend implements [`LLMClient`]. Both supported
//! providers speak the OpenAI chat-completions dialect:
//! - **OpenAI**: `https://api.openai.com/v1`
//! - **Gemini**: Google's OpenAI-compatible endpoint

use crate::types::{Message, MessageRole};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OpenAI API base URL
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Gemini's OpenAI-compatible API base URL
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Generic LLM client trait for provider abstraction
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Run one chat completion. No retries happen at this layer.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Name of the configured provider behind this client
    fn provider_name(&self) -> &str;
}

/// Outbound request shape shared by all providers.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    /// System message first, then history, then the current user message
    pub messages: Vec<Message>,
    /// JSON schema the response must follow, when the agent has a contract
    pub response_format: Option<serde_json::Value>,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, instructions: &str, messages: &[Message]) -> Self {
        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(Message::system(instructions));
        all.extend(messages.iter().cloned());
        Self {
            model: model.into(),
            messages: all,
            response_format: None,
            temperature: 1.0,
        }
    }

    pub fn with_response_format(mut self, schema: Option<serde_json::Value>) -> Self {
        self.response_format = schema;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// The system instructions carried by this request.
    pub fn instructions(&self) -> &str {
        self.messages
            .first()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// Raw provider answer before any contract handling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub model: String,
}

/// Failure classes of a single remote call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failure: {0}")]
    Connection(String),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Only transient classes are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited(_) | ProviderError::Timeout(_) | ProviderError::Connection(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::RateLimited(_) => "rate_limited",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Connection(_) => "connection",
            ProviderError::Other(_) => "other",
        }
    }
}

/// Provider kind as written in `[providers.<name>] type = ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Gemini,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => OPENAI_API_BASE,
            ProviderKind::Gemini => GEMINI_API_BASE,
        }
    }
}

/// Fully resolved provider, ready to build a client from.
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAI {
        name: String,
        api_key: String,
        api_base: String,
        timeout: Duration,
    },
    Gemini {
        name: String,
        api_key: String,
        api_base: String,
        timeout: Duration,
    },
}

impl Provider {
    pub fn new(
        kind: ProviderKind,
        name: impl Into<String>,
        api_key: impl Into<String>,
        api_base: Option<String>,
        timeout: Duration,
    ) -> Self {
        let name = name.into();
        let api_key = api_key.into();
        let api_base = api_base.unwrap_or_else(|| kind.default_base_url().to_string());
        match kind {
            ProviderKind::OpenAI => Provider::OpenAI {
                name,
                api_key,
                api_base,
                timeout,
            },
            ProviderKind::Gemini => Provider::Gemini {
                name,
                api_key,
                api_base,
                timeout,
            },
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>, ProviderError> {
        match self {
            Provider::OpenAI {
                name,
                api_key,
                api_base,
                timeout,
            }
            | Provider::Gemini {
                name,
                api_key,
                api_base,
                timeout,
            } => Ok(Box::new(super::openai::OpenAIClient::new(
                name.clone(),
                api_key.clone(),
                api_base.clone(),
                *timeout,
            )?)),
        }
    }

    /// Get a human-readable name for this provider kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Gemini { .. } => "Gemini",
        }
    }
}
