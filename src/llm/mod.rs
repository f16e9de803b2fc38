//! LLM provider clients and the completion gateway
//!
//! # Architecture
//!
//! - [`LLMClient`] - the trait every provider client implements
//! - [`ProviderRegistry`] - routes a model id to a live client by prefix
//! - [`CompletionGateway`] - retries, contract checking and usage accounting
//!   on top of the registry
//!
//! # Supported Providers
//!
//! - `openai` - OpenAI chat completions
//! - `gemini` - Gemini through its OpenAI-compatible endpoint
//!
//! # Example
//!
//! ```rust,ignore
//! use mioo::llm::{CompletionGateway, ProviderRegistry, RetryPolicy};
//!
//! let providers = Arc::new(ProviderRegistry::from_config(&config)?);
//! let gateway = CompletionGateway::new(providers, RetryPolicy::default(), telemetry);
//! let completion = gateway
//!     .complete(&spec.instructions, &messages, spec.response_contract.as_ref(), &spec.model_policy)
//!     .await?;
//! ```

/// Core LLM client trait and provider selection.
pub mod client;
/// Structured response contracts.
pub mod contract;
/// Retrying, contract-checking completion entry point.
pub mod gateway;
/// OpenAI-compatible HTTP client.
pub mod openai;
/// Registry for managing multiple LLM provider instances.
pub mod provider_registry;
/// Exponential backoff with jitter.
pub mod retry;

pub use client::{ChatRequest, ChatResponse, LLMClient, Provider, ProviderError, ProviderKind};
pub use contract::ResponseContract;
pub use gateway::{Completion, CompletionGateway, Structured};
pub use provider_registry::ProviderRegistry;
pub use retry::RetryPolicy;
