use crate::llm::client::{ChatRequest, ChatResponse, LLMClient, ProviderError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Client for any OpenAI-compatible chat-completions endpoint.
pub struct OpenAIClient {
    client: Client,
    name: String,
    api_key: String,
    api_base: String,
}

impl OpenAIClient {
    pub fn new(
        name: String,
        api_key: String,
        api_base: String,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            name,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
    #[serde(default)]
    model: String,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

fn classify_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else if err.is_connect() {
        ProviderError::Connection(err.to_string())
    } else {
        ProviderError::Other(err.to_string())
    }
}

fn classify_status(status: StatusCode, body: String) -> ProviderError {
    let detail = format!("{}: {}", status, body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout(detail),
        _ => ProviderError::Other(detail),
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    #[instrument(skip(self, request), fields(provider = %self.name, model = %request.model))]
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = WireRequest {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: request.temperature,
            response_format: request.response_format.as_ref().map(|schema| {
                serde_json::json!({
                    "type": "json_schema",
                    "json_schema": schema,
                })
            }),
        };

        debug!("Sending chat completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, error_text));
        }

        // The client timeout also covers the body, so read it as a transport step.
        let bytes = response.bytes().await.map_err(classify_transport_error)?;
        let wire: WireResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::Other(format!("Invalid response body: {}", e)))?;

        let content = wire
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Other("No choices in response".to_string()))?;

        let (prompt_tokens, completion_tokens, total_tokens) = wire
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens, u.total_tokens))
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            prompt_tokens,
            completion_tokens,
            total_tokens,
            model: if wire.model.is_empty() {
                request.model.clone()
            } else {
                wire.model
            },
        })
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}
