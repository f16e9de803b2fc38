//! Bounded conversation history.
//!
//! A conversation's `messages` window is what gets replayed to a model on the
//! next call. [`HistoryManager`] keeps it bounded and can collapse it into a
//! single summary message.

use crate::agents::AgentSpec;
use crate::llm::CompletionGateway;
use crate::types::{ConversationRecord, InteractionAction, InteractionRecord, Message, Result};
use chrono::Utc;
use tracing::info;

/// Default number of messages kept in a conversation window.
pub const DEFAULT_TOKEN_LIMIT: usize = 10;

/// Prompt prefix sent to the summarizer.
pub const SUMMARY_PROMPT: &str = "Summarize the following conversation: ";

/// Prefix of the system message that replaces a summarized window.
pub const SUMMARY_PREFIX: &str = "Previous conversation summary: ";

/// Result of a reset request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResetOutcome {
    /// The window was empty; nothing was changed
    NothingToSummarize(String),
    /// The window now holds a single summary message
    Summarized(String),
}

impl ResetOutcome {
    pub fn text(&self) -> &str {
        match self {
            ResetOutcome::NothingToSummarize(text) | ResetOutcome::Summarized(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ResetOutcome::NothingToSummarize(text) | ResetOutcome::Summarized(text) => text,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HistoryManager {
    token_limit: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LIMIT)
    }
}

impl HistoryManager {
    pub fn new(token_limit: usize) -> Self {
        Self {
            token_limit: token_limit.max(1),
        }
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// Append one exchange and re-bound the window.
    pub fn append(&self, record: &mut ConversationRecord, user: Message, assistant: Message) {
        record.messages.push(user);
        record.messages.push(assistant);
        self.truncate(&mut record.messages);
        record.updated_at = Utc::now();
    }

    /// Keep `messages[0]` plus the newest `token_limit - 1` messages.
    pub fn truncate(&self, messages: &mut Vec<Message>) {
        if messages.len() <= self.token_limit {
            return;
        }
        let keep_tail = self.token_limit - 1;
        let drop_until = messages.len() - keep_tail;
        messages.drain(1..drop_until);
    }

    /// Collapse the window into one summary message.
    ///
    /// An empty window is left untouched and the returned sentinel explains
    /// why. Otherwise the summarizer is called once, `messages` becomes a single
    /// system message and the reset is appended to the interaction log. The
    /// caller persists the record.
    pub async fn reset_and_summarize(
        &self,
        record: &mut ConversationRecord,
        gateway: &CompletionGateway,
        summarizer: &AgentSpec,
    ) -> Result<ResetOutcome> {
        if record.messages.is_empty() {
            return Ok(ResetOutcome::NothingToSummarize(format!(
                "No {} conversation history to summarize",
                record.agent_id
            )));
        }

        let transcript: Vec<&Message> = record
            .messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .collect();
        let prompt = format!(
            "{}{}",
            SUMMARY_PROMPT,
            serde_json::to_string(&transcript).unwrap_or_default()
        );

        let completion = gateway
            .complete(
                &summarizer.instructions,
                &[Message::user(prompt)],
                summarizer.response_contract.as_ref(),
                &summarizer.model_policy,
            )
            .await?;

        let summary = completion.content;
        record.messages = vec![Message::system(format!("{}{}", SUMMARY_PREFIX, summary))];
        record.interaction_log.push(InteractionRecord {
            query: SUMMARY_PROMPT.trim_end().trim_end_matches(':').to_string(),
            response: summary.clone(),
            usage: completion.usage,
            timestamp: Utc::now(),
            action: Some(InteractionAction::ConversationReset),
            error: None,
        });
        record.updated_at = Utc::now();

        info!(
            user_id = %record.user_id,
            agent = %record.agent_id,
            "Conversation history reset with summary"
        );

        Ok(ResetOutcome::Summarized(summary))
    }
}
