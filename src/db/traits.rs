//! Conversation store abstraction
//!
//! The orchestrator only sees [`ConversationStore`]. The backing engine is
//! chosen with [`DatabaseProvider`] (in-memory SQLite, file-based SQLite, or
//! remote Turso).
//!
//! # Example
//!
//! ```rust,ignore
//! use mioo::db::DatabaseProvider;
//!
//! // Ephemeral store, handy for development and tests
//! let store = DatabaseProvider::Memory.create_store().await?;
//!
//! // File-based SQLite
//! let store = DatabaseProvider::SQLite { path: "data/mioo.db".into() }.create_store().await?;
//! ```

use crate::agents::AgentId;
use crate::types::{ConversationRecord, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Database provider configuration
#[derive(Debug, Clone, Default)]
pub enum DatabaseProvider {
    /// In-memory SQLite database (ephemeral, lost on restart)
    #[default]
    Memory,
    /// File-based SQLite database
    SQLite {
        /// Path to the SQLite database file
        path: PathBuf,
    },
    /// Remote Turso database
    Turso {
        /// The Turso database URL (e.g., `libsql://your-db.turso.io`)
        url: String,
        /// Authentication token for the Turso database
        token: String,
    },
}

impl DatabaseProvider {
    /// Open the store described by this provider
    pub async fn create_store(&self) -> Result<Arc<dyn ConversationStore>> {
        let client = match self {
            DatabaseProvider::Memory => super::turso::TursoClient::new_memory().await?,
            DatabaseProvider::SQLite { path } => super::turso::TursoClient::new_local(path).await?,
            DatabaseProvider::Turso { url, token } => {
                super::turso::TursoClient::new_remote(url.clone(), token.clone()).await?
            }
        };
        Ok(Arc::new(client))
    }

    pub fn describe(&self) -> String {
        match self {
            DatabaseProvider::Memory => "in-memory".to_string(),
            DatabaseProvider::SQLite { path } => format!("sqlite:{}", path.display()),
            DatabaseProvider::Turso { url, .. } => format!("turso:{}", url),
        }
    }
}

/// Durable conversation state keyed by (user, agent).
///
/// Every operation runs in its own transaction and either commits fully or
/// leaves the store unchanged.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the record for one (user, agent) pair
    async fn load(&self, user_id: &str, agent_id: AgentId) -> Result<Option<ConversationRecord>>;

    /// Insert or replace the record for `(record.user_id, record.agent_id)`
    async fn save(&self, record: &ConversationRecord) -> Result<()>;

    /// Delete one agent's record, or every record of the user when `agent_id`
    /// is `None`. Returns the number of rows removed.
    async fn delete(&self, user_id: &str, agent_id: Option<AgentId>) -> Result<u64>;
}
