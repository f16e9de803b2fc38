use crate::agents::AgentId;
use crate::db::traits::ConversationStore;
use crate::types::{AppError, ConversationRecord, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Database, Row};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// libsql-backed conversation store.
///
/// A single connection is shared behind an async mutex so that in-memory
/// databases keep one consistent view and transactions never interleave.
pub struct TursoClient {
    _db: Database,
    conn: Mutex<Connection>,
}

fn store_err(context: &'static str) -> impl Fn(libsql::Error) -> AppError {
    move |e| AppError::Store(format!("{}: {}", context, e))
}

impl TursoClient {
    pub async fn new_remote(url: String, auth_token: String) -> Result<Self> {
        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(store_err("Failed to connect to Turso"))?;
        Self::from_database(db).await
    }

    pub async fn new_local(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::Store(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(store_err("Failed to open local database"))?;
        Self::from_database(db).await
    }

    pub async fn new_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(store_err("Failed to open in-memory database"))?;
        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let conn = db.connect().map_err(store_err("Failed to get connection"))?;
        let client = Self {
            _db: db,
            conn: Mutex::new(conn),
        };
        client.initialize_schema().await?;
        Ok(client)
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                messages TEXT NOT NULL,
                interaction_log TEXT NOT NULL,
                UNIQUE(user_id, agent_id)
            )",
            (),
        )
        .await
        .map_err(store_err("Failed to create conversations table"))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id)",
            (),
        )
        .await
        .map_err(store_err("Failed to create conversations index"))?;

        Ok(())
    }

    async fn select(
        conn: &Connection,
        user_id: &str,
        agent_id: AgentId,
    ) -> Result<Option<ConversationRecord>> {
        let mut rows = conn
            .query(
                "SELECT user_id, agent_id, created_at, updated_at, messages, interaction_log
                 FROM conversations WHERE user_id = ?1 AND agent_id = ?2",
                libsql::params![user_id, agent_id.as_str()],
            )
            .await
            .map_err(store_err("Failed to query conversation"))?;

        match rows.next().await.map_err(store_err("Failed to read row"))? {
            Some(row) => Ok(Some(record_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert(conn: &Connection, record: &ConversationRecord) -> Result<()> {
        let messages = serde_json::to_string(&record.messages)
            .map_err(|e| AppError::Store(format!("Failed to encode messages: {}", e)))?;
        let log = serde_json::to_string(&record.interaction_log)
            .map_err(|e| AppError::Store(format!("Failed to encode interaction log: {}", e)))?;

        conn.execute(
            "INSERT INTO conversations
                (user_id, agent_id, created_at, updated_at, messages, interaction_log)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id, agent_id) DO UPDATE SET
                updated_at = excluded.updated_at,
                messages = excluded.messages,
                interaction_log = excluded.interaction_log",
            libsql::params![
                record.user_id.as_str(),
                record.agent_id.as_str(),
                record.created_at.timestamp_millis(),
                record.updated_at.timestamp_millis(),
                messages,
                log
            ],
        )
        .await
        .map_err(store_err("Failed to upsert conversation"))?;

        Ok(())
    }

    async fn remove(conn: &Connection, user_id: &str, agent_id: Option<AgentId>) -> Result<u64> {
        let removed = match agent_id {
            Some(agent) => conn
                .execute(
                    "DELETE FROM conversations WHERE user_id = ?1 AND agent_id = ?2",
                    libsql::params![user_id, agent.as_str()],
                )
                .await,
            None => {
                conn.execute(
                    "DELETE FROM conversations WHERE user_id = ?1",
                    libsql::params![user_id],
                )
                .await
            }
        };
        removed.map_err(store_err("Failed to delete conversation"))
    }
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| AppError::Store(format!("Invalid timestamp in store: {}", ms)))
}

fn record_from_row(row: &Row) -> Result<ConversationRecord> {
    let user_id: String = row.get(0).map_err(store_err("Failed to read user_id"))?;
    let agent: String = row.get(1).map_err(store_err("Failed to read agent_id"))?;
    let created_at: i64 = row.get(2).map_err(store_err("Failed to read created_at"))?;
    let updated_at: i64 = row.get(3).map_err(store_err("Failed to read updated_at"))?;
    let messages: String = row.get(4).map_err(store_err("Failed to read messages"))?;
    let log: String = row.get(5).map_err(store_err("Failed to read interaction_log"))?;

    Ok(ConversationRecord {
        user_id,
        agent_id: agent
            .parse()
            .map_err(|_| AppError::Store(format!("Unknown agent id in store: {}", agent)))?,
        created_at: millis_to_datetime(created_at)?,
        updated_at: millis_to_datetime(updated_at)?,
        messages: serde_json::from_str(&messages)
            .map_err(|e| AppError::Store(format!("Corrupt messages column: {}", e)))?,
        interaction_log: serde_json::from_str(&log)
            .map_err(|e| AppError::Store(format!("Corrupt interaction_log column: {}", e)))?,
    })
}

/// Commit on success, roll back on failure.
async fn finish<T>(tx: libsql::Transaction, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(store_err("Failed to commit transaction"))?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                error!(error = %rollback, "Rollback failed");
            }
            error!(error = %e, "Store operation rolled back");
            Err(e)
        }
    }
}

#[async_trait]
impl ConversationStore for TursoClient {
    async fn load(&self, user_id: &str, agent_id: AgentId) -> Result<Option<ConversationRecord>> {
        let conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .await
            .map_err(store_err("Failed to begin transaction"))?;
        let outcome = Self::select(&tx, user_id, agent_id).await;
        finish(tx, outcome).await
    }

    async fn save(&self, record: &ConversationRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .await
            .map_err(store_err("Failed to begin transaction"))?;
        let outcome = Self::upsert(&tx, record).await;
        let result = finish(tx, outcome).await;
        if result.is_ok() {
            debug!(user_id = %record.user_id, agent = %record.agent_id, "Conversation saved");
        }
        result
    }

    async fn delete(&self, user_id: &str, agent_id: Option<AgentId>) -> Result<u64> {
        let conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .await
            .map_err(store_err("Failed to begin transaction"))?;
        let outcome = Self::remove(&tx, user_id, agent_id).await;
        finish(tx, outcome).await
    }
}
