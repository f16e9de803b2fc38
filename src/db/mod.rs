//! Durable conversation storage.
//!
//! - [`ConversationStore`] - load / upsert / delete keyed by (user, agent)
//! - [`TursoClient`] - libsql implementation (memory, local file, remote Turso)

pub mod traits;
pub mod turso;

pub use traits::{ConversationStore, DatabaseProvider};
pub use turso::TursoClient;
