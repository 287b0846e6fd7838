//! Trait abstractions for runtime I/O
//!
//! The orchestrator reads a session once at turn entry and writes it once at
//! exit, through [`SessionStore`].

use crate::db::Database;
use crate::session::SessionState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistence for per-session state
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// `None` when the key has never been saved
    async fn load(&self, key: &str) -> Result<Option<SessionState>, String>;

    async fn save(&self, key: &str, state: &SessionState) -> Result<(), String>;
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn load(&self, key: &str) -> Result<Option<SessionState>, String> {
        (**self).load(key).await
    }

    async fn save(&self, key: &str, state: &SessionState) -> Result<(), String> {
        (**self).save(key, state).await
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store; sessions vanish on restart
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, key: &str) -> Result<Option<SessionState>, String> {
        Ok(self.sessions.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, state: &SessionState) -> Result<(), String> {
        self.sessions
            .write()
            .await
            .insert(key.to_string(), state.clone());
        Ok(())
    }
}

// ============================================================================
// SQLite adapter
// ============================================================================

/// Adapter that implements [`SessionStore`] for [`Database`]
#[derive(Clone)]
pub struct DatabaseStore {
    db: Database,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for DatabaseStore {
    async fn load(&self, key: &str) -> Result<Option<SessionState>, String> {
        self.db
            .load_session(key)
            .map(|found| found.map(|s| s.state))
            .map_err(|e| e.to_string())
    }

    async fn save(&self, key: &str, state: &SessionState) -> Result<(), String> {
        self.db.save_session(key, state).map_err(|e| e.to_string())
    }
}
