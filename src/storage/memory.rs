//! In-Memory Conversation History
//!
//! Information Hiding:
//! - HashMap storage structure hidden from users
//! - Thread-safe access via RwLock hidden behind async interface
//! - Suitable for testing and ephemeral sessions

use super::{HistoryStore, StoreError};
use crate::history::{ConversationHistory, Message};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory history keyed by session id.
/// Data is lost when the process terminates.
pub struct InMemoryHistory {
    sessions: Arc<RwLock<HashMap<String, Vec<Message>>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn append(&self, session_id: &str, messages: &[Message]) -> Result<(), StoreError> {
        // The write lock serializes appends, so a batch lands contiguously.
        let mut sessions = self.sessions.write().await;
        let log = sessions.entry(session_id.to_string()).or_default();
        log.extend_from_slice(messages);
        tracing::debug!(
            "[InMemoryHistory] Appended {} messages to session '{}' (now {})",
            messages.len(),
            session_id,
            log.len()
        );
        Ok(())
    }

    async fn list(&self, session_id: &str) -> Result<ConversationHistory, StoreError> {
        let sessions = self.sessions.read().await;
        let messages = sessions.get(session_id).cloned().unwrap_or_default();
        tracing::debug!(
            "[InMemoryHistory] Loaded {} messages for session '{}'",
            messages.len(),
            session_id
        );
        Ok(ConversationHistory::from_messages(messages))
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        tracing::debug!("[InMemoryHistory] Deleted session '{}'", session_id);
        Ok(())
    }
}
