//! Conversation History Storage
//!
//! Information Hiding:
//! - Storage backend implementation details hidden behind trait
//! - Allows swapping between memory and durable backends without API changes
//! - Each storage implementation encapsulates its own data structures

use crate::history::{ConversationHistory, Message};
use async_trait::async_trait;
use thiserror::Error;

pub mod durable;
pub mod filesystem;
pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or an I/O operation failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A versioned append raced with another writer.
    #[error("version conflict: expected version {expected}, found {found}")]
    Conflict { expected: u64, found: u64 },

    /// A stored payload could not be decoded.
    #[error("stored history is corrupt: {0}")]
    Corrupt(String),
}

/// Trait defining conversation history storage.
///
/// Appends for one session observe a total order across concurrent
/// callers; a batch passed to `append` lands contiguously or not at all.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append messages as the newest entries for a session, atomically.
    async fn append(&self, session_id: &str, messages: &[Message]) -> Result<(), StoreError>;

    /// Load all messages for a session, oldest first.
    /// Returns an empty history if the session doesn't exist.
    async fn list(&self, session_id: &str) -> Result<ConversationHistory, StoreError>;

    /// Delete all messages for a session.
    async fn delete(&self, session_id: &str) -> Result<(), StoreError>;
}
