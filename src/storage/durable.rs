//! Durable Versioned History Backend
//!
//! Information Hiding:
//! - The remote key-value protocol is opaque behind [`DurableStore`]
//! - Version bookkeeping and conflict retries internalized here
//! - Record encoding independent of the backend

use super::{HistoryStore, StoreError};
use crate::history::{ConversationHistory, Message};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// How many times a raced append is retried with a fresh version before
/// the conflict is surfaced.
const MAX_CONFLICT_RETRIES: usize = 3;

/// Opaque versioned key-value collaborator holding one record log per
/// session. Backends decide where the log lives; callers only see records
/// and a monotonically increasing version per session.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// All records for a session in append order, with the log's current
    /// version. Unknown sessions are an empty log at version 0.
    async fn get(&self, session_id: &str) -> Result<(Vec<Value>, u64), StoreError>;

    /// Append records iff the stored version still matches
    /// `expected_version`; returns the new version, or
    /// [`StoreError::Conflict`] when another writer got there first.
    async fn append_atomic(
        &self,
        session_id: &str,
        records: &[Value],
        expected_version: u64,
    ) -> Result<u64, StoreError>;

    /// Drop the session's log entirely.
    async fn delete(&self, session_id: &str) -> Result<(), StoreError>;
}

/// [`HistoryStore`] over a [`DurableStore`].
///
/// A version conflict means another writer appended between our read and
/// our write. That is a benign race, so the append is retried against the
/// latest version a bounded number of times before the error surfaces.
pub struct VersionedHistory {
    store: Arc<dyn DurableStore>,
}

impl VersionedHistory {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HistoryStore for VersionedHistory {
    async fn append(&self, session_id: &str, messages: &[Message]) -> Result<(), StoreError> {
        let records = messages
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let (_, mut version) = self.store.get(session_id).await?;
        let mut last_conflict = None;

        for attempt in 0..=MAX_CONFLICT_RETRIES {
            if attempt > 0 {
                let (_, latest) = self.store.get(session_id).await?;
                version = latest;
            }

            match self
                .store
                .append_atomic(session_id, &records, version)
                .await
            {
                Ok(new_version) => {
                    tracing::debug!(
                        "[VersionedHistory] Appended {} records to session '{}' at version {}",
                        records.len(),
                        session_id,
                        new_version
                    );
                    return Ok(());
                }
                Err(conflict @ StoreError::Conflict { .. }) => {
                    tracing::debug!(
                        "[VersionedHistory] Append raced for session '{}' (attempt {}), retrying",
                        session_id,
                        attempt + 1
                    );
                    last_conflict = Some(conflict);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_conflict.unwrap_or(StoreError::Conflict {
            expected: version,
            found: version,
        }))
    }

    async fn list(&self, session_id: &str) -> Result<ConversationHistory, StoreError> {
        let (records, _) = self.store.get(session_id).await?;
        let messages = records
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Message>, _>>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(ConversationHistory::from_messages(messages))
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.store.delete(session_id).await
    }
}
