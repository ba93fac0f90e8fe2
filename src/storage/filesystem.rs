//! File-Backed Durable Store
//!
//! Information Hiding:
//! - File paths and the JSON envelope format hidden from users
//! - Directory structure management hidden behind the interface
//! - Atomicity of check-and-write internalized via a store-wide lock

use super::durable::DurableStore;
use super::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;

/// Durable store keeping one versioned JSON log per session.
/// Logs are stored as {base_path}/{session_id}.json.
pub struct FileStore {
    base_path: PathBuf,
    // Serializes read-modify-write cycles so append_atomic is atomic
    // within the process.
    write_lock: Mutex<()>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionLog {
    version: u64,
    records: Vec<Value>,
}

impl FileStore {
    pub async fn new(base_path: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("create {:?}: {}", base_path, e)))?;

        Ok(Self {
            base_path,
            write_lock: Mutex::new(()),
        })
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", session_id))
    }

    async fn read_log(&self, session_id: &str) -> Result<SessionLog, StoreError> {
        let path = self.session_path(session_id);

        if !path.exists() {
            return Ok(SessionLog::default());
        }

        let json = fs::read_to_string(&path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("read {:?}: {}", path, e)))?;

        serde_json::from_str(&json).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn write_log(&self, session_id: &str, log: &SessionLog) -> Result<(), StoreError> {
        let path = self.session_path(session_id);
        let json = serde_json::to_string_pretty(log).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        fs::write(&path, json)
            .await
            .map_err(|e| StoreError::Unavailable(format!("write {:?}: {}", path, e)))
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get(&self, session_id: &str) -> Result<(Vec<Value>, u64), StoreError> {
        let log = self.read_log(session_id).await?;
        tracing::debug!(
            "[FileStore] Loaded {} records for session '{}' (version {})",
            log.records.len(),
            session_id,
            log.version
        );
        Ok((log.records, log.version))
    }

    async fn append_atomic(
        &self,
        session_id: &str,
        records: &[Value],
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut log = self.read_log(session_id).await?;
        if log.version != expected_version {
            return Err(StoreError::Conflict {
                expected: expected_version,
                found: log.version,
            });
        }

        log.records.extend_from_slice(records);
        log.version += 1;
        self.write_log(session_id, &log).await?;

        tracing::debug!(
            "[FileStore] Appended {} records to session '{}' (version {})",
            records.len(),
            session_id,
            log.version
        );
        Ok(log.version)
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        let path = self.session_path(session_id);

        if path.exists() {
            fs::remove_file(&path)
                .await
                .map_err(|e| StoreError::Unavailable(format!("delete {:?}: {}", path, e)))?;
            tracing::debug!("[FileStore] Deleted session '{}' at {:?}", session_id, path);
        }

        Ok(())
    }
}
