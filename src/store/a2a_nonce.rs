//! Replay store for A2A authentication nonces.
//!
//! Each `(keyId, nonce)` tuple may be consumed exactly once before its
//! expiry. Entries expire at `timestamp + 2 * maxSkewSec`, which covers the
//! full window in which the paired signature would still verify.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fs::{read_json, write_json_atomic};
use super::lock::{FileLock, LockError, LockOptions};
use super::lock_path_for;
use crate::error::OperatorError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayEntry {
    expires_at_ms: i64,
    consumed_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ReplayFile {
    entries: BTreeMap<String, ReplayEntry>,
}

pub struct A2aNonceStore {
    path: PathBuf,
    lock_opts: LockOptions,
}

pub enum ConsumeOutcome {
    Fresh,
    Replayed,
}

impl A2aNonceStore {
    pub fn new(path: impl Into<PathBuf>, lock_opts: LockOptions) -> Self {
        A2aNonceStore {
            path: path.into(),
            lock_opts,
        }
    }

    /// Atomically insert `(keyId, nonce)`. A live entry under the same key
    /// means the nonce was replayed.
    pub fn consume(
        &self,
        key_id: &str,
        nonce: &str,
        expires_at_ms: i64,
    ) -> Result<ConsumeOutcome, OperatorError> {
        let _lock = self.lock()?;
        let mut file = self.load()?;
        let now_ms = Utc::now().timestamp_millis();
        file.entries.retain(|_, entry| entry.expires_at_ms > now_ms);

        let entry_key = format!("{key_id}:{nonce}");
        if file.entries.contains_key(&entry_key) {
            return Ok(ConsumeOutcome::Replayed);
        }
        file.entries.insert(
            entry_key,
            ReplayEntry {
                expires_at_ms,
                consumed_at: Utc::now(),
            },
        );
        self.save(&file)?;
        Ok(ConsumeOutcome::Fresh)
    }

    fn lock(&self) -> Result<FileLock, OperatorError> {
        FileLock::acquire(&lock_path_for(&self.path), &self.lock_opts).map_err(|e| match e {
            LockError::Timeout { path, timeout_ms } => OperatorError::StateLockTimeout {
                path: path.display().to_string(),
                timeout_ms,
            },
            LockError::Io { path, source } => OperatorError::StateIo {
                path: path.display().to_string(),
                reason: source.to_string(),
            },
        })
    }

    fn load(&self) -> Result<ReplayFile, OperatorError> {
        read_json(&self.path)
            .map(Option::unwrap_or_default)
            .map_err(|e| OperatorError::StateIo {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })
    }

    fn save(&self, file: &ReplayFile) -> Result<(), OperatorError> {
        write_json_atomic(&self.path, file).map_err(|e| OperatorError::StateIo {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
