//! TTL dedupe for mention-delegation triggers.
//!
//! A given `(targetBotId, messageId)` pair authorizes at most one pipeline
//! within its TTL. Registration happens after security verification and
//! before the pipeline proper, so a duplicate trigger dies before any
//! policy or connector work.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fs::{read_json, write_json_atomic};
use super::lock::{FileLock, LockError, LockOptions};
use super::lock_path_for;
use crate::error::OperatorError;

pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_LOCK_STALE_MS: u64 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DedupeEntry {
    expires_at_ms: i64,
    registered_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DedupeFile {
    entries: BTreeMap<String, DedupeEntry>,
}

pub struct MentionDedupeStore {
    path: PathBuf,
    lock_opts: LockOptions,
}

impl MentionDedupeStore {
    pub fn new(path: impl Into<PathBuf>, lock_opts: LockOptions) -> Self {
        MentionDedupeStore {
            path: path.into(),
            lock_opts,
        }
    }

    pub fn with_defaults(path: impl Into<PathBuf>) -> Self {
        Self::new(
            path,
            LockOptions::new(DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_LOCK_STALE_MS),
        )
    }

    /// Register a trigger. Fails with the dedupe error when the same
    /// `targetBotId:messageId` is still live, and with the mention lock
    /// timeout when the store lock cannot be taken in time.
    pub fn register(
        &self,
        target_bot_id: &str,
        message_id: &str,
        expires_at_ms: i64,
    ) -> Result<(), OperatorError> {
        let _lock = self.lock()?;
        let mut file = self.load()?;
        let now_ms = Utc::now().timestamp_millis();
        file.entries.retain(|_, entry| entry.expires_at_ms > now_ms);

        let dedupe_key = format!("{target_bot_id}:{message_id}");
        if file.entries.contains_key(&dedupe_key) {
            return Err(OperatorError::MentionDelegationDuplicate { dedupe_key });
        }
        file.entries.insert(
            dedupe_key,
            DedupeEntry {
                expires_at_ms,
                registered_at: Utc::now(),
            },
        );
        self.save(&file)
    }

    fn lock(&self) -> Result<FileLock, OperatorError> {
        FileLock::acquire(&lock_path_for(&self.path), &self.lock_opts).map_err(|e| match e {
            LockError::Timeout { timeout_ms, .. } => {
                OperatorError::MentionDelegationLockTimeout { timeout_ms }
            }
            LockError::Io { path, source } => OperatorError::StateIo {
                path: path.display().to_string(),
                reason: source.to_string(),
            },
        })
    }

    fn load(&self) -> Result<DedupeFile, OperatorError> {
        read_json(&self.path)
            .map(Option::unwrap_or_default)
            .map_err(|e| OperatorError::StateIo {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })
    }

    fn save(&self, file: &DedupeFile) -> Result<(), OperatorError> {
        write_json_atomic(&self.path, file).map_err(|e| OperatorError::StateIo {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_registration_within_ttl_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = MentionDedupeStore::with_defaults(dir.path().join("dedupe.json"));
        let expires = Utc::now().timestamp_millis() + 300_000;

        store
            .register("exec-operator", "1473395000000000777", expires)
            .unwrap();
        let err = store
            .register("exec-operator", "1473395000000000777", expires)
            .unwrap_err();
        assert_eq!(err.code(), "EXECUTION_MENTION_DELEGATION_DUPLICATE");

        // A different target bot consumes the same messageId independently.
        store
            .register("other-bot", "1473395000000000777", expires)
            .unwrap();
    }

    #[test]
    fn expired_entries_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let store = MentionDedupeStore::with_defaults(dir.path().join("dedupe.json"));
        store
            .register("bot", "123456", Utc::now().timestamp_millis() - 1)
            .unwrap();
        store
            .register("bot", "123456", Utc::now().timestamp_millis() + 60_000)
            .unwrap();
    }
}
