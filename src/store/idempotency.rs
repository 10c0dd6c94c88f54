//! Persistent idempotency map: fingerprint → run status.
//!
//! Every mutation takes the store-wide lock, reads the full document,
//! mutates one record, and rewrites atomically. The lock makes racing
//! writers serialize, so a concurrent update on an unrelated key is never
//! dropped by a whole-file overwrite.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fs::{read_json, write_json_atomic};
use super::lock::{FileLock, LockError, LockOptions};
use super::lock_path_for;
use crate::canonical;
use crate::error::{ErrorBody, OperatorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    Pending,
    ConfirmationRequired,
    Success,
    Failure,
}

impl IdempotencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ConfirmationRequired => "confirmation_required",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    /// A prior record in this status blocks a new run with the same key.
    pub fn blocks_retry(&self) -> bool {
        matches!(self, Self::Pending | Self::Success)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    pub status: IdempotencyStatus,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    keys: BTreeMap<String, IdempotencyRecord>,
}

pub struct IdempotencyStore {
    path: PathBuf,
    lock_opts: LockOptions,
}

impl IdempotencyStore {
    pub fn new(path: impl Into<PathBuf>, lock_opts: LockOptions) -> Self {
        IdempotencyStore {
            path: path.into(),
            lock_opts,
        }
    }

    /// SHA-256 over the stable serialization of `{policyVersion, intent}`.
    pub fn compute(intent: &Value, policy_version: &str) -> String {
        canonical::fingerprint(policy_version, intent)
    }

    pub fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>, OperatorError> {
        let _lock = self.lock()?;
        let store = self.load()?;
        Ok(store.keys.get(key).cloned())
    }

    pub fn mark_pending(&self, key: &str, run_id: &str) -> Result<(), OperatorError> {
        self.put(
            key,
            IdempotencyRecord {
                status: IdempotencyStatus::Pending,
                run_id: run_id.to_string(),
                result: None,
                error: None,
                updated_at: Utc::now(),
            },
        )
    }

    pub fn mark_success(
        &self,
        key: &str,
        run_id: &str,
        result: Option<Value>,
    ) -> Result<(), OperatorError> {
        self.put(
            key,
            IdempotencyRecord {
                status: IdempotencyStatus::Success,
                run_id: run_id.to_string(),
                result,
                error: None,
                updated_at: Utc::now(),
            },
        )
    }

    pub fn mark_failure(
        &self,
        key: &str,
        run_id: &str,
        error: ErrorBody,
    ) -> Result<(), OperatorError> {
        self.put(
            key,
            IdempotencyRecord {
                status: IdempotencyStatus::Failure,
                run_id: run_id.to_string(),
                result: None,
                error: Some(error),
                updated_at: Utc::now(),
            },
        )
    }

    pub fn mark_confirmation_required(
        &self,
        key: &str,
        run_id: &str,
        result: Option<Value>,
    ) -> Result<(), OperatorError> {
        self.put(
            key,
            IdempotencyRecord {
                status: IdempotencyStatus::ConfirmationRequired,
                run_id: run_id.to_string(),
                result,
                error: None,
                updated_at: Utc::now(),
            },
        )
    }

    /// Drop records older than the TTL. Returns how many were removed.
    pub fn cleanup_expired(&self, ttl_days: u32) -> Result<usize, OperatorError> {
        let _lock = self.lock()?;
        let mut store = self.load()?;
        let cutoff = Utc::now() - Duration::days(i64::from(ttl_days));
        let before = store.keys.len();
        store.keys.retain(|_, record| record.updated_at > cutoff);
        let removed = before - store.keys.len();
        if removed > 0 {
            self.save(&store)?;
        }
        Ok(removed)
    }

    fn put(&self, key: &str, record: IdempotencyRecord) -> Result<(), OperatorError> {
        let _lock = self.lock()?;
        let mut store = self.load()?;
        store.keys.insert(key.to_string(), record);
        self.save(&store)
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

    fn load(&self) -> Result<StoreFile, OperatorError> {
        read_json(&self.path)
            .map(Option::unwrap_or_default)
            .map_err(|e| OperatorError::StateIo {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })
    }

    fn save(&self, store: &StoreFile) -> Result<(), OperatorError> {
        write_json_atomic(&self.path, store).map_err(|e| OperatorError::StateIo {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
