//! Per-signer monotonic nonce dispenser for Hyperliquid actions.
//!
//! The venue keeps a sliding window of the highest nonces per address and
//! requires every new nonce to exceed the smallest retained one, so the
//! dispensed value is pinned to wall-clock millis as a floor. The critical
//! section is file-locked: concurrent pipelines for the same signer always
//! observe each other's last dispensed value.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fs::{read_json, write_json_atomic};
use super::lock::{FileLock, LockError, LockOptions};
use super::lock_path_for;
use crate::error::OperatorError;

pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_LOCK_STALE_MS: u64 = 15_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignerState {
    last_nonce: u64,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NonceFile {
    signers: BTreeMap<String, SignerState>,
}

pub struct NonceCoordinator {
    path: PathBuf,
    lock_opts: LockOptions,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NonceRequest<'a> {
    pub signer: &'a str,
    pub floor: Option<u64>,
}

impl NonceCoordinator {
    pub fn new(path: impl Into<PathBuf>, lock_opts: LockOptions) -> Self {
        NonceCoordinator {
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

    /// Dispense the next nonce for a signer: strictly greater than the last
    /// dispensed value, and never below wall-clock millis or the caller's
    /// floor.
    pub fn next_nonce(&self, request: NonceRequest<'_>) -> Result<u64, OperatorError> {
        let signer = request.signer.trim().to_lowercase();
        let _lock = self.lock()?;

        let mut file = self.load()?;
        let last = file.signers.get(&signer).map(|s| s.last_nonce).unwrap_or(0);
        let now_ms = Utc::now().timestamp_millis() as u64;
        let candidate = now_ms.max(request.floor.unwrap_or(now_ms)).max(last + 1);

        file.signers.insert(
            signer,
            SignerState {
                last_nonce: candidate,
                updated_at: Utc::now(),
            },
        );
        self.save(&file)?;
        Ok(candidate)
    }

    /// Last dispensed nonce for a signer, if any.
    pub fn last_nonce(&self, signer: &str) -> Result<Option<u64>, OperatorError> {
        let signer = signer.trim().to_lowercase();
        let _lock = self.lock()?;
        Ok(self.load()?.signers.get(&signer).map(|s| s.last_nonce))
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

    fn load(&self) -> Result<NonceFile, OperatorError> {
        read_json(&self.path)
            .map(Option::unwrap_or_default)
            .map_err(|e| OperatorError::StateIo {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })
    }

    fn save(&self, file: &NonceFile) -> Result<(), OperatorError> {
        write_json_atomic(&self.path, file).map_err(|e| OperatorError::StateIo {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
