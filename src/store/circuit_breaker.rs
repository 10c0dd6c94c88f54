//! Sliding-window failure counter with an open/cooldown state.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fs::{read_json, write_json_atomic};
use super::lock::{FileLock, LockError, LockOptions};
use super::lock_path_for;
use crate::error::{ErrorBody, OperatorError};
use crate::model::policy::CircuitBreakerPolicy;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BreakerState {
    /// Failure timestamps, epoch millis, pruned to the window on every touch.
    failures: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    open_until: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_error: Option<ErrorBody>,
    updated_at: DateTime<Utc>,
}

pub struct CircuitBreaker {
    path: PathBuf,
    lock_opts: LockOptions,
}

impl CircuitBreaker {
    pub fn new(path: impl Into<PathBuf>, lock_opts: LockOptions) -> Self {
        CircuitBreaker {
            path: path.into(),
            lock_opts,
        }
    }

    /// Fails with `CIRCUIT_BREAKER_OPEN` while the cooldown is running.
    pub fn assert_can_execute(&self, policy: &CircuitBreakerPolicy) -> Result<(), OperatorError> {
        if !policy.enabled {
            return Ok(());
        }
        let _lock = self.lock()?;
        let state = self.load()?;
        let now = Utc::now().timestamp_millis();
        if let Some(open_until) = state.open_until
            && open_until > now
        {
            return Err(OperatorError::CircuitBreakerOpen {
                open_until,
                last_error: state.last_error,
            });
        }
        Ok(())
    }

    /// Record a failure; open the breaker when the window fills up.
    pub fn register_failure(
        &self,
        policy: &CircuitBreakerPolicy,
        error: &ErrorBody,
    ) -> Result<(), OperatorError> {
        if !policy.enabled {
            return Ok(());
        }
        let _lock = self.lock()?;
        let mut state = self.load()?;
        let now = Utc::now().timestamp_millis();

        prune(&mut state, policy, now);
        state.failures.push(now);
        state.last_error = Some(error.clone());
        if state.failures.len() >= policy.max_failures as usize {
            state.open_until = Some(now + (policy.cooldown_sec as i64) * 1000);
        }
        state.updated_at = Utc::now();
        self.save(&state)
    }

    /// A success only prunes the window; it does not close an open breaker.
    pub fn register_success(&self, policy: &CircuitBreakerPolicy) -> Result<(), OperatorError> {
        if !policy.enabled {
            return Ok(());
        }
        let _lock = self.lock()?;
        let mut state = self.load()?;
        prune(&mut state, policy, Utc::now().timestamp_millis());
        state.updated_at = Utc::now();
        self.save(&state)
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

    fn load(&self) -> Result<BreakerState, OperatorError> {
        read_json(&self.path)
            .map(|opt| {
                opt.unwrap_or(BreakerState {
                    failures: Vec::new(),
                    open_until: None,
                    last_error: None,
                    updated_at: Utc::now(),
                })
            })
            .map_err(|e| OperatorError::StateIo {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })
    }

    fn save(&self, state: &BreakerState) -> Result<(), OperatorError> {
        write_json_atomic(&self.path, state).map_err(|e| OperatorError::StateIo {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

fn prune(state: &mut BreakerState, policy: &CircuitBreakerPolicy, now: i64) {
    let cutoff = now - (policy.window_sec as i64) * 1000;
    state.failures.retain(|&t| t > cutoff);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn policy(max_failures: u32, window_sec: u64, cooldown_sec: u64) -> CircuitBreakerPolicy {
        CircuitBreakerPolicy {
            enabled: true,
            max_failures,
            window_sec,
            cooldown_sec,
        }
    }

    fn an_error() -> ErrorBody {
        ErrorBody {
            code: "HYPERLIQUID_EXECUTION_FAILED".into(),
            message: "rejected".into(),
            details: Value::Null,
        }
    }

    #[test]
    fn opens_after_max_failures_within_window() {
        let dir = tempfile::tempdir().unwrap();
        let breaker = CircuitBreaker::new(
            dir.path().join("circuit-breaker.json"),
            LockOptions::default(),
        );
        let policy = policy(3, 600, 300);

        for _ in 0..2 {
            breaker.register_failure(&policy, &an_error()).unwrap();
            breaker.assert_can_execute(&policy).unwrap();
        }
        breaker.register_failure(&policy, &an_error()).unwrap();

        let err = breaker.assert_can_execute(&policy).unwrap_err();
        match err {
            OperatorError::CircuitBreakerOpen { last_error, .. } => {
                assert_eq!(last_error.unwrap().code, "HYPERLIQUID_EXECUTION_FAILED");
            }
            other => panic!("expected open breaker, got {other:?}"),
        }
    }

    #[test]
    fn disabled_breaker_never_trips() {
        let dir = tempfile::tempdir().unwrap();
        let breaker = CircuitBreaker::new(
            dir.path().join("circuit-breaker.json"),
            LockOptions::default(),
        );
        let policy = CircuitBreakerPolicy {
            enabled: false,
            ..policy(1, 600, 300)
        };
        breaker.register_failure(&policy, &an_error()).unwrap();
        breaker.assert_can_execute(&policy).unwrap();
    }

    #[test]
    fn success_prunes_but_does_not_close_open_breaker() {
        let dir = tempfile::tempdir().unwrap();
        let breaker = CircuitBreaker::new(
            dir.path().join("circuit-breaker.json"),
            LockOptions::default(),
        );
        let policy = policy(1, 600, 300);
        breaker.register_failure(&policy, &an_error()).unwrap();
        breaker.register_success(&policy).unwrap();
        assert!(breaker.assert_can_execute(&policy).is_err());
    }
}
