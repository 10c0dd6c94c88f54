//! A2A authentication for execution-plane payloads.
//!
//! Signatures are HMAC-SHA256 over the canonical payload bytes — the full
//! payload with `auth.signature` removed, keys sorted at every depth. The
//! verifier checks clock skew before doing any crypto, compares in constant
//! time, and consumes the `(keyId, nonce)` tuple so an accepted payload can
//! never verify twice inside the skew window.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;

use crate::canonical::stable_stringify;
use crate::error::OperatorError;
use crate::model::envelope::AuthBlock;
use crate::store::a2a_nonce::{A2aNonceStore, ConsumeOutcome};

pub const AUTH_SCHEME: &str = "hmac-sha256-v1";
pub const DEFAULT_MAX_SKEW_SEC: u64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    /// Record what verification would have said; never fail.
    Observe,
    /// Like observe, but failures are surfaced in the security record.
    Warn,
    /// Fail closed.
    Enforce,
}

impl SecurityMode {
    pub fn parse(raw: &str) -> Option<SecurityMode> {
        match raw.trim().to_lowercase().as_str() {
            "observe" => Some(SecurityMode::Observe),
            "warn" => Some(SecurityMode::Warn),
            "enforce" => Some(SecurityMode::Enforce),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityMode::Observe => "observe",
            SecurityMode::Warn => "warn",
            SecurityMode::Enforce => "enforce",
        }
    }
}

/// A2A verification settings, resolved once at startup.
#[derive(Debug, Clone)]
pub struct A2aConfig {
    pub mode: SecurityMode,
    /// keyId → shared secret.
    pub keyring: HashMap<String, String>,
    pub allow_unsigned_live: bool,
    pub max_skew_sec: u64,
}

impl Default for A2aConfig {
    fn default() -> Self {
        A2aConfig {
            mode: SecurityMode::Observe,
            keyring: HashMap::new(),
            allow_unsigned_live: false,
            max_skew_sec: DEFAULT_MAX_SKEW_SEC,
        }
    }
}

/// What the verifier concluded, recorded into the execution-plane event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRecord {
    pub verified: bool,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Present when verification failed but the mode allowed the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Verify the auth block of an execution payload. In enforce mode failures
/// propagate; in observe/warn they fold into the returned record.
pub fn verify_execution_auth(
    payload: &Value,
    auth: Option<&AuthBlock>,
    config: &A2aConfig,
    replay: &A2aNonceStore,
    dry_run: bool,
) -> Result<SecurityRecord, OperatorError> {
    let outcome = match auth {
        None => {
            let unsigned_live_blocked = config.mode == SecurityMode::Enforce
                && !dry_run
                && !config.allow_unsigned_live;
            if unsigned_live_blocked {
                Err(OperatorError::A2aAuthRequired)
            } else {
                return Ok(SecurityRecord {
                    verified: false,
                    mode: config.mode.as_str(),
                    key_id: None,
                    nonce: None,
                    warning: None,
                });
            }
        }
        Some(auth) => verify_auth_block(payload, auth, config, replay),
    };

    match outcome {
        Ok(record) => Ok(record),
        Err(err) => match config.mode {
            SecurityMode::Enforce => Err(err),
            SecurityMode::Observe | SecurityMode::Warn => Ok(SecurityRecord {
                verified: false,
                mode: config.mode.as_str(),
                key_id: auth.and_then(|a| a.key_id.clone()),
                nonce: auth.and_then(|a| a.nonce.clone()),
                warning: Some(err.code().to_string()),
            }),
        },
    }
}

fn verify_auth_block(
    payload: &Value,
    auth: &AuthBlock,
    config: &A2aConfig,
    replay: &A2aNonceStore,
) -> Result<SecurityRecord, OperatorError> {
    match auth.scheme.as_deref() {
        Some(AUTH_SCHEME) => {}
        other => {
            return Err(OperatorError::A2aSchemeUnsupported {
                scheme: other.unwrap_or_default().to_string(),
            });
        }
    }

    let key_id = auth
        .key_id
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or(OperatorError::A2aKeyUnknown {
            key_id: String::new(),
        })?;
    let secret = config
        .keyring
        .get(key_id)
        .ok_or(OperatorError::A2aKeyUnknown {
            key_id: key_id.to_string(),
        })?;

    let timestamp = auth
        .timestamp
        .as_deref()
        .ok_or(OperatorError::FieldInvalid {
            field: "auth.timestamp",
            value: String::new(),
        })?;
    let ts: DateTime<Utc> = timestamp
        .parse()
        .map_err(|_| OperatorError::FieldInvalid {
            field: "auth.timestamp",
            value: timestamp.to_string(),
        })?;
    let skew_sec = (Utc::now() - ts).num_seconds().abs();
    if skew_sec > config.max_skew_sec as i64 {
        return Err(OperatorError::A2aTimestampSkew {
            skew_sec,
            max_skew_sec: config.max_skew_sec,
        });
    }

    let signature = auth
        .signature
        .as_deref()
        .ok_or(OperatorError::A2aSignatureMismatch)?;
    let signature_bytes =
        hex::decode(signature.to_lowercase()).map_err(|_| OperatorError::A2aSignatureMismatch)?;

    let canonical = canonical_auth_bytes(payload);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| OperatorError::A2aSignatureMismatch)?;
    mac.update(canonical.as_bytes());
    // verify_slice is the constant-time comparison
    mac.verify_slice(&signature_bytes)
        .map_err(|_| OperatorError::A2aSignatureMismatch)?;

    let nonce = auth
        .nonce
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or(OperatorError::A2aNonceReplay {
            key_id: key_id.to_string(),
            nonce: String::new(),
        })?;
    let expires_at_ms = ts.timestamp_millis() + 2 * (config.max_skew_sec as i64) * 1000;
    if let ConsumeOutcome::Replayed = replay.consume(key_id, nonce, expires_at_ms)? {
        return Err(OperatorError::A2aNonceReplay {
            key_id: key_id.to_string(),
            nonce: nonce.to_string(),
        });
    }

    Ok(SecurityRecord {
        verified: true,
        mode: config.mode.as_str(),
        key_id: Some(key_id.to_string()),
        nonce: Some(nonce.to_string()),
        warning: None,
    })
}

/// The signed byte string: the payload with `auth.signature` removed,
/// stable-stringified.
pub fn canonical_auth_bytes(payload: &Value) -> String {
    let mut doc = payload.clone();
    if let Some(auth) = doc.get_mut("auth").and_then(Value::as_object_mut) {
        auth.remove("signature");
    }
    stable_stringify(&doc)
}

/// Sign a payload for a given key, producing the lowercased hex signature.
/// Used by upstream agents and by tests; verification does not call this.
pub fn sign_payload(payload: &Value, secret: &str) -> String {
    let canonical = canonical_auth_bytes(payload);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::lock::LockOptions;
    use serde_json::json;

    fn signed_payload(secret: &str, nonce: &str, dry_run: bool) -> Value {
        let mut payload = json!({
            "schemaVersion": "v1",
            "plane": "execution",
            "operation": "transfer",
            "requestId": "req-000001",
            "correlationId": "corr-000001",
            "dryRun": dry_run,
            "intent": { "amount": "0.001", "asset": "ETH", "chain": "base",
                        "recipient": "0x000000000000000000000000000000000000dEaD" },
            "auth": {
                "scheme": "hmac-sha256-v1",
                "keyId": "bot-alpha",
                "nonce": nonce,
                "timestamp": Utc::now().to_rfc3339(),
            }
        });
        let signature = sign_payload(&payload, secret);
        payload["auth"]["signature"] = json!(signature);
        payload
    }

    fn config(mode: SecurityMode) -> A2aConfig {
        A2aConfig {
            mode,
            keyring: HashMap::from([("bot-alpha".to_string(), "secret-1".to_string())]),
            allow_unsigned_live: false,
            max_skew_sec: 300,
        }
    }

    fn replay_store(dir: &tempfile::TempDir) -> A2aNonceStore {
        A2aNonceStore::new(dir.path().join("a2a-nonce.json"), LockOptions::default())
    }

    fn auth_of(payload: &Value) -> AuthBlock {
        serde_json::from_value(payload["auth"].clone()).unwrap()
    }

    #[test]
    fn enforce_rejects_unsigned_live() {
        let dir = tempfile::tempdir().unwrap();
        let payload = json!({ "dryRun": false });
        let err = verify_execution_auth(
            &payload,
            None,
            &config(SecurityMode::Enforce),
            &replay_store(&dir),
            false,
        )
        .unwrap_err();
        assert_eq!(err.code(), "A2A_AUTH_REQUIRED");
    }

    #[test]
    fn enforce_allows_unsigned_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let record = verify_execution_auth(
            &json!({}),
            None,
            &config(SecurityMode::Enforce),
            &replay_store(&dir),
            true,
        )
        .unwrap();
        assert!(!record.verified);
    }

    #[test]
    fn valid_signature_verifies_then_replays() {
        let dir = tempfile::tempdir().unwrap();
        let store = replay_store(&dir);
        let payload = signed_payload("secret-1", "nonce-001", true);
        let auth = auth_of(&payload);
        let cfg = config(SecurityMode::Enforce);

        let record = verify_execution_auth(&payload, Some(&auth), &cfg, &store, true).unwrap();
        assert!(record.verified);
        assert_eq!(record.key_id.as_deref(), Some("bot-alpha"));

        let err =
            verify_execution_auth(&payload, Some(&auth), &cfg, &store, true).unwrap_err();
        assert_eq!(err.code(), "A2A_NONCE_REPLAY");
    }

    #[test]
    fn tampered_payload_fails_signature() {
        let dir = tempfile::tempdir().unwrap();
        let mut payload = signed_payload("secret-1", "nonce-002", true);
        payload["intent"]["amount"] = json!("999");
        let auth = auth_of(&payload);
        let err = verify_execution_auth(
            &payload,
            Some(&auth),
            &config(SecurityMode::Enforce),
            &replay_store(&dir),
            true,
        )
        .unwrap_err();
        assert_eq!(err.code(), "A2A_SIGNATURE_MISMATCH");
    }

    #[test]
    fn unknown_key_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut payload = signed_payload("secret-1", "nonce-003", true);
        payload["auth"]["keyId"] = json!("bot-gamma");
        let auth = auth_of(&payload);
        let err = verify_execution_auth(
            &payload,
            Some(&auth),
            &config(SecurityMode::Enforce),
            &replay_store(&dir),
            true,
        )
        .unwrap_err();
        assert_eq!(err.code(), "A2A_KEY_UNKNOWN");
    }

    #[test]
    fn stale_timestamp_is_skew() {
        let dir = tempfile::tempdir().unwrap();
        let mut payload = json!({
            "auth": {
                "scheme": "hmac-sha256-v1",
                "keyId": "bot-alpha",
                "nonce": "nonce-004",
                "timestamp": (Utc::now() - chrono::Duration::seconds(900)).to_rfc3339(),
            }
        });
        let signature = sign_payload(&payload, "secret-1");
        payload["auth"]["signature"] = json!(signature);
        let auth = auth_of(&payload);
        let err = verify_execution_auth(
            &payload,
            Some(&auth),
            &config(SecurityMode::Enforce),
            &replay_store(&dir),
            true,
        )
        .unwrap_err();
        assert_eq!(err.code(), "A2A_TIMESTAMP_SKEW");
    }

    #[test]
    fn warn_mode_surfaces_failure_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        let mut payload = signed_payload("secret-1", "nonce-005", true);
        payload["intent"]["amount"] = json!("999");
        let auth = auth_of(&payload);
        let record = verify_execution_auth(
            &payload,
            Some(&auth),
            &config(SecurityMode::Warn),
            &replay_store(&dir),
            true,
        )
        .unwrap();
        assert!(!record.verified);
        assert_eq!(record.warning.as_deref(), Some("A2A_SIGNATURE_MISMATCH"));
    }
}
