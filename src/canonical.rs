//! Canonical JSON and fingerprinting.
//!
//! Idempotency keys and A2A signatures are both computed over a
//! deterministic serialization: keys sorted lexicographically at every
//! depth, no insignificant whitespace. Two logically-equal documents with
//! different key orders always produce identical bytes.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serialize a JSON value with lexicographically sorted object keys.
pub fn stable_stringify(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // serde_json handles string escaping; keys are plain strings
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_value(out, &map[*key]);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Lowercase hex SHA-256 of arbitrary bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Idempotency fingerprint: SHA-256 over the stable serialization of
/// `{intent, policyVersion}`. Hydrated fields (reference price, injected
/// slippage) must be stripped by the caller before this point so that
/// market drift never shifts the key.
pub fn fingerprint(policy_version: &str, intent: &Value) -> String {
    let doc = serde_json::json!({
        "policyVersion": policy_version,
        "intent": intent,
    });
    sha256_hex(stable_stringify(&doc).as_bytes())
}
