//! Execution-plane wire types.
//!
//! The envelope is strict (`additionalProperties=false`); the blocks that
//! have their own error vocabularies — auth and mention delegation — stay
//! loosely typed here so the A2A verifier and the mention gate can report
//! their specific codes instead of a generic schema failure.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Signed JSON envelope accepted on the execution plane.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExecutionEnvelope {
    /// Pinned to `"v1"`.
    pub schema_version: String,
    /// Pinned to `"execution"`.
    pub plane: String,
    pub operation: String,
    pub request_id: String,
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    pub intent: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<EnvelopeMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthBlock>,
}

/// Envelope metadata. Unknown keys are tolerated here — upstream routers
/// attach their own annotations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention_delegation_mode: Option<String>,
    /// Validated field-by-field by the mention gate, not by serde.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention_delegation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// HMAC auth block. Fields are optional at the type level; the verifier
/// turns each absence into its precise `A2A_*` code.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// ISO-8601.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Lowercased hex HMAC-SHA256 over the canonical payload bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Fully-validated mention-delegation trigger, produced by the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionDelegation {
    pub channel: String,
    pub message_id: String,
    pub origin_bot_id: String,
    pub target_bot_id: String,
    pub dedupe_by: String,
    pub ttl_seconds: u32,
    pub observed_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_ref: Option<String>,
}

impl MentionDelegation {
    pub fn dedupe_key(&self) -> String {
        format!("{}:{}", self.target_bot_id, self.message_id)
    }
}
