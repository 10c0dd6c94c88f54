//! Mention-delegation gate.
//!
//! A cross-bot handoff is only honored when the envelope proves which
//! message authorized it, the trigger has not looped back to its origin,
//! its TTL is still running, and the delegated-human-proxy attestations are
//! all present. Field problems are collected into one report; the loop,
//! expiry, and duplicate conditions carry their own codes.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::OperatorError;
use crate::model::envelope::{EnvelopeMeta, MentionDelegation};
use crate::store::mention_dedupe::MentionDedupeStore;

pub const GATED_MODE: &str = "gated";
const MIN_TTL_SECONDS: i64 = 5;
const MAX_TTL_SECONDS: i64 = 3600;

static CHANNEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^discord:(channel|thread):[0-9]{6,30}$").unwrap());
static MESSAGE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{6,30}$").unwrap());

/// Validate `meta.mentionDelegation` when the gated mode is requested.
/// `Ok(None)` when the payload is not gated.
pub fn validate_mention_delegation(
    meta: Option<&EnvelopeMeta>,
) -> Result<Option<MentionDelegation>, OperatorError> {
    let Some(meta) = meta else { return Ok(None) };
    if meta.mention_delegation_mode.as_deref() != Some(GATED_MODE) {
        return Ok(None);
    }

    let Some(doc) = meta.mention_delegation.as_ref().and_then(Value::as_object) else {
        return Err(OperatorError::MentionDelegationInvalid {
            errors: vec!["meta.mentionDelegation object is required in gated mode".into()],
        });
    };

    let mut errors = Vec::new();

    let channel = str_field(doc, "channel", &mut errors);
    if let Some(channel) = &channel
        && !CHANNEL.is_match(channel)
    {
        errors.push("channel: must match discord:(channel|thread):[0-9]{6,30}".into());
    }

    let message_id = str_field(doc, "messageId", &mut errors);
    if let Some(message_id) = &message_id
        && !MESSAGE_ID.is_match(message_id)
    {
        errors.push("messageId: must match [0-9]{6,30}".into());
    }

    let origin_bot_id = str_field(doc, "originBotId", &mut errors);
    let target_bot_id = str_field(doc, "targetBotId", &mut errors);

    match doc.get("dedupeBy").and_then(Value::as_str) {
        Some("messageId") => {}
        _ => errors.push("dedupeBy: the only accepted value is \"messageId\"".into()),
    }

    let ttl_seconds = match doc.get("ttlSeconds").and_then(Value::as_i64) {
        Some(ttl) if (MIN_TTL_SECONDS..=MAX_TTL_SECONDS).contains(&ttl) => Some(ttl),
        Some(ttl) => {
            errors.push(format!(
                "ttlSeconds: {ttl} outside [{MIN_TTL_SECONDS}, {MAX_TTL_SECONDS}]"
            ));
            None
        }
        None => {
            errors.push("ttlSeconds: integer is required".into());
            None
        }
    };

    let observed_at: Option<DateTime<Utc>> = match doc.get("observedAt").and_then(Value::as_str) {
        Some(raw) => match raw.parse() {
            Ok(ts) => Some(ts),
            Err(_) => {
                errors.push(format!("observedAt: `{raw}` is not ISO-8601"));
                None
            }
        },
        None => {
            errors.push("observedAt: ISO-8601 timestamp is required".into());
            None
        }
    };

    let (risk_classification, authorization_ref) = check_proxy(doc, &mut errors);

    if !errors.is_empty() {
        return Err(OperatorError::MentionDelegationInvalid { errors });
    }

    // Everything validated above is Some; anything else already errored.
    let (Some(channel), Some(message_id), Some(origin_bot_id), Some(target_bot_id)) =
        (channel, message_id, origin_bot_id, target_bot_id)
    else {
        return Err(OperatorError::MentionDelegationInvalid {
            errors: vec!["mention delegation fields incomplete".into()],
        });
    };
    let (Some(ttl_seconds), Some(observed_at)) = (ttl_seconds, observed_at) else {
        return Err(OperatorError::MentionDelegationInvalid {
            errors: vec!["mention delegation fields incomplete".into()],
        });
    };

    if origin_bot_id == target_bot_id {
        return Err(OperatorError::MentionDelegationLoop {
            bot_id: origin_bot_id,
        });
    }

    let expires_at = observed_at + Duration::seconds(ttl_seconds);
    if expires_at <= Utc::now() {
        return Err(OperatorError::MentionDelegationExpired {
            expires_at: expires_at.to_rfc3339(),
        });
    }

    Ok(Some(MentionDelegation {
        channel,
        message_id,
        origin_bot_id,
        target_bot_id,
        dedupe_by: "messageId".into(),
        ttl_seconds: ttl_seconds as u32,
        observed_at,
        expires_at,
        risk_classification,
        authorization_ref,
    }))
}

/// Consume the trigger: at most one pipeline per `(targetBotId, messageId)`
/// until expiry. Runs after security verification, before the pipeline.
pub fn register_mention_trigger(
    store: &MentionDedupeStore,
    delegation: &MentionDelegation,
) -> Result<(), OperatorError> {
    store.register(
        &delegation.target_bot_id,
        &delegation.message_id,
        delegation.expires_at.timestamp_millis(),
    )
}

fn str_field(
    doc: &serde_json::Map<String, Value>,
    field: &str,
    errors: &mut Vec<String>,
) -> Option<String> {
    match doc.get(field).and_then(Value::as_str) {
        Some(value) if !value.trim().is_empty() => Some(value.to_string()),
        _ => {
            errors.push(format!("{field}: non-empty string is required"));
            None
        }
    }
}

fn check_proxy(
    doc: &serde_json::Map<String, Value>,
    errors: &mut Vec<String>,
) -> (Option<String>, Option<String>) {
    let Some(proxy) = doc.get("delegatedHumanProxy").and_then(Value::as_object) else {
        errors.push("delegatedHumanProxy: object is required".into());
        return (None, None);
    };

    if proxy.get("mode").and_then(Value::as_str) != Some("delegated-human-proxy") {
        errors.push("delegatedHumanProxy.mode: must be \"delegated-human-proxy\"".into());
    }
    for gate in ["policyValidated", "envelopeValidated", "riskGatePassed"] {
        if proxy.get(gate).and_then(Value::as_bool) != Some(true) {
            errors.push(format!("delegatedHumanProxy.{gate}: must be true"));
        }
    }

    let risk_classification = proxy.get("riskClassification").and_then(Value::as_str);
    if let Some(classification) = risk_classification
        && !matches!(classification, "read" | "diagnostic" | "sensitive" | "live")
    {
        errors.push(format!(
            "delegatedHumanProxy.riskClassification: `{classification}` not in read|diagnostic|sensitive|live"
        ));
    }

    let authorization_ref = proxy
        .get("authorizationRef")
        .and_then(Value::as_str)
        .map(str::to_string);
    if matches!(risk_classification, Some("sensitive") | Some("live")) && authorization_ref.is_none()
    {
        errors.push(
            "delegatedHumanProxy.authorizationRef: required for sensitive/live classifications"
                .into(),
        );
    }

    (risk_classification.map(str::to_string), authorization_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gated_meta(delegation: Value) -> EnvelopeMeta {
        EnvelopeMeta {
            mention_delegation_mode: Some("gated".into()),
            mention_delegation: Some(delegation),
            source: None,
        }
    }

    fn valid_delegation() -> Value {
        json!({
            "channel": "discord:channel:123456789012345678",
            "messageId": "1473395000000000777",
            "originBotId": "decision-router",
            "targetBotId": "exec-operator",
            "dedupeBy": "messageId",
            "ttlSeconds": 300,
            "observedAt": Utc::now().to_rfc3339(),
            "delegatedHumanProxy": {
                "mode": "delegated-human-proxy",
                "policyValidated": true,
                "envelopeValidated": true,
                "riskGatePassed": true,
                "riskClassification": "live",
                "authorizationRef": "ticket-4411"
            }
        })
    }

    #[test]
    fn ungated_meta_passes_through() {
        let meta = EnvelopeMeta::default();
        assert!(validate_mention_delegation(Some(&meta)).unwrap().is_none());
        assert!(validate_mention_delegation(None).unwrap().is_none());
    }

    #[test]
    fn valid_gated_delegation_is_accepted() {
        let delegation = validate_mention_delegation(Some(&gated_meta(valid_delegation())))
            .unwrap()
            .unwrap();
        assert_eq!(delegation.dedupe_key(), "exec-operator:1473395000000000777");
        assert_eq!(delegation.ttl_seconds, 300);
    }

    #[test]
    fn loop_to_origin_is_rejected() {
        let mut doc = valid_delegation();
        doc["targetBotId"] = json!("decision-router");
        let err = validate_mention_delegation(Some(&gated_meta(doc))).unwrap_err();
        assert_eq!(err.code(), "EXECUTION_MENTION_DELEGATION_LOOP");
    }

    #[test]
    fn expired_trigger_is_rejected() {
        let mut doc = valid_delegation();
        doc["observedAt"] = json!((Utc::now() - Duration::seconds(600)).to_rfc3339());
        let err = validate_mention_delegation(Some(&gated_meta(doc))).unwrap_err();
        assert_eq!(err.code(), "EXECUTION_MENTION_DELEGATION_EXPIRED");
    }

    #[test]
    fn ttl_bounds_are_inclusive_five_and_exclusive_above_3600() {
        let mut doc = valid_delegation();
        doc["ttlSeconds"] = json!(5);
        assert!(validate_mention_delegation(Some(&gated_meta(doc.clone()))).is_ok());
        doc["ttlSeconds"] = json!(3601);
        let err = validate_mention_delegation(Some(&gated_meta(doc.clone()))).unwrap_err();
        assert_eq!(err.code(), "EXECUTION_MENTION_DELEGATION_INVALID");
        doc["ttlSeconds"] = json!(0);
        assert!(validate_mention_delegation(Some(&gated_meta(doc))).is_err());
    }

    #[test]
    fn field_errors_are_collected() {
        let mut doc = valid_delegation();
        doc["channel"] = json!("slack:channel:123456789");
        doc["dedupeBy"] = json!("channel");
        doc["delegatedHumanProxy"]["riskGatePassed"] = json!(false);
        let err = validate_mention_delegation(Some(&gated_meta(doc))).unwrap_err();
        match err {
            OperatorError::MentionDelegationInvalid { errors } => {
                assert_eq!(errors.len(), 3, "expected all errors collected: {errors:?}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn sensitive_without_authorization_ref_is_invalid() {
        let mut doc = valid_delegation();
        doc["delegatedHumanProxy"]["riskClassification"] = json!("sensitive");
        doc["delegatedHumanProxy"]
            .as_object_mut()
            .unwrap()
            .remove("authorizationRef");
        let err = validate_mention_delegation(Some(&gated_meta(doc))).unwrap_err();
        assert_eq!(err.code(), "EXECUTION_MENTION_DELEGATION_INVALID");
    }

    #[test]
    fn dedupe_consumes_trigger_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = MentionDedupeStore::with_defaults(dir.path().join("dedupe.json"));
        let delegation = validate_mention_delegation(Some(&gated_meta(valid_delegation())))
            .unwrap()
            .unwrap();
        register_mention_trigger(&store, &delegation).unwrap();
        let err = register_mention_trigger(&store, &delegation).unwrap_err();
        assert_eq!(err.code(), "EXECUTION_MENTION_DELEGATION_DUPLICATE");
    }
}
