//! Execution-plane payload validation.
//!
//! Ordered per the wire contract: envelope schema, envelope field rules,
//! operation lookup, per-operation intent schema, then normalization into
//! the canonical intent. Schema-level failures collect every error they
//! can before reporting.

pub mod schemas;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::OperatorError;
use crate::model::envelope::ExecutionEnvelope;
use crate::model::intent::{CanonicalIntent, UncheckedIntent};
use crate::normalize;

pub const SCHEMA_VERSION: &str = "v1";
pub const PLANE: &str = "execution";

static ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._:-]{6,128}$").unwrap());

/// A payload that passed every schema gate, alongside its canonical intent.
#[derive(Debug, Clone)]
pub struct ValidatedPayload {
    pub envelope: ExecutionEnvelope,
    pub intent: CanonicalIntent,
}

/// Validate and canonicalize an execution-plane payload.
pub fn parse_execution_payload(payload: &Value) -> Result<ValidatedPayload, OperatorError> {
    let envelope: ExecutionEnvelope =
        serde_json::from_value(payload.clone()).map_err(|e| OperatorError::SchemaInvalid {
            errors: vec![format!("envelope: {e}")],
        })?;

    let mut errors = Vec::new();
    if envelope.schema_version != SCHEMA_VERSION {
        errors.push(format!(
            "schemaVersion: expected \"{SCHEMA_VERSION}\", got \"{}\"",
            envelope.schema_version
        ));
    }
    if envelope.plane != PLANE {
        errors.push(format!(
            "plane: expected \"{PLANE}\", got \"{}\"",
            envelope.plane
        ));
    }
    if !ID_PATTERN.is_match(&envelope.request_id) {
        errors.push("requestId: must match [a-zA-Z0-9._:-]{6,128}".to_string());
    }
    if !ID_PATTERN.is_match(&envelope.correlation_id) {
        errors.push("correlationId: must match [a-zA-Z0-9._:-]{6,128}".to_string());
    }
    if !errors.is_empty() {
        return Err(OperatorError::SchemaInvalid { errors });
    }

    if !schemas::is_known_operation(&envelope.operation) {
        return Err(OperatorError::OperationUnknown {
            operation: envelope.operation.clone(),
        });
    }
    if let Err(errors) = schemas::check_intent_shape(&envelope.operation, &envelope.intent) {
        return Err(OperatorError::SchemaInvalid { errors });
    }

    // Shape is good; hand the loose form to the normalizer for semantics.
    let mut unchecked: UncheckedIntent =
        serde_json::from_value(envelope.intent.clone()).map_err(|e| {
            OperatorError::SchemaInvalid {
                errors: vec![format!("intent: {e}")],
            }
        })?;
    unchecked.action = Some(envelope.operation.clone());
    let intent = normalize::normalize(&unchecked)?;

    Ok(ValidatedPayload { envelope, intent })
}
