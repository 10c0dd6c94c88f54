//! Pipeline orchestrator.
//!
//! Three entry points — free-text instructions, native commands, and
//! signed execution payloads — converge on one intent pipeline:
//! policy, enrichment, plan, safety gates, dispatch, persistence. The
//! public surface never returns `Err`: every failure folds into the
//! `{ok:false, error}` outcome after the audit trail and persistent state
//! have been updated.

pub mod config;
pub mod keys;

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use serde_json::{Value, json};

use crate::connectors::ExecutionContext;
use crate::connectors::hyperliquid::MarketData;
use crate::connectors::registry::ConnectorRegistry;
use crate::error::{ErrorBody, OperatorError};
use crate::mention;
use crate::model::intent::{CanonicalIntent, UncheckedIntent};
use crate::model::plan::Plan;
use crate::model::policy::{CircuitBreakerPolicy, PolicyDocument};
use crate::normalize;
use crate::parse;
use crate::plan::build_plan;
use crate::policy as policy_engine;
use crate::security;
use crate::store::StateLayout;
use crate::store::a2a_nonce::A2aNonceStore;
use crate::store::audit::AuditLog;
use crate::store::circuit_breaker::CircuitBreaker;
use crate::store::idempotency::IdempotencyStore;
use crate::store::mention_dedupe::MentionDedupeStore;
use crate::store::nonce::NonceCoordinator;
use crate::validate;

use config::OperatorConfig;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Caller-side dry-run request; ORed with the envelope's flag and the
    /// policy default.
    pub dry_run: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Instruction,
    Native,
    ExecutionPayload,
}

impl Source {
    fn as_str(&self) -> &'static str {
        match self {
            Source::Instruction => "instruction",
            Source::Native => "native",
            Source::ExecutionPayload => "execution_payload",
        }
    }
}

/// Public pipeline return shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub ok: bool,
    pub run_id: String,
    pub source: &'static str,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_plane: Option<Value>,
    /// Post-enrichment intent: what policy evaluated and connectors saw.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Value>,
    /// Pre-enrichment canonical intent: what the fingerprint covers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_intent: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// Mutable per-run context. Tracks exactly how far the run got so the
/// failure path knows which stores to update.
struct RunContext {
    run_id: String,
    source: Source,
    arg_dry_run: Option<bool>,
    dry_run: bool,
    idempotency_key: Option<String>,
    pending_marked: bool,
    breaker_policy: Option<CircuitBreakerPolicy>,
    execution_plane: Option<Value>,
    intent_value: Option<Value>,
    canonical_value: Option<Value>,
    plan: Option<Plan>,
}

impl RunContext {
    fn new(run_id: String, source: Source, arg_dry_run: Option<bool>) -> Self {
        RunContext {
            run_id,
            source,
            arg_dry_run,
            dry_run: arg_dry_run.unwrap_or(true),
            idempotency_key: None,
            pending_marked: false,
            breaker_policy: None,
            execution_plane: None,
            intent_value: None,
            canonical_value: None,
            plan: None,
        }
    }
}

pub struct Executor {
    config: OperatorConfig,
    registry: ConnectorRegistry,
    audit: AuditLog,
    idempotency: IdempotencyStore,
    breaker: CircuitBreaker,
    replay: A2aNonceStore,
    mention_dedupe: MentionDedupeStore,
}

impl Executor {
    pub fn new(config: OperatorConfig, market_data: Arc<dyn MarketData>) -> Self {
        let layout = StateLayout::new(&config.state_dir);
        let nonces = Arc::new(NonceCoordinator::with_defaults(layout.hyperliquid_nonce()));
        let registry = ConnectorRegistry::build(
            market_data,
            nonces,
            config.hyperliquid_account_address.clone(),
        );
        Executor {
            audit: AuditLog::new(layout.audit()),
            idempotency: IdempotencyStore::new(layout.idempotency(), config.lock),
            breaker: CircuitBreaker::new(layout.circuit_breaker(), config.lock),
            replay: A2aNonceStore::new(layout.a2a_nonce(), config.lock),
            mention_dedupe: MentionDedupeStore::with_defaults(layout.mention_dedupe()),
            registry,
            config,
        }
    }

    /// Replace the default connector wiring. Lets callers decorate or
    /// substitute venues without touching the pipeline.
    pub fn with_registry(mut self, registry: ConnectorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    // ── Entry points ────────────────────────────────────────────────

    /// Control plane: free-form pt/en instruction.
    pub async fn run_instruction(&self, text: &str, opts: &RunOptions) -> RunOutcome {
        let mut ctx = RunContext::new(new_run_id(), Source::Instruction, opts.dry_run);
        let result = self.instruction_pipeline(&mut ctx, text).await;
        self.conclude(ctx, result)
    }

    /// Native command: a structured, loosely-typed intent from the CLI.
    pub async fn run_native_command(
        &self,
        unchecked: &UncheckedIntent,
        opts: &RunOptions,
    ) -> RunOutcome {
        let mut ctx = RunContext::new(new_run_id(), Source::Native, opts.dry_run);
        let result = self.native_pipeline(&mut ctx, unchecked).await;
        self.conclude(ctx, result)
    }

    /// Execution plane: signed JSON envelope from an upstream agent.
    pub async fn run_execution_payload(&self, payload: &Value, opts: &RunOptions) -> RunOutcome {
        let mut ctx = RunContext::new(new_run_id(), Source::ExecutionPayload, opts.dry_run);
        let result = self.payload_pipeline(&mut ctx, payload).await;
        self.conclude(ctx, result)
    }

    // ── Per-source front-ends ───────────────────────────────────────

    async fn instruction_pipeline(
        &self,
        ctx: &mut RunContext,
        text: &str,
    ) -> Result<Value, OperatorError> {
        let unchecked = parse::parse_instruction(text)?;
        self.audit.append(
            &ctx.run_id,
            "intent.parsed",
            json!({
                "action": unchecked.action,
                "language": unchecked.language,
                "raw": text,
            }),
        )?;
        let canonical = normalize::normalize(&unchecked)?;
        self.audit
            .append(&ctx.run_id, "intent.normalized", canonical.to_value())?;
        self.intent_pipeline(ctx, canonical).await
    }

    async fn native_pipeline(
        &self,
        ctx: &mut RunContext,
        unchecked: &UncheckedIntent,
    ) -> Result<Value, OperatorError> {
        let canonical = normalize::normalize(unchecked)?;
        self.audit
            .append(&ctx.run_id, "intent.normalized", canonical.to_value())?;
        self.intent_pipeline(ctx, canonical).await
    }

    async fn payload_pipeline(
        &self,
        ctx: &mut RunContext,
        payload: &Value,
    ) -> Result<Value, OperatorError> {
        let validated = validate::parse_execution_payload(payload)?;
        let envelope = &validated.envelope;

        // Caller flag and envelope flag both force a dry run.
        let envelope_dry = envelope.dry_run.unwrap_or(false);
        let requested_dry = ctx.arg_dry_run.unwrap_or(false) || envelope_dry;
        ctx.arg_dry_run = Some(requested_dry);
        ctx.dry_run = requested_dry;

        let delegation = mention::validate_mention_delegation(envelope.meta.as_ref())?;
        let security_record = security::verify_execution_auth(
            payload,
            envelope.auth.as_ref(),
            &self.config.a2a,
            &self.replay,
            requested_dry,
        )?;
        // Consume the trigger only after the sender proved who they are.
        if let Some(delegation) = &delegation {
            mention::register_mention_trigger(&self.mention_dedupe, delegation)?;
        }

        let plane = json!({
            "requestId": envelope.request_id,
            "correlationId": envelope.correlation_id,
            "operation": envelope.operation,
            "security": security_record,
            "mentionDelegation": delegation,
        });
        ctx.execution_plane = Some(plane.clone());
        self.audit
            .append(&ctx.run_id, "execution_plane.received", plane)?;
        self.audit.append(
            &ctx.run_id,
            "intent.normalized",
            validated.intent.to_value(),
        )?;
        self.intent_pipeline(ctx, validated.intent.clone()).await
    }

    // ── Common pipeline ─────────────────────────────────────────────

    async fn intent_pipeline(
        &self,
        ctx: &mut RunContext,
        canonical: CanonicalIntent,
    ) -> Result<Value, OperatorError> {
        let policy = PolicyDocument::load(&self.config.policy_path)?;
        ctx.breaker_policy = Some(policy.circuit_breaker.clone());

        let dry_run = ctx.arg_dry_run.unwrap_or(false) || policy.execution.default_dry_run;
        ctx.dry_run = dry_run;
        ctx.canonical_value = Some(canonical.to_value());

        // Fingerprint the ORIGINAL canonical intent: hydration below must
        // not shift the idempotency key between retries.
        let fingerprint = IdempotencyStore::compute(&canonical.to_value(), &policy.version);
        ctx.idempotency_key = Some(fingerprint.clone());

        let enriched = self
            .registry
            .hyperliquid
            .enrich_intent_for_policy(canonical.clone(), &policy)
            .await
            .map_err(OperatorError::from)?;
        if enriched != canonical {
            self.audit
                .append(&ctx.run_id, "intent.policy_enriched", enriched.to_value())?;
        }
        ctx.intent_value = Some(enriched.to_value());

        let report = policy_engine::evaluate(&enriched, &policy)?;
        self.audit.append(
            &ctx.run_id,
            "policy.checked",
            serde_json::to_value(&report).unwrap_or(Value::Null),
        )?;

        let plan = build_plan(&enriched, dry_run);
        self.audit.append(
            &ctx.run_id,
            "plan.generated",
            serde_json::to_value(&plan).unwrap_or(Value::Null),
        )?;
        ctx.plan = Some(plan);

        let live_write = !dry_run && !enriched.is_read_only();
        if live_write {
            if policy.execution.require_key_segregation {
                keys::assert_key_segregation(&self.config)?;
            }
            self.breaker.assert_can_execute(&policy.circuit_breaker)?;
            self.idempotency
                .cleanup_expired(policy.idempotency.ttl_days)?;
            if let Some(existing) = self.idempotency.get(&fingerprint)?
                && existing.status.blocks_retry()
            {
                return Err(OperatorError::IdempotencyDuplicate {
                    status: existing.status.as_str().to_string(),
                    run_id: existing.run_id,
                });
            }
            self.idempotency.mark_pending(&fingerprint, &ctx.run_id)?;
            ctx.pending_marked = true;
        }

        let connector = self.registry.for_intent(&enriched);
        let exec_ctx = ExecutionContext {
            run_id: &ctx.run_id,
            idempotency_key: ctx.idempotency_key.as_deref(),
        };
        let result = if enriched.is_read_only() {
            // Reads have no live/dry distinction.
            let report = connector
                .execute(&enriched, &exec_ctx)
                .await
                .map_err(OperatorError::from)?;
            json!({ "report": report })
        } else if dry_run {
            let preflight = connector
                .preflight(&enriched)
                .await
                .map_err(OperatorError::from)?;
            json!({ "preflight": preflight })
        } else {
            let preflight = connector
                .preflight(&enriched)
                .await
                .map_err(OperatorError::from)?;
            let execution = connector
                .execute(&enriched, &exec_ctx)
                .await
                .map_err(OperatorError::from)?;
            json!({ "preflight": preflight, "execution": execution })
        };

        if live_write {
            self.idempotency
                .mark_success(&fingerprint, &ctx.run_id, Some(result.clone()))?;
            self.breaker.register_success(&policy.circuit_breaker)?;
            // The terminal status is on disk; the failure path must not
            // rewrite it if a later append fails.
            ctx.pending_marked = false;
        }
        self.audit.append(
            &ctx.run_id,
            "execution.completed",
            json!({ "dryRun": dry_run, "result": &result }),
        )?;
        Ok(result)
    }

    /// Fold the pipeline result into the public outcome, updating the
    /// failure stores when the run had already passed the live-write gate.
    fn conclude(&self, ctx: RunContext, result: Result<Value, OperatorError>) -> RunOutcome {
        match result {
            Ok(result) => RunOutcome {
                ok: true,
                run_id: ctx.run_id,
                source: ctx.source.as_str(),
                dry_run: ctx.dry_run,
                idempotency_key: ctx.idempotency_key,
                execution_plane: ctx.execution_plane,
                intent: ctx.intent_value,
                canonical_intent: ctx.canonical_value,
                plan: ctx.plan,
                result: Some(result),
                error: None,
            },
            Err(err) => {
                let body = ErrorBody::from(&err);
                // Best-effort from here: a secondary store failure must not
                // mask the primary error.
                let _ = self.audit.append(
                    &ctx.run_id,
                    "execution.failed",
                    json!({ "error": &body }),
                );
                if ctx.pending_marked
                    && let Some(key) = &ctx.idempotency_key
                {
                    let _ = self.idempotency.mark_failure(key, &ctx.run_id, body.clone());
                    if let Some(breaker_policy) = &ctx.breaker_policy {
                        let _ = self.breaker.register_failure(breaker_policy, &body);
                    }
                }
                RunOutcome {
                    ok: false,
                    run_id: ctx.run_id,
                    source: ctx.source.as_str(),
                    dry_run: ctx.dry_run,
                    idempotency_key: ctx.idempotency_key,
                    execution_plane: ctx.execution_plane,
                    intent: ctx.intent_value,
                    canonical_intent: ctx.canonical_value,
                    plan: ctx.plan,
                    result: None,
                    error: Some(body),
                }
            }
        }
    }
}

fn new_run_id() -> String {
    let suffix: u32 = rand::rng().random();
    format!("run_{}_{suffix:08x}", Utc::now().timestamp_millis())
}
