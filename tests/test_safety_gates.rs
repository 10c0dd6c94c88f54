//! Live-write safety gates: idempotency, circuit breaker, key segregation,
//! and the Jupiter→Raydium network fallback.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::*;
use serde_json::json;

use exec_flow::connectors::fallback::JupiterWithRaydiumFallback;
use exec_flow::connectors::raydium::RaydiumConnector;
use exec_flow::connectors::registry::ConnectorRegistry;
use exec_flow::connectors::{
    Connector, ConnectorError, ExecutionContext, ExecutionReport, PreflightReport,
};
use exec_flow::model::intent::CanonicalIntent;

const TRANSFER: &str = "send 0.001 ETH to 0x000000000000000000000000000000000000dEaD";
const SWAP: &str = "swap 1 SOL for USDC";

/// A Jupiter that always fails with a configurable error.
struct FailingJupiter {
    error: ConnectorError,
}

#[async_trait]
impl Connector for FailingJupiter {
    fn name(&self) -> &'static str {
        "jupiter"
    }

    async fn preflight(
        &self,
        _intent: &CanonicalIntent,
    ) -> Result<PreflightReport, ConnectorError> {
        Err(self.error.clone())
    }

    async fn execute(
        &self,
        _intent: &CanonicalIntent,
        _ctx: &ExecutionContext<'_>,
    ) -> Result<ExecutionReport, ConnectorError> {
        Err(self.error.clone())
    }
}

fn live_policy() -> serde_json::Value {
    let mut policy = policy_json();
    policy["execution"]["defaultDryRun"] = json!(false);
    policy["circuitBreaker"]["maxFailures"] = json!(2);
    policy
}

fn registry_with_jupiter(
    dir: &std::path::Path,
    jupiter: Arc<dyn Connector>,
) -> ConnectorRegistry {
    use exec_flow::connectors::hyperliquid::StaticMarketData;
    use exec_flow::store::nonce::NonceCoordinator;
    let mut registry = ConnectorRegistry::build(
        Arc::new(StaticMarketData::default()),
        Arc::new(NonceCoordinator::with_defaults(
            dir.join("state/hyperliquid-nonce.json"),
        )),
        None,
    );
    registry.jupiter = jupiter;
    registry
}

#[tokio::test]
async fn duplicate_live_intent_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let executor = executor(dir.path(), &live_policy(), &[]);

    let first = executor.run_instruction(TRANSFER, &live()).await;
    assert!(first.ok, "expected ok, got {:?}", first.error);
    assert!(!first.dry_run);
    let result = first.result.as_ref().unwrap();
    assert!(result["execution"]["reference"]["txHash"].is_string());

    let second = executor.run_instruction(TRANSFER, &live()).await;
    assert!(!second.ok);
    let error = second.error.unwrap();
    assert_eq!(error.code, "IDEMPOTENCY_DUPLICATE");
    assert_eq!(error.details["status"], "success");
    assert_eq!(error.details["runId"], first.run_id);
}

#[tokio::test]
async fn dry_run_does_not_consume_idempotency() {
    let dir = tempfile::tempdir().unwrap();
    let executor = executor(dir.path(), &live_policy(), &[]);

    let dry_outcome = executor.run_instruction(TRANSFER, &dry()).await;
    assert!(dry_outcome.ok);

    let live_outcome = executor.run_instruction(TRANSFER, &live()).await;
    assert!(live_outcome.ok, "dry run must not block the live run");
}

#[tokio::test]
async fn venue_failure_marks_failure_and_permits_retry() {
    let dir = tempfile::tempdir().unwrap();
    let failing = Arc::new(FailingJupiter {
        error: ConnectorError::new("JUPITER_EXECUTION_FAILED", "route not found"),
    });
    let executor = executor(dir.path(), &live_policy(), &[])
        .with_registry(registry_with_jupiter(dir.path(), failing));

    let first = executor.run_instruction(SWAP, &live()).await;
    assert!(!first.ok);
    assert_eq!(
        first.error.as_ref().unwrap().code,
        "JUPITER_EXECUTION_FAILED"
    );

    // Failure status does not block a retry of the same fingerprint: the
    // retry reaches the connector again.
    let second = executor.run_instruction(SWAP, &live()).await;
    assert!(!second.ok);
    assert_eq!(
        second.error.as_ref().unwrap().code,
        "JUPITER_EXECUTION_FAILED"
    );
}

#[tokio::test]
async fn circuit_breaker_opens_after_max_failures() {
    let dir = tempfile::tempdir().unwrap();
    let failing = Arc::new(FailingJupiter {
        error: ConnectorError::new("JUPITER_EXECUTION_FAILED", "route not found"),
    });
    let executor = executor(dir.path(), &live_policy(), &[])
        .with_registry(registry_with_jupiter(dir.path(), failing));

    for _ in 0..2 {
        let outcome = executor.run_instruction(SWAP, &live()).await;
        assert!(!outcome.ok);
    }

    // The breaker is open for every live write now, not just swaps.
    let outcome = executor.run_instruction(TRANSFER, &live()).await;
    assert!(!outcome.ok);
    let error = outcome.error.unwrap();
    assert_eq!(error.code, "CIRCUIT_BREAKER_OPEN");
    assert_eq!(
        error.details["lastError"]["code"],
        "JUPITER_EXECUTION_FAILED"
    );

    // Dry runs stay available while the breaker cools down.
    let dry_outcome = executor.run_instruction(TRANSFER, &dry()).await;
    assert!(dry_outcome.ok);
}

#[tokio::test]
async fn network_failure_falls_back_to_raydium() {
    let dir = tempfile::tempdir().unwrap();
    let failing = Arc::new(FailingJupiter {
        error: ConnectorError::new("JUPITER_EXECUTION_FAILED", "connection timed out"),
    });
    let jupiter: Arc<dyn Connector> = Arc::new(JupiterWithRaydiumFallback::new(
        failing,
        Arc::new(RaydiumConnector),
    ));
    let executor = executor(dir.path(), &live_policy(), &[])
        .with_registry(registry_with_jupiter(dir.path(), jupiter));

    let outcome = executor.run_instruction(SWAP, &live()).await;
    assert!(outcome.ok, "expected fallback, got {:?}", outcome.error);

    let result = outcome.result.as_ref().unwrap();
    assert_eq!(result["execution"]["connector"], "raydium");
    assert_eq!(result["execution"]["fallback"]["from"], "jupiter");
    assert_eq!(
        result["execution"]["fallback"]["reason"],
        "JUPITER_EXECUTION_FAILED"
    );
}

#[tokio::test]
async fn venue_logic_failure_does_not_fall_back() {
    let dir = tempfile::tempdir().unwrap();
    let failing = Arc::new(FailingJupiter {
        error: ConnectorError::new("JUPITER_EXECUTION_FAILED", "slippage tolerance exceeded"),
    });
    let jupiter: Arc<dyn Connector> = Arc::new(JupiterWithRaydiumFallback::new(
        failing,
        Arc::new(RaydiumConnector),
    ));
    let executor = executor(dir.path(), &live_policy(), &[])
        .with_registry(registry_with_jupiter(dir.path(), jupiter));

    let outcome = executor.run_instruction(SWAP, &live()).await;
    assert!(!outcome.ok);
    assert_eq!(outcome.error.unwrap().code, "JUPITER_EXECUTION_FAILED");
}

#[tokio::test]
async fn key_segregation_blocks_unkeyed_live_writes() {
    let dir = tempfile::tempdir().unwrap();
    let mut policy = live_policy();
    policy["execution"]["requireKeySegregation"] = json!(true);
    let executor = executor(dir.path(), &policy, &[]);

    let outcome = executor.run_instruction(TRANSFER, &live()).await;
    assert!(!outcome.ok);
    let error = outcome.error.unwrap();
    assert_eq!(error.code, "KEY_SEGREGATION_KEYS_MISSING");
    assert_eq!(error.details["missing"].as_array().unwrap().len(), 3);
}
