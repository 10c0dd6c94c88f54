//! Control-plane pipeline scenarios: NL instructions end to end.

mod common;

use common::*;
use serde_json::json;

#[tokio::test]
async fn nl_transfer_dry_run_plans_preflight_only() {
    let dir = tempfile::tempdir().unwrap();
    let executor = executor(dir.path(), &policy_json(), &[]);

    let outcome = executor
        .run_instruction(
            "send 0.001 ETH to 0x000000000000000000000000000000000000dEaD",
            &dry(),
        )
        .await;

    assert!(outcome.ok, "expected ok, got {:?}", outcome.error);
    assert!(outcome.dry_run);
    assert_eq!(outcome.source, "instruction");

    let intent = outcome.intent.as_ref().unwrap();
    assert_eq!(intent["action"], "transfer");
    assert_eq!(intent["chain"], "base");
    assert_eq!(intent["amount"], "0.001");

    let plan = outcome.plan.as_ref().unwrap();
    assert_eq!(serde_json::to_value(plan.mode).unwrap(), "dry-run");
    let preflight = plan
        .steps
        .iter()
        .find(|s| s.id == "preflight-transfer")
        .expect("preflight step");
    assert_eq!(preflight.connector.as_deref(), Some("base"));
    assert!(!plan.has_step("execute-transfer"));

    // Dry runs never touch the idempotency store but still report the key.
    assert!(outcome.idempotency_key.is_some());
}

#[tokio::test]
async fn audit_trail_has_contractual_event_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let executor = executor(dir.path(), &policy_json(), &[]);

    let outcome = executor
        .run_instruction(
            "send 0.001 ETH to 0x000000000000000000000000000000000000dEaD",
            &dry(),
        )
        .await;
    assert!(outcome.ok);

    let events = executor.audit_log().read_run(&outcome.run_id).unwrap();
    let names: Vec<&str> = events.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(
        names,
        [
            "intent.parsed",
            "intent.normalized",
            "policy.checked",
            "plan.generated",
            "execution.completed"
        ]
    );
}

#[tokio::test]
async fn hl_market_order_hydrates_and_enforces_notional_cap() {
    let dir = tempfile::tempdir().unwrap();
    let executor = executor(dir.path(), &policy_json(), &[("BTC", "50000")]);

    // 0.001 BTC at mid 50000 = 50 USD, inside the 100 USD cap.
    let ok = executor
        .run_instruction("buy 0.001 BTC perp at market on hyperliquid", &dry())
        .await;
    assert!(ok.ok, "expected ok, got {:?}", ok.error);
    let intent = ok.intent.as_ref().unwrap();
    assert_eq!(intent["slippageBps"], 50);
    assert_eq!(intent["referencePrice"], "50000");

    let events = executor.audit_log().read_run(&ok.run_id).unwrap();
    assert!(events.iter().any(|e| e.event == "intent.policy_enriched"));
    assert!(events.iter().any(|e| e.event == "plan.generated"));

    // 0.01 BTC = 500 USD blows the cap.
    let over = executor
        .run_instruction("buy 0.01 BTC perp at market on hyperliquid", &dry())
        .await;
    assert!(!over.ok);
    assert_eq!(over.error.unwrap().code, "POLICY_NOTIONAL_EXCEEDED");
}

#[tokio::test]
async fn idempotency_key_is_stable_under_hydration() {
    let dir = tempfile::tempdir().unwrap();
    let instruction = "buy 0.001 BTC perp at market on hyperliquid";

    let first = executor(dir.path(), &policy_json(), &[("BTC", "50000")])
        .run_instruction(instruction, &dry())
        .await;
    let second = executor(dir.path(), &policy_json(), &[("BTC", "51000")])
        .run_instruction(instruction, &dry())
        .await;

    assert!(first.ok && second.ok);
    assert_eq!(first.idempotency_key, second.idempotency_key);
    assert_ne!(
        first.intent.as_ref().unwrap()["referencePrice"],
        second.intent.as_ref().unwrap()["referencePrice"]
    );
}

#[tokio::test]
async fn balance_read_runs_without_live_gates() {
    let dir = tempfile::tempdir().unwrap();
    let mut policy = policy_json();
    policy["execution"]["defaultDryRun"] = json!(false);
    // Key segregation on: a live write would now demand wallet keys, but a
    // read must not.
    policy["execution"]["requireKeySegregation"] = json!(true);
    let executor = executor(dir.path(), &policy, &[]);

    let outcome = executor.run_instruction("/saldo", &live()).await;
    assert!(outcome.ok, "expected ok, got {:?}", outcome.error);
    assert!(!outcome.dry_run);
    let plan = outcome.plan.as_ref().unwrap();
    assert_eq!(
        plan.step_ids(),
        [
            "validate-policy",
            "fetch-balances",
            "mark-to-market",
            "format-discord-response"
        ]
    );
}

#[tokio::test]
async fn unparseable_instruction_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    let executor = executor(dir.path(), &policy_json(), &[]);
    let outcome = executor.run_instruction("do something good", &dry()).await;
    assert!(!outcome.ok);
    assert_eq!(outcome.error.as_ref().unwrap().code, "INTENT_PARSE_ERROR");

    let events = executor.audit_log().read_run(&outcome.run_id).unwrap();
    assert_eq!(events.last().unwrap().event, "execution.failed");
}

#[tokio::test]
async fn policy_denied_chain_short_circuits_before_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut policy = policy_json();
    policy["allowlists"]["chains"] = json!(["base"]);
    let executor = executor(dir.path(), &policy, &[]);

    let outcome = executor.run_instruction("swap 1 SOL for USDC", &dry()).await;
    assert!(!outcome.ok);
    assert_eq!(outcome.error.unwrap().code, "POLICY_CHAIN_DENIED");

    // Policy refused it, so no plan and no connector work was recorded.
    let events = executor.audit_log().read_run(&outcome.run_id).unwrap();
    assert!(!events.iter().any(|e| e.event == "plan.generated"));
    assert!(!events.iter().any(|e| e.event == "execution.completed"));
}

#[tokio::test]
async fn pt_instruction_runs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let executor = executor(dir.path(), &policy_json(), &[]);

    let outcome = executor
        .run_instruction(
            "transfira 0,01 SOL para 7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU na solana",
            &dry(),
        )
        .await;
    assert!(outcome.ok, "expected ok, got {:?}", outcome.error);
    let intent = outcome.intent.as_ref().unwrap();
    assert_eq!(intent["action"], "transfer");
    assert_eq!(intent["chain"], "solana");
    assert_eq!(intent["amount"], "0.01");
}
