//! Plan builder: intent → ordered step list.
//!
//! Every plan opens with `validate-policy`. Reads fan into the balance
//! pipeline; writes get a preflight step and, outside dry-run, an execute
//! step. The execute step of a bridge is attributed to the source chain,
//! which is where the funds actually move first.

use crate::model::intent::CanonicalIntent;
use crate::model::plan::{Plan, PlanMode, PlanStep, StepKind};

pub fn build_plan(intent: &CanonicalIntent, dry_run: bool) -> Plan {
    let mode = if dry_run { PlanMode::DryRun } else { PlanMode::Live };
    let mut steps = vec![PlanStep {
        id: "validate-policy".into(),
        kind: StepKind::Validate,
        connector: None,
    }];

    if intent.is_read_only() {
        steps.push(PlanStep {
            id: "fetch-balances".into(),
            kind: StepKind::Fetch,
            connector: None,
        });
        steps.push(PlanStep {
            id: "mark-to-market".into(),
            kind: StepKind::Transform,
            connector: None,
        });
        steps.push(PlanStep {
            id: "format-discord-response".into(),
            kind: StepKind::Report,
            connector: None,
        });
        return Plan { mode, steps };
    }

    let action = intent.action();
    steps.push(PlanStep {
        id: format!("preflight-{action}"),
        kind: StepKind::Preflight,
        connector: Some(preflight_connector(intent).to_string()),
    });
    if !dry_run {
        steps.push(PlanStep {
            id: format!("execute-{action}"),
            kind: StepKind::Execute,
            connector: Some(execute_connector(intent).to_string()),
        });
    }
    Plan { mode, steps }
}

/// Connector a write's preflight runs against.
pub fn preflight_connector(intent: &CanonicalIntent) -> &'static str {
    match intent {
        CanonicalIntent::Transfer { chain, .. }
        | CanonicalIntent::Send { chain, .. }
        | CanonicalIntent::DefiDeposit { chain, .. }
        | CanonicalIntent::DefiWithdraw { chain, .. }
        | CanonicalIntent::ContractCall { chain, .. } => chain.as_str(),
        CanonicalIntent::Bridge { .. } => "debridge",
        CanonicalIntent::SwapJupiter { .. } => "jupiter",
        CanonicalIntent::SwapRaydium { .. } => "raydium",
        CanonicalIntent::SwapPumpfun { .. } => "pumpfun",
        CanonicalIntent::HlOrder { .. }
        | CanonicalIntent::HlCancel { .. }
        | CanonicalIntent::HlModify { .. }
        | CanonicalIntent::HlDeposit { .. }
        | CanonicalIntent::HlBridgeDeposit { .. }
        | CanonicalIntent::HlBridgeWithdraw { .. } => "hyperliquid",
        CanonicalIntent::PortfolioBalance { .. } => "portfolio",
    }
}

/// Connector the execute step is attributed to. Only bridges differ from
/// preflight: execution starts on the source chain.
pub fn execute_connector(intent: &CanonicalIntent) -> &'static str {
    match intent {
        CanonicalIntent::Bridge { from_chain, .. } => from_chain.as_str(),
        other => preflight_connector(other),
    }
}
