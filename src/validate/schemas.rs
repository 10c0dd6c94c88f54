//! Per-operation intent schemas for the execution plane.
//!
//! Each operation has a strict shape: unknown keys are rejected
//! (`deny_unknown_fields`), field types are pinned, and anything optional
//! is explicit. Value-range rules (positivity, bps bounds, address
//! formats) are the normalizer's job and carry their own codes; this layer
//! answers only "is this document the right shape for the operation".

use serde::Deserialize;
use serde_json::Value;

/// Shape-check an intent document against its operation's schema. Returns
/// the collected schema error messages on failure.
pub fn check_intent_shape(operation: &str, intent: &Value) -> Result<(), Vec<String>> {
    let result = match operation {
        "transfer" | "send" => probe::<TransferIntent>(intent),
        "bridge" => probe::<BridgeIntent>(intent),
        "swap_jupiter" | "swap_raydium" | "swap_pumpfun" => probe::<SwapIntent>(intent),
        "hl_order" => probe::<HlOrderIntent>(intent),
        "hl_cancel" => probe::<HlCancelIntent>(intent),
        "hl_modify" => probe::<HlModifyIntent>(intent),
        "hl_deposit" => probe::<HlDepositIntent>(intent),
        "defi_deposit" | "defi_withdraw" => probe::<DefiIntent>(intent),
        "portfolio_balance" => probe::<BalanceIntent>(intent),
        "contract_call" => probe::<ContractCallIntent>(intent),
        "hl_bridge_deposit" | "hl_bridge_withdraw" => probe::<HlBridgeIntent>(intent),
        _ => return Err(vec![format!("no intent schema for operation `{operation}`")]),
    };
    result.and_then(|()| check_amount_fields(intent))
}

/// Operations the execution plane accepts.
pub fn is_known_operation(operation: &str) -> bool {
    matches!(
        operation,
        "transfer"
            | "send"
            | "bridge"
            | "swap_jupiter"
            | "swap_raydium"
            | "swap_pumpfun"
            | "hl_order"
            | "hl_cancel"
            | "hl_modify"
            | "hl_deposit"
            | "defi_deposit"
            | "defi_withdraw"
            | "portfolio_balance"
            | "contract_call"
            | "hl_bridge_deposit"
            | "hl_bridge_withdraw"
    )
}

fn probe<'de, T: Deserialize<'de>>(intent: &'de Value) -> Result<(), Vec<String>> {
    T::deserialize(intent)
        .map(|_| ())
        .map_err(|e| vec![format!("intent: {e}")])
}

/// Numeric-ish fields accept a JSON number or a non-empty string of at most
/// 64 characters.
fn check_amount_fields(intent: &Value) -> Result<(), Vec<String>> {
    const NUMERIC_FIELDS: [&str; 5] = ["amount", "size", "value", "price", "leverage"];
    let Some(map) = intent.as_object() else {
        return Ok(());
    };
    let mut errors = Vec::new();
    for field in NUMERIC_FIELDS {
        match map.get(field) {
            None | Some(Value::Number(_)) => {}
            Some(Value::String(s)) => {
                if s.is_empty() || s.len() > 64 {
                    errors.push(format!("intent.{field}: expected 1..=64 characters"));
                }
            }
            Some(other) => {
                errors.push(format!(
                    "intent.{field}: expected number or string, got {other}"
                ));
            }
        }
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

// ── Shapes ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct TransferIntent {
    amount: Value,
    asset: String,
    recipient: String,
    #[serde(default)]
    chain: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct BridgeIntent {
    amount: Value,
    asset: String,
    from_chain: String,
    to_chain: String,
    #[serde(default)]
    recipient: Option<String>,
    #[serde(default)]
    provider: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct SwapIntent {
    amount: Value,
    asset_in: String,
    asset_out: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    slippage_bps: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct HlOrderIntent {
    market: String,
    side: String,
    size: Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    reduce_only: Option<bool>,
    #[serde(default)]
    leverage: Option<Value>,
    #[serde(default)]
    slippage_bps: Option<Value>,
    #[serde(default)]
    tif: Option<String>,
    #[serde(default)]
    cloid: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct HlCancelIntent {
    market: String,
    #[serde(default)]
    oid: Option<Value>,
    #[serde(default)]
    cloid: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct HlModifyIntent {
    market: String,
    #[serde(default)]
    oid: Option<Value>,
    #[serde(default)]
    cloid: Option<String>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    size: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct HlDepositIntent {
    amount: Value,
    #[serde(default)]
    asset: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct DefiIntent {
    chain: String,
    protocol: String,
    asset: String,
    amount: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct BalanceIntent {
    #[serde(default)]
    chain: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct ContractCallIntent {
    contract: String,
    calldata: String,
    #[serde(default)]
    chain: Option<String>,
    #[serde(default)]
    value: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct HlBridgeIntent {
    amount: Value,
    #[serde(default)]
    asset: Option<String>,
}
