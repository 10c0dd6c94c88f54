//! Versioned operator policy document.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::chain::Chain;
use crate::error::OperatorError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyDocument {
    pub version: String,
    pub execution: ExecutionPolicy,
    pub allowlists: Allowlists,
    pub limits: Limits,
    pub idempotency: IdempotencyPolicy,
    pub circuit_breaker: CircuitBreakerPolicy,
    pub market_data: MarketDataPolicy,
    pub routing: RoutingPolicy,
    pub reporting: ReportingPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExecutionPolicy {
    pub allow_mainnet_only: bool,
    pub default_dry_run: bool,
    pub require_key_segregation: bool,
    #[serde(default)]
    pub require_recipient_allowlist: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Allowlists {
    pub chains: Vec<Chain>,
    /// Empty list means any asset.
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Check applies only when populated.
    #[serde(default)]
    pub contracts: Vec<String>,
    #[serde(default)]
    pub bridge_routes: Vec<BridgeRoute>,
    #[serde(default)]
    pub hyperliquid_symbols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BridgeRoute {
    pub from: Chain,
    pub to: Chain,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Limits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_order_size: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_slippage_bps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_slippage_bps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_perp_leverage: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_notional_usd_per_tx: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IdempotencyPolicy {
    pub ttl_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CircuitBreakerPolicy {
    pub enabled: bool,
    pub max_failures: u32,
    pub window_sec: u64,
    pub cooldown_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MarketDataPolicy {
    pub primary_price_source: String,
    pub fallback_price_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoutingPolicy {
    pub hyperliquid_operational_role: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReportingPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord_channel_id: Option<String>,
}

impl PolicyDocument {
    /// Load and structurally validate a policy file.
    pub fn load(path: &Path) -> Result<Self, OperatorError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OperatorError::PolicyNotFound {
                    path: path.display().to_string(),
                });
            }
            Err(e) => {
                return Err(OperatorError::PolicyInvalid {
                    reason: e.to_string(),
                });
            }
        };
        serde_json::from_str(&contents).map_err(|e| OperatorError::PolicyInvalid {
            reason: e.to_string(),
        })
    }
}
