//! Intent representations.
//!
//! Two stages, on purpose: [`UncheckedIntent`] is whatever the NL parser or
//! an execution payload produced — everything optional, strings and raw
//! JSON. [`CanonicalIntent`] is the fully-typed sum the rest of the system
//! consumes. Policy evaluation, plan building, and connectors only accept
//! the canonical form, so nothing downstream can run on unvalidated input.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::chain::Chain;

// ── Shared vocabulary ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    Perp,
    Spot,
}

/// Hyperliquid time-in-force; wire casing follows the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tif {
    Alo,
    Ioc,
    Gtc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapMode {
    ExactIn,
    ExactOut,
}

/// Either the literal `"market"` or a limit price, preserved as a decimal
/// string on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Price {
    Market,
    Limit(Decimal),
}

impl Price {
    pub fn is_market(&self) -> bool {
        matches!(self, Price::Market)
    }

    pub fn limit(&self) -> Option<Decimal> {
        match self {
            Price::Market => None,
            Price::Limit(p) => Some(*p),
        }
    }
}

impl Serialize for Price {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Price::Market => serializer.serialize_str("market"),
            Price::Limit(p) => serializer.serialize_str(&p.normalize().to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == "market" {
            return Ok(Price::Market);
        }
        raw.parse::<Decimal>()
            .map(Price::Limit)
            .map_err(|_| serde::de::Error::custom(format!("invalid price `{raw}`")))
    }
}

/// Order reference: venue-assigned integer id or client-chosen 32-hex id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderRef {
    Oid(u64),
    Cloid(String),
}

impl std::fmt::Display for OrderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderRef::Oid(oid) => write!(f, "{oid}"),
            OrderRef::Cloid(cloid) => f.write_str(cloid),
        }
    }
}

// ── Canonical intent ────────────────────────────────────────────────

/// The single internal representation every downstream component consumes.
/// Amounts and prices are decimals internally and decimal strings at the
/// JSON edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CanonicalIntent {
    #[serde(rename_all = "camelCase")]
    Transfer {
        chain: Chain,
        asset: String,
        amount: Decimal,
        recipient: String,
    },
    /// Alias operation for `transfer` kept distinct on the wire.
    #[serde(rename_all = "camelCase")]
    Send {
        chain: Chain,
        asset: String,
        amount: Decimal,
        recipient: String,
    },
    #[serde(rename_all = "camelCase")]
    Bridge {
        from_chain: Chain,
        to_chain: Chain,
        asset: String,
        amount: Decimal,
        provider: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SwapJupiter {
        asset_in: String,
        asset_out: String,
        amount: Decimal,
        mode: SwapMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slippage_bps: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    SwapRaydium {
        asset_in: String,
        asset_out: String,
        amount: Decimal,
        mode: SwapMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slippage_bps: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    SwapPumpfun {
        asset_in: String,
        asset_out: String,
        amount: Decimal,
        mode: SwapMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slippage_bps: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    HlOrder {
        market: String,
        kind: MarketKind,
        side: Side,
        size: Decimal,
        price: Price,
        #[serde(default)]
        reduce_only: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        leverage: Option<Decimal>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slippage_bps: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tif: Option<Tif>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cloid: Option<String>,
        /// Venue mid attached by policy hydration for market orders; never
        /// part of the idempotency fingerprint.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference_price: Option<Decimal>,
    },
    #[serde(rename_all = "camelCase")]
    HlCancel {
        market: String,
        order_ref: OrderRef,
    },
    #[serde(rename_all = "camelCase")]
    HlModify {
        market: String,
        order_ref: OrderRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        price: Option<Price>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<Decimal>,
    },
    #[serde(rename_all = "camelCase")]
    HlDeposit { asset: String, amount: Decimal },
    #[serde(rename_all = "camelCase")]
    DefiDeposit {
        chain: Chain,
        protocol: String,
        asset: String,
        amount: Decimal,
    },
    #[serde(rename_all = "camelCase")]
    DefiWithdraw {
        chain: Chain,
        protocol: String,
        asset: String,
        amount: Decimal,
    },
    #[serde(rename_all = "camelCase")]
    PortfolioBalance {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chain: Option<Chain>,
    },
    #[serde(rename_all = "camelCase")]
    ContractCall {
        chain: Chain,
        contract: String,
        calldata: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Decimal>,
    },
    #[serde(rename_all = "camelCase")]
    HlBridgeDeposit { asset: String, amount: Decimal },
    #[serde(rename_all = "camelCase")]
    HlBridgeWithdraw { asset: String, amount: Decimal },
}

impl CanonicalIntent {
    /// Wire name of the action, matching the serde tag.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "transfer",
            Self::Send { .. } => "send",
            Self::Bridge { .. } => "bridge",
            Self::SwapJupiter { .. } => "swap_jupiter",
            Self::SwapRaydium { .. } => "swap_raydium",
            Self::SwapPumpfun { .. } => "swap_pumpfun",
            Self::HlOrder { .. } => "hl_order",
            Self::HlCancel { .. } => "hl_cancel",
            Self::HlModify { .. } => "hl_modify",
            Self::HlDeposit { .. } => "hl_deposit",
            Self::DefiDeposit { .. } => "defi_deposit",
            Self::DefiWithdraw { .. } => "defi_withdraw",
            Self::PortfolioBalance { .. } => "portfolio_balance",
            Self::ContractCall { .. } => "contract_call",
            Self::HlBridgeDeposit { .. } => "hl_bridge_deposit",
            Self::HlBridgeWithdraw { .. } => "hl_bridge_withdraw",
        }
    }

    /// Chains a policy chain-allowlist check must cover.
    pub fn chains(&self) -> Vec<Chain> {
        match self {
            Self::Transfer { chain, .. } | Self::Send { chain, .. } => vec![*chain],
            Self::Bridge {
                from_chain,
                to_chain,
                ..
            } => vec![*from_chain, *to_chain],
            Self::SwapJupiter { .. } | Self::SwapRaydium { .. } | Self::SwapPumpfun { .. } => {
                vec![Chain::Solana]
            }
            Self::HlOrder { .. }
            | Self::HlCancel { .. }
            | Self::HlModify { .. }
            | Self::HlDeposit { .. }
            | Self::HlBridgeDeposit { .. }
            | Self::HlBridgeWithdraw { .. } => vec![Chain::Hyperliquid],
            Self::DefiDeposit { chain, .. } | Self::DefiWithdraw { chain, .. } => vec![*chain],
            Self::PortfolioBalance { chain } => chain.map(|c| vec![c]).unwrap_or_default(),
            Self::ContractCall { chain, .. } => vec![*chain],
        }
    }

    /// Assets a policy asset-allowlist check must cover.
    pub fn assets(&self) -> Vec<&str> {
        match self {
            Self::Transfer { asset, .. }
            | Self::Send { asset, .. }
            | Self::Bridge { asset, .. }
            | Self::HlDeposit { asset, .. }
            | Self::DefiDeposit { asset, .. }
            | Self::DefiWithdraw { asset, .. }
            | Self::HlBridgeDeposit { asset, .. }
            | Self::HlBridgeWithdraw { asset, .. } => vec![asset],
            Self::SwapJupiter {
                asset_in,
                asset_out,
                ..
            }
            | Self::SwapRaydium {
                asset_in,
                asset_out,
                ..
            }
            | Self::SwapPumpfun {
                asset_in,
                asset_out,
                ..
            } => vec![asset_in, asset_out],
            Self::HlOrder { .. }
            | Self::HlCancel { .. }
            | Self::HlModify { .. }
            | Self::PortfolioBalance { .. }
            | Self::ContractCall { .. } => Vec::new(),
        }
    }

    /// Read-only actions skip the live-write gates entirely.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::PortfolioBalance { .. })
    }

    pub fn recipient(&self) -> Option<&str> {
        match self {
            Self::Transfer { recipient, .. } | Self::Send { recipient, .. } => Some(recipient),
            Self::Bridge { recipient, .. } => recipient.as_deref(),
            _ => None,
        }
    }

    /// Operations that cannot run without a recipient.
    pub fn requires_recipient(&self) -> bool {
        matches!(self, Self::Transfer { .. } | Self::Send { .. })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("canonical intent serializes")
    }
}

// ── Unchecked intent ────────────────────────────────────────────────

/// Convergence point between the NL parser and the execution-plane payload:
/// every field optional, numbers still raw JSON (string or number). The
/// normalizer is the only consumer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UncheckedIntent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Original instruction text, control plane only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_out: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage_bps: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tif: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calldata: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}
