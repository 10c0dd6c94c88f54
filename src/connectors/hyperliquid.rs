//! Hyperliquid connector: orders, cancels, modifies, deposits, and the
//! native bridge. Beyond the common trait it exposes the venue info
//! surface and policy enrichment (reference-price hydration and default
//! slippage injection), and it draws every live nonce from the file-backed
//! coordinator so concurrent pipelines stay strictly monotonic per signer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use super::{
    Connector, ConnectorError, ExecutionContext, ExecutionReport, PreflightReport, unsupported,
};
use crate::model::intent::CanonicalIntent;
use crate::model::policy::PolicyDocument;
use crate::store::nonce::{NonceCoordinator, NonceRequest};

/// Venue market-data surface. The production implementation speaks the
/// info endpoint; tests and offline runs use [`StaticMarketData`].
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Mid price for a market, if the venue knows it.
    async fn mid_price(&self, market: &str) -> Result<Option<Decimal>, ConnectorError>;

    /// Raw info query passthrough.
    async fn info(&self, query: &Value) -> Result<Value, ConnectorError>;
}

/// Fixed mid prices, handed in at construction.
#[derive(Debug, Default)]
pub struct StaticMarketData {
    mids: HashMap<String, Decimal>,
}

impl StaticMarketData {
    pub fn new(mids: HashMap<String, Decimal>) -> Self {
        StaticMarketData { mids }
    }
}

#[async_trait]
impl MarketData for StaticMarketData {
    async fn mid_price(&self, market: &str) -> Result<Option<Decimal>, ConnectorError> {
        Ok(self.mids.get(market).copied())
    }

    async fn info(&self, query: &Value) -> Result<Value, ConnectorError> {
        Ok(json!({ "query": query, "mids": self.mids.keys().collect::<Vec<_>>() }))
    }
}

pub struct HyperliquidConnector {
    market_data: Arc<dyn MarketData>,
    nonces: Arc<NonceCoordinator>,
    /// Lowercased API-wallet address; required for live execution only.
    signer: Option<String>,
}

impl HyperliquidConnector {
    pub fn new(
        market_data: Arc<dyn MarketData>,
        nonces: Arc<NonceCoordinator>,
        signer: Option<String>,
    ) -> Self {
        HyperliquidConnector {
            market_data,
            nonces,
            signer: signer.map(|s| s.to_lowercase()),
        }
    }

    /// Policy enrichment for orders: market orders gain the policy's
    /// default slippage when they carry none, and a reference price from
    /// the venue mid so the notional cap can be enforced. The fingerprint
    /// is computed before this step, so hydration never shifts it.
    pub async fn enrich_intent_for_policy(
        &self,
        intent: CanonicalIntent,
        policy: &PolicyDocument,
    ) -> Result<CanonicalIntent, ConnectorError> {
        let CanonicalIntent::HlOrder {
            market,
            kind,
            side,
            size,
            price,
            reduce_only,
            leverage,
            slippage_bps,
            tif,
            cloid,
            reference_price,
        } = intent
        else {
            return Ok(intent);
        };

        let (slippage_bps, reference_price) = if price.is_market() {
            let slippage = slippage_bps.or(policy.limits.default_slippage_bps);
            let reference = match reference_price {
                Some(p) => Some(p),
                None => self.market_data.mid_price(&market).await?,
            };
            (slippage, reference)
        } else {
            (slippage_bps, reference_price)
        };

        Ok(CanonicalIntent::HlOrder {
            market,
            kind,
            side,
            size,
            price,
            reduce_only,
            leverage,
            slippage_bps,
            tif,
            cloid,
            reference_price,
        })
    }

    pub async fn info(&self, query: &Value) -> Result<Value, ConnectorError> {
        self.market_data.info(query).await
    }

    fn live_signer(&self) -> Result<&str, ConnectorError> {
        self.signer.as_deref().ok_or_else(|| {
            ConnectorError::new(
                "HYPERLIQUID_SIGNER_MISSING",
                "no API wallet configured for live hyperliquid execution",
            )
        })
    }

    fn accepts(intent: &CanonicalIntent) -> bool {
        matches!(
            intent,
            CanonicalIntent::HlOrder { .. }
                | CanonicalIntent::HlCancel { .. }
                | CanonicalIntent::HlModify { .. }
                | CanonicalIntent::HlDeposit { .. }
                | CanonicalIntent::HlBridgeDeposit { .. }
                | CanonicalIntent::HlBridgeWithdraw { .. }
        )
    }
}

#[async_trait]
impl Connector for HyperliquidConnector {
    fn name(&self) -> &'static str {
        "hyperliquid"
    }

    async fn preflight(&self, intent: &CanonicalIntent) -> Result<PreflightReport, ConnectorError> {
        if !Self::accepts(intent) {
            return Err(unsupported(self.name(), intent));
        }
        let estimate = match intent {
            CanonicalIntent::HlOrder {
                market,
                kind,
                side,
                size,
                price,
                slippage_bps,
                reference_price,
                ..
            } => json!({
                "market": market,
                "kind": kind,
                "side": side,
                "size": size,
                "price": price,
                "slippageBps": slippage_bps,
                "referencePrice": reference_price,
            }),
            CanonicalIntent::HlCancel { market, order_ref } => {
                json!({ "market": market, "orderRef": order_ref })
            }
            CanonicalIntent::HlModify {
                market,
                order_ref,
                price,
                size,
            } => json!({
                "market": market,
                "orderRef": order_ref,
                "price": price,
                "size": size,
            }),
            CanonicalIntent::HlDeposit { asset, amount }
            | CanonicalIntent::HlBridgeDeposit { asset, amount }
            | CanonicalIntent::HlBridgeWithdraw { asset, amount } => {
                json!({ "asset": asset, "amount": amount })
            }
            _ => unreachable!("accepts() gated non-hyperliquid intents"),
        };
        Ok(PreflightReport {
            connector: self.name().to_string(),
            action: intent.action().to_string(),
            checks: vec!["market-known".into(), "order-shape".into()],
            estimate,
            fallback: None,
        })
    }

    async fn execute(
        &self,
        intent: &CanonicalIntent,
        ctx: &ExecutionContext<'_>,
    ) -> Result<ExecutionReport, ConnectorError> {
        if !Self::accepts(intent) {
            return Err(unsupported(self.name(), intent));
        }
        let signer = self.live_signer()?;
        let nonce = self
            .nonces
            .next_nonce(NonceRequest {
                signer,
                floor: None,
            })
            .map_err(|e| {
                ConnectorError::new("HYPERLIQUID_NONCE_UNAVAILABLE", e.to_string())
            })?;

        Ok(ExecutionReport {
            connector: self.name().to_string(),
            action: intent.action().to_string(),
            reference: json!({
                "nonce": nonce,
                "signer": signer,
                "runId": ctx.run_id,
            }),
            fallback: None,
        })
    }
}
