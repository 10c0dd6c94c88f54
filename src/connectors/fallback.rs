//! Jupiter → Raydium network-failure fallback.
//!
//! A decorator around the Jupiter connector: when Jupiter fails with a
//! network-class error (connectivity-flavored preflight/execution failures,
//! or HTTP 408/425/429/5xx), the same swap is re-dispatched to Raydium and
//! the report carries a `fallback` record naming the original failure.
//! Venue-logic rejections (bad route, slippage exceeded on-chain) are not
//! retried anywhere.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Connector, ConnectorError, ExecutionContext, ExecutionReport, PreflightReport};
use crate::model::intent::CanonicalIntent;

const NETWORK_FALLBACK_CODES: [&str; 2] = ["JUPITER_PREFLIGHT_FAILED", "JUPITER_EXECUTION_FAILED"];
const NETWORK_MESSAGE_MARKERS: [&str; 8] = [
    "timeout",
    "timed out",
    "network",
    "connection",
    "econnreset",
    "socket",
    "dns",
    "unreachable",
];

pub struct JupiterWithRaydiumFallback {
    jupiter: Arc<dyn Connector>,
    raydium: Arc<dyn Connector>,
}

impl JupiterWithRaydiumFallback {
    pub fn new(jupiter: Arc<dyn Connector>, raydium: Arc<dyn Connector>) -> Self {
        JupiterWithRaydiumFallback { jupiter, raydium }
    }
}

/// Is this Jupiter failure a network condition rather than a venue verdict?
pub fn is_network_error(err: &ConnectorError) -> bool {
    if err.code == "JUPITER_HTTP_ERROR" {
        return matches!(err.http_status, Some(408 | 425 | 429) | Some(500..=599));
    }
    if NETWORK_FALLBACK_CODES.contains(&err.code.as_str()) {
        let message = err.message.to_lowercase();
        return NETWORK_MESSAGE_MARKERS
            .iter()
            .any(|marker| message.contains(marker));
    }
    false
}

fn fallback_record(err: &ConnectorError) -> Value {
    json!({
        "from": "jupiter",
        "reason": err.code,
        "detail": err.message,
    })
}

/// The same swap, re-addressed to Raydium.
fn to_raydium(intent: &CanonicalIntent) -> Option<CanonicalIntent> {
    match intent {
        CanonicalIntent::SwapJupiter {
            asset_in,
            asset_out,
            amount,
            mode,
            slippage_bps,
        } => Some(CanonicalIntent::SwapRaydium {
            asset_in: asset_in.clone(),
            asset_out: asset_out.clone(),
            amount: *amount,
            mode: *mode,
            slippage_bps: *slippage_bps,
        }),
        _ => None,
    }
}

#[async_trait]
impl Connector for JupiterWithRaydiumFallback {
    fn name(&self) -> &'static str {
        "jupiter"
    }

    async fn preflight(&self, intent: &CanonicalIntent) -> Result<PreflightReport, ConnectorError> {
        match self.jupiter.preflight(intent).await {
            Ok(report) => Ok(report),
            Err(err) if is_network_error(&err) => {
                let Some(raydium_intent) = to_raydium(intent) else {
                    return Err(err);
                };
                let mut report = self.raydium.preflight(&raydium_intent).await?;
                report.fallback = Some(fallback_record(&err));
                Ok(report)
            }
            Err(err) => Err(err),
        }
    }

    async fn execute(
        &self,
        intent: &CanonicalIntent,
        ctx: &ExecutionContext<'_>,
    ) -> Result<ExecutionReport, ConnectorError> {
        match self.jupiter.execute(intent, ctx).await {
            Ok(report) => Ok(report),
            Err(err) if is_network_error(&err) => {
                let Some(raydium_intent) = to_raydium(intent) else {
                    return Err(err);
                };
                let mut report = self.raydium.execute(&raydium_intent, ctx).await?;
                report.fallback = Some(fallback_record(&err));
                Ok(report)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_network_conditions() {
        let timeout = ConnectorError::new("JUPITER_EXECUTION_FAILED", "request timed out");
        assert!(is_network_error(&timeout));

        let rejected = ConnectorError::new("JUPITER_EXECUTION_FAILED", "route not found");
        assert!(!is_network_error(&rejected));

        let gateway = ConnectorError::new("JUPITER_HTTP_ERROR", "bad gateway").with_status(502);
        assert!(is_network_error(&gateway));

        let throttled = ConnectorError::new("JUPITER_HTTP_ERROR", "slow down").with_status(429);
        assert!(is_network_error(&throttled));

        let not_found = ConnectorError::new("JUPITER_HTTP_ERROR", "no route").with_status(404);
        assert!(!is_network_error(&not_found));

        let other_venue = ConnectorError::new("RAYDIUM_EXECUTION_FAILED", "network error");
        assert!(!is_network_error(&other_venue));
    }
}
