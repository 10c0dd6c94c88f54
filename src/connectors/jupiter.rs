//! Jupiter aggregator connector for Solana swaps.

use async_trait::async_trait;
use serde_json::json;

use super::{
    Connector, ConnectorError, ExecutionContext, ExecutionReport, PreflightReport, unsupported,
};
use crate::canonical::sha256_hex;
use crate::model::intent::CanonicalIntent;

pub struct JupiterConnector;

#[async_trait]
impl Connector for JupiterConnector {
    fn name(&self) -> &'static str {
        "jupiter"
    }

    async fn preflight(&self, intent: &CanonicalIntent) -> Result<PreflightReport, ConnectorError> {
        let CanonicalIntent::SwapJupiter {
            asset_in,
            asset_out,
            amount,
            mode,
            slippage_bps,
        } = intent
        else {
            return Err(unsupported(self.name(), intent));
        };
        Ok(PreflightReport {
            connector: self.name().to_string(),
            action: intent.action().to_string(),
            checks: vec!["route-quote".into(), "slippage-bounds".into()],
            estimate: json!({
                "route": [asset_in, asset_out],
                "amount": amount,
                "mode": mode,
                "slippageBps": slippage_bps,
            }),
            fallback: None,
        })
    }

    async fn execute(
        &self,
        intent: &CanonicalIntent,
        ctx: &ExecutionContext<'_>,
    ) -> Result<ExecutionReport, ConnectorError> {
        let CanonicalIntent::SwapJupiter { .. } = intent else {
            return Err(unsupported(self.name(), intent));
        };
        let digest = sha256_hex(format!("jupiter:{}", ctx.run_id).as_bytes());
        Ok(ExecutionReport {
            connector: self.name().to_string(),
            action: intent.action().to_string(),
            reference: json!({ "txSignature": bs58::encode(digest.as_bytes()).into_string() }),
            fallback: None,
        })
    }
}
