//! Pump.fun bonding-curve swap connector.

use async_trait::async_trait;
use serde_json::json;

use super::{
    Connector, ConnectorError, ExecutionContext, ExecutionReport, PreflightReport, unsupported,
};
use crate::canonical::sha256_hex;
use crate::model::intent::CanonicalIntent;

pub struct PumpfunConnector;

#[async_trait]
impl Connector for PumpfunConnector {
    fn name(&self) -> &'static str {
        "pumpfun"
    }

    async fn preflight(&self, intent: &CanonicalIntent) -> Result<PreflightReport, ConnectorError> {
        let CanonicalIntent::SwapPumpfun {
            asset_in,
            asset_out,
            amount,
            slippage_bps,
            ..
        } = intent
        else {
            return Err(unsupported(self.name(), intent));
        };
        Ok(PreflightReport {
            connector: self.name().to_string(),
            action: intent.action().to_string(),
            checks: vec!["curve-quote".into()],
            estimate: json!({
                "curve": format!("{asset_in}->{asset_out}"),
                "amount": amount,
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
        let CanonicalIntent::SwapPumpfun { .. } = intent else {
            return Err(unsupported(self.name(), intent));
        };
        let digest = sha256_hex(format!("pumpfun:{}", ctx.run_id).as_bytes());
        Ok(ExecutionReport {
            connector: self.name().to_string(),
            action: intent.action().to_string(),
            reference: json!({ "txSignature": bs58::encode(digest.as_bytes()).into_string() }),
            fallback: None,
        })
    }
}
