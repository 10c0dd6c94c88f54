//! deBridge connector for cross-chain moves.

use async_trait::async_trait;
use serde_json::json;

use super::{
    Connector, ConnectorError, ExecutionContext, ExecutionReport, PreflightReport, unsupported,
};
use crate::canonical::sha256_hex;
use crate::model::intent::CanonicalIntent;

pub struct DebridgeConnector;

#[async_trait]
impl Connector for DebridgeConnector {
    fn name(&self) -> &'static str {
        "debridge"
    }

    async fn preflight(&self, intent: &CanonicalIntent) -> Result<PreflightReport, ConnectorError> {
        let CanonicalIntent::Bridge {
            from_chain,
            to_chain,
            asset,
            amount,
            recipient,
            ..
        } = intent
        else {
            return Err(unsupported(self.name(), intent));
        };
        Ok(PreflightReport {
            connector: self.name().to_string(),
            action: intent.action().to_string(),
            checks: vec!["route-supported".into(), "recipient-format".into()],
            estimate: json!({
                "route": format!("{from_chain}->{to_chain}"),
                "asset": asset,
                "amount": amount,
                "recipient": recipient,
                "estimatedSeconds": 120,
            }),
            fallback: None,
        })
    }

    async fn execute(
        &self,
        intent: &CanonicalIntent,
        ctx: &ExecutionContext<'_>,
    ) -> Result<ExecutionReport, ConnectorError> {
        let CanonicalIntent::Bridge { from_chain, .. } = intent else {
            return Err(unsupported(self.name(), intent));
        };
        let digest = sha256_hex(format!("debridge:{}", ctx.run_id).as_bytes());
        Ok(ExecutionReport {
            // Execution is attributed to the source chain; the bridge order
            // id is the cross-chain reference.
            connector: from_chain.to_string(),
            action: intent.action().to_string(),
            reference: json!({ "orderId": format!("0x{digest}") }),
            fallback: None,
        })
    }
}
