//! Solana connector: native SOL transfers and DeFi protocol moves.

use async_trait::async_trait;
use serde_json::json;

use super::{
    Connector, ConnectorError, ExecutionContext, ExecutionReport, PreflightReport, unsupported,
};
use crate::canonical::sha256_hex;
use crate::model::intent::CanonicalIntent;

pub struct SolanaConnector;

impl SolanaConnector {
    fn signature_reference(&self, ctx: &ExecutionContext<'_>, action: &str) -> String {
        let digest = sha256_hex(format!("solana:{}:{action}", ctx.run_id).as_bytes());
        bs58::encode(digest.as_bytes()).into_string()
    }
}

#[async_trait]
impl Connector for SolanaConnector {
    fn name(&self) -> &'static str {
        "solana"
    }

    async fn preflight(&self, intent: &CanonicalIntent) -> Result<PreflightReport, ConnectorError> {
        let (checks, estimate) = match intent {
            CanonicalIntent::Transfer { amount, .. } | CanonicalIntent::Send { amount, .. } => (
                vec!["recipient-format".into(), "native-asset".into()],
                json!({ "computeUnits": 450, "lamports": amount }),
            ),
            CanonicalIntent::DefiDeposit { protocol, amount, .. }
            | CanonicalIntent::DefiWithdraw { protocol, amount, .. } => (
                vec!["protocol-route".into()],
                json!({ "protocol": protocol, "amount": amount }),
            ),
            other => return Err(unsupported(self.name(), other)),
        };
        Ok(PreflightReport {
            connector: self.name().to_string(),
            action: intent.action().to_string(),
            checks,
            estimate,
            fallback: None,
        })
    }

    async fn execute(
        &self,
        intent: &CanonicalIntent,
        ctx: &ExecutionContext<'_>,
    ) -> Result<ExecutionReport, ConnectorError> {
        match intent {
            CanonicalIntent::Transfer { .. }
            | CanonicalIntent::Send { .. }
            | CanonicalIntent::DefiDeposit { .. }
            | CanonicalIntent::DefiWithdraw { .. } => Ok(ExecutionReport {
                connector: self.name().to_string(),
                action: intent.action().to_string(),
                reference: json!({
                    "signature": self.signature_reference(ctx, intent.action())
                }),
                fallback: None,
            }),
            other => Err(unsupported(self.name(), other)),
        }
    }
}
