//! EVM connector (Base, Arbitrum): native transfers, contract calls, and
//! DeFi protocol moves. Transport-free; references are derived
//! deterministically from the run.

use async_trait::async_trait;
use serde_json::json;

use super::{
    Connector, ConnectorError, ExecutionContext, ExecutionReport, PreflightReport, unsupported,
};
use crate::canonical::sha256_hex;
use crate::model::chain::Chain;
use crate::model::intent::CanonicalIntent;

pub struct EvmConnector {
    chain: Chain,
}

impl EvmConnector {
    pub fn new(chain: Chain) -> Self {
        EvmConnector { chain }
    }

    fn chain_id(&self) -> u64 {
        match self.chain {
            Chain::Base => 8453,
            Chain::Arbitrum => 42161,
            // Registry wiring keeps non-EVM chains away from this connector.
            Chain::Solana | Chain::Hyperliquid => 0,
        }
    }

    fn tx_reference(&self, ctx: &ExecutionContext<'_>, action: &str) -> String {
        format!("0x{}", sha256_hex(format!("{}:{}:{action}", self.name(), ctx.run_id).as_bytes()))
    }
}

#[async_trait]
impl Connector for EvmConnector {
    fn name(&self) -> &'static str {
        self.chain.as_str()
    }

    async fn preflight(&self, intent: &CanonicalIntent) -> Result<PreflightReport, ConnectorError> {
        let (checks, estimate) = match intent {
            CanonicalIntent::Transfer { amount, .. } | CanonicalIntent::Send { amount, .. } => (
                vec!["recipient-format".into(), "native-asset".into()],
                json!({ "chainId": self.chain_id(), "gasLimit": "21000", "value": amount }),
            ),
            CanonicalIntent::ContractCall { calldata, value, .. } => (
                vec!["contract-format".into(), "calldata-hex".into()],
                json!({
                    "chainId": self.chain_id(),
                    "gasLimit": "120000",
                    "dataBytes": (calldata.len().saturating_sub(2)) / 2,
                    "value": value,
                }),
            ),
            CanonicalIntent::DefiDeposit { protocol, amount, .. }
            | CanonicalIntent::DefiWithdraw { protocol, amount, .. } => (
                vec!["protocol-route".into()],
                json!({ "chainId": self.chain_id(), "protocol": protocol, "amount": amount }),
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
            | CanonicalIntent::ContractCall { .. }
            | CanonicalIntent::DefiDeposit { .. }
            | CanonicalIntent::DefiWithdraw { .. } => Ok(ExecutionReport {
                connector: self.name().to_string(),
                action: intent.action().to_string(),
                reference: json!({ "txHash": self.tx_reference(ctx, intent.action()) }),
                fallback: None,
            }),
            other => Err(unsupported(self.name(), other)),
        }
    }
}
