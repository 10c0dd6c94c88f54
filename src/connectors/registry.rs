//! Connector registry: one instance per venue, selected by intent.

use std::sync::Arc;

use super::Connector;
use super::debridge::DebridgeConnector;
use super::evm::EvmConnector;
use super::fallback::JupiterWithRaydiumFallback;
use super::hyperliquid::{HyperliquidConnector, MarketData};
use super::jupiter::JupiterConnector;
use super::portfolio::PortfolioConnector;
use super::pumpfun::PumpfunConnector;
use super::raydium::RaydiumConnector;
use super::solana::SolanaConnector;
use crate::model::chain::Chain;
use crate::model::intent::CanonicalIntent;
use crate::store::nonce::NonceCoordinator;

pub struct ConnectorRegistry {
    pub base: Arc<dyn Connector>,
    pub arbitrum: Arc<dyn Connector>,
    pub solana: Arc<dyn Connector>,
    pub jupiter: Arc<dyn Connector>,
    pub raydium: Arc<dyn Connector>,
    pub pumpfun: Arc<dyn Connector>,
    pub debridge: Arc<dyn Connector>,
    pub portfolio: Arc<dyn Connector>,
    pub hyperliquid: Arc<HyperliquidConnector>,
}

impl ConnectorRegistry {
    /// Default wiring: the Jupiter slot is the fallback decorator over the
    /// plain Jupiter connector, delegating to the shared Raydium instance
    /// on network-class failures.
    pub fn build(
        market_data: Arc<dyn MarketData>,
        nonces: Arc<NonceCoordinator>,
        hyperliquid_signer: Option<String>,
    ) -> Self {
        let raydium: Arc<dyn Connector> = Arc::new(RaydiumConnector);
        let jupiter: Arc<dyn Connector> = Arc::new(JupiterWithRaydiumFallback::new(
            Arc::new(JupiterConnector),
            Arc::clone(&raydium),
        ));
        ConnectorRegistry {
            base: Arc::new(EvmConnector::new(Chain::Base)),
            arbitrum: Arc::new(EvmConnector::new(Chain::Arbitrum)),
            solana: Arc::new(SolanaConnector),
            jupiter,
            raydium,
            pumpfun: Arc::new(PumpfunConnector),
            debridge: Arc::new(DebridgeConnector),
            portfolio: Arc::new(PortfolioConnector),
            hyperliquid: Arc::new(HyperliquidConnector::new(
                market_data,
                nonces,
                hyperliquid_signer,
            )),
        }
    }

    /// Connector responsible for an intent.
    pub fn for_intent(&self, intent: &CanonicalIntent) -> Arc<dyn Connector> {
        match intent {
            CanonicalIntent::Transfer { chain, .. }
            | CanonicalIntent::Send { chain, .. }
            | CanonicalIntent::DefiDeposit { chain, .. }
            | CanonicalIntent::DefiWithdraw { chain, .. }
            | CanonicalIntent::ContractCall { chain, .. } => self.for_chain(*chain),
            CanonicalIntent::Bridge { .. } => Arc::clone(&self.debridge),
            CanonicalIntent::SwapJupiter { .. } => Arc::clone(&self.jupiter),
            CanonicalIntent::SwapRaydium { .. } => Arc::clone(&self.raydium),
            CanonicalIntent::SwapPumpfun { .. } => Arc::clone(&self.pumpfun),
            CanonicalIntent::HlOrder { .. }
            | CanonicalIntent::HlCancel { .. }
            | CanonicalIntent::HlModify { .. }
            | CanonicalIntent::HlDeposit { .. }
            | CanonicalIntent::HlBridgeDeposit { .. }
            | CanonicalIntent::HlBridgeWithdraw { .. } => {
                Arc::clone(&self.hyperliquid) as Arc<dyn Connector>
            }
            CanonicalIntent::PortfolioBalance { .. } => Arc::clone(&self.portfolio),
        }
    }

    fn for_chain(&self, chain: Chain) -> Arc<dyn Connector> {
        match chain {
            Chain::Base => Arc::clone(&self.base),
            Chain::Arbitrum => Arc::clone(&self.arbitrum),
            Chain::Solana => Arc::clone(&self.solana),
            // Direct chain ops on the L1 are routed through the venue
            // connector.
            Chain::Hyperliquid => Arc::clone(&self.hyperliquid) as Arc<dyn Connector>,
        }
    }
}
