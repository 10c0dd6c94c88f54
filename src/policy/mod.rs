//! Policy engine: allowlist and limit evaluation over a canonical intent.
//!
//! Checks run in a fixed order and short-circuit on the first violation.
//! The four leading checks are structural: a policy that does not pin
//! mainnet-only execution, the Hyperliquid L3 role, known price sources,
//! and a reporting channel is refused outright, whatever the intent.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::OperatorError;
use crate::model::intent::{CanonicalIntent, MarketKind};
use crate::model::policy::PolicyDocument;

/// Assets treated as 1:1 USD for notional purposes.
const STABLE_ASSETS: [&str; 3] = ["USDC", "USDT", "DAI"];

const PRICE_SOURCES: [&str; 2] = ["chainlink", "pyth"];
const HL_OPERATIONAL_ROLE: &str = "destination_l3";
const BRIDGE_PROVIDER: &str = "debridge";

/// Successful evaluation: the ordered list of checks that ran, plus the
/// derived USD notional when one was computed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyReport {
    pub checks: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notional_usd: Option<Decimal>,
}

pub fn evaluate(
    intent: &CanonicalIntent,
    policy: &PolicyDocument,
) -> Result<PolicyReport, OperatorError> {
    let mut checks = Vec::new();

    check_structure(policy, &mut checks)?;
    check_chains(intent, policy, &mut checks)?;
    check_assets(intent, policy, &mut checks)?;
    check_recipient(intent, policy, &mut checks)?;
    check_contract(intent, policy, &mut checks)?;
    check_bridge(intent, policy, &mut checks)?;
    check_hyperliquid_symbol(intent, policy, &mut checks)?;
    check_order_limits(intent, policy, &mut checks)?;
    let notional_usd = check_notional(intent, policy, &mut checks)?;

    Ok(PolicyReport {
        checks,
        notional_usd,
    })
}

fn check_structure(
    policy: &PolicyDocument,
    checks: &mut Vec<&'static str>,
) -> Result<(), OperatorError> {
    if !policy.execution.allow_mainnet_only {
        return Err(OperatorError::PolicyMainnetRequired);
    }
    checks.push("execution.allowMainnetOnly");

    if policy.routing.hyperliquid_operational_role != HL_OPERATIONAL_ROLE {
        return Err(OperatorError::PolicyHlRoleInvalid {
            role: policy.routing.hyperliquid_operational_role.clone(),
        });
    }
    checks.push("routing.hyperliquidOperationalRole");

    for source in [
        &policy.market_data.primary_price_source,
        &policy.market_data.fallback_price_source,
    ] {
        if !PRICE_SOURCES.contains(&source.as_str()) {
            return Err(OperatorError::PolicyMarketDataInvalid {
                value: source.clone(),
            });
        }
    }
    checks.push("marketData.priceSources");

    if policy
        .reporting
        .discord_channel_id
        .as_deref()
        .is_none_or(str::is_empty)
    {
        return Err(OperatorError::PolicyReportingChannelRequired);
    }
    checks.push("reporting.discordChannelId");
    Ok(())
}

fn check_chains(
    intent: &CanonicalIntent,
    policy: &PolicyDocument,
    checks: &mut Vec<&'static str>,
) -> Result<(), OperatorError> {
    for chain in intent.chains() {
        if !policy.allowlists.chains.contains(&chain) {
            return Err(OperatorError::PolicyChainDenied {
                chain: chain.to_string(),
            });
        }
    }
    checks.push("allowlists.chains");
    Ok(())
}

fn check_assets(
    intent: &CanonicalIntent,
    policy: &PolicyDocument,
    checks: &mut Vec<&'static str>,
) -> Result<(), OperatorError> {
    if policy.allowlists.assets.is_empty() {
        return Ok(());
    }
    for asset in intent.assets() {
        if !policy.allowlists.assets.iter().any(|a| a == asset) {
            return Err(OperatorError::PolicyAssetDenied {
                asset: asset.to_string(),
            });
        }
    }
    checks.push("allowlists.assets");
    Ok(())
}

fn check_recipient(
    intent: &CanonicalIntent,
    policy: &PolicyDocument,
    checks: &mut Vec<&'static str>,
) -> Result<(), OperatorError> {
    if !policy.execution.require_recipient_allowlist {
        return Ok(());
    }
    let recipient = match intent.recipient() {
        Some(r) => r,
        None if intent.requires_recipient() => {
            return Err(OperatorError::PolicyRecipientRequired {
                action: intent.action().to_string(),
            });
        }
        None => return Ok(()),
    };
    let allowed = policy
        .allowlists
        .recipients
        .iter()
        .any(|r| r.eq_ignore_ascii_case(recipient));
    if !allowed {
        return Err(OperatorError::PolicyRecipientDenied {
            recipient: recipient.to_string(),
        });
    }
    checks.push("allowlists.recipients");
    Ok(())
}

fn check_contract(
    intent: &CanonicalIntent,
    policy: &PolicyDocument,
    checks: &mut Vec<&'static str>,
) -> Result<(), OperatorError> {
    let CanonicalIntent::ContractCall { contract, .. } = intent else {
        return Ok(());
    };
    if policy.allowlists.contracts.is_empty() {
        return Ok(());
    }
    let allowed = policy
        .allowlists
        .contracts
        .iter()
        .any(|c| c.eq_ignore_ascii_case(contract));
    if !allowed {
        return Err(OperatorError::PolicyContractDenied {
            contract: contract.clone(),
        });
    }
    checks.push("allowlists.contracts");
    Ok(())
}

fn check_bridge(
    intent: &CanonicalIntent,
    policy: &PolicyDocument,
    checks: &mut Vec<&'static str>,
) -> Result<(), OperatorError> {
    let CanonicalIntent::Bridge {
        from_chain,
        to_chain,
        provider,
        ..
    } = intent
    else {
        return Ok(());
    };

    if provider != BRIDGE_PROVIDER {
        return Err(OperatorError::PolicyBridgeProviderDenied {
            provider: provider.clone(),
        });
    }
    let source_allowed = policy
        .allowlists
        .bridge_routes
        .iter()
        .any(|route| route.from == *from_chain);
    if !source_allowed {
        return Err(OperatorError::PolicyBridgeSourceDenied {
            chain: from_chain.to_string(),
        });
    }
    let route_allowed = policy
        .allowlists
        .bridge_routes
        .iter()
        .any(|route| route.from == *from_chain && route.to == *to_chain);
    if !route_allowed {
        return Err(OperatorError::PolicyBridgeRouteDenied {
            from: from_chain.to_string(),
            to: to_chain.to_string(),
        });
    }
    checks.push("allowlists.bridgeRoutes");
    Ok(())
}

fn check_hyperliquid_symbol(
    intent: &CanonicalIntent,
    policy: &PolicyDocument,
    checks: &mut Vec<&'static str>,
) -> Result<(), OperatorError> {
    let market = match intent {
        CanonicalIntent::HlOrder { market, .. }
        | CanonicalIntent::HlCancel { market, .. }
        | CanonicalIntent::HlModify { market, .. } => market,
        _ => return Ok(()),
    };
    if policy.allowlists.hyperliquid_symbols.is_empty() {
        return Ok(());
    }
    if !policy
        .allowlists
        .hyperliquid_symbols
        .iter()
        .any(|s| s == market)
    {
        return Err(OperatorError::PolicyHlSymbolDenied {
            market: market.clone(),
        });
    }
    checks.push("allowlists.hyperliquidSymbols");
    Ok(())
}

fn check_order_limits(
    intent: &CanonicalIntent,
    policy: &PolicyDocument,
    checks: &mut Vec<&'static str>,
) -> Result<(), OperatorError> {
    let CanonicalIntent::HlOrder {
        kind,
        size,
        price,
        leverage,
        slippage_bps,
        ..
    } = intent
    else {
        return Ok(());
    };

    if let Some(max) = policy.limits.max_order_size
        && *size > max
    {
        return Err(OperatorError::PolicyOrderSizeExceeded {
            size: size.to_string(),
            max: max.to_string(),
        });
    }
    checks.push("limits.maxOrderSize");

    if price.is_market() {
        let Some(bps) = slippage_bps else {
            return Err(OperatorError::PolicySlippageRequired);
        };
        if let Some(max) = policy.limits.max_slippage_bps
            && *bps > max
        {
            return Err(OperatorError::PolicySlippageExceeded { bps: *bps, max });
        }
        checks.push("limits.maxSlippageBps");
    }

    if *kind == MarketKind::Perp
        && let (Some(lev), Some(max)) = (leverage, policy.limits.max_perp_leverage)
        && *lev > max
    {
        return Err(OperatorError::PolicyLeverageExceeded {
            leverage: lev.to_string(),
            max: max.to_string(),
        });
    }
    checks.push("limits.maxPerpLeverage");
    Ok(())
}

/// USD notional: stable-denominated amounts count at par; orders price at
/// their limit or hydrated reference price. Orders with a cap but no
/// derivable price fail closed.
fn check_notional(
    intent: &CanonicalIntent,
    policy: &PolicyDocument,
    checks: &mut Vec<&'static str>,
) -> Result<Option<Decimal>, OperatorError> {
    let Some(max) = policy.limits.max_notional_usd_per_tx else {
        return Ok(None);
    };

    let notional = derive_notional(intent);
    if let CanonicalIntent::HlOrder { market, .. } = intent
        && notional.is_none()
    {
        return Err(OperatorError::PolicyNotionalUnpriced {
            market: market.clone(),
        });
    }

    if let Some(notional) = notional {
        if notional > max {
            return Err(OperatorError::PolicyNotionalExceeded {
                notional: notional.to_string(),
                max: max.to_string(),
            });
        }
        checks.push("limits.maxNotionalUsdPerTx");
    }
    Ok(notional)
}

fn derive_notional(intent: &CanonicalIntent) -> Option<Decimal> {
    let stable = |asset: &str| STABLE_ASSETS.contains(&asset);
    match intent {
        CanonicalIntent::HlOrder {
            size,
            price,
            reference_price,
            ..
        } => price
            .limit()
            .or(*reference_price)
            .map(|p| (*size * p).normalize()),
        CanonicalIntent::Transfer { asset, amount, .. }
        | CanonicalIntent::Send { asset, amount, .. }
        | CanonicalIntent::Bridge { asset, amount, .. }
        | CanonicalIntent::HlDeposit { asset, amount }
        | CanonicalIntent::DefiDeposit { asset, amount, .. }
        | CanonicalIntent::DefiWithdraw { asset, amount, .. }
        | CanonicalIntent::HlBridgeDeposit { asset, amount }
        | CanonicalIntent::HlBridgeWithdraw { asset, amount } => {
            stable(asset).then_some(*amount)
        }
        CanonicalIntent::SwapJupiter {
            asset_in, amount, ..
        }
        | CanonicalIntent::SwapRaydium {
            asset_in, amount, ..
        }
        | CanonicalIntent::SwapPumpfun {
            asset_in, amount, ..
        } => stable(asset_in).then_some(*amount),
        CanonicalIntent::HlCancel { .. }
        | CanonicalIntent::HlModify { .. }
        | CanonicalIntent::PortfolioBalance { .. }
        | CanonicalIntent::ContractCall { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::chain::Chain;
    use crate::model::intent::{Price, Side};
    use crate::model::policy::*;

    pub(crate) fn sample_policy() -> PolicyDocument {
        PolicyDocument {
            version: "2026-07-01".into(),
            execution: ExecutionPolicy {
                allow_mainnet_only: true,
                default_dry_run: true,
                require_key_segregation: true,
                require_recipient_allowlist: false,
            },
            allowlists: Allowlists {
                chains: vec![Chain::Base, Chain::Solana, Chain::Arbitrum, Chain::Hyperliquid],
                assets: vec![],
                recipients: vec![],
                contracts: vec![],
                bridge_routes: vec![
                    BridgeRoute {
                        from: Chain::Base,
                        to: Chain::Solana,
                    },
                    BridgeRoute {
                        from: Chain::Solana,
                        to: Chain::Base,
                    },
                ],
                hyperliquid_symbols: vec![],
            },
            limits: Limits {
                max_order_size: Some("10".parse().unwrap()),
                max_slippage_bps: Some(100),
                default_slippage_bps: Some(50),
                max_perp_leverage: Some("5".parse().unwrap()),
                max_notional_usd_per_tx: Some("1000".parse().unwrap()),
            },
            idempotency: IdempotencyPolicy { ttl_days: 7 },
            circuit_breaker: CircuitBreakerPolicy {
                enabled: true,
                max_failures: 3,
                window_sec: 600,
                cooldown_sec: 300,
            },
            market_data: MarketDataPolicy {
                primary_price_source: "chainlink".into(),
                fallback_price_source: "pyth".into(),
            },
            routing: RoutingPolicy {
                hyperliquid_operational_role: "destination_l3".into(),
            },
            reporting: ReportingPolicy {
                discord_channel_id: Some("140000000000000001".into()),
            },
        }
    }

    fn market_order(size: &str, slippage_bps: Option<u32>, reference: Option<&str>) -> CanonicalIntent {
        CanonicalIntent::HlOrder {
            market: "BTC".into(),
            kind: MarketKind::Perp,
            side: Side::Buy,
            size: size.parse().unwrap(),
            price: Price::Market,
            reduce_only: false,
            leverage: None,
            slippage_bps,
            tif: None,
            cloid: None,
            reference_price: reference.map(|r| r.parse().unwrap()),
        }
    }

    #[test]
    fn structural_checks_fire_first() {
        let mut policy = sample_policy();
        policy.routing.hyperliquid_operational_role = "origin".into();
        let intent = market_order("1", Some(50), Some("100"));
        assert_eq!(
            evaluate(&intent, &policy).unwrap_err().code(),
            "POLICY_HL_ROLE_INVALID"
        );

        policy = sample_policy();
        policy.reporting.discord_channel_id = None;
        assert_eq!(
            evaluate(&intent, &policy).unwrap_err().code(),
            "POLICY_REPORTING_CHANNEL_REQUIRED"
        );
    }

    #[test]
    fn chain_denied() {
        let mut policy = sample_policy();
        policy.allowlists.chains = vec![Chain::Base];
        let intent = CanonicalIntent::SwapJupiter {
            asset_in: "SOL".into(),
            asset_out: "USDC".into(),
            amount: "1".parse().unwrap(),
            mode: crate::model::intent::SwapMode::ExactIn,
            slippage_bps: None,
        };
        assert_eq!(
            evaluate(&intent, &policy).unwrap_err().code(),
            "POLICY_CHAIN_DENIED"
        );
    }

    #[test]
    fn asset_allowlist_applies_when_non_empty() {
        let mut policy = sample_policy();
        policy.allowlists.assets = vec!["ETH".into()];
        let intent = CanonicalIntent::HlDeposit {
            asset: "USDC".into(),
            amount: "100".parse().unwrap(),
        };
        assert_eq!(
            evaluate(&intent, &policy).unwrap_err().code(),
            "POLICY_ASSET_DENIED"
        );
    }

    #[test]
    fn bridge_route_checks() {
        let policy = sample_policy();
        let denied_route = CanonicalIntent::Bridge {
            from_chain: Chain::Base,
            to_chain: Chain::Arbitrum,
            asset: "USDC".into(),
            amount: "10".parse().unwrap(),
            provider: "debridge".into(),
            recipient: None,
        };
        assert_eq!(
            evaluate(&denied_route, &policy).unwrap_err().code(),
            "POLICY_BRIDGE_ROUTE_DENIED"
        );

        let bad_provider = CanonicalIntent::Bridge {
            from_chain: Chain::Base,
            to_chain: Chain::Solana,
            asset: "USDC".into(),
            amount: "10".parse().unwrap(),
            provider: "wormhole".into(),
            recipient: None,
        };
        assert_eq!(
            evaluate(&bad_provider, &policy).unwrap_err().code(),
            "POLICY_BRIDGE_PROVIDER_DENIED"
        );

        let bad_source = CanonicalIntent::Bridge {
            from_chain: Chain::Arbitrum,
            to_chain: Chain::Base,
            asset: "USDC".into(),
            amount: "10".parse().unwrap(),
            provider: "debridge".into(),
            recipient: None,
        };
        assert_eq!(
            evaluate(&bad_source, &policy).unwrap_err().code(),
            "POLICY_BRIDGE_SOURCE_DENIED"
        );
    }

    #[test]
    fn market_order_without_slippage_is_refused() {
        let policy = sample_policy();
        let intent = market_order("1", None, Some("100"));
        assert_eq!(
            evaluate(&intent, &policy).unwrap_err().code(),
            "POLICY_SLIPPAGE_REQUIRED"
        );
    }

    #[test]
    fn notional_cap_uses_reference_price() {
        let mut policy = sample_policy();
        policy.limits.max_notional_usd_per_tx = Some("40".parse().unwrap());

        let under = market_order("0.0005", Some(50), Some("50000"));
        let report = evaluate(&under, &policy).unwrap();
        assert_eq!(report.notional_usd.unwrap().to_string(), "25");

        let over = market_order("0.01", Some(50), Some("50000"));
        assert_eq!(
            evaluate(&over, &policy).unwrap_err().code(),
            "POLICY_NOTIONAL_EXCEEDED"
        );
    }

    #[test]
    fn unpriced_market_order_fails_closed_under_cap() {
        let policy = sample_policy();
        let intent = market_order("1", Some(50), None);
        assert_eq!(
            evaluate(&intent, &policy).unwrap_err().code(),
            "POLICY_NOTIONAL_UNPRICED"
        );
    }

    #[test]
    fn leverage_cap() {
        let policy = sample_policy();
        let intent = CanonicalIntent::HlOrder {
            market: "BTC".into(),
            kind: MarketKind::Perp,
            side: Side::Buy,
            size: "1".parse().unwrap(),
            price: Price::Limit("100".parse().unwrap()),
            reduce_only: false,
            leverage: Some("20".parse().unwrap()),
            slippage_bps: None,
            tif: None,
            cloid: None,
            reference_price: None,
        };
        assert_eq!(
            evaluate(&intent, &policy).unwrap_err().code(),
            "POLICY_LEVERAGE_EXCEEDED"
        );
    }

    #[test]
    fn recipient_allowlist_enforced_when_required() {
        let mut policy = sample_policy();
        policy.execution.require_recipient_allowlist = true;
        policy.allowlists.recipients = vec!["0x000000000000000000000000000000000000dEaD".into()];

        let allowed = CanonicalIntent::Transfer {
            chain: Chain::Base,
            asset: "ETH".into(),
            amount: "0.001".parse().unwrap(),
            recipient: "0x000000000000000000000000000000000000dead".into(),
        };
        assert!(evaluate(&allowed, &policy).is_ok());

        let denied = CanonicalIntent::Transfer {
            chain: Chain::Base,
            asset: "ETH".into(),
            amount: "0.001".parse().unwrap(),
            recipient: "0x1111111111111111111111111111111111111111".into(),
        };
        assert_eq!(
            evaluate(&denied, &policy).unwrap_err().code(),
            "POLICY_RECIPIENT_DENIED"
        );
    }
}
