//! Intent normalization: [`UncheckedIntent`] → [`CanonicalIntent`].
//!
//! Both planes converge here. Every semantic constraint lives in this
//! module — chain aliases, native-asset rules, address formats, positive
//! decimal amounts, order references — and each violation carries its
//! precise code. Downstream components never re-validate.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::OperatorError;
use crate::model::chain::Chain;
use crate::model::intent::{
    CanonicalIntent, MarketKind, OrderRef, Price, Side, SwapMode, Tif, UncheckedIntent,
};

static CLOID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[0-9a-f]{32}$").unwrap());
static OID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());
static CALLDATA: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x(?:[0-9a-fA-F]{2})*$").unwrap());

pub fn normalize(unchecked: &UncheckedIntent) -> Result<CanonicalIntent, OperatorError> {
    let action = unchecked.action.as_deref().unwrap_or_default();
    match action {
        "transfer" | "send" => normalize_transfer(unchecked, action),
        "bridge" => normalize_bridge(unchecked),
        "swap_jupiter" | "swap_raydium" | "swap_pumpfun" => normalize_swap(unchecked, action),
        "hl_order" => normalize_hl_order(unchecked),
        "hl_cancel" | "hl_modify" => normalize_hl_order_ref_op(unchecked, action),
        "hl_deposit" => normalize_hl_deposit(unchecked),
        "defi_deposit" | "defi_withdraw" => normalize_defi(unchecked, action),
        "portfolio_balance" => normalize_balance(unchecked),
        "contract_call" => normalize_contract_call(unchecked),
        "hl_bridge_deposit" | "hl_bridge_withdraw" => normalize_hl_bridge(unchecked, action),
        other => Err(OperatorError::OperationUnknown {
            operation: other.to_string(),
        }),
    }
}

// ── Per-action normalizers ──────────────────────────────────────────

fn normalize_transfer(
    unchecked: &UncheckedIntent,
    action: &str,
) -> Result<CanonicalIntent, OperatorError> {
    let asset = required_asset(unchecked, action)?;
    let amount = parse_amount(unchecked.amount.as_ref(), "amount", action)?;
    let recipient = unchecked
        .recipient
        .clone()
        .ok_or(OperatorError::FieldMissing {
            field: "recipient",
            action: action.to_string(),
        })?;

    let chain = match unchecked.chain.as_deref() {
        Some(name) => resolve_chain(name)?,
        None => infer_transfer_chain(&asset, &recipient)?,
    };

    // Transfers move the gas asset only.
    let native = chain.native_asset();
    if native != Some(asset.as_str()) {
        return Err(OperatorError::AssetUnsupported {
            asset,
            action: action.to_string(),
            chain: chain.to_string(),
        });
    }

    let recipient = check_address(chain, &recipient)?;
    if action == "send" {
        Ok(CanonicalIntent::Send {
            chain,
            asset,
            amount,
            recipient,
        })
    } else {
        Ok(CanonicalIntent::Transfer {
            chain,
            asset,
            amount,
            recipient,
        })
    }
}

/// Transfer with no explicit chain: the asset decides first (ETH→base,
/// SOL→solana), then the recipient's address format. No unique answer means
/// the caller has to disambiguate.
fn infer_transfer_chain(asset: &str, recipient: &str) -> Result<Chain, OperatorError> {
    if let Some(chain) = Chain::inferred_from_asset(asset) {
        return Ok(chain);
    }
    let matches: Vec<Chain> = [Chain::Base, Chain::Solana]
        .into_iter()
        .filter(|c| c.address_matches(recipient))
        .collect();
    match matches.as_slice() {
        [only] => Ok(*only),
        _ => Err(OperatorError::ChainAmbiguous {
            asset: asset.to_string(),
        }),
    }
}

fn normalize_bridge(unchecked: &UncheckedIntent) -> Result<CanonicalIntent, OperatorError> {
    let from_chain = resolve_chain(unchecked.from_chain.as_deref().ok_or(
        OperatorError::FieldMissing {
            field: "fromChain",
            action: "bridge".into(),
        },
    )?)?;
    let to_chain = resolve_chain(unchecked.to_chain.as_deref().ok_or(
        OperatorError::FieldMissing {
            field: "toChain",
            action: "bridge".into(),
        },
    )?)?;
    if from_chain == to_chain {
        return Err(OperatorError::BridgeChainsInvalid {
            chain: from_chain.to_string(),
        });
    }

    let asset = required_asset(unchecked, "bridge")?;
    let amount = parse_amount(unchecked.amount.as_ref(), "amount", "bridge")?;
    let recipient = match unchecked.recipient.as_deref() {
        Some(r) => Some(check_address(to_chain, r)?),
        None => None,
    };
    let provider = unchecked
        .provider
        .clone()
        .unwrap_or_else(|| "debridge".to_string())
        .to_lowercase();

    Ok(CanonicalIntent::Bridge {
        from_chain,
        to_chain,
        asset,
        amount,
        provider,
        recipient,
    })
}

fn normalize_swap(
    unchecked: &UncheckedIntent,
    action: &str,
) -> Result<CanonicalIntent, OperatorError> {
    let asset_in = unchecked
        .asset_in
        .as_deref()
        .map(normalize_asset)
        .ok_or(OperatorError::FieldMissing {
            field: "assetIn",
            action: action.to_string(),
        })?;
    let asset_out = unchecked
        .asset_out
        .as_deref()
        .map(normalize_asset)
        .ok_or(OperatorError::FieldMissing {
            field: "assetOut",
            action: action.to_string(),
        })?;
    if asset_in == asset_out {
        return Err(OperatorError::SwapAssetsInvalid { asset: asset_in });
    }

    let amount = parse_amount(unchecked.amount.as_ref(), "amount", action)?;
    let mode = parse_swap_mode(unchecked.mode.as_deref())?;
    let slippage_bps = parse_slippage(unchecked.slippage_bps.as_ref())?;

    let intent = match action {
        "swap_jupiter" => CanonicalIntent::SwapJupiter {
            asset_in,
            asset_out,
            amount,
            mode,
            slippage_bps,
        },
        "swap_raydium" => CanonicalIntent::SwapRaydium {
            asset_in,
            asset_out,
            amount,
            mode,
            slippage_bps,
        },
        _ => CanonicalIntent::SwapPumpfun {
            asset_in,
            asset_out,
            amount,
            mode,
            slippage_bps,
        },
    };
    Ok(intent)
}

fn normalize_hl_order(unchecked: &UncheckedIntent) -> Result<CanonicalIntent, OperatorError> {
    let market = required_market(unchecked, "hl_order")?;
    let kind = parse_market_kind(unchecked.kind.as_deref(), &market)?;
    check_market_symbol(&market, kind)?;

    let side = match unchecked.side.as_deref() {
        Some("buy") => Side::Buy,
        Some("sell") => Side::Sell,
        Some(other) => {
            return Err(OperatorError::FieldInvalid {
                field: "side",
                value: other.to_string(),
            });
        }
        None => {
            return Err(OperatorError::FieldMissing {
                field: "side",
                action: "hl_order".into(),
            });
        }
    };

    let size = parse_amount(unchecked.size.as_ref(), "size", "hl_order")?;
    let price = match unchecked.price.as_ref() {
        Some(value) => parse_price(value)?,
        None => Price::Market,
    };
    let leverage = match unchecked.leverage.as_ref() {
        Some(value) => Some(parse_leverage(value)?),
        None => None,
    };
    let slippage_bps = parse_slippage(unchecked.slippage_bps.as_ref())?;
    let tif = match unchecked.tif.as_deref() {
        Some(raw) => Some(parse_tif(raw)?),
        None => None,
    };
    let cloid = match unchecked.cloid.as_deref() {
        Some(raw) => Some(check_cloid(raw)?),
        None => None,
    };

    Ok(CanonicalIntent::HlOrder {
        market,
        kind,
        side,
        size,
        price,
        reduce_only: unchecked.reduce_only.unwrap_or(false),
        leverage,
        slippage_bps,
        tif,
        cloid,
        reference_price: None,
    })
}

fn normalize_hl_order_ref_op(
    unchecked: &UncheckedIntent,
    action: &str,
) -> Result<CanonicalIntent, OperatorError> {
    let market = required_market(unchecked, action)?;
    let order_ref = parse_order_ref(unchecked.oid.as_ref(), unchecked.cloid.as_deref())?;

    if action == "hl_cancel" {
        return Ok(CanonicalIntent::HlCancel { market, order_ref });
    }

    let price = match unchecked.price.as_ref() {
        Some(value) => Some(parse_price(value)?),
        None => None,
    };
    let size = match unchecked.size.as_ref() {
        Some(value) => Some(parse_amount(Some(value), "size", action)?),
        None => None,
    };
    Ok(CanonicalIntent::HlModify {
        market,
        order_ref,
        price,
        size,
    })
}

fn normalize_hl_deposit(unchecked: &UncheckedIntent) -> Result<CanonicalIntent, OperatorError> {
    let asset = unchecked
        .asset
        .as_deref()
        .map(normalize_asset)
        .unwrap_or_else(|| "USDC".to_string());
    if asset != "USDC" {
        return Err(OperatorError::AssetUnsupported {
            asset,
            action: "hl_deposit".into(),
            chain: Chain::Hyperliquid.to_string(),
        });
    }
    let amount = parse_amount(unchecked.amount.as_ref(), "amount", "hl_deposit")?;
    Ok(CanonicalIntent::HlDeposit { asset, amount })
}

fn normalize_defi(
    unchecked: &UncheckedIntent,
    action: &str,
) -> Result<CanonicalIntent, OperatorError> {
    let chain = resolve_chain(
        unchecked
            .chain
            .as_deref()
            .ok_or(OperatorError::FieldMissing {
                field: "chain",
                action: action.to_string(),
            })?,
    )?;
    let protocol = unchecked
        .protocol
        .clone()
        .map(|p| p.to_lowercase())
        .ok_or(OperatorError::FieldMissing {
            field: "protocol",
            action: action.to_string(),
        })?;
    let asset = required_asset(unchecked, action)?;
    let amount = parse_amount(unchecked.amount.as_ref(), "amount", action)?;

    if action == "defi_deposit" {
        Ok(CanonicalIntent::DefiDeposit {
            chain,
            protocol,
            asset,
            amount,
        })
    } else {
        Ok(CanonicalIntent::DefiWithdraw {
            chain,
            protocol,
            asset,
            amount,
        })
    }
}

fn normalize_balance(unchecked: &UncheckedIntent) -> Result<CanonicalIntent, OperatorError> {
    let chain = match unchecked.chain.as_deref() {
        Some(name) => Some(resolve_chain(name)?),
        None => None,
    };
    Ok(CanonicalIntent::PortfolioBalance { chain })
}

fn normalize_contract_call(unchecked: &UncheckedIntent) -> Result<CanonicalIntent, OperatorError> {
    let chain = match unchecked.chain.as_deref() {
        Some(name) => resolve_chain(name)?,
        None => Chain::Base,
    };
    let contract = unchecked
        .contract
        .as_deref()
        .ok_or(OperatorError::FieldMissing {
            field: "contract",
            action: "contract_call".into(),
        })?;
    let contract = check_address(chain, contract)?;

    let calldata = unchecked
        .calldata
        .as_deref()
        .ok_or(OperatorError::FieldMissing {
            field: "calldata",
            action: "contract_call".into(),
        })?;
    if !CALLDATA.is_match(calldata) {
        return Err(OperatorError::FieldInvalid {
            field: "calldata",
            value: calldata.to_string(),
        });
    }

    let value = match unchecked.value.as_ref() {
        Some(v) => Some(parse_amount(Some(v), "value", "contract_call")?),
        None => None,
    };

    Ok(CanonicalIntent::ContractCall {
        chain,
        contract,
        calldata: calldata.to_lowercase(),
        value,
    })
}

fn normalize_hl_bridge(
    unchecked: &UncheckedIntent,
    action: &str,
) -> Result<CanonicalIntent, OperatorError> {
    let asset = unchecked
        .asset
        .as_deref()
        .map(normalize_asset)
        .unwrap_or_else(|| "USDC".to_string());
    let amount = parse_amount(unchecked.amount.as_ref(), "amount", action)?;
    if action == "hl_bridge_deposit" {
        Ok(CanonicalIntent::HlBridgeDeposit { asset, amount })
    } else {
        Ok(CanonicalIntent::HlBridgeWithdraw { asset, amount })
    }
}

// ── Field-level helpers ─────────────────────────────────────────────

fn resolve_chain(name: &str) -> Result<Chain, OperatorError> {
    Chain::from_alias(name).ok_or_else(|| OperatorError::ChainUnsupported {
        chain: name.to_string(),
    })
}

fn normalize_asset(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn required_asset(unchecked: &UncheckedIntent, action: &str) -> Result<String, OperatorError> {
    unchecked
        .asset
        .as_deref()
        .map(normalize_asset)
        .ok_or(OperatorError::FieldMissing {
            field: "asset",
            action: action.to_string(),
        })
}

fn required_market(unchecked: &UncheckedIntent, action: &str) -> Result<String, OperatorError> {
    unchecked
        .market
        .as_deref()
        .map(|m| m.trim().to_uppercase())
        .ok_or(OperatorError::FieldMissing {
            field: "market",
            action: action.to_string(),
        })
}

fn check_address(chain: Chain, address: &str) -> Result<String, OperatorError> {
    if !chain.address_matches(address) {
        return Err(OperatorError::AddressInvalid {
            address: address.to_string(),
            chain: chain.to_string(),
        });
    }
    Ok(address.to_string())
}

/// Positive decimal from either a JSON string (≤64 chars) or a number.
fn parse_amount(
    value: Option<&Value>,
    field: &'static str,
    action: &str,
) -> Result<Decimal, OperatorError> {
    let value = value.ok_or(OperatorError::FieldMissing {
        field,
        action: action.to_string(),
    })?;
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(OperatorError::InvalidAmount {
                value: other.to_string(),
                reason: "expected a decimal string or number".into(),
            });
        }
    };
    if raw.is_empty() || raw.len() > 64 {
        return Err(OperatorError::InvalidAmount {
            value: raw,
            reason: "expected 1..=64 characters".into(),
        });
    }
    let parsed: Decimal = raw.parse().map_err(|_| OperatorError::InvalidAmount {
        value: raw.clone(),
        reason: "not a decimal".into(),
    })?;
    if parsed <= Decimal::ZERO {
        return Err(OperatorError::InvalidAmount {
            value: raw,
            reason: "must be positive".into(),
        });
    }
    Ok(parsed.normalize())
}

fn parse_price(value: &Value) -> Result<Price, OperatorError> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(OperatorError::InvalidPrice {
                value: other.to_string(),
            });
        }
    };
    if raw.eq_ignore_ascii_case("market") {
        return Ok(Price::Market);
    }
    let parsed: Decimal = raw.parse().map_err(|_| OperatorError::InvalidPrice {
        value: raw.clone(),
    })?;
    if parsed <= Decimal::ZERO {
        return Err(OperatorError::InvalidPrice { value: raw });
    }
    Ok(Price::Limit(parsed.normalize()))
}

fn parse_leverage(value: &Value) -> Result<Decimal, OperatorError> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(OperatorError::InvalidLeverage {
                value: other.to_string(),
            });
        }
    };
    let parsed: Decimal = raw.parse().map_err(|_| OperatorError::InvalidLeverage {
        value: raw.clone(),
    })?;
    if parsed <= Decimal::ZERO {
        return Err(OperatorError::InvalidLeverage { value: raw });
    }
    Ok(parsed.normalize())
}

/// Integer basis points in `0..=10000`.
fn parse_slippage(value: Option<&Value>) -> Result<Option<u32>, OperatorError> {
    let Some(value) = value else { return Ok(None) };
    let invalid = || OperatorError::InvalidSlippage {
        value: value.to_string(),
    };
    let bps: u32 = match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()).ok_or_else(invalid)?,
        Value::String(s) => s.trim().parse().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    if bps > 10_000 {
        return Err(invalid());
    }
    Ok(Some(bps))
}

fn parse_tif(raw: &str) -> Result<Tif, OperatorError> {
    match raw.trim().to_lowercase().as_str() {
        "alo" => Ok(Tif::Alo),
        "ioc" => Ok(Tif::Ioc),
        "gtc" => Ok(Tif::Gtc),
        _ => Err(OperatorError::FieldInvalid {
            field: "tif",
            value: raw.to_string(),
        }),
    }
}

fn parse_swap_mode(raw: Option<&str>) -> Result<SwapMode, OperatorError> {
    match raw {
        None => Ok(SwapMode::ExactIn),
        Some(s) => match s.trim().to_lowercase().as_str() {
            "exactin" | "exact_in" => Ok(SwapMode::ExactIn),
            "exactout" | "exact_out" => Ok(SwapMode::ExactOut),
            _ => Err(OperatorError::FieldInvalid {
                field: "mode",
                value: s.to_string(),
            }),
        },
    }
}

fn parse_market_kind(raw: Option<&str>, market: &str) -> Result<MarketKind, OperatorError> {
    match raw {
        Some(s) => match s.trim().to_lowercase().as_str() {
            "perp" => Ok(MarketKind::Perp),
            "spot" => Ok(MarketKind::Spot),
            _ => Err(OperatorError::FieldInvalid {
                field: "kind",
                value: s.to_string(),
            }),
        },
        // A pair symbol can only be a spot market.
        None if market.contains('/') => Ok(MarketKind::Spot),
        None => Ok(MarketKind::Perp),
    }
}

fn check_market_symbol(market: &str, kind: MarketKind) -> Result<(), OperatorError> {
    match kind {
        MarketKind::Spot if !market.contains('/') => Err(OperatorError::MarketSymbolInvalid {
            symbol: market.to_string(),
            reason: "spot markets are pairs like HYPE/USDC".into(),
        }),
        MarketKind::Perp if market.contains('/') => Err(OperatorError::MarketSymbolInvalid {
            symbol: market.to_string(),
            reason: "perp markets are bare coins like BTC".into(),
        }),
        _ => Ok(()),
    }
}

fn check_cloid(raw: &str) -> Result<String, OperatorError> {
    let lowered = raw.trim().to_lowercase();
    if !CLOID.is_match(&lowered) {
        return Err(OperatorError::OrderRefInvalid {
            value: raw.to_string(),
            reason: "cloid must be 0x followed by 32 hex chars".into(),
        });
    }
    Ok(lowered)
}

fn parse_order_ref(
    oid: Option<&Value>,
    cloid: Option<&str>,
) -> Result<OrderRef, OperatorError> {
    match (oid, cloid) {
        (Some(_), Some(_)) => Err(OperatorError::OrderRefInvalid {
            value: "oid+cloid".into(),
            reason: "provide exactly one of oid or cloid".into(),
        }),
        (None, None) => Err(OperatorError::OrderRefInvalid {
            value: String::new(),
            reason: "an oid or cloid is required".into(),
        }),
        (None, Some(cloid)) => Ok(OrderRef::Cloid(check_cloid(cloid)?)),
        (Some(value), None) => {
            let raw = match value {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                other => other.to_string(),
            };
            if !OID.is_match(&raw) {
                return Err(OperatorError::OrderRefInvalid {
                    value: raw,
                    reason: "oid must be decimal digits".into(),
                });
            }
            let oid: u64 = raw.parse().map_err(|_| OperatorError::OrderRefInvalid {
                value: raw.clone(),
                reason: "oid out of range".into(),
            })?;
            if oid == 0 {
                return Err(OperatorError::OrderRefInvalid {
                    value: raw,
                    reason: "oid must be positive".into(),
                });
            }
            Ok(OrderRef::Oid(oid))
        }
    }
}
