//! Control-plane instruction recognizer.
//!
//! Maps free-form pt/en text onto a loose [`UncheckedIntent`]. Matchers run
//! in a fixed order and the first hit wins; anything unrecognized fails with
//! `INTENT_PARSE_ERROR`. The parser only extracts — every semantic check
//! (chains, address formats, positivity) belongs to the normalizer.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::OperatorError;
use crate::model::intent::UncheckedIntent;

const NUM: &str = r"\d+(?:[.,]\d+)?";

static BALANCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:/saldo\b|saldo\b|(?:show\s+)?balance\b)").unwrap());
static BALANCE_CHAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:on|na|no|em)\s+([a-zA-Z-]+)\s*$").unwrap());

static TRANSFER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*(?:send|transfer|envie|enviar|transfira|transferir)\s+(?P<amount>{NUM})\s+(?P<asset>[a-zA-Z]{{2,10}})\s+(?:to|para)\s+(?P<recipient>\S+?)(?:\s+(?:on|na|no|em)\s+(?P<chain>[a-zA-Z-]+))?\s*$"
    ))
    .unwrap()
});

static CANCEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:cancel|cancele|cancelar)\s+(?:order|ordem)\s+(?P<ref>0x[0-9a-fA-F]{32}|\d+)\s+(?:on|em)\s+(?P<market>[a-zA-Z0-9]+(?:/[a-zA-Z0-9]+)?)(?:\s+(?:on|na)\s+hyperliquid)?\s*$",
    )
    .unwrap()
});

static MODIFY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:modify|modifique|modificar|altere|alterar)\s+(?:order|ordem)\s+(?P<ref>0x[0-9a-fA-F]{32}|\d+)\s+(?:on|em)\s+(?P<market>[a-zA-Z0-9]+(?:/[a-zA-Z0-9]+)?)(?P<rest>.*)$",
    )
    .unwrap()
});

static ORDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*(?P<side>buy|sell|compre|comprar|venda|vender)\s+(?P<size>{NUM})\s+(?P<market>[a-zA-Z0-9]+(?:/[a-zA-Z0-9]+)?)(?P<rest>.*)$"
    ))
    .unwrap()
});

static SWAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*(?:swap|troque|trocar)\s+(?P<amount>{NUM})\s+(?P<in>[a-zA-Z]{{2,10}})\s+(?:for|por)\s+(?P<out>[a-zA-Z]{{2,10}})(?P<rest>.*)$"
    ))
    .unwrap()
});

static BRIDGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*(?:bridge|ponte)\s+(?P<amount>{NUM})\s+(?P<asset>[a-zA-Z]{{2,10}})\s+(?:from|de)\s+(?P<from>[a-zA-Z-]+)\s+(?:to|para)\s+(?P<to>[a-zA-Z-]+)(?:\s+(?:to|para)\s+(?P<recipient>\S+))?\s*$"
    ))
    .unwrap()
});

static CONTRACT_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*(?:call|chame|chamar)\s+(?P<contract>0x[0-9a-fA-F]{{40}})\s+(?:on|na|no)\s+base\s+(?:with\s+(?:data|calldata)|com\s+(?:dados|calldata))\s+(?P<calldata>0x[0-9a-fA-F]*)(?:\s+(?:value|valor)\s+(?P<value>{NUM}))?\s*$"
    ))
    .unwrap()
});

// Hyperliquid order qualifiers, scanned over the tail of the instruction.
static KIND: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(perp|spot)\b").unwrap());
static PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?:\b(?:at|a)\b|@)\s*(?P<price>market|mercado|{NUM})"
    ))
    .unwrap()
});
static REDUCE_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\breduce[\s-]?only\b").unwrap());
static LEVERAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:leverage|alavancagem)\s+(?P<lev>{NUM})")).unwrap()
});
static SLIPPAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bslippage\s+(?P<bps>\d+)\s*bps\b").unwrap());
static TIF: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\btif\s+(?P<tif>alo|ioc|gtc)\b").unwrap());
static CLOID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcloid\s+(?P<cloid>0x[0-9a-fA-F]{32})\b").unwrap());
static MODIFY_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:price|preco|preço)\s+(?P<price>market|mercado|{NUM})"
    ))
    .unwrap()
});
static MODIFY_SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:size|tamanho)\s+(?P<size>{NUM})")).unwrap()
});
static SWAP_VENUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:via|on|na|no)\s+(?P<venue>jupiter|raydium|pumpfun)\b").unwrap());

static PT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(saldo|envie|enviar|transfira|transferir|compre|comprar|venda|vender|troque|trocar|ponte|chame|chamar|mercado|preço|preco|alavancagem|tamanho|para)\b",
    )
    .unwrap()
});

/// Recognize one instruction. First matching operation wins.
pub fn parse_instruction(text: &str) -> Result<UncheckedIntent, OperatorError> {
    let language = detect_language(text);
    let base = UncheckedIntent {
        raw: Some(text.to_string()),
        language: Some(language.to_string()),
        ..UncheckedIntent::default()
    };

    if BALANCE.is_match(text) {
        return Ok(UncheckedIntent {
            action: Some("portfolio_balance".into()),
            chain: BALANCE_CHAIN
                .captures(text)
                .map(|c| c[1].to_lowercase()),
            ..base
        });
    }

    if let Some(caps) = TRANSFER.captures(text) {
        // `send` verbs also land on transfer; the `send` operation is an
        // execution-plane alias.
        return Ok(UncheckedIntent {
            action: Some("transfer".into()),
            amount: Some(num_value(&caps["amount"])),
            asset: Some(caps["asset"].to_string()),
            recipient: Some(caps["recipient"].to_string()),
            chain: caps.name("chain").map(|m| m.as_str().to_lowercase()),
            ..base
        });
    }

    if let Some(caps) = CANCEL.captures(text) {
        let mut intent = UncheckedIntent {
            action: Some("hl_cancel".into()),
            market: Some(caps["market"].to_string()),
            ..base
        };
        set_order_ref(&mut intent, &caps["ref"]);
        return Ok(intent);
    }

    if let Some(caps) = MODIFY.captures(text) {
        let rest = &caps["rest"];
        let mut intent = UncheckedIntent {
            action: Some("hl_modify".into()),
            market: Some(caps["market"].to_string()),
            price: MODIFY_PRICE
                .captures(rest)
                .map(|c| price_value(&c["price"])),
            size: MODIFY_SIZE.captures(rest).map(|c| num_value(&c["size"])),
            ..base
        };
        set_order_ref(&mut intent, &caps["ref"]);
        return Ok(intent);
    }

    if let Some(caps) = ORDER.captures(text) {
        let rest = &caps["rest"];
        let side = match caps["side"].to_lowercase().as_str() {
            "buy" | "compre" | "comprar" => "buy",
            _ => "sell",
        };
        return Ok(UncheckedIntent {
            action: Some("hl_order".into()),
            side: Some(side.into()),
            size: Some(num_value(&caps["size"])),
            market: Some(caps["market"].to_string()),
            kind: KIND.captures(rest).map(|c| c[1].to_lowercase()),
            price: PRICE.captures(rest).map(|c| price_value(&c["price"])),
            reduce_only: REDUCE_ONLY.is_match(rest).then_some(true),
            leverage: LEVERAGE.captures(rest).map(|c| num_value(&c["lev"])),
            slippage_bps: SLIPPAGE
                .captures(rest)
                .map(|c| Value::String(c["bps"].to_string())),
            tif: TIF.captures(rest).map(|c| c["tif"].to_string()),
            cloid: CLOID.captures(rest).map(|c| c["cloid"].to_string()),
            ..base
        });
    }

    if let Some(caps) = SWAP.captures(text) {
        let rest = &caps["rest"];
        let venue = SWAP_VENUE
            .captures(rest)
            .map(|c| c["venue"].to_lowercase())
            .unwrap_or_else(|| "jupiter".to_string());
        return Ok(UncheckedIntent {
            action: Some(format!("swap_{venue}")),
            amount: Some(num_value(&caps["amount"])),
            asset_in: Some(caps["in"].to_string()),
            asset_out: Some(caps["out"].to_string()),
            slippage_bps: SLIPPAGE
                .captures(rest)
                .map(|c| Value::String(c["bps"].to_string())),
            ..base
        });
    }

    if let Some(caps) = BRIDGE.captures(text) {
        return Ok(UncheckedIntent {
            action: Some("bridge".into()),
            amount: Some(num_value(&caps["amount"])),
            asset: Some(caps["asset"].to_string()),
            from_chain: Some(caps["from"].to_lowercase()),
            to_chain: Some(caps["to"].to_lowercase()),
            recipient: caps.name("recipient").map(|m| m.as_str().to_string()),
            ..base
        });
    }

    if let Some(caps) = CONTRACT_CALL.captures(text) {
        return Ok(UncheckedIntent {
            action: Some("contract_call".into()),
            chain: Some("base".into()),
            contract: Some(caps["contract"].to_string()),
            calldata: Some(caps["calldata"].to_string()),
            value: caps.name("value").map(|m| num_value(m.as_str())),
            ..base
        });
    }

    Err(OperatorError::IntentParse {
        instruction: text.to_string(),
    })
}

fn detect_language(text: &str) -> &'static str {
    if PT_MARKER.is_match(text) { "pt" } else { "en" }
}

/// `0,01` → `"0.01"`. Numbers stay strings until the normalizer parses them.
fn num_value(raw: &str) -> Value {
    Value::String(raw.replace(',', "."))
}

fn price_value(raw: &str) -> Value {
    match raw.to_lowercase().as_str() {
        "market" | "mercado" => Value::String("market".into()),
        other => Value::String(other.replace(',', ".")),
    }
}

fn set_order_ref(intent: &mut UncheckedIntent, raw: &str) {
    if raw.starts_with("0x") || raw.starts_with("0X") {
        intent.cloid = Some(raw.to_string());
    } else {
        intent.oid = Some(Value::String(raw.to_string()));
    }
}
