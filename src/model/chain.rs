use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Chains the operator can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Base,
    Solana,
    Arbitrum,
    Hyperliquid,
}

static EVM_ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap());
static SOLANA_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").unwrap());

impl Chain {
    /// Resolve user-facing aliases. `None` for anything unknown.
    pub fn from_alias(name: &str) -> Option<Chain> {
        match name.trim().to_lowercase().as_str() {
            "base" => Some(Chain::Base),
            "solana" | "sol" => Some(Chain::Solana),
            "arbitrum" | "arb" | "arbitrum-one" => Some(Chain::Arbitrum),
            "hyperliquid" | "hl" | "hypercore" => Some(Chain::Hyperliquid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Base => "base",
            Chain::Solana => "solana",
            Chain::Arbitrum => "arbitrum",
            Chain::Hyperliquid => "hyperliquid",
        }
    }

    /// Gas asset for chains where transfers are native-only.
    pub fn native_asset(&self) -> Option<&'static str> {
        match self {
            Chain::Base | Chain::Arbitrum => Some("ETH"),
            Chain::Solana => Some("SOL"),
            Chain::Hyperliquid => None,
        }
    }

    /// Chain implied by a native asset ticker, for transfers that omit the
    /// chain. ETH maps to Base (the operator's EVM home), never Arbitrum.
    pub fn inferred_from_asset(asset: &str) -> Option<Chain> {
        match asset.to_uppercase().as_str() {
            "ETH" => Some(Chain::Base),
            "SOL" => Some(Chain::Solana),
            _ => None,
        }
    }

    /// Does `address` match this chain's address format? EVM addresses are
    /// accepted case-insensitively; checksum casing is not enforced.
    pub fn address_matches(&self, address: &str) -> bool {
        match self {
            Chain::Base | Chain::Arbitrum | Chain::Hyperliquid => EVM_ADDRESS.is_match(address),
            Chain::Solana => {
                SOLANA_ADDRESS.is_match(address) && bs58::decode(address).into_vec().is_ok()
            }
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve() {
        assert_eq!(Chain::from_alias("SOL"), Some(Chain::Solana));
        assert_eq!(Chain::from_alias("hl"), Some(Chain::Hyperliquid));
        assert_eq!(Chain::from_alias(" Base "), Some(Chain::Base));
        assert_eq!(Chain::from_alias("optimism"), None);
    }

    #[test]
    fn evm_addresses_accept_any_case() {
        let addr = "0x000000000000000000000000000000000000dEaD";
        assert!(Chain::Base.address_matches(addr));
        assert!(Chain::Base.address_matches(&addr.to_lowercase()));
        assert!(!Chain::Base.address_matches("0x1234"));
    }

    #[test]
    fn solana_address_length_bounds() {
        let valid = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";
        assert!(Chain::Solana.address_matches(valid));
        // 31 chars: below the minimum
        assert!(!Chain::Solana.address_matches(&valid[..31]));
        // 45 chars: above the maximum
        let too_long = format!("{valid}1");
        assert!(!Chain::Solana.address_matches(&too_long));
        // base58 alphabet excludes 0, O, I, l
        assert!(!Chain::Solana.address_matches("O0Il0000000000000000000000000000"));
    }
}
