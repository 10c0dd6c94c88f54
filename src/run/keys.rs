//! Key-segregation assertion for live writes.
//!
//! Three wallets must be configured before anything irreversible runs, and
//! the Base EOA must not be the same key as the Hyperliquid API wallet: a
//! venue-compromised key must never be able to move L1 funds.

use alloy::signers::local::PrivateKeySigner;

use super::config::{OperatorConfig, SolanaKey};
use crate::error::OperatorError;

pub fn assert_key_segregation(config: &OperatorConfig) -> Result<(), OperatorError> {
    let mut missing = Vec::new();
    if config.base_private_key.is_none() {
        missing.push("BASE_PRIVATE_KEY".to_string());
    }
    if config.solana_private_key.is_none() {
        missing.push("SOLANA_PRIVATE_KEY_B58|SOLANA_PRIVATE_KEY_JSON".to_string());
    }
    if config.hyperliquid_api_wallet_private_key.is_none() {
        missing.push("HYPERLIQUID_API_WALLET_PRIVATE_KEY".to_string());
    }
    let (Some(base_key), Some(solana_key), Some(hl_key)) = (
        &config.base_private_key,
        &config.solana_private_key,
        &config.hyperliquid_api_wallet_private_key,
    ) else {
        return Err(OperatorError::KeySegregationKeysMissing { missing });
    };

    check_solana_key(solana_key)?;

    let base_address = evm_address("BASE_PRIVATE_KEY", base_key)?;
    let hl_address = evm_address("HYPERLIQUID_API_WALLET_PRIVATE_KEY", hl_key)?;
    if base_address == hl_address {
        return Err(OperatorError::KeySegregationViolation {
            address: base_address,
        });
    }
    Ok(())
}

/// Normalized (lowercase hex) address derived from a private key.
fn evm_address(env_name: &'static str, raw_key: &str) -> Result<String, OperatorError> {
    let signer: PrivateKeySigner =
        raw_key
            .trim()
            .parse()
            .map_err(|_| OperatorError::FieldInvalid {
                field: env_name,
                value: "<redacted>".into(),
            })?;
    Ok(format!("{:#x}", signer.address()))
}

fn check_solana_key(key: &SolanaKey) -> Result<(), OperatorError> {
    let valid = match key {
        SolanaKey::Base58(raw) => bs58::decode(raw.trim())
            .into_vec()
            .map(|bytes| bytes.len() == 64)
            .unwrap_or(false),
        SolanaKey::JsonArray(raw) => serde_json::from_str::<Vec<u8>>(raw)
            .map(|bytes| bytes.len() == 64)
            .unwrap_or(false),
    };
    if !valid {
        return Err(OperatorError::FieldInvalid {
            field: "SOLANA_PRIVATE_KEY",
            value: "<redacted>".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    // Throwaway keys, never funded.
    const KEY_A: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
    const KEY_B: &str = "0x0000000000000000000000000000000000000000000000000000000000000002";

    fn config_with(base: Option<&str>, hl: Option<&str>, sol: bool) -> OperatorConfig {
        let mut config = OperatorConfig::offline(PathBuf::from("/tmp"), PathBuf::from("/tmp/p"));
        config.base_private_key = base.map(str::to_string);
        config.hyperliquid_api_wallet_private_key = hl.map(str::to_string);
        config.solana_private_key = sol.then(|| SolanaKey::JsonArray(format!("{:?}", [7u8; 64])));
        config
    }

    #[test]
    fn missing_keys_are_listed() {
        let err = assert_key_segregation(&config_with(Some(KEY_A), None, false)).unwrap_err();
        match err {
            OperatorError::KeySegregationKeysMissing { missing } => {
                assert_eq!(missing.len(), 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn identical_base_and_hl_keys_violate() {
        let err =
            assert_key_segregation(&config_with(Some(KEY_A), Some(KEY_A), true)).unwrap_err();
        assert_eq!(err.code(), "KEY_SEGREGATION_VIOLATION");
    }

    #[test]
    fn distinct_keys_pass() {
        assert_key_segregation(&config_with(Some(KEY_A), Some(KEY_B), true)).unwrap();
    }
}
