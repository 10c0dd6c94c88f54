use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::security::{A2aConfig, DEFAULT_MAX_SKEW_SEC, SecurityMode};
use crate::store::lock::LockOptions;

/// Operator configuration, resolved from the environment once at startup
/// and passed by reference everywhere else.
///
/// Wallet keys stay raw strings here; address derivation happens in the
/// key-segregation check so a dry-run never needs parseable keys.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    pub state_dir: PathBuf,
    pub policy_path: PathBuf,
    pub base_private_key: Option<String>,
    pub solana_private_key: Option<SolanaKey>,
    pub hyperliquid_api_wallet_private_key: Option<String>,
    pub hyperliquid_account_address: Option<String>,
    pub a2a: A2aConfig,
    pub lock: LockOptions,
}

/// Solana secret material comes in two encodings.
#[derive(Debug, Clone)]
pub enum SolanaKey {
    Base58(String),
    JsonArray(String),
}

impl OperatorConfig {
    /// Resolve from the environment. `state_dir`/`policy_path` come from
    /// the CLI; the state dir falls back to `EXEC_FLOW_STATE_DIR`, then
    /// `~/.exec-flow/state`.
    pub fn from_env(state_dir: Option<PathBuf>, policy_path: PathBuf) -> Result<Self> {
        let state_dir = state_dir
            .or_else(|| std::env::var("EXEC_FLOW_STATE_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(default_state_dir);

        let solana_private_key = match (
            std::env::var("SOLANA_PRIVATE_KEY_B58").ok(),
            std::env::var("SOLANA_PRIVATE_KEY_JSON").ok(),
        ) {
            (Some(b58), _) => Some(SolanaKey::Base58(b58)),
            (None, Some(json)) => Some(SolanaKey::JsonArray(json)),
            (None, None) => None,
        };

        let mode = match std::env::var("A2A_SECURITY_MODE") {
            Ok(raw) => SecurityMode::parse(&raw)
                .with_context(|| format!("invalid A2A_SECURITY_MODE `{raw}`"))?,
            Err(_) => SecurityMode::Observe,
        };
        let keyring: HashMap<String, String> = match std::env::var("A2A_HMAC_KEYS_JSON") {
            Ok(raw) => serde_json::from_str(&raw).context("parsing A2A_HMAC_KEYS_JSON")?,
            Err(_) => HashMap::new(),
        };
        let allow_unsigned_live = match std::env::var("A2A_ALLOW_UNSIGNED_LIVE").ok().as_deref() {
            None | Some("false") => false,
            Some("true") => true,
            Some(other) => bail!("invalid A2A_ALLOW_UNSIGNED_LIVE `{other}` (true|false)"),
        };

        let lock = LockOptions::new(
            env_u64("EXEC_FLOW_LOCK_TIMEOUT_MS")?.unwrap_or(LockOptions::default().timeout_ms),
            env_u64("EXEC_FLOW_LOCK_STALE_MS")?.unwrap_or(LockOptions::default().stale_ms),
        );

        Ok(OperatorConfig {
            state_dir,
            policy_path,
            base_private_key: std::env::var("BASE_PRIVATE_KEY").ok(),
            solana_private_key,
            hyperliquid_api_wallet_private_key: std::env::var(
                "HYPERLIQUID_API_WALLET_PRIVATE_KEY",
            )
            .ok(),
            hyperliquid_account_address: std::env::var("HYPERLIQUID_ACCOUNT_ADDRESS").ok(),
            a2a: A2aConfig {
                mode,
                keyring,
                allow_unsigned_live,
                max_skew_sec: env_u64("A2A_MAX_SKEW_SEC")?.unwrap_or(DEFAULT_MAX_SKEW_SEC),
            },
            lock,
        })
    }

    /// Bare config for tests and offline validation: no keys, observe mode.
    pub fn offline(state_dir: PathBuf, policy_path: PathBuf) -> Self {
        OperatorConfig {
            state_dir,
            policy_path,
            base_private_key: None,
            solana_private_key: None,
            hyperliquid_api_wallet_private_key: None,
            hyperliquid_account_address: None,
            a2a: A2aConfig::default(),
            lock: LockOptions::default(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".exec-flow")
        .join("state")
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .with_context(|| format!("invalid {name} `{raw}`")),
        Err(_) => Ok(None),
    }
}
