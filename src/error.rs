use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Every way a run can fail. One variant per wire code; the executor folds
/// these into [`ErrorBody`] at the public boundary and never lets a raw
/// error (or a stack trace) escape.
#[derive(Debug, Error)]
pub enum OperatorError {
    // ── Parse ───────────────────────────────────────────────────────

    #[error("could not recognize an operation in instruction: {instruction}")]
    IntentParse { instruction: String },

    // ── Envelope schema ─────────────────────────────────────────────

    #[error("execution payload failed schema validation ({} errors)", errors.len())]
    SchemaInvalid { errors: Vec<String> },

    #[error("unknown operation `{operation}`")]
    OperationUnknown { operation: String },

    // ── Normalization ───────────────────────────────────────────────

    #[error("unsupported chain `{chain}`")]
    ChainUnsupported { chain: String },

    #[error("chain is ambiguous for asset `{asset}`; specify it explicitly")]
    ChainAmbiguous { asset: String },

    #[error("asset `{asset}` is not valid for {action} on {chain}")]
    AssetUnsupported {
        asset: String,
        action: String,
        chain: String,
    },

    #[error("invalid amount `{value}`: {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error("invalid price `{value}`")]
    InvalidPrice { value: String },

    #[error("invalid leverage `{value}`")]
    InvalidLeverage { value: String },

    #[error("invalid slippage `{value}` (expected integer bps in 0..=10000)")]
    InvalidSlippage { value: String },

    #[error("address `{address}` is not valid for chain {chain}")]
    AddressInvalid { address: String, chain: String },

    #[error("invalid order reference `{value}`: {reason}")]
    OrderRefInvalid { value: String, reason: String },

    #[error("invalid market symbol `{symbol}`: {reason}")]
    MarketSymbolInvalid { symbol: String, reason: String },

    #[error("bridge requires two distinct chains, got `{chain}` on both sides")]
    BridgeChainsInvalid { chain: String },

    #[error("swap requires two distinct assets, got `{asset}` on both sides")]
    SwapAssetsInvalid { asset: String },

    #[error("missing required field `{field}` for {action}")]
    FieldMissing {
        field: &'static str,
        action: String,
    },

    #[error("field `{field}` has invalid value `{value}`")]
    FieldInvalid { field: &'static str, value: String },

    // ── A2A security ────────────────────────────────────────────────

    #[error("live execution payload carries no auth block and unsigned live runs are disabled")]
    A2aAuthRequired,

    #[error("unsupported auth scheme `{scheme}`")]
    A2aSchemeUnsupported { scheme: String },

    #[error("auth keyId `{key_id}` is not in the keyring")]
    A2aKeyUnknown { key_id: String },

    #[error("auth timestamp skew {skew_sec}s exceeds the allowed {max_skew_sec}s")]
    A2aTimestampSkew { skew_sec: i64, max_skew_sec: u64 },

    #[error("auth signature does not match the canonical payload")]
    A2aSignatureMismatch,

    #[error("nonce `{nonce}` was already consumed for keyId `{key_id}`")]
    A2aNonceReplay { key_id: String, nonce: String },

    // ── Mention delegation ──────────────────────────────────────────

    #[error("mention delegation metadata is invalid: {}", errors.join("; "))]
    MentionDelegationInvalid { errors: Vec<String> },

    #[error("mention delegation loops back to the originating bot `{bot_id}`")]
    MentionDelegationLoop { bot_id: String },

    #[error("mention delegation trigger expired at {expires_at}")]
    MentionDelegationExpired { expires_at: String },

    #[error("mention trigger `{dedupe_key}` was already consumed")]
    MentionDelegationDuplicate { dedupe_key: String },

    #[error("could not acquire the mention dedupe lock within {timeout_ms}ms")]
    MentionDelegationLockTimeout { timeout_ms: u64 },

    // ── Policy ──────────────────────────────────────────────────────

    #[error("policy document not found at {path}")]
    PolicyNotFound { path: String },

    #[error("policy document is invalid: {reason}")]
    PolicyInvalid { reason: String },

    #[error("policy requires mainnet-only execution")]
    PolicyMainnetRequired,

    #[error("policy hyperliquid operational role must be destination_l3, got `{role}`")]
    PolicyHlRoleInvalid { role: String },

    #[error("policy market data sources must be chainlink or pyth, got `{value}`")]
    PolicyMarketDataInvalid { value: String },

    #[error("policy reporting.discordChannelId is required")]
    PolicyReportingChannelRequired,

    #[error("chain {chain} is not in the policy chain allowlist")]
    PolicyChainDenied { chain: String },

    #[error("asset {asset} is not in the policy asset allowlist")]
    PolicyAssetDenied { asset: String },

    #[error("{action} requires a recipient and none was provided")]
    PolicyRecipientRequired { action: String },

    #[error("recipient {recipient} is not in the policy recipient allowlist")]
    PolicyRecipientDenied { recipient: String },

    #[error("contract {contract} is not in the policy contract allowlist")]
    PolicyContractDenied { contract: String },

    #[error("bridge provider `{provider}` is not allowed (policy pins debridge)")]
    PolicyBridgeProviderDenied { provider: String },

    #[error("bridge source chain {chain} is not allowed by policy")]
    PolicyBridgeSourceDenied { chain: String },

    #[error("bridge route {from}->{to} is not in the policy route allowlist")]
    PolicyBridgeRouteDenied { from: String, to: String },

    #[error("hyperliquid market {market} is not in the policy symbol allowlist")]
    PolicyHlSymbolDenied { market: String },

    #[error("order size {size} exceeds policy max {max}")]
    PolicyOrderSizeExceeded { size: String, max: String },

    #[error("market order carries no slippage and policy sets no default")]
    PolicySlippageRequired,

    #[error("slippage {bps} bps exceeds policy max {max} bps")]
    PolicySlippageExceeded { bps: u32, max: u32 },

    #[error("leverage {leverage} exceeds policy max {max}")]
    PolicyLeverageExceeded { leverage: String, max: String },

    #[error("USD notional {notional} exceeds policy max {max}")]
    PolicyNotionalExceeded { notional: String, max: String },

    #[error("cannot derive a USD notional for {market} and policy caps notional per tx")]
    PolicyNotionalUnpriced { market: String },

    // ── Live-write safety gates ─────────────────────────────────────

    #[error("missing wallet keys for live execution: {}", missing.join(", "))]
    KeySegregationKeysMissing { missing: Vec<String> },

    #[error("base and hyperliquid signing keys resolve to the same address {address}")]
    KeySegregationViolation { address: String },

    #[error("circuit breaker is open until {open_until}")]
    CircuitBreakerOpen {
        open_until: i64,
        last_error: Option<ErrorBody>,
    },

    #[error("an identical intent already ran (status {status}, run {run_id})")]
    IdempotencyDuplicate { status: String, run_id: String },

    // ── Infrastructure ──────────────────────────────────────────────

    #[error("could not acquire lock on {path} within {timeout_ms}ms")]
    StateLockTimeout { path: String, timeout_ms: u64 },

    #[error("state file error on {path}: {reason}")]
    StateIo { path: String, reason: String },

    // ── Venue (connector-originated) ────────────────────────────────

    #[error("{code}: {message}")]
    Venue {
        code: String,
        message: String,
        details: Value,
        http_status: Option<u16>,
    },
}

impl OperatorError {
    /// Stable wire code for the public failure shape.
    pub fn code(&self) -> &str {
        match self {
            Self::IntentParse { .. } => "INTENT_PARSE_ERROR",
            Self::SchemaInvalid { .. } => "EXECUTION_SCHEMA_INVALID",
            Self::OperationUnknown { .. } => "EXECUTION_OPERATION_UNKNOWN",
            Self::ChainUnsupported { .. } => "CHAIN_UNSUPPORTED",
            Self::ChainAmbiguous { .. } => "CHAIN_AMBIGUOUS",
            Self::AssetUnsupported { .. } => "ASSET_UNSUPPORTED",
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::InvalidPrice { .. } => "INVALID_PRICE",
            Self::InvalidLeverage { .. } => "INVALID_LEVERAGE",
            Self::InvalidSlippage { .. } => "INVALID_SLIPPAGE",
            Self::AddressInvalid { .. } => "ADDRESS_INVALID",
            Self::OrderRefInvalid { .. } => "ORDER_REF_INVALID",
            Self::MarketSymbolInvalid { .. } => "MARKET_SYMBOL_INVALID",
            Self::BridgeChainsInvalid { .. } => "BRIDGE_CHAINS_INVALID",
            Self::SwapAssetsInvalid { .. } => "SWAP_ASSETS_INVALID",
            Self::FieldMissing { .. } => "FIELD_MISSING",
            Self::FieldInvalid { .. } => "FIELD_INVALID",
            Self::A2aAuthRequired => "A2A_AUTH_REQUIRED",
            Self::A2aSchemeUnsupported { .. } => "A2A_SCHEME_UNSUPPORTED",
            Self::A2aKeyUnknown { .. } => "A2A_KEY_UNKNOWN",
            Self::A2aTimestampSkew { .. } => "A2A_TIMESTAMP_SKEW",
            Self::A2aSignatureMismatch => "A2A_SIGNATURE_MISMATCH",
            Self::A2aNonceReplay { .. } => "A2A_NONCE_REPLAY",
            Self::MentionDelegationInvalid { .. } => "EXECUTION_MENTION_DELEGATION_INVALID",
            Self::MentionDelegationLoop { .. } => "EXECUTION_MENTION_DELEGATION_LOOP",
            Self::MentionDelegationExpired { .. } => "EXECUTION_MENTION_DELEGATION_EXPIRED",
            Self::MentionDelegationDuplicate { .. } => "EXECUTION_MENTION_DELEGATION_DUPLICATE",
            Self::MentionDelegationLockTimeout { .. } => {
                "EXECUTION_MENTION_DELEGATION_LOCK_TIMEOUT"
            }
            Self::PolicyNotFound { .. } => "POLICY_NOT_FOUND",
            Self::PolicyInvalid { .. } => "POLICY_INVALID",
            Self::PolicyMainnetRequired => "POLICY_MAINNET_REQUIRED",
            Self::PolicyHlRoleInvalid { .. } => "POLICY_HL_ROLE_INVALID",
            Self::PolicyMarketDataInvalid { .. } => "POLICY_MARKETDATA_INVALID",
            Self::PolicyReportingChannelRequired => "POLICY_REPORTING_CHANNEL_REQUIRED",
            Self::PolicyChainDenied { .. } => "POLICY_CHAIN_DENIED",
            Self::PolicyAssetDenied { .. } => "POLICY_ASSET_DENIED",
            Self::PolicyRecipientRequired { .. } => "POLICY_RECIPIENT_REQUIRED",
            Self::PolicyRecipientDenied { .. } => "POLICY_RECIPIENT_DENIED",
            Self::PolicyContractDenied { .. } => "POLICY_CONTRACT_DENIED",
            Self::PolicyBridgeProviderDenied { .. } => "POLICY_BRIDGE_PROVIDER_DENIED",
            Self::PolicyBridgeSourceDenied { .. } => "POLICY_BRIDGE_SOURCE_DENIED",
            Self::PolicyBridgeRouteDenied { .. } => "POLICY_BRIDGE_ROUTE_DENIED",
            Self::PolicyHlSymbolDenied { .. } => "POLICY_HL_SYMBOL_DENIED",
            Self::PolicyOrderSizeExceeded { .. } => "POLICY_ORDER_SIZE_EXCEEDED",
            Self::PolicySlippageRequired => "POLICY_SLIPPAGE_REQUIRED",
            Self::PolicySlippageExceeded { .. } => "POLICY_SLIPPAGE_EXCEEDED",
            Self::PolicyLeverageExceeded { .. } => "POLICY_LEVERAGE_EXCEEDED",
            Self::PolicyNotionalExceeded { .. } => "POLICY_NOTIONAL_EXCEEDED",
            Self::PolicyNotionalUnpriced { .. } => "POLICY_NOTIONAL_UNPRICED",
            Self::KeySegregationKeysMissing { .. } => "KEY_SEGREGATION_KEYS_MISSING",
            Self::KeySegregationViolation { .. } => "KEY_SEGREGATION_VIOLATION",
            Self::CircuitBreakerOpen { .. } => "CIRCUIT_BREAKER_OPEN",
            Self::IdempotencyDuplicate { .. } => "IDEMPOTENCY_DUPLICATE",
            Self::StateLockTimeout { .. } => "STATE_LOCK_TIMEOUT",
            Self::StateIo { .. } => "STATE_IO_ERROR",
            Self::Venue { code, .. } => code,
        }
    }

    /// Structured detail payload for the public failure shape.
    pub fn details(&self) -> Value {
        match self {
            Self::SchemaInvalid { errors } => json!({ "errors": errors }),
            Self::MentionDelegationInvalid { errors } => json!({ "errors": errors }),
            Self::A2aTimestampSkew {
                skew_sec,
                max_skew_sec,
            } => json!({ "skewSec": skew_sec, "maxSkewSec": max_skew_sec }),
            Self::A2aNonceReplay { key_id, nonce } => {
                json!({ "keyId": key_id, "nonce": nonce })
            }
            Self::MentionDelegationDuplicate { dedupe_key } => {
                json!({ "dedupeKey": dedupe_key })
            }
            Self::CircuitBreakerOpen {
                open_until,
                last_error,
            } => json!({ "openUntil": open_until, "lastError": last_error }),
            Self::IdempotencyDuplicate { status, run_id } => {
                json!({ "status": status, "runId": run_id })
            }
            Self::KeySegregationKeysMissing { missing } => json!({ "missing": missing }),
            Self::PolicyNotionalExceeded { notional, max } => {
                json!({ "notionalUsd": notional, "maxNotionalUsdPerTx": max })
            }
            Self::Venue {
                details,
                http_status,
                ..
            } => match http_status {
                Some(status) => json!({ "httpStatus": status, "venue": details }),
                None => details.clone(),
            },
            _ => Value::Null,
        }
    }
}

/// Wire shape of a failure: `{code, message, details}`. This is the only
/// error representation that crosses the public pipeline boundary.
#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl From<&OperatorError> for ErrorBody {
    fn from(err: &OperatorError) -> Self {
        ErrorBody {
            code: err.code().to_string(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_are_screaming_snake() {
        let err = OperatorError::PolicyChainDenied {
            chain: "base".into(),
        };
        assert_eq!(err.code(), "POLICY_CHAIN_DENIED");
        let body = ErrorBody::from(&err);
        assert!(body.message.contains("base"));
    }

    #[test]
    fn venue_errors_keep_their_dynamic_code() {
        let err = OperatorError::Venue {
            code: "JUPITER_HTTP_ERROR".into(),
            message: "gateway timeout".into(),
            details: json!({ "route": "SOL->USDC" }),
            http_status: Some(504),
        };
        assert_eq!(err.code(), "JUPITER_HTTP_ERROR");
        assert_eq!(err.details()["httpStatus"], 504);
    }
}
