//! Shared fixtures for pipeline tests: policies, executors with static
//! market data, and signed execution payloads.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use exec_flow::connectors::hyperliquid::StaticMarketData;
use exec_flow::run::config::OperatorConfig;
use exec_flow::run::{Executor, RunOptions};
use exec_flow::security::{A2aConfig, SecurityMode, sign_payload};

pub const POLICY_VERSION: &str = "2026-07-01";

/// A permissive baseline policy; tests override what they pin down.
pub fn policy_json() -> Value {
    json!({
        "version": POLICY_VERSION,
        "execution": {
            "allowMainnetOnly": true,
            "defaultDryRun": true,
            "requireKeySegregation": false,
            "requireRecipientAllowlist": false
        },
        "allowlists": {
            "chains": ["base", "solana", "arbitrum", "hyperliquid"],
            "assets": [],
            "recipients": [],
            "contracts": [],
            "bridgeRoutes": [
                { "from": "base", "to": "solana" },
                { "from": "solana", "to": "base" }
            ],
            "hyperliquidSymbols": []
        },
        "limits": {
            "maxOrderSize": "10",
            "maxSlippageBps": 100,
            "defaultSlippageBps": 50,
            "maxPerpLeverage": "5",
            "maxNotionalUsdPerTx": "100"
        },
        "idempotency": { "ttlDays": 7 },
        "circuitBreaker": {
            "enabled": true,
            "maxFailures": 3,
            "windowSec": 600,
            "cooldownSec": 300
        },
        "marketData": {
            "primaryPriceSource": "chainlink",
            "fallbackPriceSource": "pyth"
        },
        "routing": { "hyperliquidOperationalRole": "destination_l3" },
        "reporting": { "discordChannelId": "140000000000000001" }
    })
}

pub fn write_policy(dir: &Path, policy: &Value) -> PathBuf {
    let path = dir.join("policy.json");
    std::fs::write(&path, serde_json::to_string_pretty(policy).unwrap()).unwrap();
    path
}

pub fn offline_config(dir: &Path, policy: &Value) -> OperatorConfig {
    let policy_path = write_policy(dir, policy);
    OperatorConfig::offline(dir.join("state"), policy_path)
}

pub fn enforce_a2a(keyring: &[(&str, &str)]) -> A2aConfig {
    A2aConfig {
        mode: SecurityMode::Enforce,
        keyring: keyring
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        allow_unsigned_live: false,
        max_skew_sec: 300,
    }
}

/// Executor over a temp state dir with fixed Hyperliquid mids.
pub fn executor(dir: &Path, policy: &Value, mids: &[(&str, &str)]) -> Executor {
    executor_with_config(offline_config(dir, policy), mids)
}

pub fn executor_with_config(config: OperatorConfig, mids: &[(&str, &str)]) -> Executor {
    let mids: HashMap<String, Decimal> = mids
        .iter()
        .map(|(market, mid)| (market.to_string(), mid.parse().unwrap()))
        .collect();
    Executor::new(config, Arc::new(StaticMarketData::new(mids)))
}

pub fn live() -> RunOptions {
    RunOptions { dry_run: None }
}

pub fn dry() -> RunOptions {
    RunOptions {
        dry_run: Some(true),
    }
}

/// Minimal valid transfer payload. `dry_run` lands in the envelope.
pub fn transfer_payload(request_id: &str, dry_run: bool) -> Value {
    json!({
        "schemaVersion": "v1",
        "plane": "execution",
        "operation": "transfer",
        "requestId": request_id,
        "correlationId": format!("corr-{request_id}"),
        "dryRun": dry_run,
        "intent": {
            "amount": "0.001",
            "asset": "ETH",
            "chain": "base",
            "recipient": "0x000000000000000000000000000000000000dEaD"
        }
    })
}

/// Attach a valid HMAC auth block signed with `secret`.
pub fn sign(mut payload: Value, key_id: &str, nonce: &str, secret: &str) -> Value {
    payload["auth"] = json!({
        "scheme": "hmac-sha256-v1",
        "keyId": key_id,
        "nonce": nonce,
        "timestamp": Utc::now().to_rfc3339(),
    });
    let signature = sign_payload(&payload, secret);
    payload["auth"]["signature"] = json!(signature);
    payload
}

pub fn gated_mention(origin: &str, target: &str, message_id: &str, ttl: u32) -> Value {
    json!({
        "mentionDelegationMode": "gated",
        "mentionDelegation": {
            "channel": "discord:channel:123456789012345678",
            "messageId": message_id,
            "originBotId": origin,
            "targetBotId": target,
            "dedupeBy": "messageId",
            "ttlSeconds": ttl,
            "observedAt": Utc::now().to_rfc3339(),
            "delegatedHumanProxy": {
                "mode": "delegated-human-proxy",
                "policyValidated": true,
                "envelopeValidated": true,
                "riskGatePassed": true,
                "riskClassification": "live",
                "authorizationRef": "ticket-4411"
            }
        }
    })
}
