//! Venue connector surface.
//!
//! The executor depends only on [`Connector`]: one preflight and one
//! execute per intent, both returning structured reports that the pipeline
//! serializes into the audit log without interpretation. The connectors
//! shipped here are transport-free — they validate, simulate, and produce
//! deterministic references; wiring real RPC behind the same trait is a
//! per-venue concern that never touches the pipeline.

pub mod debridge;
pub mod evm;
pub mod fallback;
pub mod hyperliquid;
pub mod jupiter;
pub mod portfolio;
pub mod pumpfun;
pub mod raydium;
pub mod registry;
pub mod solana;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::OperatorError;
use crate::model::intent::CanonicalIntent;

/// Run-scoped identifiers handed to a live execution.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'a> {
    pub run_id: &'a str,
    pub idempotency_key: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightReport {
    pub connector: String,
    pub action: String,
    /// Names of the simulations/checks the connector performed.
    pub checks: Vec<String>,
    pub estimate: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub connector: String,
    pub action: String,
    /// Venue-side reference: tx hash, signature, order id.
    pub reference: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Value>,
}

/// Venue-originated failure. Codes are venue-prefixed
/// (`JUPITER_EXECUTION_FAILED`, `HYPERLIQUID_...`) and flow to the public
/// boundary unchanged.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ConnectorError {
    pub code: String,
    pub message: String,
    pub details: Value,
    pub http_status: Option<u16>,
}

impl ConnectorError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        ConnectorError {
            code: code.into(),
            message: message.into(),
            details: Value::Null,
            http_status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

impl From<ConnectorError> for OperatorError {
    fn from(err: ConnectorError) -> Self {
        OperatorError::Venue {
            code: err.code,
            message: err.message,
            details: err.details,
            http_status: err.http_status,
        }
    }
}

/// One venue. `preflight` runs for dry-run and as the pre-live sanity
/// check; `execute` only ever runs live, after every safety gate.
#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn preflight(&self, intent: &CanonicalIntent) -> Result<PreflightReport, ConnectorError>;

    async fn execute(
        &self,
        intent: &CanonicalIntent,
        ctx: &ExecutionContext<'_>,
    ) -> Result<ExecutionReport, ConnectorError>;
}

/// An intent arriving at the wrong connector is an operator wiring bug,
/// not a venue failure.
pub(crate) fn unsupported(name: &str, intent: &CanonicalIntent) -> ConnectorError {
    ConnectorError::new(
        "CONNECTOR_ACTION_UNSUPPORTED",
        format!("connector {name} does not handle {}", intent.action()),
    )
}
