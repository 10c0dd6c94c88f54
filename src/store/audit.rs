//! Append-only audit stream, one JSON event per line, keyed by run.

use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fs::append_jsonl;
use crate::error::OperatorError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub run_id: String,
    pub event: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

/// Sink handed through the pipeline. Every contractual point in the run
/// appends here; failures to audit fail the run rather than pass silently.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        AuditLog { path: path.into() }
    }

    pub fn append(&self, run_id: &str, event: &str, data: Value) -> Result<(), OperatorError> {
        let entry = AuditEvent {
            run_id: run_id.to_string(),
            event: event.to_string(),
            data,
            timestamp: Utc::now(),
        };
        append_jsonl(&self.path, &entry).map_err(|e| self.io_error(e))
    }

    /// All events, oldest first. Unparseable lines are surfaced as errors;
    /// the stream is a contract, not best-effort telemetry.
    pub fn read_all(&self) -> Result<Vec<AuditEvent>, OperatorError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| OperatorError::StateIo {
                    path: self.path.display().to_string(),
                    reason: format!("bad audit line: {e}"),
                })
            })
            .collect()
    }

    /// Events for one run, in emission order.
    pub fn read_run(&self, run_id: &str) -> Result<Vec<AuditEvent>, OperatorError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.run_id == run_id)
            .collect())
    }

    fn io_error(&self, e: io::Error) -> OperatorError {
        OperatorError::StateIo {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_and_filter_by_run() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.jsonl"));
        log.append("run_a", "intent.parsed", json!({ "action": "transfer" }))
            .unwrap();
        log.append("run_b", "intent.parsed", json!({})).unwrap();
        log.append("run_a", "policy.checked", json!({})).unwrap();

        let events = log.read_run("run_a").unwrap();
        let names: Vec<&str> = events.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(names, ["intent.parsed", "policy.checked"]);
    }
}
