//! File-backed persistent state.
//!
//! Every store follows the same discipline: a single JSON document, read
//! and rewritten atomically (write-temp-then-rename) under an adjacent
//! `*.lock` file, so that concurrent pipelines serialize per store and a
//! reader always observes the last committed write. The audit log is the
//! one exception: append-only JSONL, no reader blocks a writer.

pub mod a2a_nonce;
pub mod audit;
pub mod circuit_breaker;
pub mod fs;
pub mod idempotency;
pub mod lock;
pub mod mention_dedupe;
pub mod nonce;

use std::path::{Path, PathBuf};

/// Resolved locations of every state file under one state directory.
#[derive(Debug, Clone)]
pub struct StateLayout {
    pub dir: PathBuf,
}

impl StateLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        StateLayout { dir: dir.into() }
    }

    pub fn idempotency(&self) -> PathBuf {
        self.dir.join("idempotency.json")
    }

    pub fn circuit_breaker(&self) -> PathBuf {
        self.dir.join("circuit-breaker.json")
    }

    pub fn hyperliquid_nonce(&self) -> PathBuf {
        self.dir.join("hyperliquid-nonce.json")
    }

    pub fn a2a_nonce(&self) -> PathBuf {
        self.dir.join("a2a-nonce.json")
    }

    pub fn mention_dedupe(&self) -> PathBuf {
        self.dir.join("mention-delegation-dedupe.json")
    }

    pub fn audit(&self) -> PathBuf {
        self.dir.join("audit.jsonl")
    }
}

/// Lock file adjacent to a state file: `idempotency.json` →
/// `idempotency.json.lock`.
pub(crate) fn lock_path_for(state_file: &Path) -> PathBuf {
    let mut name = state_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".lock");
    state_file.with_file_name(name)
}
