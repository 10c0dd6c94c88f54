use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Dual-plane execution operator — parse, validate, and run trading
/// intents against operator policy.
#[derive(Parser)]
#[command(name = "exec-flow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Output the execution-plane envelope JSON schema (for upstream agents)
    Schema,

    /// Validate an execution payload file without running it
    Validate {
        /// Path to the payload JSON file
        file: PathBuf,
    },

    /// Load and structurally validate a policy document
    Policy {
        /// Path to the policy JSON file
        file: PathBuf,
    },

    /// Run a free-text instruction through the pipeline
    Run {
        /// The instruction, e.g. "send 0.001 ETH to 0x… on base"
        instruction: String,

        /// Force a dry run regardless of the policy default
        #[arg(long)]
        dry_run: bool,

        /// Path to the policy document
        #[arg(long, default_value = "policy.json")]
        policy: PathBuf,

        /// State directory (default: EXEC_FLOW_STATE_DIR or ~/.exec-flow/state)
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },

    /// Run a structured native command (loose intent JSON)
    Native {
        /// Path to the intent JSON file
        file: PathBuf,

        /// Force a dry run regardless of the policy default
        #[arg(long)]
        dry_run: bool,

        /// Path to the policy document
        #[arg(long, default_value = "policy.json")]
        policy: PathBuf,

        /// State directory (default: EXEC_FLOW_STATE_DIR or ~/.exec-flow/state)
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },

    /// Run a signed execution-plane payload
    Exec {
        /// Path to the payload JSON file
        file: PathBuf,

        /// Force a dry run regardless of the envelope and policy default
        #[arg(long)]
        dry_run: bool,

        /// Path to the policy document
        #[arg(long, default_value = "policy.json")]
        policy: PathBuf,

        /// State directory (default: EXEC_FLOW_STATE_DIR or ~/.exec-flow/state)
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },

    /// Tail the audit log
    Audit {
        /// Only events for this run
        #[arg(long)]
        run_id: Option<String>,

        /// Number of trailing events to print
        #[arg(long, default_value = "50")]
        lines: usize,

        /// State directory (default: EXEC_FLOW_STATE_DIR or ~/.exec-flow/state)
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },
}
