use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use rust_decimal::Decimal;

use exec_flow::cli::{Cli, Command};
use exec_flow::connectors::hyperliquid::StaticMarketData;
use exec_flow::model::envelope::ExecutionEnvelope;
use exec_flow::model::intent::UncheckedIntent;
use exec_flow::model::policy::PolicyDocument;
use exec_flow::run::config::OperatorConfig;
use exec_flow::run::{Executor, RunOptions, RunOutcome};
use exec_flow::store::StateLayout;
use exec_flow::store::audit::AuditLog;
use exec_flow::validate;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Schema => print_schema(),
        Command::Validate { file } => validate_payload(&file),
        Command::Policy { file } => check_policy(&file),
        Command::Run {
            instruction,
            dry_run,
            policy,
            state_dir,
        } => {
            let executor = build_executor(state_dir, policy)?;
            let opts = run_options(dry_run);
            block_on(async { executor.run_instruction(&instruction, &opts).await })
        }
        Command::Native {
            file,
            dry_run,
            policy,
            state_dir,
        } => {
            let unchecked: UncheckedIntent = read_json_file(&file)?;
            let executor = build_executor(state_dir, policy)?;
            let opts = run_options(dry_run);
            block_on(async { executor.run_native_command(&unchecked, &opts).await })
        }
        Command::Exec {
            file,
            dry_run,
            policy,
            state_dir,
        } => {
            let payload: serde_json::Value = read_json_file(&file)?;
            let executor = build_executor(state_dir, policy)?;
            let opts = run_options(dry_run);
            block_on(async { executor.run_execution_payload(&payload, &opts).await })
        }
        Command::Audit {
            run_id,
            lines,
            state_dir,
        } => tail_audit(run_id.as_deref(), lines, state_dir),
    }
}

fn print_schema() -> Result<()> {
    let schema = schemars::schema_for!(ExecutionEnvelope);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn validate_payload(file: &Path) -> Result<()> {
    let payload: serde_json::Value = read_json_file(file)?;
    match validate::parse_execution_payload(&payload) {
        Ok(validated) => {
            println!("OK: operation {}", validated.envelope.operation);
            println!(
                "{}",
                serde_json::to_string_pretty(&validated.intent.to_value())?
            );
            Ok(())
        }
        Err(err) => {
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&exec_flow::error::ErrorBody::from(&err))?
            );
            bail!("payload is invalid");
        }
    }
}

fn check_policy(file: &Path) -> Result<()> {
    match PolicyDocument::load(file) {
        Ok(policy) => {
            println!("OK: policy version {}", policy.version);
            Ok(())
        }
        Err(err) => bail!("{err}"),
    }
}

fn tail_audit(run_id: Option<&str>, lines: usize, state_dir: Option<PathBuf>) -> Result<()> {
    let config = OperatorConfig::from_env(state_dir, PathBuf::from("policy.json"))?;
    let log = AuditLog::new(StateLayout::new(&config.state_dir).audit());
    let events = match run_id {
        Some(run_id) => log.read_run(run_id),
        None => log.read_all(),
    }
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    let start = events.len().saturating_sub(lines);
    for event in &events[start..] {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

fn build_executor(state_dir: Option<PathBuf>, policy: PathBuf) -> Result<Executor> {
    let config = OperatorConfig::from_env(state_dir, policy)?;
    // Offline market data for notional hydration; live venue transports
    // plug in behind the same trait.
    let mids: HashMap<String, Decimal> = match std::env::var("EXEC_FLOW_HL_MIDS_JSON") {
        Ok(raw) => serde_json::from_str(&raw).context("parsing EXEC_FLOW_HL_MIDS_JSON")?,
        Err(_) => HashMap::new(),
    };
    Ok(Executor::new(
        config,
        Arc::new(StaticMarketData::new(mids)),
    ))
}

fn run_options(dry_run: bool) -> RunOptions {
    RunOptions {
        dry_run: dry_run.then_some(true),
    }
}

fn block_on(run: impl Future<Output = RunOutcome>) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    let outcome = rt.block_on(run);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if outcome.ok {
        Ok(())
    } else {
        bail!(
            "run {} failed: {}",
            outcome.run_id,
            outcome
                .error
                .map(|e| e.code)
                .unwrap_or_else(|| "UNKNOWN".into())
        )
    }
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}
