//! `tako-fanout` CLI: `run`/`status`/`clean` over the fan-out
//! orchestration core (spec SPEC_FULL.md §A3). The binary itself is a
//! thin `main.rs` over a library `run()` that does all the parsing, I/O,
//! and error reporting and returns a process exit code; this crate is
//! that library for the fan-out core.

pub mod args;
pub mod clean;
pub mod discoverer;
pub mod error;
pub mod logging;
pub mod run;
pub mod runner;
pub mod status;

use clap::Parser;

use fanout_config::{CliOverrides, FanOutConfig};
use fanout_types::FanOutResult;

use args::{Cli, Commands, FanOutAction};
pub use error::CliError;

/// Parse argv, discover configuration, and execute the selected
/// subcommand. Returns the process exit code: `main.rs` only maps this to
/// `std::process::exit` and never prints anything itself, following the
/// `cli::run()` convention.
pub fn run() -> i32 {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json_logs);

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        state_dir: cli.state_dir.clone(),
        lock_dir: cli.lock_dir.clone(),
        workspace_root: cli.workspace_root.clone(),
        subscriptions_root: cli.subscriptions_root.clone(),
        idempotency_enabled: if cli.no_idempotency { Some(false) } else { None },
        default_concurrency_limit: None,
        default_child_timeout_secs: None,
    };

    let config = match FanOutConfig::discover(&overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return error::codes::CLI_ARGS;
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create async runtime: {e}");
            return error::codes::INTERNAL;
        }
    };

    match rt.block_on(execute(cli.command, &config)) {
        Ok(()) => error::codes::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            e.to_exit_code()
        }
    }
}

async fn execute(command: Commands, config: &FanOutConfig) -> Result<(), CliError> {
    let Commands::FanOut { action } = command;
    match action {
        FanOutAction::Run { event_type, source_repo, payload_file, wait, timeout, concurrency, schema_version, dry_run, json } => {
            let payload = run::load_payload(payload_file.as_ref())?;
            let timeout = timeout.as_deref().map(run::parse_duration_flag).transpose()?;

            let runtime = run::Runtime::build(config, dry_run)?;
            let result = runtime.run(event_type, source_repo, payload, wait, timeout, concurrency, schema_version).await?;
            print_result(&result, json);
            Ok(())
        }
        FanOutAction::Status { id, json } => {
            let runtime = run::Runtime::build(config, true)?;
            let result = status::lookup(&runtime.state_store, &id)?;
            print_result(&result, json);
            Ok(())
        }
        FanOutAction::Clean { older_than, force } => {
            let _ = force;
            let older_than = older_than.as_deref().map(run::parse_duration_flag).transpose()?;
            let report = clean::run_once(config, older_than)?;
            println!("removed {} expired state file(s), {} orphaned workspace(s)", report.states_removed, report.workspaces_removed);
            Ok(())
        }
    }
}

fn print_result(result: &FanOutResult, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string()));
        return;
    }

    println!("fan-out {}: {}", result.fan_out_id, if result.success { "completed" } else { "not completed" });
    println!("  subscribers found:  {}", result.subscribers_found);
    println!("  triggered:          {}", result.triggered_count);
    println!("  timeout exceeded:   {}", result.timeout_exceeded);
    if !result.errors.is_empty() {
        println!("  errors:");
        for error in &result.errors {
            println!("    - {error}");
        }
    }
    for child in &result.children_summary {
        let run_id = child.run_id.as_deref().unwrap_or("-");
        println!("  child {}/{}: {} (run {})", child.repository, child.workflow, child.status, run_id);
    }
}
