//! CLI argument definitions (spec SPEC_FULL.md §A3), in the usual
//! `clap`-derive style: one top-level `Cli` struct with global flags plus
//! a `Commands` enum for the subcommand surface.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// tako-fanout - exercise the fan-out orchestration core from a terminal
#[derive(Parser)]
#[command(name = "tako-fanout")]
#[command(about = "Broadcast an event to subscribers and supervise their child workflows")]
#[command(version)]
pub struct Cli {
    /// Path to an explicit `tako.toml` (overrides discovery).
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Directory fan-out state files are written under.
    #[arg(long, global = true)]
    pub state_dir: Option<Utf8PathBuf>,

    /// Directory advisory lock files are written under.
    #[arg(long, global = true)]
    pub lock_dir: Option<Utf8PathBuf>,

    /// Root directory child workspaces are scratch-allocated under.
    #[arg(long, global = true)]
    pub workspace_root: Option<Utf8PathBuf>,

    /// Root directory the bundled `FileSystemDiscoverer` scans for
    /// `*.tako.toml` subscription declarations.
    #[arg(long, global = true)]
    pub subscriptions_root: Option<Utf8PathBuf>,

    /// Disable fingerprint-based idempotent deduplication.
    #[arg(long, global = true)]
    pub no_idempotency: bool,

    /// Emit structured JSON logs instead of human-readable text.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fan-out operations: trigger, inspect, and reap.
    FanOut {
        #[command(subcommand)]
        action: FanOutAction,
    },
}

#[derive(Subcommand)]
pub enum FanOutAction {
    /// Trigger a `tako/fan-out@v1` step against the bundled discoverer
    /// and runner (or a real backend supplied programmatically).
    Run {
        /// Event type carried by the triggering event.
        #[arg(long)]
        event_type: String,

        /// Repository the event originates from.
        #[arg(long)]
        source_repo: String,

        /// Path to a JSON file with the event payload (defaults to `{}`).
        #[arg(long)]
        payload_file: Option<Utf8PathBuf>,

        /// Wait for every triggered child to reach a terminal status.
        #[arg(long)]
        wait: bool,

        /// Overall timeout, Go-style duration string (e.g. `30s`, `1m30s`).
        #[arg(long)]
        timeout: Option<String>,

        /// Maximum children dispatched concurrently (0 = unbounded).
        #[arg(long)]
        concurrency: Option<usize>,

        /// Event schema version, written as `<event_type>@<version>`.
        #[arg(long)]
        schema_version: Option<String>,

        /// Don't actually invoke child workflows; record synthetic runs.
        #[arg(long)]
        dry_run: bool,

        /// Print the result as JSON instead of a human summary.
        #[arg(long)]
        json: bool,
    },

    /// Show the current status of a fan-out by id or fingerprint.
    Status {
        /// A `fanout-<fingerprint>` id, a timestamp-derived id, or a bare
        /// 64-hex fingerprint.
        #[arg(long)]
        id: String,

        /// Print the status as JSON instead of a human summary.
        #[arg(long)]
        json: bool,
    },

    /// Reap expired fan-out state and orphaned child workspaces.
    Clean {
        /// Override every retention window with this age (Go-style duration).
        #[arg(long)]
        older_than: Option<String>,

        /// Run even if the workspace root or state dir looks unfamiliar.
        #[arg(long)]
        force: bool,
    },
}
