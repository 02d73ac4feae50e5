//! tako-fanout - a `tako/fan-out@v1` step runner
//!
//! This crate is a thin re-export over [`fanout_cli`]: the real logic
//! lives in the `fanout-*` workspace crates (C1-C9), composed behind the
//! `fanout-orchestrator` entry point and driven here by a terminal CLI.

pub use fanout_cli::run;
