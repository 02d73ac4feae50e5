//! Structured logging setup (spec SPEC_FULL.md §A4) via `tracing` +
//! `tracing-subscriber` ambient logging: env-filter controlled verbosity,
//! human text by default, JSON on request.

use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("TAKO_FANOUT_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}
