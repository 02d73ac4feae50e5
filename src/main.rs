//! tako-fanout CLI binary
//!
//! This is the minimal entrypoint. All logic is in the library; main.rs
//! only invokes `run()` and maps the returned code to a process exit.

fn main() {
    std::process::exit(tako_fanout::run());
}
