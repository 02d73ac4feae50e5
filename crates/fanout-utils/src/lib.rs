//! Shared filesystem, backoff and cancellation primitives used across the
//! tako fan-out orchestration core.

pub mod atomic_write;
pub mod backoff;
pub mod cancel;
pub mod pid;

pub use atomic_write::{create_exclusive, write_atomic, CreateOutcome};
pub use backoff::{apply_jitter, delay_for_attempt, poll_delay};
pub use cancel::CancelToken;
pub use pid::is_process_alive;
