//! The top-level fan-out algorithm (C6): parses a step's parameters,
//! fingerprints and deduplicates the triggering event, discovers and
//! filters subscribers, resolves diamond dependencies, dispatches children
//! with bounded concurrency behind a circuit breaker and a retrying
//! executor, and optionally waits for them all to settle.

pub mod diamond;
pub mod discoverer;
pub mod error;
pub mod orchestrator;
pub mod params;
pub mod runner;

pub use diamond::{resolve, SkippedByDiamond};
pub use discoverer::{DiscoveryError, StaticDiscoverer, SubscriptionDiscoverer};
pub use error::OrchestratorError;
pub use orchestrator::{FanOutOrchestrator, OrchestratorConfig, STEP_USES};
pub use params::{parse, StepParams};
pub use runner::{ExecutionResult, WorkflowInput, WorkflowRunner};
