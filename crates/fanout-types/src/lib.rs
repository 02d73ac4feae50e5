//! Shared data model for the tako fan-out orchestration core.
//!
//! Every other crate in the workspace builds on the types defined here:
//! the dynamically-typed payload tree ([`value::Value`]), events and their
//! schemas ([`event`]), subscription declarations ([`subscription`]),
//! persisted fan-out/child state ([`state`]), circuit-breaker and lock
//! records ([`breaker`], [`lock`]), and the result shape returned to callers
//! ([`result`]).

pub mod breaker;
pub mod event;
pub mod lock;
pub mod result;
pub mod state;
pub mod subscription;
pub mod value;

pub use breaker::{BreakerState, CircuitBreakerRecord};
pub use event::{Event, EventMetadata, EventSchema, LegacyEvent, PropertySchema, PropertyType};
pub use lock::{LockMode, LockRecord};
pub use result::{ChildSummary, DetailedError, ErrorType, FanOutResult};
pub use state::{ChildWorkflow, ChildWorkflowStatus, FanOutState, FanOutStatus, is_idempotent_id};
pub use subscription::{Subscription, SubscriptionMatch, normalize_whitespace};
pub use value::Value;
