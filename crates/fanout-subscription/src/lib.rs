//! Subscription evaluator: event-type matching, semver range checks,
//! filter expression evaluation with a compiled-program cache, and input
//! templating (C2).

pub mod error;
pub mod evaluator;
pub mod filter;
pub mod templating;
pub mod version_range;

pub use error::SubscriptionError;
pub use evaluator::evaluate;
pub use filter::{FilterCache, Program};
pub use templating::process_inputs;
pub use version_range::check_compatibility;
