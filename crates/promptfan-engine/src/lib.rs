//! Execution core of promptfan.
//!
//! - [`AttemptExecutor`]: one timed, logged generation attempt.
//! - [`ExecutionEngine`]: K attempts per model, in parallel or sequentially
//!   with a configurable delay.
//! - [`BatchOrchestrator`]: resolves providers and assembles the response.

pub mod executor;
pub mod orchestrator;
pub mod policy;

pub use executor::{AttemptExecutor, AttemptTarget};
pub use orchestrator::BatchOrchestrator;
pub use policy::{DelayPolicy, ExecutionEngine, ExecutionPolicy, SleepFn};
