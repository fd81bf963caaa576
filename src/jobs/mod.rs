//! Background fitting jobs.
//!
//! - `job`: one model's run, its cancellation flag, progress and outcome
//! - `coordinator`: at most one active job per model, start/abort/query

pub mod coordinator;
pub mod job;

pub use coordinator::*;
pub use job::*;
