//! Submission execution: admission queue, worker pool, step executor and
//! backend runners.
//!
//! A submission is admitted into the [`AdmissionQueue`], picked up by a
//! [`WorkerPool`] worker and driven through its job's steps by the
//! [`PipelineExecutor`]. Status changes go through the [`StatusTracker`].

pub mod config;
pub mod error;
pub mod executor;
pub mod queue;
pub mod recovery;
pub mod runner;
pub mod tracker;
pub mod worker_pool;

#[cfg(test)]
mod testing;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use executor::PipelineExecutor;
pub use queue::{Admission, AdmissionQueue, QueueStatus, QueuedSubmission, Reservation, RunningSlot};
pub use recovery::{recover, RecoveryReport};
pub use runner::{BackendRunner, ProcessRunner, StepOutcome, StepRequest};
pub use tracker::StatusTracker;
pub use worker_pool::WorkerPool;
