//! Workflow orchestrator, job queue and service glue.
//!
//! A scan request enters through [`ReviewService`], becomes a [`queue::Job`],
//! and is driven through the stage graph by the [`Orchestrator`] with a
//! bundle of analysis agents.

mod error;
mod orchestrator;
mod queue;
mod service;
mod state;

pub use error::EngineError;
pub use orchestrator::{Orchestrator, RunOptions, StageObserver};
pub use queue::{Job, JobQueue, JobStatus, JobStatusSnapshot, OrchestratorCallback};
pub use service::{InitiateResponse, ReviewService};
pub use state::{GraphState, Stage};
