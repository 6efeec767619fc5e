//! Business logic services.

pub mod artifacts;
pub mod pipeline;
pub mod reconcile;
pub mod upload;
pub mod worker;

pub use pipeline::ImagePipeline;
pub use reconcile::{run_sweep, start_reconcile_task, ReconcileConfig, SweepReport};
pub use worker::{FailurePolicy, MessageOutcome, Worker, WorkerConfig};
