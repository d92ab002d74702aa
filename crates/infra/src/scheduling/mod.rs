//! Task and timer scheduling adapters

pub mod error;
mod tokio_scheduler;

pub use error::SchedulerError;
pub use tokio_scheduler::TokioScheduler;
