//! Coordinator module
//!
//! Gathers partial results and runs the local partition → scan → gather
//! pipeline.

pub mod gather;
pub mod local;

pub use gather::{
    collect, gather, FinalResult, Gatherer, PartialResult, TaskOutcome, WorkerFailure,
    WorkerSummary,
};
pub use local::{LocalCoordinator, RunReport};
