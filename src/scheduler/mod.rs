//! Batch Scheduler
//!
//! Turns pages x devices x plugins into an execution plan of ordered
//! batches, then runs each batch with bounded concurrency and timeouts.

pub(crate) mod error;
pub(crate) mod events;
pub(crate) mod executor;
pub(crate) mod options;
pub(crate) mod plan;
pub(crate) mod planner;

pub mod api;
