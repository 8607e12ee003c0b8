//! Parallel key search.
//!
//! This module provides:
//! - Seekers, each running an independent generate-and-test loop
//! - Status events flowing from seekers to the aggregator
//! - The pool that starts and stops a fixed number of seekers

mod pool;
mod seeker;
mod status;

pub use pool::SeekerPool;
pub use seeker::{Seeker, SeekerSettings};
pub use status::{Hit, WorkerStatus};
