//! Task queues.
//!
//! The scheduler dispatches unit batches through the `TaskQueue`
//! trait and blocks until every unit in the batch has a terminal
//! outcome. `WorkerPool` runs units on a thread pool; `DirectQueue`
//! runs them inline for deterministic tests and single-threaded use.

pub mod direct;
pub mod pool;

pub use direct::DirectQueue;
pub use pool::WorkerPool;

use crate::error::WorkerError;
use crate::pipeline::{Unit, UnitOutcome};

pub trait TaskQueue: Send + Sync {
    /// Executes a batch of units and returns each with its outcome.
    /// Blocks until the whole batch is done.
    fn dispatch(&self, units: Vec<Unit>) -> Result<Vec<(Unit, UnitOutcome)>, WorkerError>;
}
