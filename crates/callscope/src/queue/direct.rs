//! Inline task queue.

use std::sync::Arc;

use crate::error::WorkerError;
use crate::pipeline::{Unit, UnitExecutor, UnitOutcome};

use super::TaskQueue;

/// Executes units inline on the calling thread, in batch order. Used
/// in tests and wherever deterministic sequencing matters more than
/// throughput.
pub struct DirectQueue {
    executor: Arc<UnitExecutor>,
}

impl DirectQueue {
    pub fn new(executor: Arc<UnitExecutor>) -> Self {
        Self { executor }
    }
}

impl TaskQueue for DirectQueue {
    fn dispatch(&self, units: Vec<Unit>) -> Result<Vec<(Unit, UnitOutcome)>, WorkerError> {
        Ok(units
            .into_iter()
            .map(|unit| {
                let outcome = self.executor.execute(&unit);
                (unit, outcome)
            })
            .collect())
    }
}
