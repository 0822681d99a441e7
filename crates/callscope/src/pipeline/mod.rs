//! Pipeline orchestration: the stage graph, the units it produces,
//! the executor that runs them, and the scheduler tying it together.

pub mod error;
pub mod executor;
pub mod graph;
pub mod scheduler;
pub mod unit;

pub use error::{PipelineError, UnitError};
pub use executor::{transcript_blob_path, Adapters, UnitExecutor};
pub use graph::{Criticality, Dispatch, StageSpec, STAGES};
pub use scheduler::{Pipeline, PipelineReport};
pub use unit::{Unit, UnitKind, UnitOutcome};
