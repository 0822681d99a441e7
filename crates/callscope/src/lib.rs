pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod retry;
pub mod services;

pub use config::{load_config, Config};
pub use db::Database;
pub use error::{CallscopeError, ConfigError, Result, WorkerError};
pub use pipeline::{Adapters, Pipeline, PipelineError, Unit, UnitExecutor, UnitKind, UnitOutcome};
pub use queue::{DirectQueue, TaskQueue, WorkerPool};
pub use retry::RetryPolicy;
