//! Stage graph.
//!
//! The pipeline is a fixed four-stage graph. Each stage declares how
//! its units are dispatched and what a permanent unit failure means
//! for the job; the scheduler walks the graph in order and the
//! executor consults it when a unit runs out of retries.

/// What a permanent unit failure does to the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// The job is marked FAILED and no later stage runs.
    Abort,
    /// The failure is recorded as a synthetic result row and the job
    /// continues.
    Tolerant,
}

/// How a stage's units are handed to the task queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// All units of the stage go out as one batch.
    Parallel,
    /// Units go out one at a time, each completing before the next.
    Serial,
}

#[derive(Debug, Clone, Copy)]
pub struct StageSpec {
    pub name: &'static str,
    pub criticality: Criticality,
    pub dispatch: Dispatch,
}

/// Execution order of the pipeline. Transcription fans out over the
/// two channels; sentiment scoring is serialized per competitor so
/// one competitor's permanent failure cannot interleave with another's
/// writes.
pub static STAGES: [StageSpec; 4] = [
    StageSpec {
        name: "transcribe",
        criticality: Criticality::Abort,
        dispatch: Dispatch::Parallel,
    },
    StageSpec {
        name: "detect_competitors",
        criticality: Criticality::Abort,
        dispatch: Dispatch::Serial,
    },
    StageSpec {
        name: "score_sentiment",
        criticality: Criticality::Tolerant,
        dispatch: Dispatch::Serial,
    },
    StageSpec {
        name: "finalize",
        criticality: Criticality::Abort,
        dispatch: Dispatch::Serial,
    },
];

pub fn stage_by_name(name: &str) -> Option<&'static StageSpec> {
    STAGES.iter().find(|s| s.name == name)
}
