//! Units of work.
//!
//! A unit is the smallest retryable piece of a job: one channel's
//! transcription, the detection pass, one competitor's scoring, or the
//! finalizing status write. Units are self-describing so a worker can
//! execute one with nothing but the database and the service adapters.

use crate::db::Channel;
use crate::pipeline::graph::{StageSpec, STAGES};

#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub job_id: String,
    pub kind: UnitKind,
}

impl Unit {
    pub fn new(job_id: impl Into<String>, kind: UnitKind) -> Self {
        Self {
            job_id: job_id.into(),
            kind,
        }
    }

    /// Human-readable identity for logs and failure notifications.
    pub fn label(&self) -> String {
        self.kind.label()
    }

    pub fn stage(&self) -> &'static StageSpec {
        self.kind.stage()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnitKind {
    Transcribe { channel: Channel },
    DetectCompetitors,
    ScoreSentiment { competitor: String },
    Finalize,
}

impl UnitKind {
    pub fn label(&self) -> String {
        match self {
            UnitKind::Transcribe { channel } => format!("transcribe:{}", channel),
            UnitKind::DetectCompetitors => "detect_competitors".to_string(),
            UnitKind::ScoreSentiment { competitor } => {
                format!("score_sentiment:{}", competitor)
            }
            UnitKind::Finalize => "finalize".to_string(),
        }
    }

    /// The graph stage this kind belongs to. Total by construction;
    /// the stage order is pinned by a test so a graph reshuffle cannot
    /// silently hand a kind the wrong failure policy.
    pub fn stage(&self) -> &'static StageSpec {
        match self {
            UnitKind::Transcribe { .. } => &STAGES[0],
            UnitKind::DetectCompetitors => &STAGES[1],
            UnitKind::ScoreSentiment { .. } => &STAGES[2],
            UnitKind::Finalize => &STAGES[3],
        }
    }
}

/// The terminal result of executing one unit, retries included.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Completed,
    /// Permanent failure on a tolerant stage; recorded, job continues.
    Tolerated { error: String },
    /// Permanent failure on an aborting stage; the job is FAILED.
    Aborted { error: String },
}

impl UnitOutcome {
    pub fn is_abort(&self) -> bool {
        matches!(self, UnitOutcome::Aborted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::graph::{Criticality, Dispatch};

    #[test]
    fn test_labels() {
        assert_eq!(
            UnitKind::Transcribe {
                channel: Channel::Left
            }
            .label(),
            "transcribe:left"
        );
        assert_eq!(
            UnitKind::ScoreSentiment {
                competitor: "Acme".to_string()
            }
            .label(),
            "score_sentiment:Acme"
        );
        assert_eq!(UnitKind::Finalize.label(), "finalize");
    }

    #[test]
    fn test_kind_resolves_stage() {
        let kind = UnitKind::ScoreSentiment {
            competitor: "Acme".to_string(),
        };
        let stage = kind.stage();
        assert_eq!(stage.name, "score_sentiment");
        assert_eq!(stage.criticality, Criticality::Tolerant);

        let transcribe = UnitKind::Transcribe {
            channel: Channel::Right,
        };
        assert_eq!(transcribe.stage().dispatch, Dispatch::Parallel);
    }

    #[test]
    fn test_kind_to_stage_mapping_matches_graph_order() {
        let kinds = [
            UnitKind::Transcribe {
                channel: Channel::Left,
            },
            UnitKind::DetectCompetitors,
            UnitKind::ScoreSentiment {
                competitor: "Acme".to_string(),
            },
            UnitKind::Finalize,
        ];
        let names: Vec<&str> = kinds.iter().map(|k| k.stage().name).collect();
        assert_eq!(
            names,
            vec!["transcribe", "detect_competitors", "score_sentiment", "finalize"]
        );
    }
}
