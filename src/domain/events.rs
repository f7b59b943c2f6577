//! Progress events emitted while a pipeline run resolves and executes stages.
//!
//! Events carry no behavior; a [`Reporter`](crate::core::Reporter) decides
//! whether they become log lines, get collected for assertions, or both.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::stage::StageId;

/// Why a stage did (or did not) execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Completion evidence present; nothing to do
    CacheHit,

    /// Never attempted before
    FirstRun,

    /// Recorded as done but the evidence is gone
    StaleRerun,

    /// Recorded as failed last time
    RetryAfterFailure,

    /// Force requested by the caller
    Forced,

    /// Disabled for this run; recorded outputs are cleared
    Disabled,
}

impl Decision {
    /// Whether the stage body runs for this decision
    pub fn executes(self) -> bool {
        !matches!(self, Decision::CacheHit | Decision::Disabled)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Decision::CacheHit => "cache hit",
            Decision::FirstRun => "first run",
            Decision::StaleRerun => "stale output, rerunning",
            Decision::RetryAfterFailure => "retrying after failure",
            Decision::Forced => "forced rerun",
            Decision::Disabled => "disabled",
        };
        f.write_str(label)
    }
}

/// Result of a stage that was executed or cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed,
    Cleared,
}

/// A single progress event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Report {
    /// The orchestrator decided what to do with a stage
    Decided {
        stage: StageId,
        item: String,
        decision: Decision,
    },

    /// A stage finished executing (or was cleared)
    Finished {
        stage: StageId,
        item: String,
        outcome: Outcome,
    },

    /// A stage hit a recoverable problem
    Warning {
        stage: StageId,
        item: String,
        message: String,
    },

    /// The manifest was written to disk
    Persisted { path: PathBuf, entries: usize },

    /// Writing the manifest failed; the in-memory state is still current
    PersistFailed { path: PathBuf, error: String },
}

impl Report {
    pub fn stage(&self) -> Option<StageId> {
        match self {
            Report::Decided { stage, .. }
            | Report::Finished { stage, .. }
            | Report::Warning { stage, .. } => Some(*stage),
            Report::Persisted { .. } | Report::PersistFailed { .. } => None,
        }
    }
}
