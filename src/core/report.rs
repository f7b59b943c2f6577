//! Reporters: where progress events go.
//!
//! The orchestrator and stages never log decisions directly; they hand
//! [`Report`]s to an injected [`Reporter`]. Production uses
//! [`TracingReporter`], tests use [`MemoryReporter`] to assert on exactly
//! what happened.

use std::sync::Mutex;

use tracing::{debug, error, info, warn};

use crate::domain::{Decision, Outcome, Report, StageId};

pub trait Reporter: Send + Sync {
    fn report(&self, report: Report);
}

/// Turns reports into structured `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, report: Report) {
        match report {
            Report::Decided {
                stage,
                item,
                decision: Decision::CacheHit,
            } => info!(stage = %stage, item = %item, "Already complete, skipping"),
            Report::Decided {
                stage,
                item,
                decision: Decision::Disabled,
            } => warn!(stage = %stage, item = %item, "Stage disabled, clearing recorded output"),
            Report::Decided {
                stage,
                item,
                decision,
            } => info!(stage = %stage, item = %item, reason = %decision, "Running stage"),
            Report::Finished {
                stage,
                item,
                outcome: Outcome::Succeeded,
            } => info!(stage = %stage, item = %item, "Stage completed"),
            Report::Finished {
                stage,
                item,
                outcome: Outcome::Failed,
            } => warn!(stage = %stage, item = %item, "Stage did not complete"),
            Report::Finished {
                stage,
                item,
                outcome: Outcome::Cleared,
            } => debug!(stage = %stage, item = %item, "Stage output cleared"),
            Report::Warning {
                stage,
                item,
                message,
            } => warn!(stage = %stage, item = %item, "{}", message),
            Report::Persisted { path, entries } => {
                debug!(path = %path.display(), entries, "Manifest saved")
            }
            Report::PersistFailed { path, error } => error!(
                path = %path.display(),
                error = %error,
                "Manifest save failed, progress is only held in memory"
            ),
        }
    }
}

/// Collects reports in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    reports: Mutex<Vec<Report>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far
    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.clear();
        }
    }

    /// Decisions in the order they were made
    pub fn decisions(&self) -> Vec<(StageId, Decision)> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Decided {
                    stage, decision, ..
                } => Some((stage, decision)),
                _ => None,
            })
            .collect()
    }

    /// Stages whose bodies actually executed, in order
    pub fn executed(&self) -> Vec<StageId> {
        self.decisions()
            .into_iter()
            .filter(|(_, d)| d.executes())
            .map(|(s, _)| s)
            .collect()
    }

    pub fn outcome(&self, stage: StageId) -> Option<Outcome> {
        self.reports().into_iter().rev().find_map(|r| match r {
            Report::Finished {
                stage: s, outcome, ..
            } if s == stage => Some(outcome),
            _ => None,
        })
    }

    pub fn warnings(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Warning { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Number of successful manifest writes
    pub fn persist_count(&self) -> usize {
        self.reports()
            .iter()
            .filter(|r| matches!(r, Report::Persisted { .. }))
            .count()
    }

    pub fn persist_failures(&self) -> usize {
        self.reports()
            .iter()
            .filter(|r| matches!(r, Report::PersistFailed { .. }))
            .count()
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, report: Report) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report);
        }
    }
}
