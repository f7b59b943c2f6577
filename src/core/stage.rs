//! The stage contract.
//!
//! A stage owns a fixed set of manifest columns (its output locators and a
//! status flag), can tell whether those columns prove it is done, and can
//! produce them. [`Stage::run`] wraps the skip/force/disable policy around
//! [`Stage::process`] so individual stages only implement the work itself.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::adapters::{ClipLayout, Toolkit};
use crate::config::OutputDirs;
use crate::core::report::Reporter;
use crate::domain::{Decision, Entry, Flag, Outcome, Report, StageId};

/// Per-run switches
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Rerun stages even when their output is complete
    pub force: bool,

    /// Format selector for the video download
    pub video_quality: String,

    /// Format selector for a dedicated audio download
    pub audio_quality: String,

    /// Optional section count passed to the analysis
    pub sections: Option<u32>,

    /// Output shape for cut clips
    pub layout: ClipLayout,

    /// Stages whose recorded outputs are cleared instead of produced
    pub disabled: BTreeSet<StageId>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            force: false,
            video_quality: "bestvideo*+bestaudio/best".to_string(),
            audio_quality: "bestaudio/best".to_string(),
            sections: None,
            layout: ClipLayout::Reel,
            disabled: BTreeSet::new(),
        }
    }
}

impl RunOptions {
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_disabled(mut self, stage: StageId) -> Self {
        self.disabled.insert(stage);
        self
    }
}

/// Everything a stage may use while running
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub tools: &'a Toolkit,
    pub dirs: &'a OutputDirs,
    pub options: &'a RunOptions,
    pub reporter: &'a dyn Reporter,
}

impl<'a> StageContext<'a> {
    /// Report a recoverable problem for `entry`
    pub fn warn(&self, stage: StageId, entry: &Entry, message: impl Into<String>) {
        self.reporter.report(Report::Warning {
            stage,
            item: entry.label().to_string(),
            message: message.into(),
        });
    }
}

/// Status is true, the primary locator is recorded, and every recorded
/// locator exists on disk.
pub fn has_evidence(entry: &Entry, stage: StageId) -> bool {
    entry.status(stage).is_true()
        && entry.has_primary_output(stage)
        && entry.outputs(stage).iter().all(|path| path.exists())
}

/// How the policy treats a stage given its evidence, the force switch and
/// its recorded status.
pub fn decide(complete: bool, force: bool, status: Flag) -> Decision {
    if force {
        return Decision::Forced;
    }
    if complete {
        return Decision::CacheHit;
    }
    match status {
        Flag::True => Decision::StaleRerun,
        Flag::False => Decision::RetryAfterFailure,
        Flag::Unknown => Decision::FirstRun,
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    /// Whether the entry proves this stage is done
    fn is_complete(&self, entry: &Entry, _ctx: &StageContext<'_>) -> bool {
        has_evidence(entry, self.id())
    }

    /// Produce this stage's outputs.
    ///
    /// Implementations record success (locators + true) or failure
    /// (locators cleared + false) on the returned entry and never fail
    /// the run.
    async fn process(&self, entry: Entry, ctx: &StageContext<'_>) -> Entry;

    /// Apply the disable/skip/force policy, then process if needed.
    async fn run(&self, entry: Entry, ctx: &StageContext<'_>) -> Entry {
        let stage = self.id();
        let item = entry.label().to_string();

        if ctx.options.disabled.contains(&stage) {
            ctx.reporter.report(Report::Decided {
                stage,
                item: item.clone(),
                decision: Decision::Disabled,
            });
            let mut entry = entry;
            entry.clear_stage(stage);
            ctx.reporter.report(Report::Finished {
                stage,
                item,
                outcome: Outcome::Cleared,
            });
            return entry;
        }

        let complete = self.is_complete(&entry, ctx);
        let decision = decide(complete, ctx.options.force, entry.status(stage));
        ctx.reporter.report(Report::Decided {
            stage,
            item: item.clone(),
            decision,
        });
        if !decision.executes() {
            return entry;
        }

        let entry = self.process(entry, ctx).await;
        let outcome = if entry.status(stage).is_true() {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        };
        ctx.reporter.report(Report::Finished {
            stage,
            item,
            outcome,
        });
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_decide() {
        assert_eq!(decide(true, false, Flag::True), Decision::CacheHit);
        assert_eq!(decide(true, true, Flag::True), Decision::Forced);
        assert_eq!(decide(false, true, Flag::Unknown), Decision::Forced);
        assert_eq!(decide(false, false, Flag::True), Decision::StaleRerun);
        assert_eq!(decide(false, false, Flag::False), Decision::RetryAfterFailure);
        assert_eq!(decide(false, false, Flag::Unknown), Decision::FirstRun);
    }

    #[test]
    fn test_has_evidence_requires_all_three() {
        let tmp = TempDir::new().unwrap();
        let video = tmp.path().join("v.mp4");
        std::fs::write(&video, b"video").unwrap();

        let mut entry = Entry::new("id");
        entry.video_path = Some(video.clone());
        assert!(!has_evidence(&entry, StageId::Download));

        entry.video_status = Flag::True;
        assert!(has_evidence(&entry, StageId::Download));

        entry.video_path = Some(PathBuf::from(tmp.path().join("gone.mp4")));
        assert!(!has_evidence(&entry, StageId::Download));

        entry.video_path = None;
        assert!(!has_evidence(&entry, StageId::Download));
    }

    #[test]
    fn test_has_evidence_checks_secondary_locators() {
        let tmp = TempDir::new().unwrap();
        let srt = tmp.path().join("a.srt");
        std::fs::write(&srt, b"1\n").unwrap();

        let mut entry = Entry::new("id");
        entry.caption_srt_path = Some(srt);
        entry.captions_status = Flag::True;
        assert!(has_evidence(&entry, StageId::Captions));

        entry.caption_vtt_path = Some(tmp.path().join("missing.vtt"));
        assert!(!has_evidence(&entry, StageId::Captions));
    }
}
