//! Analyze: generative analysis of the transcript.
//!
//! The analysis file is only written when the model returned text, and an
//! empty analysis file never counts as complete.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

use super::existing;
use crate::core::stage::{has_evidence, Stage, StageContext};
use crate::domain::{Entry, Flag, StageId};

pub struct AnalyzeStage;

impl AnalyzeStage {
    async fn analyze(&self, entry: &Entry, ctx: &StageContext<'_>) -> Result<std::path::PathBuf> {
        let transcript_path =
            existing(&entry.transcript_path).context("Transcript not available for analysis")?;
        let transcript = fs::read_to_string(transcript_path)
            .await
            .context("Could not read transcript")?;
        if transcript.trim().is_empty() {
            anyhow::bail!("Transcript is empty");
        }

        let analysis = ctx
            .tools
            .analyst
            .analyze(&transcript, ctx.options.sections)
            .await
            .context("Analysis failed")?;
        if analysis.trim().is_empty() {
            anyhow::bail!("Analysis came back empty");
        }

        let target = ctx.dirs.analysis_file(&entry.stem());
        fs::create_dir_all(&ctx.dirs.analysis)
            .await
            .context("Could not create analysis directory")?;
        fs::write(&target, analysis)
            .await
            .with_context(|| format!("Could not write {}", target.display()))?;
        Ok(target)
    }
}

#[async_trait]
impl Stage for AnalyzeStage {
    fn id(&self) -> StageId {
        StageId::Analyze
    }

    fn is_complete(&self, entry: &Entry, _ctx: &StageContext<'_>) -> bool {
        has_evidence(entry, self.id())
            && entry
                .analysis_path
                .as_ref()
                .and_then(|p| std::fs::metadata(p).ok())
                .map(|m| m.len() > 0)
                .unwrap_or(false)
    }

    async fn process(&self, mut entry: Entry, ctx: &StageContext<'_>) -> Entry {
        match self.analyze(&entry, ctx).await {
            Ok(path) => {
                entry.analysis_path = Some(path);
                entry.analysis_status = Flag::True;
            }
            Err(e) => {
                ctx.warn(self.id(), &entry, format!("{:#}", e));
                entry.analysis_path = None;
                entry.analysis_status = Flag::False;
            }
        }
        entry
    }
}
