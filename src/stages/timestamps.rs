//! Timestamps: clip ranges chosen from the captions and the analysis.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

use super::existing;
use crate::core::stage::{Stage, StageContext};
use crate::domain::{Entry, Flag, StageId, TimestampFile};

pub struct TimestampsStage;

impl TimestampsStage {
    async fn extract(&self, entry: &Entry, ctx: &StageContext<'_>) -> Result<PathBuf> {
        let srt_path = existing(&entry.caption_srt_path)
            .context("Subtitles not available for timestamp extraction")?;
        let analysis_path = existing(&entry.analysis_path)
            .context("Analysis not available for timestamp extraction")?;

        let subtitles = fs::read_to_string(srt_path)
            .await
            .context("Could not read subtitles")?;
        let analysis = fs::read_to_string(analysis_path)
            .await
            .context("Could not read analysis")?;

        let ranges = ctx
            .tools
            .analyst
            .extract_timestamps(&subtitles, &analysis)
            .await
            .context("Timestamp extraction failed")?;
        if ranges.is_empty() {
            anyhow::bail!("No clip ranges were found");
        }

        let json = serde_json::to_string_pretty(&TimestampFile::from_ranges(&ranges))
            .context("Could not encode timestamps")?;
        let target = ctx.dirs.timestamps_file(&entry.stem());
        fs::create_dir_all(&ctx.dirs.timestamps)
            .await
            .context("Could not create timestamps directory")?;
        fs::write(&target, json)
            .await
            .with_context(|| format!("Could not write {}", target.display()))?;
        Ok(target)
    }
}

#[async_trait]
impl Stage for TimestampsStage {
    fn id(&self) -> StageId {
        StageId::Timestamps
    }

    async fn process(&self, mut entry: Entry, ctx: &StageContext<'_>) -> Entry {
        match self.extract(&entry, ctx).await {
            Ok(path) => {
                entry.timestamps_path = Some(path);
                entry.timestamps_status = Flag::True;
            }
            Err(e) => {
                ctx.warn(self.id(), &entry, format!("{:#}", e));
                entry.timestamps_path = None;
                entry.timestamps_status = Flag::False;
            }
        }
        entry
    }
}
