//! Clips: cut each timestamp range out of the captioned video.
//!
//! Ranges are padded by a second on each side and rounded to whole
//! seconds. When the captioned video is missing the raw video is used.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

use super::existing;
use crate::core::stage::{Stage, StageContext};
use crate::domain::{Entry, Flag, StageId, TimestampFile};

pub struct ClipsStage;

impl ClipsStage {
    async fn cut_all(&self, entry: &Entry, ctx: &StageContext<'_>) -> Result<Vec<PathBuf>> {
        let timestamps_path =
            existing(&entry.timestamps_path).context("Timestamps not available for clipping")?;

        let source = match existing(&entry.captioned_video_path) {
            Some(captioned) => captioned.to_path_buf(),
            None => {
                let raw =
                    existing(&entry.video_path).context("No video available to cut clips from")?;
                ctx.warn(
                    self.id(),
                    entry,
                    "Captioned video missing, cutting clips from the raw video",
                );
                raw.to_path_buf()
            }
        };

        let json = fs::read_to_string(timestamps_path)
            .await
            .context("Could not read timestamps")?;
        let file: TimestampFile =
            serde_json::from_str(&json).context("Timestamps file is malformed")?;

        let ranges = file.ranges();
        let skipped = file.segments.len() - ranges.len();
        if skipped > 0 {
            ctx.warn(
                self.id(),
                entry,
                format!("Skipping {} segment(s) with missing or invalid times", skipped),
            );
        }

        let stem = entry.stem();
        let mut clips = Vec::new();
        for (index, range) in ranges.iter().enumerate() {
            let target = ctx.dirs.clip_file(&stem, index + 1);
            match ctx
                .tools
                .finisher
                .cut(&source, range.padded_window(), ctx.options.layout, &target)
                .await
            {
                Ok(path) => clips.push(path),
                Err(e) => ctx.warn(
                    self.id(),
                    entry,
                    format!("Clip {} failed: {:#}", index + 1, e),
                ),
            }
        }

        if clips.is_empty() {
            anyhow::bail!("No clips were produced");
        }
        Ok(clips)
    }
}

#[async_trait]
impl Stage for ClipsStage {
    fn id(&self) -> StageId {
        StageId::Clips
    }

    async fn process(&self, mut entry: Entry, ctx: &StageContext<'_>) -> Entry {
        match self.cut_all(&entry, ctx).await {
            Ok(clips) => {
                entry.clip_paths = clips;
                entry.clips_status = Flag::True;
            }
            Err(e) => {
                ctx.warn(self.id(), &entry, format!("{:#}", e));
                entry.clip_paths.clear();
                entry.clips_status = Flag::False;
            }
        }
        entry
    }
}
