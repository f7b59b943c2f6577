//! Burn: subtitles rendered into the full video.

use anyhow::Context;
use async_trait::async_trait;

use super::existing;
use crate::core::stage::{Stage, StageContext};
use crate::domain::{Entry, Flag, StageId};

pub struct BurnStage;

#[async_trait]
impl Stage for BurnStage {
    fn id(&self) -> StageId {
        StageId::Burn
    }

    async fn process(&self, mut entry: Entry, ctx: &StageContext<'_>) -> Entry {
        let outcome = match (existing(&entry.video_path), existing(&entry.caption_srt_path)) {
            (None, _) => Err(anyhow::anyhow!("Video not available for subtitle burn-in")),
            (_, None) => Err(anyhow::anyhow!("Subtitles not available for burn-in")),
            (Some(video), Some(srt)) => {
                let target = ctx.dirs.captioned_video(&entry.stem());
                ctx.tools
                    .finisher
                    .burn(video, srt, &target)
                    .await
                    .context("Subtitle burn-in failed")
            }
        };

        match outcome {
            Ok(path) => {
                entry.captioned_video_path = Some(path);
                entry.captioned_video_status = Flag::True;
            }
            Err(e) => {
                ctx.warn(self.id(), &entry, format!("{:#}", e));
                entry.captioned_video_path = None;
                entry.captioned_video_status = Flag::False;
            }
        }
        entry
    }
}
