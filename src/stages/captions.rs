//! Captions: SRT (primary), VTT and plain-text subtitles.

use anyhow::Context;
use async_trait::async_trait;

use super::existing;
use crate::core::stage::{Stage, StageContext};
use crate::domain::{Entry, Flag, StageId};

pub struct CaptionsStage;

#[async_trait]
impl Stage for CaptionsStage {
    fn id(&self) -> StageId {
        StageId::Captions
    }

    async fn process(&self, mut entry: Entry, ctx: &StageContext<'_>) -> Entry {
        let outcome = match existing(&entry.audio_path) {
            None => Err(anyhow::anyhow!("Audio not available for captioning")),
            Some(audio) => ctx
                .tools
                .captioner
                .caption(audio, &ctx.dirs.captions, &entry.stem())
                .await
                .context("Caption generation failed"),
        };

        match outcome {
            Ok(set) => {
                entry.caption_srt_path = Some(set.srt);
                entry.caption_vtt_path = set.vtt;
                entry.caption_txt_path = set.txt;
                entry.captions_status = Flag::True;
            }
            Err(e) => {
                ctx.warn(self.id(), &entry, format!("{:#}", e));
                entry.clear_stage(self.id());
            }
        }
        entry
    }
}
