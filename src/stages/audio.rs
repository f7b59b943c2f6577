//! ExtractAudio: produce an MP3 for speech-to-text.
//!
//! Transcodes the recorded video when it exists. Otherwise a dedicated
//! audio stream is fetched as a scratch file and transcoded; the transcoder
//! removes the scratch input.

use async_trait::async_trait;

use super::existing;
use crate::adapters::SCRATCH_MARKER;
use crate::core::stage::{Stage, StageContext};
use crate::domain::{Entry, Flag, StageId};

pub struct ExtractAudioStage;

impl ExtractAudioStage {
    fn fail(&self, mut entry: Entry, ctx: &StageContext<'_>, message: String) -> Entry {
        ctx.warn(self.id(), &entry, message);
        entry.audio_path = None;
        entry.audio_status = Flag::False;
        entry
    }
}

#[async_trait]
impl Stage for ExtractAudioStage {
    fn id(&self) -> StageId {
        StageId::ExtractAudio
    }

    async fn process(&self, mut entry: Entry, ctx: &StageContext<'_>) -> Entry {
        let stem = entry.stem();

        let source = match existing(&entry.video_path) {
            Some(video) => video.to_path_buf(),
            None => {
                let scratch_name = format!("{}{}", stem, SCRATCH_MARKER);
                let fetched = ctx
                    .tools
                    .source
                    .fetch_audio(
                        &entry.source_url,
                        &ctx.dirs.audios,
                        &scratch_name,
                        &ctx.options.audio_quality,
                    )
                    .await;
                match fetched {
                    Ok(path) => path,
                    Err(e) => {
                        return self.fail(
                            entry,
                            ctx,
                            format!("No video on disk and audio download failed: {:#}", e),
                        )
                    }
                }
            }
        };

        let target = ctx.dirs.audio_file(&stem);
        match ctx.tools.transcoder.to_mp3(&source, &target).await {
            Ok(path) => {
                entry.audio_path = Some(path);
                entry.audio_status = Flag::True;
                entry
            }
            Err(e) => self.fail(entry, ctx, format!("MP3 extraction failed: {:#}", e)),
        }
    }
}
