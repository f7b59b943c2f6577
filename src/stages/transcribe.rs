//! Transcribe: plain-text transcript from the recorded audio.

use anyhow::Context;
use async_trait::async_trait;

use super::existing;
use crate::core::stage::{Stage, StageContext};
use crate::domain::{Entry, Flag, StageId};

pub struct TranscribeStage;

#[async_trait]
impl Stage for TranscribeStage {
    fn id(&self) -> StageId {
        StageId::Transcribe
    }

    async fn process(&self, mut entry: Entry, ctx: &StageContext<'_>) -> Entry {
        let outcome = match existing(&entry.audio_path) {
            None => Err(anyhow::anyhow!("Audio not available for transcription")),
            Some(audio) => ctx
                .tools
                .transcriber
                .transcribe(audio, &ctx.dirs.transcripts, &entry.stem())
                .await
                .context("Transcription failed"),
        };

        match outcome {
            Ok(path) => {
                entry.transcript_path = Some(path);
                entry.transcript_status = Flag::True;
            }
            Err(e) => {
                ctx.warn(self.id(), &entry, format!("{:#}", e));
                entry.transcript_path = None;
                entry.transcript_status = Flag::False;
            }
        }
        entry
    }
}
