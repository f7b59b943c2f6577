//! Download: fetch the source video.

use async_trait::async_trait;

use crate::core::stage::{Stage, StageContext};
use crate::domain::{Entry, Flag, StageId};

pub struct DownloadStage;

#[async_trait]
impl Stage for DownloadStage {
    fn id(&self) -> StageId {
        StageId::Download
    }

    async fn process(&self, mut entry: Entry, ctx: &StageContext<'_>) -> Entry {
        let result = ctx
            .tools
            .source
            .fetch_video(
                &entry.source_url,
                &ctx.dirs.videos,
                &entry.stem(),
                &ctx.options.video_quality,
            )
            .await;

        match result {
            Ok(path) => {
                entry.video_path = Some(path);
                entry.video_status = Flag::True;
            }
            Err(e) => {
                ctx.warn(self.id(), &entry, format!("Video download failed: {:#}", e));
                entry.video_path = None;
                entry.video_status = Flag::False;
            }
        }
        entry
    }
}
