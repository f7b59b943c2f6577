//! The concrete pipeline stages.
//!
//! Each stage reads the locators of its dependencies from the entry,
//! calls one collaborator from the [`Toolkit`](crate::adapters::Toolkit),
//! and records its own locators and status. Failures are reported through
//! the context and recorded as a false status; they never abort a run.

pub mod analysis;
pub mod audio;
pub mod burn;
pub mod captions;
pub mod clips;
pub mod download;
pub mod timestamps;
pub mod transcribe;

use std::path::{Path, PathBuf};

pub use analysis::AnalyzeStage;
pub use audio::ExtractAudioStage;
pub use burn::BurnStage;
pub use captions::CaptionsStage;
pub use clips::ClipsStage;
pub use download::DownloadStage;
pub use timestamps::TimestampsStage;
pub use transcribe::TranscribeStage;

use crate::core::stage::Stage;

/// One instance of every stage
pub fn standard_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(DownloadStage),
        Box::new(ExtractAudioStage),
        Box::new(TranscribeStage),
        Box::new(CaptionsStage),
        Box::new(AnalyzeStage),
        Box::new(TimestampsStage),
        Box::new(BurnStage),
        Box::new(ClipsStage),
    ]
}

/// The recorded path, if it exists on disk
pub(crate) fn existing(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StageId;

    #[test]
    fn test_standard_stages_cover_pipeline() {
        let ids: Vec<StageId> = standard_stages().iter().map(|s| s.id()).collect();
        assert_eq!(ids, StageId::PIPELINE.to_vec());
    }
}
