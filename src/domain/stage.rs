//! Stage identifiers and the manifest columns each stage owns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::entry::Column;

/// Identifier of a pipeline stage.
///
/// Ordering follows the full-pipeline order, so a `BTreeMap<StageId, _>`
/// iterates stages the way a whole-pipeline run visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageId {
    /// Fetch the source video
    Download,

    /// Produce an MP3 from the video (or a dedicated audio stream)
    ExtractAudio,

    /// Speech-to-text transcript
    Transcribe,

    /// Subtitle files (SRT, VTT, plain text)
    Captions,

    /// Generative analysis of the transcript
    Analyze,

    /// Clip time ranges derived from captions + analysis
    Timestamps,

    /// Subtitles burned into the full video
    Burn,

    /// Short clips cut from the captioned video
    Clips,
}

impl StageId {
    /// Every stage, in whole-pipeline execution order.
    pub const PIPELINE: [StageId; 8] = [
        StageId::Download,
        StageId::ExtractAudio,
        StageId::Transcribe,
        StageId::Captions,
        StageId::Analyze,
        StageId::Timestamps,
        StageId::Burn,
        StageId::Clips,
    ];

    /// Stable kebab-case name used in logs and on the command line
    pub fn name(self) -> &'static str {
        match self {
            StageId::Download => "download",
            StageId::ExtractAudio => "extract-audio",
            StageId::Transcribe => "transcribe",
            StageId::Captions => "captions",
            StageId::Analyze => "analyze",
            StageId::Timestamps => "timestamps",
            StageId::Burn => "burn",
            StageId::Clips => "clips",
        }
    }

    /// Column holding this stage's tri-state status flag
    pub fn status_column(self) -> Column {
        match self {
            StageId::Download => Column::VideoStatus,
            StageId::ExtractAudio => Column::AudioStatus,
            StageId::Transcribe => Column::TranscriptStatus,
            StageId::Captions => Column::CaptionsStatus,
            StageId::Analyze => Column::AnalysisStatus,
            StageId::Timestamps => Column::TimestampsStatus,
            StageId::Burn => Column::CaptionedVideoStatus,
            StageId::Clips => Column::ClipsStatus,
        }
    }

    /// Columns holding this stage's output locators. The first one is the
    /// primary locator: it must be recorded for the stage to count as done.
    pub fn locator_columns(self) -> &'static [Column] {
        match self {
            StageId::Download => &[Column::VideoPath],
            StageId::ExtractAudio => &[Column::AudioPath],
            StageId::Transcribe => &[Column::TranscriptPath],
            StageId::Captions => &[
                Column::CaptionSrtPath,
                Column::CaptionVttPath,
                Column::CaptionTxtPath,
            ],
            StageId::Analyze => &[Column::AnalysisPath],
            StageId::Timestamps => &[Column::TimestampsPath],
            StageId::Burn => &[Column::CaptionedVideoPath],
            StageId::Clips => &[Column::ClipPaths],
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "download" | "video" => Ok(StageId::Download),
            "extract-audio" | "audio" => Ok(StageId::ExtractAudio),
            "transcribe" | "transcript" => Ok(StageId::Transcribe),
            "captions" | "caption" => Ok(StageId::Captions),
            "analyze" | "analysis" => Ok(StageId::Analyze),
            "timestamps" => Ok(StageId::Timestamps),
            "burn" => Ok(StageId::Burn),
            "clips" | "clip" => Ok(StageId::Clips),
            _ => anyhow::bail!("Unknown stage: {}", s),
        }
    }
}
