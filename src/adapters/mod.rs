//! Adapter interfaces for external media tools and services.
//!
//! Stages never call tools directly. They go through the traits below,
//! bundled in a [`Toolkit`], so tests can swap in fakes:
//! - MediaSource: metadata lookup and downloads (yt-dlp)
//! - Transcoder: audio extraction (ffmpeg)
//! - Transcriber / Captioner: speech-to-text (whisper)
//! - Analyst: transcript analysis and clip selection (Gemini)
//! - Finisher: subtitle burn-in and clip cutting (ffmpeg)

pub mod ffmpeg;
pub mod gemini;
pub mod prompts;
pub mod whisper;
pub mod ytdlp;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::Settings;
use crate::domain::TimeRange;

pub use ffmpeg::Ffmpeg;
pub use gemini::Gemini;
pub use whisper::Whisper;
pub use ytdlp::YtDlp;

/// Marker in the file name of intermediate audio downloads; the transcoder
/// deletes such inputs once the MP3 exists.
pub const SCRATCH_MARKER: &str = "_audiotemp";

/// Whether `path` is an intermediate audio download
pub fn is_scratch(path: &Path) -> bool {
    path.file_stem()
        .map(|s| s.to_string_lossy().ends_with(SCRATCH_MARKER))
        .unwrap_or(false)
}

/// Metadata from a source lookup
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub title: String,
    pub duration_seconds: Option<f64>,
}

/// Subtitle files produced for one item
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionSet {
    pub srt: PathBuf,
    pub vtt: Option<PathBuf>,
    pub txt: Option<PathBuf>,
}

/// Output shape of cut clips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipLayout {
    /// Vertical 1080x1920, for short-form feeds
    #[default]
    Reel,
    /// Horizontal 1920x1080
    Wide,
}

impl ClipLayout {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ClipLayout::Reel => (1080, 1920),
            ClipLayout::Wide => (1920, 1080),
        }
    }
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    fn name(&self) -> &str;

    /// Title and duration of the item
    async fn fetch_info(&self, url: &str) -> Result<MediaInfo>;

    /// Download the video into `dir` as `<base_name>.<ext>`
    async fn fetch_video(&self, url: &str, dir: &Path, base_name: &str, quality: &str)
        -> Result<PathBuf>;

    /// Download an audio-only stream into `dir` as `<base_name>.<ext>`
    async fn fetch_audio(&self, url: &str, dir: &Path, base_name: &str, quality: &str)
        -> Result<PathBuf>;
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `source` to an MP3 at `target`
    async fn to_mp3(&self, source: &Path, target: &Path) -> Result<PathBuf>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Write a plain-text transcript of `audio` into `dir`
    async fn transcribe(&self, audio: &Path, dir: &Path, base_name: &str) -> Result<PathBuf>;
}

#[async_trait]
pub trait Captioner: Send + Sync {
    /// Write subtitle files for `audio` into `dir`
    async fn caption(&self, audio: &Path, dir: &Path, base_name: &str) -> Result<CaptionSet>;
}

#[async_trait]
pub trait Analyst: Send + Sync {
    /// Free-form analysis of a transcript
    async fn analyze(&self, transcript: &str, sections: Option<u32>) -> Result<String>;

    /// Clip ranges chosen from timed subtitles and a prior analysis
    async fn extract_timestamps(&self, subtitles: &str, analysis: &str) -> Result<Vec<TimeRange>>;
}

#[async_trait]
pub trait Finisher: Send + Sync {
    /// Burn `subtitles` into `video`, writing `target`
    async fn burn(&self, video: &Path, subtitles: &Path, target: &Path) -> Result<PathBuf>;

    /// Cut the `[start, end]` second window out of `video` into `target`
    async fn cut(
        &self,
        video: &Path,
        window: (u64, u64),
        layout: ClipLayout,
        target: &Path,
    ) -> Result<PathBuf>;
}

/// The collaborators a run uses
#[derive(Clone)]
pub struct Toolkit {
    pub source: Arc<dyn MediaSource>,
    pub transcoder: Arc<dyn Transcoder>,
    pub transcriber: Arc<dyn Transcriber>,
    pub captioner: Arc<dyn Captioner>,
    pub analyst: Arc<dyn Analyst>,
    pub finisher: Arc<dyn Finisher>,
}

impl Toolkit {
    /// Real tools as configured
    pub fn system(settings: &Settings) -> Self {
        let ffmpeg = Arc::new(Ffmpeg::with_binary_path(&settings.tools.ffmpeg));
        let mut whisper =
            Whisper::with_binary_path(&settings.tools.whisper).with_model(&settings.whisper_model);
        if let Some(language) = &settings.whisper_language {
            whisper = whisper.with_language(language);
        }
        let whisper = Arc::new(whisper);
        Self {
            source: Arc::new(YtDlp::with_binary_path(&settings.tools.ytdlp)),
            transcoder: ffmpeg.clone(),
            transcriber: whisper.clone(),
            captioner: whisper,
            analyst: Arc::new(Gemini::new(
                settings.gemini_api_key.clone(),
                &settings.analysis_model,
            )),
            finisher: ffmpeg,
        }
    }
}

/// Run an external tool to completion, failing on spawn errors, timeouts
/// and non-zero exits. Stdout and stderr are captured.
pub(crate) async fn run_tool<I, S>(binary: &str, args: I, limit: Duration) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_tool_in(binary, args, None, limit).await
}

/// [`run_tool`] with the child started in `working_dir` when given
pub(crate) async fn run_tool_in<I, S>(
    binary: &str,
    args: I,
    working_dir: Option<&Path>,
    limit: Duration,
) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(binary);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }
    let child = command
        .spawn()
        .with_context(|| format!("Failed to spawn '{}'", binary))?;

    let output = timeout(limit, child.wait_with_output())
        .await
        .with_context(|| format!("'{}' timed out after {:?}", binary, limit))?
        .with_context(|| format!("Failed to wait for '{}'", binary))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);
        anyhow::bail!(
            "'{}' failed with exit code {}: {}",
            binary,
            exit_code,
            tail(stderr.trim(), 20)
        );
    }

    Ok(output)
}

/// Last `lines` lines of tool output
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_scratch() {
        assert!(is_scratch(Path::new("audios/talk_audiotemp.webm")));
        assert!(!is_scratch(Path::new("videos/talk.mp4")));
        assert!(!is_scratch(Path::new("audios/talk.mp3")));
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
    }

    #[tokio::test]
    async fn test_run_tool_reports_missing_binary() {
        let err = run_tool(
            "reelkit-definitely-missing-binary",
            ["--version"],
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Failed to spawn"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_in_working_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let output = run_tool_in("pwd", Vec::<&str>::new(), Some(tmp.path()), Duration::from_secs(5))
            .await
            .unwrap();
        let reported = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }
}
