//! ffmpeg adapter: MP3 extraction, subtitle burn-in and clip cutting.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::{is_scratch, run_tool, run_tool_in, ClipLayout, Finisher, Transcoder};

const TRANSCODE_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const BURN_TIMEOUT: Duration = Duration::from_secs(3 * 60 * 60);

pub struct Ffmpeg {
    binary_path: String,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new()
    }
}

impl Ffmpeg {
    pub fn new() -> Self {
        Self::with_binary_path("ffmpeg")
    }

    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    async fn ensure_parent(target: &Path) -> Result<()> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        Ok(())
    }

    async fn produced(target: &Path) -> Result<PathBuf> {
        let size = fs::metadata(target)
            .await
            .map(|m| m.len())
            .with_context(|| format!("ffmpeg did not produce {}", target.display()))?;
        if size == 0 {
            anyhow::bail!("ffmpeg produced an empty file: {}", target.display());
        }
        Ok(target.to_path_buf())
    }
}

fn mp3_args(source: &Path, target: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), source.into()];
    args.extend(
        ["-vn", "-ar", "44100", "-ac", "2", "-b:a", "192k"]
            .into_iter()
            .map(OsString::from),
    );
    args.push(target.into());
    args
}

/// The subtitles filter runs with the subtitle directory as working
/// directory, so only the file name goes into the filter expression.
fn burn_args(video: &Path, subtitle_name: &str, target: &Path) -> Vec<OsString> {
    let filter = format!("subtitles='{}'", escape_filter_value(subtitle_name));
    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), video.into()];
    args.extend(
        [
            "-vf", filter.as_str(), "-c:v", "libx264", "-preset", "medium", "-crf", "22", "-c:a", "aac",
            "-b:a", "192k",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(target.into());
    args
}

fn cut_args(video: &Path, window: (u64, u64), layout: ClipLayout, target: &Path) -> Vec<OsString> {
    let (width, height) = layout.dimensions();
    let filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
        w = width,
        h = height
    );
    let start = window.0.to_string();
    let end = window.1.to_string();

    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), video.into()];
    args.extend(
        [
            "-ss", start.as_str(), "-to", end.as_str(), "-vf", filter.as_str(), "-c:v", "libx264", "-preset", "veryfast",
            "-crf", "23", "-c:a", "aac", "-b:a", "128k", "-avoid_negative_ts", "make_zero",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(target.into());
    args
}

/// Escape characters that end a quoted filter value
fn escape_filter_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'").replace(':', "\\:")
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("Failed to resolve current directory")?
        .join(path))
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn to_mp3(&self, source: &Path, target: &Path) -> Result<PathBuf> {
        Self::ensure_parent(target).await?;
        debug!(source = %source.display(), target = %target.display(), "Extracting MP3");

        let result = run_tool(&self.binary_path, mp3_args(source, target), TRANSCODE_TIMEOUT)
            .await
            .with_context(|| format!("MP3 extraction failed for {}", source.display()));

        if is_scratch(source) && source != target {
            if let Err(e) = fs::remove_file(source).await {
                warn!(path = %source.display(), error = %e, "Could not remove intermediate audio");
            }
        }

        result?;
        Self::produced(target).await
    }
}

#[async_trait]
impl Finisher for Ffmpeg {
    async fn burn(&self, video: &Path, subtitles: &Path, target: &Path) -> Result<PathBuf> {
        Self::ensure_parent(target).await?;
        let video = absolute(video)?;
        let target = absolute(target)?;
        let subtitles = absolute(subtitles)?;

        let subtitle_dir = subtitles
            .parent()
            .context("Subtitle path has no parent directory")?;
        let subtitle_name = subtitles
            .file_name()
            .context("Subtitle path has no file name")?
            .to_string_lossy()
            .into_owned();

        debug!(video = %video.display(), subtitles = %subtitles.display(), "Burning subtitles");

        run_tool_in(
            &self.binary_path,
            burn_args(&video, &subtitle_name, &target),
            Some(subtitle_dir),
            BURN_TIMEOUT,
        )
        .await
        .context("Subtitle burn failed")?;

        Self::produced(&target).await
    }

    async fn cut(
        &self,
        video: &Path,
        window: (u64, u64),
        layout: ClipLayout,
        target: &Path,
    ) -> Result<PathBuf> {
        Self::ensure_parent(target).await?;
        debug!(video = %video.display(), start = window.0, end = window.1, "Cutting clip");

        run_tool(
            &self.binary_path,
            cut_args(video, window, layout, target),
            TRANSCODE_TIMEOUT,
        )
        .await
        .with_context(|| format!("Clip cut failed for {}", target.display()))?;

        Self::produced(target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_mp3_args() {
        let args = strings(&mp3_args(Path::new("in.mp4"), Path::new("out.mp3")));
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert!(args.windows(2).any(|w| w[0] == "-b:a" && w[1] == "192k"));
        assert!(args.contains(&"-vn".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp3"));
    }

    #[test]
    fn test_burn_filter_is_escaped() {
        let args = strings(&burn_args(
            Path::new("/v/in.mp4"),
            "It's a: talk.srt",
            Path::new("/o/out.mp4"),
        ));
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], r"subtitles='It\'s a\: talk.srt'");
    }

    #[test]
    fn test_cut_args_layouts() {
        let reel = strings(&cut_args(
            Path::new("in.mp4"),
            (29, 46),
            ClipLayout::Reel,
            Path::new("c.mp4"),
        ));
        assert!(reel.windows(2).any(|w| w[0] == "-ss" && w[1] == "29"));
        assert!(reel.windows(2).any(|w| w[0] == "-to" && w[1] == "46"));
        assert!(reel.iter().any(|a| a.starts_with("scale=1080:1920")));

        let wide = strings(&cut_args(
            Path::new("in.mp4"),
            (0, 12),
            ClipLayout::Wide,
            Path::new("c.mp4"),
        ));
        assert!(wide.iter().any(|a| a.starts_with("scale=1920:1080")));
    }

    #[tokio::test]
    async fn test_scratch_input_removed_even_on_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = tmp.path().join("talk_audiotemp.webm");
        std::fs::write(&scratch, b"audio").unwrap();

        let ffmpeg = Ffmpeg::with_binary_path("reelkit-missing-ffmpeg");
        let result = ffmpeg.to_mp3(&scratch, &tmp.path().join("talk.mp3")).await;

        assert!(result.is_err());
        assert!(!scratch.exists());
    }
}
