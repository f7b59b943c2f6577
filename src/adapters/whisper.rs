//! Whisper transcription backend.
//!
//! Shells out to a local whisper binary. Whisper writes into a temp dir
//! named after the input file; results are copied out under the item's
//! base name.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tempfile::TempDir;
use tokio::fs;
use tracing::debug;

use super::{run_tool, CaptionSet, Captioner, Transcriber};

const WHISPER_TIMEOUT: Duration = Duration::from_secs(4 * 60 * 60);

/// Whisper JSON output (only the fields we read)
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    text: String,
    #[serde(default)]
    language: String,
}

pub struct Whisper {
    binary_path: String,
    model: String,
    language: Option<String>,
}

impl Default for Whisper {
    fn default() -> Self {
        Self::new()
    }
}

impl Whisper {
    pub fn new() -> Self {
        Self::with_binary_path("whisper")
    }

    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            model: "tiny".to_string(),
            language: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Force a language instead of letting whisper detect it
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Run whisper on `audio`, writing `format` output into a fresh temp dir
    async fn run(&self, audio: &Path, format: &str) -> Result<(TempDir, String)> {
        let temp_dir = tempfile::tempdir().context("Failed to create temp dir")?;

        let mut args = vec![
            audio.as_os_str().to_os_string(),
            "--model".into(),
            self.model.clone().into(),
            "--output_dir".into(),
            temp_dir.path().as_os_str().to_os_string(),
            "--output_format".into(),
            format.into(),
            "--verbose".into(),
            "False".into(),
        ];
        if let Some(language) = &self.language {
            args.push("--language".into());
            args.push(language.clone().into());
        }

        debug!(audio = %audio.display(), model = %self.model, format, "Running whisper");
        run_tool(&self.binary_path, args, WHISPER_TIMEOUT)
            .await
            .with_context(|| format!("Whisper failed on {}", audio.display()))?;

        let stem = audio
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        Ok((temp_dir, stem))
    }
}

async fn copy_out(from: &Path, to: &Path) -> Result<PathBuf> {
    fs::copy(from, to)
        .await
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(to.to_path_buf())
}

async fn copy_optional(from: PathBuf, to: PathBuf) -> Option<PathBuf> {
    if fs::try_exists(&from).await.unwrap_or(false) {
        copy_out(&from, &to).await.ok()
    } else {
        None
    }
}

#[async_trait]
impl Transcriber for Whisper {
    async fn transcribe(&self, audio: &Path, dir: &Path, base_name: &str) -> Result<PathBuf> {
        let (temp_dir, stem) = self.run(audio, "json").await?;

        let json_path = temp_dir.path().join(format!("{}.json", stem));
        let json_content = fs::read_to_string(&json_path)
            .await
            .context("Failed to read whisper output")?;
        let whisper: WhisperOutput =
            serde_json::from_str(&json_content).context("Failed to parse whisper JSON")?;

        let text = whisper.text.trim();
        if text.is_empty() {
            anyhow::bail!("Whisper produced an empty transcript");
        }
        debug!(language = %whisper.language, chars = text.len(), "Transcript ready");

        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        let target = dir.join(format!("{}.txt", base_name));
        fs::write(&target, format!("{}\n", text))
            .await
            .with_context(|| format!("Failed to write transcript: {}", target.display()))?;
        Ok(target)
    }
}

#[async_trait]
impl Captioner for Whisper {
    async fn caption(&self, audio: &Path, dir: &Path, base_name: &str) -> Result<CaptionSet> {
        let (temp_dir, stem) = self.run(audio, "all").await?;
        let produced = |ext: &str| temp_dir.path().join(format!("{}.{}", stem, ext));
        let target = |ext: &str| dir.join(format!("{}.{}", base_name, ext));

        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let srt = copy_out(&produced("srt"), &target("srt"))
            .await
            .context("Whisper did not produce SRT subtitles")?;
        let vtt = copy_optional(produced("vtt"), target("vtt")).await;
        let txt = copy_optional(produced("txt"), target("txt")).await;

        Ok(CaptionSet { srt, vtt, txt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let whisper = Whisper::with_binary_path("/opt/whisper")
            .with_model("small")
            .with_language("en");
        assert_eq!(whisper.binary_path, "/opt/whisper");
        assert_eq!(whisper.model, "small");
        assert_eq!(whisper.language.as_deref(), Some("en"));
        assert_eq!(Whisper::new().model, "tiny");
    }

    #[test]
    fn test_parse_output() {
        let parsed: WhisperOutput =
            serde_json::from_str(r#"{"text": " hello there ", "segments": []}"#).unwrap();
        assert_eq!(parsed.text.trim(), "hello there");
        assert!(parsed.language.is_empty());
    }

    #[tokio::test]
    async fn test_copy_optional_skips_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let copied = copy_optional(tmp.path().join("a.vtt"), tmp.path().join("b.vtt")).await;
        assert!(copied.is_none());

        std::fs::write(tmp.path().join("a.vtt"), "WEBVTT").unwrap();
        let copied = copy_optional(tmp.path().join("a.vtt"), tmp.path().join("b.vtt")).await;
        assert_eq!(copied, Some(tmp.path().join("b.vtt")));
    }
}
