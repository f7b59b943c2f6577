//! yt-dlp adapter: metadata lookups and downloads.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;
use tracing::debug;

use super::{run_tool, MediaInfo, MediaSource};

const INFO_TIMEOUT: Duration = Duration::from_secs(120);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Media source backed by the `yt-dlp` CLI
pub struct YtDlp {
    binary_path: String,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct InfoOutput {
    title: Option<String>,
    duration: Option<f64>,
}

impl YtDlp {
    pub fn new() -> Self {
        Self::with_binary_path("yt-dlp")
    }

    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    async fn fetch(&self, url: &str, dir: &Path, base_name: &str, format: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let template = dir.join(format!("{}.%(ext)s", base_name));
        debug!(url, format, template = %template.display(), "Starting yt-dlp download");

        let output = run_tool(
            &self.binary_path,
            download_args(url, format, &template),
            DOWNLOAD_TIMEOUT,
        )
        .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = final_path(&stdout)
            .with_context(|| format!("yt-dlp did not report a file for {}", url))?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            anyhow::bail!("yt-dlp reported {} but it does not exist", path.display());
        }
        Ok(path)
    }
}

fn download_args(url: &str, format: &str, template: &Path) -> Vec<String> {
    vec![
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--no-progress".to_string(),
        "-f".to_string(),
        format.to_string(),
        "--merge-output-format".to_string(),
        "mp4".to_string(),
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
        "--print".to_string(),
        "after_move:filepath".to_string(),
        url.to_string(),
    ]
}

/// The last non-empty stdout line is the final file path
fn final_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(PathBuf::from)
}

fn parse_info(json: &str) -> Result<MediaInfo> {
    let info: InfoOutput =
        serde_json::from_str(json).context("Failed to parse yt-dlp metadata")?;
    let title = info
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .context("yt-dlp metadata has no title")?;
    Ok(MediaInfo {
        title,
        duration_seconds: info.duration,
    })
}

#[async_trait]
impl MediaSource for YtDlp {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch_info(&self, url: &str) -> Result<MediaInfo> {
        let output = run_tool(
            &self.binary_path,
            ["--dump-single-json", "--no-playlist", "--no-warnings", url],
            INFO_TIMEOUT,
        )
        .await?;
        parse_info(&String::from_utf8_lossy(&output.stdout))
    }

    async fn fetch_video(
        &self,
        url: &str,
        dir: &Path,
        base_name: &str,
        quality: &str,
    ) -> Result<PathBuf> {
        self.fetch(url, dir, base_name, quality).await
    }

    async fn fetch_audio(
        &self,
        url: &str,
        dir: &Path,
        base_name: &str,
        quality: &str,
    ) -> Result<PathBuf> {
        self.fetch(url, dir, base_name, quality).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info() {
        let info = parse_info(r#"{"id": "x", "title": " My Talk ", "duration": 812.0}"#).unwrap();
        assert_eq!(info.title, "My Talk");
        assert_eq!(info.duration_seconds, Some(812.0));

        assert!(parse_info(r#"{"id": "x", "title": "  "}"#).is_err());
        assert!(parse_info("not json").is_err());
    }

    #[test]
    fn test_final_path_takes_last_line() {
        let stdout = "[info] something\n/out/videos/talk.mp4\n\n";
        assert_eq!(final_path(stdout), Some(PathBuf::from("/out/videos/talk.mp4")));
        assert_eq!(final_path("  \n"), None);
    }

    #[test]
    fn test_download_args() {
        let args = download_args("https://e.com/v", "best", Path::new("/o/talk.%(ext)s"));
        let f = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f + 1], "best");
        assert_eq!(args.last().map(String::as_str), Some("https://e.com/v"));
        assert!(args.contains(&"after_move:filepath".to_string()));
    }

    #[test]
    fn test_custom_binary_path() {
        let adapter = YtDlp::with_binary_path("/opt/bin/yt-dlp");
        assert_eq!(adapter.binary_path, "/opt/bin/yt-dlp");
        assert_eq!(adapter.name(), "yt-dlp");
    }
}
