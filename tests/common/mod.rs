//! Shared fixtures: fake collaborators that write small files instead of
//! calling real tools, and a harness wiring them to a temp output root.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use reelkit::adapters::{
    is_scratch, Analyst, CaptionSet, Captioner, ClipLayout, Finisher, MediaInfo, MediaSource,
    Transcoder, Transcriber,
};
use reelkit::domain::TimeRange;
use reelkit::{Manifest, MemoryReporter, Orchestrator, OutputDirs, Toolkit};

pub const URL: &str = "https://youtu.be/dQw4w9WgXcQ";
pub const CANONICAL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

pub const SRT: &str = "1\n00:00:01,000 --> 00:00:04,000\nHello there\n";

/// Every collaborator in one fake; each operation is counted and can be
/// switched to fail.
pub struct FakeTools {
    title: Mutex<Option<String>>,
    calls: Mutex<Vec<&'static str>>,
    failing: Mutex<HashSet<&'static str>>,
    analysis: Mutex<String>,
    ranges: Mutex<Vec<TimeRange>>,
    cut_windows: Mutex<Vec<(u64, u64)>>,
    cut_sources: Mutex<Vec<PathBuf>>,
    transcode_sources: Mutex<Vec<PathBuf>>,
}

impl FakeTools {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            title: Mutex::new(Some("Never Gonna: Give You Up".to_string())),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            analysis: Mutex::new("Section 1: the hook. Score 9/10.".to_string()),
            ranges: Mutex::new(vec![
                TimeRange::new(10.4, 40.2).unwrap(),
                TimeRange::new(0.3, 20.0).unwrap(),
            ]),
            cut_windows: Mutex::new(Vec::new()),
            cut_sources: Mutex::new(Vec::new()),
            transcode_sources: Mutex::new(Vec::new()),
        })
    }

    pub fn toolkit(self: &Arc<Self>) -> Toolkit {
        Toolkit {
            source: self.clone(),
            transcoder: self.clone(),
            transcriber: self.clone(),
            captioner: self.clone(),
            analyst: self.clone(),
            finisher: self.clone(),
        }
    }

    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.failing.lock().unwrap().remove(op);
    }

    pub fn set_title(&self, title: Option<&str>) {
        *self.title.lock().unwrap() = title.map(str::to_string);
    }

    pub fn set_analysis(&self, text: &str) {
        *self.analysis.lock().unwrap() = text.to_string();
    }

    pub fn set_ranges(&self, ranges: Vec<TimeRange>) {
        *self.ranges.lock().unwrap() = ranges;
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn cut_windows(&self) -> Vec<(u64, u64)> {
        self.cut_windows.lock().unwrap().clone()
    }

    pub fn cut_sources(&self) -> Vec<PathBuf> {
        self.cut_sources.lock().unwrap().clone()
    }

    pub fn transcode_sources(&self) -> Vec<PathBuf> {
        self.transcode_sources.lock().unwrap().clone()
    }

    fn enter(&self, op: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(op);
        if self.failing.lock().unwrap().contains(op) {
            anyhow::bail!("{} is configured to fail", op);
        }
        Ok(())
    }
}

fn write(path: &Path, content: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(path.to_path_buf())
}

#[async_trait]
impl MediaSource for FakeTools {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch_info(&self, _url: &str) -> Result<MediaInfo> {
        self.enter("fetch_info")?;
        let title = self.title.lock().unwrap().clone();
        match title {
            Some(title) => Ok(MediaInfo {
                title,
                duration_seconds: Some(212.0),
            }),
            None => anyhow::bail!("video unavailable"),
        }
    }

    async fn fetch_video(&self, _url: &str, dir: &Path, base: &str, _q: &str) -> Result<PathBuf> {
        self.enter("fetch_video")?;
        write(&dir.join(format!("{}.mp4", base)), "video")
    }

    async fn fetch_audio(&self, _url: &str, dir: &Path, base: &str, _q: &str) -> Result<PathBuf> {
        self.enter("fetch_audio")?;
        write(&dir.join(format!("{}.webm", base)), "audio stream")
    }
}

#[async_trait]
impl Transcoder for FakeTools {
    async fn to_mp3(&self, source: &Path, target: &Path) -> Result<PathBuf> {
        self.transcode_sources.lock().unwrap().push(source.to_path_buf());
        let outcome = self.enter("to_mp3");
        if is_scratch(source) {
            let _ = std::fs::remove_file(source);
        }
        outcome?;
        write(target, "mp3")
    }
}

#[async_trait]
impl Transcriber for FakeTools {
    async fn transcribe(&self, _audio: &Path, dir: &Path, base: &str) -> Result<PathBuf> {
        self.enter("transcribe")?;
        write(&dir.join(format!("{}.txt", base)), "hello there general kenobi\n")
    }
}

#[async_trait]
impl Captioner for FakeTools {
    async fn caption(&self, _audio: &Path, dir: &Path, base: &str) -> Result<CaptionSet> {
        self.enter("caption")?;
        Ok(CaptionSet {
            srt: write(&dir.join(format!("{}.srt", base)), SRT)?,
            vtt: Some(write(&dir.join(format!("{}.vtt", base)), "WEBVTT\n")?),
            txt: Some(write(&dir.join(format!("{}.txt", base)), "Hello there\n")?),
        })
    }
}

#[async_trait]
impl Analyst for FakeTools {
    async fn analyze(&self, _transcript: &str, _sections: Option<u32>) -> Result<String> {
        self.enter("analyze")?;
        Ok(self.analysis.lock().unwrap().clone())
    }

    async fn extract_timestamps(&self, subtitles: &str, analysis: &str) -> Result<Vec<TimeRange>> {
        self.enter("extract_timestamps")?;
        assert_eq!(subtitles, SRT);
        assert!(!analysis.is_empty());
        Ok(self.ranges.lock().unwrap().clone())
    }
}

#[async_trait]
impl Finisher for FakeTools {
    async fn burn(&self, _video: &Path, _subtitles: &Path, target: &Path) -> Result<PathBuf> {
        self.enter("burn")?;
        write(target, "captioned video")
    }

    async fn cut(
        &self,
        video: &Path,
        window: (u64, u64),
        _layout: ClipLayout,
        target: &Path,
    ) -> Result<PathBuf> {
        self.enter("cut")?;
        self.cut_windows.lock().unwrap().push(window);
        self.cut_sources.lock().unwrap().push(video.to_path_buf());
        write(target, "clip")
    }
}

/// A temp output root with fakes and a memory reporter
pub struct Harness {
    pub tmp: TempDir,
    pub tools: Arc<FakeTools>,
    pub reporter: Arc<MemoryReporter>,
    pub dirs: OutputDirs,
    pub manifest_path: PathBuf,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Outputs under a named subdirectory of the temp root
    pub fn with_output_dir(name: &str) -> Self {
        Self::build(Some(name))
    }

    fn build(subdir: Option<&str>) -> Self {
        let tmp = TempDir::new().unwrap();
        let root = match subdir {
            Some(name) => tmp.path().join(name),
            None => tmp.path().to_path_buf(),
        };
        let dirs = OutputDirs::under(&root);
        let manifest_path = root.join("processing_manifest.csv");
        Self {
            tmp,
            tools: FakeTools::new(),
            reporter: Arc::new(MemoryReporter::new()),
            dirs,
            manifest_path,
        }
    }

    /// A fresh orchestrator over the manifest currently on disk, as a new
    /// command invocation would see it
    pub async fn orchestrator(&self) -> Orchestrator {
        let manifest = Manifest::load(&self.manifest_path).await;
        Orchestrator::new(
            manifest,
            self.tools.toolkit(),
            self.dirs.clone(),
            self.reporter.clone(),
        )
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }
}

/// Call counts keyed by operation, for before/after comparisons
pub fn snapshot(tools: &FakeTools) -> HashMap<&'static str, usize> {
    [
        "fetch_info",
        "fetch_video",
        "fetch_audio",
        "to_mp3",
        "transcribe",
        "caption",
        "analyze",
        "extract_timestamps",
        "burn",
        "cut",
    ]
    .into_iter()
    .map(|op| (op, tools.calls(op)))
    .collect()
}
