//! Configuration for reelkit paths, models and tool binaries.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (applied through [`Overrides`])
//! 2. Environment variables (REELKIT_OUTPUT, REELKIT_MANIFEST, REELKIT_YTDLP,
//!    REELKIT_FFMPEG, REELKIT_WHISPER, GEMINI_API_KEY / GOOGLE_API_KEY)
//! 3. Config file (.reelkit/config.yaml)
//! 4. Defaults (./output)
//!
//! Config file discovery:
//! - Searches current directory and parents for .reelkit/config.yaml,
//!   then ~/.reelkit/config.yaml
//! - Paths in config file are relative to the project root (the parent of .reelkit/)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::manifest::DEFAULT_MANIFEST_FILE;

pub const CONFIG_DIR: &str = ".reelkit";
pub const CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_OUTPUT: &str = "output";
pub const DEFAULT_WHISPER_MODEL: &str = "tiny";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-1.5-pro-latest";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Output root (relative to the project root)
    pub output: Option<String>,
    /// Manifest CSV (relative to the project root)
    pub manifest: Option<String>,
    /// Per-artifact directories (relative to the output root)
    #[serde(flatten)]
    pub dirs: DirOverrides,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelsConfig {
    pub whisper: Option<String>,
    /// Spoken language passed to whisper; detected when unset
    pub language: Option<String>,
    pub analysis: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsConfig {
    pub ytdlp: Option<String>,
    pub ffmpeg: Option<String>,
    pub whisper: Option<String>,
}

/// Optional replacements for individual artifact directories
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DirOverrides {
    pub videos: Option<PathBuf>,
    pub audios: Option<PathBuf>,
    pub transcripts: Option<PathBuf>,
    pub analysis: Option<PathBuf>,
    pub captions: Option<PathBuf>,
    pub captioned_videos: Option<PathBuf>,
    pub timestamps: Option<PathBuf>,
    pub clips: Option<PathBuf>,
}

impl DirOverrides {
    /// Field-wise merge, `other` wins where set
    fn merged(&self, other: &DirOverrides) -> DirOverrides {
        DirOverrides {
            videos: other.videos.clone().or_else(|| self.videos.clone()),
            audios: other.audios.clone().or_else(|| self.audios.clone()),
            transcripts: other.transcripts.clone().or_else(|| self.transcripts.clone()),
            analysis: other.analysis.clone().or_else(|| self.analysis.clone()),
            captions: other.captions.clone().or_else(|| self.captions.clone()),
            captioned_videos: other
                .captioned_videos
                .clone()
                .or_else(|| self.captioned_videos.clone()),
            timestamps: other.timestamps.clone().or_else(|| self.timestamps.clone()),
            clips: other.clips.clone().or_else(|| self.clips.clone()),
        }
    }
}

/// Where every kind of artifact is written
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDirs {
    pub videos: PathBuf,
    pub audios: PathBuf,
    pub transcripts: PathBuf,
    pub analysis: PathBuf,
    pub captions: PathBuf,
    pub captioned_videos: PathBuf,
    pub timestamps: PathBuf,
    pub clips: PathBuf,
}

impl OutputDirs {
    /// Default layout under an output root
    pub fn under(root: &Path) -> Self {
        Self {
            videos: root.join("videos"),
            audios: root.join("audios"),
            transcripts: root.join("transcripts"),
            analysis: root.join("viral_analysis"),
            captions: root.join("captions"),
            captioned_videos: root.join("captioned_videos"),
            timestamps: root.join("viral_clip_timestamps"),
            clips: root.join("viral_clips"),
        }
    }

    /// Default layout with individual directories replaced; relative
    /// overrides are taken relative to `root`
    pub fn with_overrides(root: &Path, overrides: &DirOverrides) -> Self {
        let defaults = Self::under(root);
        let pick = |value: &Option<PathBuf>, default: PathBuf| match value {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => default,
        };
        Self {
            videos: pick(&overrides.videos, defaults.videos),
            audios: pick(&overrides.audios, defaults.audios),
            transcripts: pick(&overrides.transcripts, defaults.transcripts),
            analysis: pick(&overrides.analysis, defaults.analysis),
            captions: pick(&overrides.captions, defaults.captions),
            captioned_videos: pick(&overrides.captioned_videos, defaults.captioned_videos),
            timestamps: pick(&overrides.timestamps, defaults.timestamps),
            clips: pick(&overrides.clips, defaults.clips),
        }
    }

    pub fn audio_file(&self, base_name: &str) -> PathBuf {
        self.audios.join(format!("{}.mp3", base_name))
    }

    pub fn analysis_file(&self, base_name: &str) -> PathBuf {
        self.analysis
            .join(format!("{}_viral_clips_analysis.txt", base_name))
    }

    pub fn timestamps_file(&self, base_name: &str) -> PathBuf {
        self.timestamps.join(format!("{}_timestamps.json", base_name))
    }

    pub fn captioned_video(&self, base_name: &str) -> PathBuf {
        self.captioned_videos
            .join(format!("{}_captioned.mp4", base_name))
    }

    /// `<base>_clip_<n>.mp4`, numbered from 1
    pub fn clip_file(&self, base_name: &str, number: usize) -> PathBuf {
        self.clips.join(format!("{}_clip_{}.mp4", base_name, number))
    }
}

/// Tool binaries
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPaths {
    pub ytdlp: String,
    pub ffmpeg: String,
    pub whisper: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ytdlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            whisper: "whisper".to_string(),
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Output root
    pub output: PathBuf,
    /// Manifest path when set explicitly; otherwise it lives in the output root
    pub manifest: Option<PathBuf>,
    /// Per-directory replacements
    pub dirs: DirOverrides,
    pub whisper_model: String,
    pub whisper_language: Option<String>,
    pub analysis_model: String,
    pub tools: ToolPaths,
    pub gemini_api_key: Option<String>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            manifest: None,
            dirs: DirOverrides::default(),
            whisper_model: DEFAULT_WHISPER_MODEL.to_string(),
            whisper_language: None,
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            tools: ToolPaths::default(),
            gemini_api_key: None,
            config_file: None,
        }
    }
}

/// Command-line replacements, applied last
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub dirs: DirOverrides,
    pub whisper_model: Option<String>,
    pub whisper_language: Option<String>,
    pub analysis_model: Option<String>,
}

impl Settings {
    /// Load from the given config file, or the discovered one, plus the
    /// process environment
    pub fn load(explicit_config: Option<&Path>) -> Result<Self> {
        let config_path = match explicit_config {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(),
        };
        let config = match &config_path {
            Some(path) => Some((path.clone(), load_config_file(path)?)),
            None => None,
        };
        Ok(Self::resolve(config, |key| std::env::var(key).ok()))
    }

    /// Layer defaults, config file and environment
    pub fn resolve(
        config: Option<(PathBuf, ConfigFile)>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut settings = Self::default();

        if let Some((path, file)) = config {
            let base_dir = project_root(&path);
            if let Some(output) = &file.paths.output {
                settings.output = resolve_path(&base_dir, output);
            }
            if let Some(manifest) = &file.paths.manifest {
                settings.manifest = Some(resolve_path(&base_dir, manifest));
            }
            settings.dirs = file.paths.dirs;
            if let Some(model) = file.models.whisper {
                settings.whisper_model = model;
            }
            if let Some(language) = file.models.language {
                settings.whisper_language = Some(language);
            }
            if let Some(model) = file.models.analysis {
                settings.analysis_model = model;
            }
            if let Some(bin) = file.tools.ytdlp {
                settings.tools.ytdlp = bin;
            }
            if let Some(bin) = file.tools.ffmpeg {
                settings.tools.ffmpeg = bin;
            }
            if let Some(bin) = file.tools.whisper {
                settings.tools.whisper = bin;
            }
            settings.config_file = Some(path);
        }

        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        if let Some(output) = env("REELKIT_OUTPUT") {
            settings.output = PathBuf::from(output);
        }
        if let Some(manifest) = env("REELKIT_MANIFEST") {
            settings.manifest = Some(PathBuf::from(manifest));
        }
        if let Some(bin) = env("REELKIT_YTDLP") {
            settings.tools.ytdlp = bin;
        }
        if let Some(bin) = env("REELKIT_FFMPEG") {
            settings.tools.ffmpeg = bin;
        }
        if let Some(bin) = env("REELKIT_WHISPER") {
            settings.tools.whisper = bin;
        }
        settings.gemini_api_key = env("GEMINI_API_KEY").or_else(|| env("GOOGLE_API_KEY"));

        settings
    }

    /// Apply command-line replacements
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(output) = overrides.output {
            self.output = output;
        }
        if let Some(manifest) = overrides.manifest {
            self.manifest = Some(manifest);
        }
        self.dirs = self.dirs.merged(&overrides.dirs);
        if let Some(model) = overrides.whisper_model {
            self.whisper_model = model;
        }
        if let Some(language) = overrides.whisper_language {
            self.whisper_language = Some(language);
        }
        if let Some(model) = overrides.analysis_model {
            self.analysis_model = model;
        }
        self
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| self.output.join(DEFAULT_MANIFEST_FILE))
    }

    pub fn output_dirs(&self) -> OutputDirs {
        OutputDirs::with_overrides(&self.output, &self.dirs)
    }
}

/// Find config file by searching current directory and parents, then the
/// user's home directory
fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }
    }

    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
        .filter(|path| path.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Directory the config file's relative paths are resolved against
fn project_root(config_path: &Path) -> PathBuf {
    let parent = config_path.parent().unwrap_or(Path::new("."));
    if parent.file_name().map(|n| n == CONFIG_DIR).unwrap_or(false) {
        parent.parent().unwrap_or(Path::new(".")).to_path_buf()
    } else {
        parent.to_path_buf()
    }
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
