//! Command-line interface for reelkit.
//!
//! Provides commands for processing a media URL through the pipeline,
//! listing and removing manifest entries, and showing the resolved
//! configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::adapters::{ClipLayout, Toolkit};
use crate::config::{DirOverrides, Overrides, Settings};
use crate::core::{
    Manifest, Orchestrator, ProcessRequest, RemoveOutcome, RunOptions, TracingReporter,
};
use crate::domain::{Entry, Flag, StageId};

/// reelkit - Resumable media pipeline
#[derive(Parser, Debug)]
#[command(name = "reelkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Manifest CSV (default: <output>/processing_manifest.csv)
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Config file (default: nearest .reelkit/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output root for all artifacts
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process a media URL (whole pipeline unless stage flags are given)
    Process(ProcessArgs),

    /// Inspect or edit the manifest
    Manage {
        #[command(subcommand)]
        action: ManageAction,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum ManageAction {
    /// List manifest entries
    List {
        /// Print entries as JSON
        #[arg(long)]
        json: bool,

        /// Maximum number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Delete an item's artifacts and its manifest row
    Remove {
        /// URL of the item
        url: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct ProcessArgs {
    /// URL of the media item
    pub url: String,

    /// Base name for artifacts (default: the media title)
    #[arg(short, long)]
    pub filename: Option<String>,

    /// Format selector for the video download
    #[arg(long)]
    pub video_quality: Option<String>,

    /// Format selector for an audio-only download
    #[arg(long)]
    pub audio_quality: Option<String>,

    /// Download the video
    #[arg(long)]
    pub download: bool,

    /// Extract MP3 audio
    #[arg(long)]
    pub extract_audio: bool,

    /// Generate a transcript
    #[arg(long)]
    pub transcribe: bool,

    /// Generate subtitle files
    #[arg(long)]
    pub captions: bool,

    /// Analyze the transcript
    #[arg(long)]
    pub analyze: bool,

    /// Select clip timestamps
    #[arg(long)]
    pub timestamps: bool,

    /// Burn subtitles into the video
    #[arg(long)]
    pub burn: bool,

    /// Cut clips
    #[arg(long)]
    pub clips: bool,

    /// Skip the video; fetch an audio stream instead
    #[arg(long)]
    pub audio_only: bool,

    /// Number of sections the analysis should find
    #[arg(long)]
    pub sections: Option<u32>,

    /// Whisper model name
    #[arg(long)]
    pub whisper_model: Option<String>,

    /// Spoken language for whisper (detected when omitted)
    #[arg(long)]
    pub language: Option<String>,

    /// Analysis model name
    #[arg(long)]
    pub analysis_model: Option<String>,

    /// Cut clips in 16:9 instead of 9:16
    #[arg(long)]
    pub no_reel: bool,

    /// Rerun stages even when their outputs are complete
    #[arg(long)]
    pub force: bool,

    #[arg(long)]
    pub video_dir: Option<PathBuf>,

    #[arg(long)]
    pub audio_dir: Option<PathBuf>,

    #[arg(long)]
    pub transcript_dir: Option<PathBuf>,

    #[arg(long)]
    pub analysis_dir: Option<PathBuf>,

    #[arg(long)]
    pub caption_dir: Option<PathBuf>,
}

/// Stages that make sense without a video
const AUDIO_ONLY_TARGETS: [StageId; 4] = [
    StageId::Transcribe,
    StageId::Captions,
    StageId::Analyze,
    StageId::Timestamps,
];

impl ProcessArgs {
    /// Stages selected by flags, in pipeline order
    pub fn targets(&self) -> Vec<StageId> {
        let selected = [
            (self.download, StageId::Download),
            (self.extract_audio, StageId::ExtractAudio),
            (self.transcribe, StageId::Transcribe),
            (self.captions, StageId::Captions),
            (self.analyze, StageId::Analyze),
            (self.timestamps, StageId::Timestamps),
            (self.burn, StageId::Burn),
            (self.clips, StageId::Clips),
        ];
        let targets: Vec<StageId> = selected
            .into_iter()
            .filter(|(on, _)| *on)
            .map(|(_, stage)| stage)
            .collect();

        if targets.is_empty() && self.audio_only {
            AUDIO_ONLY_TARGETS.to_vec()
        } else {
            targets
        }
    }

    pub fn run_options(&self) -> RunOptions {
        let mut options = RunOptions::default().with_force(self.force);
        if let Some(quality) = &self.video_quality {
            options.video_quality = quality.clone();
        }
        if let Some(quality) = &self.audio_quality {
            options.audio_quality = quality.clone();
        }
        options.sections = self.sections;
        options.layout = if self.no_reel {
            ClipLayout::Wide
        } else {
            ClipLayout::Reel
        };
        if self.audio_only {
            options = options.with_disabled(StageId::Download);
        }
        options
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            whisper_model: self.whisper_model.clone(),
            whisper_language: self.language.clone(),
            analysis_model: self.analysis_model.clone(),
            dirs: DirOverrides {
                videos: self.video_dir.clone(),
                audios: self.audio_dir.clone(),
                transcripts: self.transcript_dir.clone(),
                analysis: self.analysis_dir.clone(),
                captions: self.caption_dir.clone(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let settings = Settings::load(self.config.as_deref())?;
        let global = Overrides {
            output: self.output.clone(),
            manifest: self.manifest.clone(),
            ..Default::default()
        };

        match self.command {
            Commands::Process(args) => {
                let mut overrides = args.overrides();
                overrides.output = global.output;
                overrides.manifest = global.manifest;
                process(settings.with_overrides(overrides), args).await
            }
            Commands::Manage { action } => {
                let settings = settings.with_overrides(global);
                match action {
                    ManageAction::List { json, limit } => list_entries(&settings, json, limit).await,
                    ManageAction::Remove { url } => remove_entry(&settings, &url).await,
                }
            }
            Commands::Config => show_config(&settings.with_overrides(global)),
        }
    }
}

async fn orchestrator(settings: &Settings) -> Orchestrator {
    let manifest = Manifest::load(settings.manifest_path()).await;
    Orchestrator::new(
        manifest,
        Toolkit::system(settings),
        settings.output_dirs(),
        Arc::new(TracingReporter),
    )
}

/// Process one URL and print a per-stage summary
async fn process(settings: Settings, args: ProcessArgs) -> Result<()> {
    let mut orchestrator = orchestrator(&settings).await;

    let mut request = ProcessRequest::new(args.url.clone())
        .with_targets(&args.targets())
        .with_options(args.run_options());
    if let Some(filename) = &args.filename {
        request = request.with_filename(filename.clone());
    }

    let entry = orchestrator.process(&request).await?;

    println!();
    println!("{} ({})", entry.label(), entry.source_url);
    println!("{:<16} {:<8} {}", "STAGE", "STATUS", "OUTPUT");
    println!("{}", "-".repeat(80));
    for stage in StageId::PIPELINE {
        let output = entry
            .outputs(stage)
            .first()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!(
            "{:<16} {:<8} {}",
            stage.name(),
            status_label(entry.status(stage)),
            output
        );
    }
    if !entry.clip_paths.is_empty() {
        println!("\n{} clip(s) in {}", entry.clip_paths.len(), settings.output_dirs().clips.display());
    }

    Ok(())
}

fn status_label(flag: Flag) -> &'static str {
    match flag {
        Flag::True => "done",
        Flag::False => "failed",
        Flag::Unknown => "-",
    }
}

/// One character per stage: `+` done, `x` failed, `.` not attempted
fn stage_summary(entry: &Entry) -> String {
    StageId::PIPELINE
        .iter()
        .map(|stage| match entry.status(*stage) {
            Flag::True => '+',
            Flag::False => 'x',
            Flag::Unknown => '.',
        })
        .collect()
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

/// List manifest entries
async fn list_entries(settings: &Settings, json: bool, limit: usize) -> Result<()> {
    let orchestrator = orchestrator(settings).await;
    let entries: Vec<&Entry> = orchestrator.list().into_iter().take(limit).collect();

    if json {
        let out = serde_json::to_string_pretty(&entries).context("Failed to encode entries")?;
        println!("{}", out);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Manifest is empty. Use 'reelkit process <url>' to add media.");
        return Ok(());
    }

    println!("{:<40} {:<10} {:<20} {}", "NAME", "STAGES", "UPDATED", "URL");
    println!("{}", "-".repeat(110));
    for entry in &entries {
        let updated = entry
            .updated_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<40} {:<10} {:<20} {}",
            truncate(entry.label(), 40),
            stage_summary(entry),
            updated,
            entry.source_url
        );
    }

    println!(
        "\nStages: {} (+ done, x failed, . not attempted)",
        StageId::PIPELINE
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(" ")
    );
    println!("Total: {} entries", orchestrator.manifest().len());

    Ok(())
}

/// Remove an item and its artifacts
async fn remove_entry(settings: &Settings, url: &str) -> Result<()> {
    let mut orchestrator = orchestrator(settings).await;

    match orchestrator.remove(url).await {
        RemoveOutcome::NotFound(item) => {
            println!("Not in manifest: {}", item);
        }
        RemoveOutcome::Removed(report) => {
            println!("Removed {}", report.item);
            println!("  Deleted files:  {}", report.deleted.len());
            println!("  Already gone:   {}", report.missing.len());
            if !report.failed.is_empty() {
                println!("  Could not delete:");
                for path in &report.failed {
                    println!("    {}", path.display());
                }
            }
        }
    }

    Ok(())
}

/// Show resolved configuration
fn show_config(settings: &Settings) -> Result<()> {
    let dirs = settings.output_dirs();

    println!("reelkit configuration");
    println!("{}", "=".repeat(40));
    println!(
        "Config file: {}",
        settings
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Output:            {}", settings.output.display());
    println!("  Manifest:          {}", settings.manifest_path().display());
    println!("  Videos:            {}", dirs.videos.display());
    println!("  Audios:            {}", dirs.audios.display());
    println!("  Transcripts:       {}", dirs.transcripts.display());
    println!("  Analysis:          {}", dirs.analysis.display());
    println!("  Captions:          {}", dirs.captions.display());
    println!("  Captioned videos:  {}", dirs.captioned_videos.display());
    println!("  Timestamps:        {}", dirs.timestamps.display());
    println!("  Clips:             {}", dirs.clips.display());
    println!();
    println!("Models:");
    println!("  Whisper:   {}", settings.whisper_model);
    println!(
        "  Language:  {}",
        settings.whisper_language.as_deref().unwrap_or("auto")
    );
    println!("  Analysis:  {}", settings.analysis_model);
    println!(
        "  API key:   {}",
        if settings.gemini_api_key.is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!();
    println!("Tools:");
    println!("  yt-dlp:    {}", settings.tools.ytdlp);
    println!("  ffmpeg:    {}", settings.tools.ffmpeg);
    println!("  whisper:   {}", settings.tools.whisper);

    Ok(())
}
