//! reelkit - Resumable media pipeline
//!
//! Takes a media URL through download, audio extraction, transcription,
//! captioning, generative analysis, clip selection, subtitle burn-in and
//! clip cutting, recording every artifact in a CSV manifest.
//!
//! # Architecture
//!
//! The system is built around a persistent manifest:
//! - Each media item is one manifest row with a status flag per stage
//! - A stage is skipped when its recorded outputs still exist on disk
//! - The manifest is saved after every stage, so an interrupted run resumes
//!   from the first stage without evidence
//!
//! # Modules
//!
//! - `adapters`: External tools (yt-dlp, ffmpeg, whisper, Gemini)
//! - `core`: Orchestration logic (Manifest, Stage, DependencyGraph, Orchestrator)
//! - `domain`: Data structures (Entry, ItemId, StageId, Report)
//! - `stages`: The eight pipeline stages
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the whole pipeline
//! reelkit process https://youtu.be/dQw4w9WgXcQ
//!
//! # Only produce captions (and what they depend on)
//! reelkit process https://youtu.be/dQw4w9WgXcQ --captions
//!
//! # Inspect the manifest
//! reelkit manage list
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod stages;

// Re-export main types at crate root for convenience
pub use crate::core::{
    DependencyGraph, Manifest, MemoryReporter, Orchestrator, ProcessRequest, RemoveOutcome,
    Reporter, RunOptions, Stage, TracingReporter,
};
pub use adapters::Toolkit;
pub use config::{OutputDirs, Settings};
pub use domain::{Entry, Flag, ItemId, StageId};
