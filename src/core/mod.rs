//! Core orchestration logic.
//!
//! This module contains:
//! - Manifest: The CSV-backed entry store
//! - Stage: The stage contract and run policy
//! - Pipeline: The stage dependency graph and planning
//! - Report: Reporter trait and implementations
//! - Orchestrator: Main execution engine

pub mod manifest;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod stage;

// Re-export commonly used types
pub use manifest::{Manifest, ManifestError, DEFAULT_MANIFEST_FILE};
pub use orchestrator::{Orchestrator, ProcessRequest, RemoveOutcome, RemoveReport};
pub use pipeline::{DependencyGraph, GraphError};
pub use report::{MemoryReporter, Reporter, TracingReporter};
pub use stage::{decide, has_evidence, RunOptions, Stage, StageContext};
