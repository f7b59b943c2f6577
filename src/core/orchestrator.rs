//! Main orchestrator for pipeline execution.
//!
//! Resolves requested stages to their dependency closure, runs each stage
//! through the skip/force policy, merges what changed into the manifest,
//! and saves the manifest after every stage so an interrupted run resumes
//! where it stopped.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::adapters::Toolkit;
use crate::config::OutputDirs;
use crate::domain::{sanitize_base_name, Column, Entry, EntryPatch, ItemId, Report, StageId};
use crate::stages::standard_stages;

use super::manifest::Manifest;
use super::pipeline::{DependencyGraph, GraphError};
use super::report::Reporter;
use super::stage::{RunOptions, Stage, StageContext};

/// Containers a downloaded video may end up in
const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "webm", "mov"];

/// A request to bring one media item up to date
#[derive(Debug, Clone, Default)]
pub struct ProcessRequest {
    /// URL (or other reference) of the item
    pub reference: String,

    /// Preferred base name; the fetched title is used when absent
    pub filename: Option<String>,

    /// Stages to produce; empty means the whole pipeline
    pub targets: Vec<StageId>,

    pub options: RunOptions,
}

impl ProcessRequest {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            ..Default::default()
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_targets(mut self, targets: &[StageId]) -> Self {
        self.targets = targets.to_vec();
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }
}

/// What `remove` did on disk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveReport {
    pub item: String,
    pub deleted: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoveOutcome {
    Removed(RemoveReport),
    NotFound(String),
}

/// Main pipeline orchestrator
pub struct Orchestrator {
    manifest: Manifest,
    stages: BTreeMap<StageId, Box<dyn Stage>>,
    graph: DependencyGraph,
    tools: Toolkit,
    dirs: OutputDirs,
    reporter: Arc<dyn Reporter>,
}

impl Orchestrator {
    /// Orchestrator with the standard stages and dependency graph
    pub fn new(
        manifest: Manifest,
        tools: Toolkit,
        dirs: OutputDirs,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let stages = standard_stages()
            .into_iter()
            .map(|stage| (stage.id(), stage))
            .collect();
        Self {
            manifest,
            stages,
            graph: DependencyGraph::standard(),
            tools,
            dirs,
            reporter,
        }
    }

    /// Replace the implementation of a stage
    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.insert(stage.id(), stage);
        self
    }

    /// Replace the dependency graph
    pub fn with_graph(mut self, graph: DependencyGraph) -> Self {
        self.graph = graph;
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Bring one item up to date for the requested stages.
    ///
    /// Fails only when the reference cannot be canonicalized, the base
    /// name cannot be resolved for a new item, or the plan is invalid.
    /// Stage failures are recorded in the returned entry.
    #[instrument(skip(self, request), fields(reference = %request.reference))]
    pub async fn process(&mut self, request: &ProcessRequest) -> Result<Entry> {
        let item = ItemId::parse(&request.reference)?;
        let entry = self
            .prepare_entry(&item, request.filename.as_deref())
            .await?;

        let targets = if request.targets.is_empty() {
            StageId::PIPELINE.to_vec()
        } else {
            request.targets.clone()
        };
        info!(item = %item, base_name = %entry.label(), targets = ?targets, "Processing item");

        self.resolve_and_run(&targets, entry, &request.options).await
    }

    /// Get or create the entry for `item`, making sure it has a base name.
    async fn prepare_entry(&mut self, item: &ItemId, filename: Option<&str>) -> Result<Entry> {
        let requested = filename
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(sanitize_base_name);

        if let Some(existing) = self.manifest.get(item.as_str()) {
            match (&existing.base_name, &requested) {
                (Some(stored), Some(wanted)) if stored != wanted => {
                    warn!(
                        item = %item,
                        stored = %stored,
                        requested = %wanted,
                        "Item already has a base name, ignoring the requested one"
                    );
                    return Ok(existing.clone());
                }
                (Some(_), _) => return Ok(existing.clone()),
                (None, _) => debug!(item = %item, "Existing entry has no base name"),
            }
        } else {
            info!(item = %item, "Creating new manifest entry");
        }

        let base_name = match requested {
            Some(name) => name,
            None => {
                let info = self
                    .tools
                    .source
                    .fetch_info(item.as_str())
                    .await
                    .with_context(|| format!("Could not resolve a title for {}", item))?;
                sanitize_base_name(&info.title)
            }
        };

        let patch = EntryPatch::new().text(Column::BaseName, base_name);
        Ok(self.manifest.upsert(item.as_str(), &patch).clone())
    }

    /// Run `targets` and their dependencies against `entry`, persisting
    /// after every stage. Returns the entry as stored after the last stage.
    #[instrument(skip(self, entry, options), fields(item = %entry.source_url))]
    pub async fn resolve_and_run(
        &mut self,
        targets: &[StageId],
        mut entry: Entry,
        options: &RunOptions,
    ) -> Result<Entry> {
        let plan = self.graph.plan(targets)?;
        if let Some(missing) = plan.iter().find(|s| !self.stages.contains_key(*s)) {
            return Err(GraphError::Unregistered(*missing).into());
        }
        debug!(plan = ?plan, "Execution plan");

        let identity = entry.source_url.clone();
        for stage_id in plan {
            let Some(stage) = self.stages.get(&stage_id) else {
                continue;
            };
            let ctx = StageContext {
                tools: &self.tools,
                dirs: &self.dirs,
                options,
                reporter: self.reporter.as_ref(),
            };

            let updated = stage.run(entry.clone(), &ctx).await;
            let patch = entry.diff(&updated);
            if !patch.is_empty() || self.manifest.get(&identity).is_none() {
                self.manifest.upsert(&identity, &patch);
            }
            self.persist().await;

            entry = match self.manifest.get(&identity) {
                Some(stored) => stored.clone(),
                None => updated,
            };
        }

        Ok(entry)
    }

    async fn persist(&self) {
        let path = self.manifest.path().to_path_buf();
        match self.manifest.save().await {
            Ok(()) => self.reporter.report(Report::Persisted {
                path,
                entries: self.manifest.len(),
            }),
            Err(e) => self.reporter.report(Report::PersistFailed {
                path,
                error: e.to_string(),
            }),
        }
    }

    /// Delete an item's artifacts and its manifest row
    #[instrument(skip(self))]
    pub async fn remove(&mut self, reference: &str) -> RemoveOutcome {
        let key = match ItemId::parse(reference) {
            Ok(id) => id.to_string(),
            Err(e) => {
                debug!(error = %e, "Reference is not canonicalizable, matching it literally");
                reference.trim().to_string()
            }
        };

        let Some(entry) = self.manifest.get(&key).cloned() else {
            info!(item = %key, "Not in manifest, nothing to remove");
            return RemoveOutcome::NotFound(key);
        };

        let mut report = RemoveReport {
            item: key.clone(),
            ..Default::default()
        };

        for path in self.artifacts_of(&entry) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!(path = %path.display(), "Deleted artifact");
                    report.deleted.push(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    info!(path = %path.display(), "Artifact already gone");
                    report.missing.push(path);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not delete artifact");
                    report.failed.push(path);
                }
            }
        }

        self.manifest.remove(&key);
        self.persist().await;
        info!(
            item = %key,
            deleted = report.deleted.len(),
            missing = report.missing.len(),
            "Removed item"
        );
        RemoveOutcome::Removed(report)
    }

    /// Recorded outputs of every stage, plus derived files that exist on disk
    /// but were never recorded (e.g. clips left over from an earlier run, or
    /// a video whose locator was cleared by an audio-only run).
    fn artifacts_of(&self, entry: &Entry) -> BTreeSet<PathBuf> {
        let mut paths: BTreeSet<PathBuf> = StageId::PIPELINE
            .iter()
            .flat_map(|stage| entry.outputs(*stage))
            .collect();

        let stem = entry.stem();
        let derived = [
            self.dirs.audio_file(&stem),
            self.dirs.analysis_file(&stem),
            self.dirs.timestamps_file(&stem),
            self.dirs.captioned_video(&stem),
        ];
        paths.extend(derived.into_iter().filter(|p| p.exists()));

        paths.extend(
            VIDEO_EXTENSIONS
                .iter()
                .map(|ext| self.dirs.videos.join(format!("{}.{}", stem, ext)))
                .filter(|p| p.exists()),
        );

        let clip_pattern = format!("{}_clip_*.mp4", glob::Pattern::escape(&stem));
        paths.extend(matching(&self.dirs.clips, &clip_pattern));

        paths
    }

    /// Entries, most recently updated first
    pub fn list(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.manifest.entries().iter().collect();
        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        entries
    }
}

/// Files in `dir` whose names match `pattern`; the directory itself is
/// taken literally.
fn matching(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let full = PathBuf::from(glob::Pattern::escape(&dir.to_string_lossy())).join(pattern);
    match glob::glob(&full.to_string_lossy()) {
        Ok(matches) => matches.flatten().filter(|p| p.is_file()).collect(),
        Err(e) => {
            debug!(pattern = %full.display(), error = %e, "Invalid artifact pattern");
            Vec::new()
        }
    }
}
