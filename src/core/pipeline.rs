//! Stage dependency graph and execution planning.
//!
//! The graph is data: each stage lists the stages whose outputs it reads.
//! Planning a set of targets yields their transitive dependency closure in
//! an order where every stage comes after all of its dependencies.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use thiserror::Error;

use crate::domain::StageId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Stage '{stage}' depends on '{dependency}', which is not in the graph")]
    UnknownDependency { stage: StageId, dependency: StageId },

    #[error("Stage '{0}' is not in the graph")]
    UnknownStage(StageId),

    #[error("Dependency cycle through stage '{0}'")]
    Cycle(StageId),

    #[error("No implementation registered for stage '{0}'")]
    Unregistered(StageId),
}

/// Adjacency list: stage -> stages it depends on
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<StageId, Vec<StageId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard media pipeline
    pub fn standard() -> Self {
        use StageId::*;
        Self::new()
            .with_stage(Download, &[])
            .with_stage(ExtractAudio, &[Download])
            .with_stage(Transcribe, &[ExtractAudio])
            .with_stage(Captions, &[ExtractAudio])
            .with_stage(Analyze, &[Transcribe])
            .with_stage(Timestamps, &[Captions, Analyze])
            .with_stage(Burn, &[Download, Captions])
            .with_stage(Clips, &[Burn, Timestamps])
    }

    /// Add (or replace) a stage and its direct dependencies
    pub fn with_stage(mut self, stage: StageId, dependencies: &[StageId]) -> Self {
        self.edges.insert(stage, dependencies.to_vec());
        self
    }

    pub fn contains(&self, stage: StageId) -> bool {
        self.edges.contains_key(&stage)
    }

    pub fn dependencies(&self, stage: StageId) -> &[StageId] {
        self.edges.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn stages(&self) -> impl Iterator<Item = StageId> + '_ {
        self.edges.keys().copied()
    }

    /// Every dependency is a known stage and there are no cycles
    pub fn validate(&self) -> Result<(), GraphError> {
        for (stage, dependencies) in &self.edges {
            for dependency in dependencies {
                if !self.edges.contains_key(dependency) {
                    return Err(GraphError::UnknownDependency {
                        stage: *stage,
                        dependency: *dependency,
                    });
                }
            }
        }
        let all: Vec<StageId> = self.stages().collect();
        self.plan(&all).map(|_| ())
    }

    /// Transitive dependencies of `stage`, excluding itself
    pub fn closure(&self, stage: StageId) -> Result<BTreeSet<StageId>, GraphError> {
        let mut plan = self.plan(&[stage])?;
        plan.retain(|s| *s != stage);
        Ok(plan.into_iter().collect())
    }

    /// Execution order for `targets` and everything they depend on.
    ///
    /// Iterative post-order walk; each stage appears once, after all of its
    /// dependencies. Dependencies are visited in declaration order and
    /// targets in the order given.
    pub fn plan(&self, targets: &[StageId]) -> Result<Vec<StageId>, GraphError> {
        let mut order = Vec::new();
        let mut done: HashSet<StageId> = HashSet::new();
        let mut in_progress: HashSet<StageId> = HashSet::new();

        for &target in targets {
            if !self.contains(target) {
                return Err(GraphError::UnknownStage(target));
            }

            let mut stack = vec![(target, false)];
            while let Some((stage, expanded)) = stack.pop() {
                if expanded {
                    in_progress.remove(&stage);
                    if done.insert(stage) {
                        order.push(stage);
                    }
                    continue;
                }
                if done.contains(&stage) {
                    continue;
                }
                if !in_progress.insert(stage) {
                    return Err(GraphError::Cycle(stage));
                }

                stack.push((stage, true));
                for &dependency in self.dependencies(stage).iter().rev() {
                    if !self.contains(dependency) {
                        return Err(GraphError::UnknownDependency { stage, dependency });
                    }
                    if !done.contains(&dependency) {
                        stack.push((dependency, false));
                    }
                }
            }
        }

        Ok(order)
    }
}
