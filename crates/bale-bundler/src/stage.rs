//! Build stages and the registry that orders them.
//!
//! A library build is a fixed sequence of stages sharing one
//! [`StageContext`]: the module graph is resolved first, then each stage adds
//! artifacts. Nothing touches the output directory until every stage has
//! finished.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bale_config::{BuildConfig, TsConfig};
use bale_graph::{ModuleGraph, build_graph};
use tracing::debug;

use crate::artifact::ArtifactSet;
use crate::{Error, Result};

/// Stage execution phases.
///
/// Stages run in phase order, lower numbers first. Stages that share a phase
/// run in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StagePhase {
    /// Module graph resolution. Always first.
    Graph = 0,
    /// One bundle per output format.
    Bundle = 20,
    /// The merged declaration file.
    Declarations = 30,
    /// Checks and extra artifacts that need every other stage's output.
    PostProcess = 100,
}

/// State shared by the stages of one build.
pub struct StageContext {
    pub config: Arc<BuildConfig>,
    /// Project root; relative config paths are resolved against it.
    pub root: PathBuf,
    pub tsconfig: TsConfig,
    pub graph: Option<Arc<ModuleGraph>>,
    pub artifacts: ArtifactSet,
    /// Non-fatal problems to show the user.
    pub warnings: Vec<String>,
}

impl StageContext {
    pub fn new(config: Arc<BuildConfig>, root: PathBuf, tsconfig: TsConfig) -> Self {
        Self {
            config,
            root,
            tsconfig,
            graph: None,
            artifacts: ArtifactSet::default(),
            warnings: Vec::new(),
        }
    }

    /// The resolved module graph.
    ///
    /// Fails when called from a stage that runs before [`GraphStage`].
    pub fn graph(&self) -> Result<&Arc<ModuleGraph>> {
        self.graph
            .as_ref()
            .ok_or_else(|| Error::Task("module graph requested before it was resolved".into()))
    }
}

/// One step of a library build.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn phase(&self) -> StagePhase;

    async fn run(&self, ctx: &mut StageContext) -> Result<()>;
}

/// Stages kept in phase order.
#[derive(Default)]
pub struct StageRegistry {
    stages: Vec<(StagePhase, Arc<dyn Stage>)>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage under its own phase.
    pub fn add<S: Stage + 'static>(&mut self, stage: S) {
        let phase = stage.phase();
        self.stages.push((phase, Arc::new(stage)));
    }

    /// Add a stage under an explicit phase, overriding the stage's own.
    pub fn add_with_phase(&mut self, stage: Arc<dyn Stage>, phase: StagePhase) {
        self.stages.push((phase, stage));
    }

    /// Stages sorted by phase. The sort is stable, so registration order
    /// breaks ties.
    pub fn into_ordered(mut self) -> Vec<Arc<dyn Stage>> {
        self.stages.sort_by_key(|(phase, _)| *phase);
        self.stages.into_iter().map(|(_, stage)| stage).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order against one context.
    pub async fn run_all(self, ctx: &mut StageContext) -> Result<()> {
        for stage in self.into_ordered() {
            debug!(stage = stage.name(), "running stage");
            stage.run(ctx).await?;
        }
        Ok(())
    }
}

/// Resolves the module graph from the configured entry.
pub struct GraphStage;

#[async_trait]
impl Stage for GraphStage {
    fn name(&self) -> &'static str {
        "graph"
    }

    fn phase(&self) -> StagePhase {
        StagePhase::Graph
    }

    async fn run(&self, ctx: &mut StageContext) -> Result<()> {
        let config = Arc::clone(&ctx.config);
        let root = ctx.root.clone();
        // the walk reads files synchronously
        let graph = tokio::task::spawn_blocking(move || build_graph(&config, &root))
            .await
            .map_err(|e| Error::Task(e.to_string()))??;

        ctx.warnings
            .extend(graph.warnings().iter().map(ToString::to_string));
        ctx.graph = Some(Arc::new(graph));
        Ok(())
    }
}
