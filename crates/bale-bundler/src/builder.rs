//! The library build entry point.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bale_config::{LibraryConfig, discover_tsconfig, validate_fs, validate_schema};
use serde::Serialize;
use tracing::{info, warn};

use crate::artifact::{ArtifactKind, ArtifactSet};
use crate::bundle::BundleStage;
use crate::dts::DeclarationStage;
use crate::output::{LockOptions, OutputLock, PublishMode, publish};
use crate::stage::{GraphStage, Stage, StageContext, StageRegistry};
use crate::{Error, Result};

/// One file written by a build.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub file_name: String,
    pub kind: ArtifactKind,
    pub size: usize,
}

/// Outcome of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub out_dir: PathBuf,
    pub artifacts: Vec<ArtifactSummary>,
    pub warnings: Vec<String>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl BuildReport {
    pub fn total_size(&self) -> usize {
        self.artifacts.iter().map(|a| a.size).sum()
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(duration.as_millis())
    }
}

/// Builds a library from a loaded configuration.
///
/// The output directory is only touched once every stage has succeeded. A
/// failed build leaves the previous contents in place.
pub struct LibraryBuilder {
    config: LibraryConfig,
    root: PathBuf,
    lock_options: LockOptions,
    extra_stages: Vec<Arc<dyn Stage>>,
}

impl LibraryBuilder {
    pub fn new(config: LibraryConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
            lock_options: LockOptions::default(),
            extra_stages: Vec::new(),
        }
    }

    /// Run an additional stage, ordered by its own phase.
    pub fn with_stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.extra_stages.push(Arc::new(stage));
        self
    }

    pub fn with_lock_options(mut self, options: LockOptions) -> Self {
        self.lock_options = options;
        self
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    fn registry(&self) -> StageRegistry {
        let mut registry = StageRegistry::new();
        registry.add(GraphStage);
        registry.add(BundleStage);
        registry.add(DeclarationStage);
        for stage in &self.extra_stages {
            registry.add_with_phase(Arc::clone(stage), stage.phase());
        }
        registry
    }

    pub async fn build(self) -> Result<BuildReport> {
        let started = Instant::now();
        validate_schema(&self.config)?;
        validate_fs(&self.config, &self.root)?;

        let build = Arc::new(self.config.build.clone());
        let tsconfig = discover_tsconfig(&self.root, build.tsconfig.as_deref())?;
        let out_dir = build.out_dir_path(&self.root);

        let mut ctx = StageContext::new(Arc::clone(&build), self.root.clone(), tsconfig);
        self.registry().run_all(&mut ctx).await?;
        check_complete(&build.formats, &ctx.artifacts)?;

        for warning in &ctx.warnings {
            warn!("{warning}");
        }

        let _lock = OutputLock::acquire(&out_dir, self.lock_options).await?;
        let artifacts = ctx.artifacts;
        let mode = PublishMode::from_empty_out_dir(build.empty_out_dir);
        let publish_dir = out_dir.clone();
        let published = {
            let artifacts = artifacts.clone();
            tokio::task::spawn_blocking(move || publish(&publish_dir, &artifacts, mode))
                .await
                .map_err(|e| Error::Task(e.to_string()))??
        };

        let summaries: Vec<ArtifactSummary> = published
            .iter()
            .filter_map(|name| artifacts.get(name))
            .map(|artifact| ArtifactSummary {
                file_name: artifact.file_name.clone(),
                kind: artifact.kind,
                size: artifact.size(),
            })
            .collect();

        let duration = started.elapsed();
        info!(
            out_dir = %out_dir.display(),
            files = summaries.len(),
            ms = duration.as_millis() as u64,
            "build complete"
        );

        Ok(BuildReport {
            out_dir,
            artifacts: summaries,
            warnings: ctx.warnings,
            duration,
        })
    }
}

/// Every requested format must have produced its bundle.
fn check_complete(formats: &[bale_config::Format], artifacts: &ArtifactSet) -> Result<()> {
    for &format in formats {
        if !artifacts.bundles().any(|(f, _)| f == format) {
            return Err(Error::MissingArtifact { format });
        }
    }
    Ok(())
}
