//! Per-format bundling with rolldown.
//!
//! Every requested format gets its own rolldown run. The runs are spawned
//! together and joined before any artifact is recorded, so a failure in one
//! format discards the others.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bale_config::{BuildConfig, Format, Platform};
use rolldown::{
    BundlerBuilder as RolldownBundlerBuilder, BundlerOptions, GlobalsOutputOption, InputItem,
    IsExternal, OutputFormat, ResolveOptions, SourceMapType,
};
use rolldown_common::{ChunkFilenamesOutputOption, Output};
use rustc_hash::FxHashMap;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::artifact::Artifact;
use crate::stage::{Stage, StageContext, StagePhase};
use crate::{Error, Result};

type ExternalFuture = Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + 'static>>;

/// Everything one rolldown run needs, detached from the stage context.
#[derive(Debug, Clone)]
struct FormatPlan {
    format: Format,
    root: PathBuf,
    entry: PathBuf,
    file_name: String,
    name: Option<String>,
    /// Concrete specifiers found in the graph.
    externals: Vec<String>,
    /// Configured external packages; each also covers its `/` subpaths.
    packages: Vec<String>,
    globals: FxHashMap<String, String>,
    sourcemap: bool,
    platform: Platform,
}

impl FormatPlan {
    fn new(config: &BuildConfig, root: &Path, format: Format, externals: &[String]) -> Self {
        // UMD globals are keyed by package; subpath imports share the package's global
        let mut globals = FxHashMap::default();
        if format == Format::Umd {
            for package in &config.external {
                if let Some(global) = config.globals.get(package) {
                    globals.insert(package.clone(), global.clone());
                }
            }
            for specifier in externals {
                let package = bale_graph::package_name(specifier);
                let global = config
                    .globals
                    .get(specifier)
                    .or_else(|| config.globals.get(package));
                if let Some(global) = global {
                    globals.insert(specifier.clone(), global.clone());
                }
            }
        }

        Self {
            format,
            root: root.to_path_buf(),
            entry: config.entry_path(root),
            file_name: config.file_name.clone(),
            name: config.name.clone(),
            externals: externals.to_vec(),
            packages: config.external.clone(),
            globals,
            sourcemap: config.sourcemap,
            platform: config.platform,
        }
    }

    fn bundler_options(&self) -> BundlerOptions {
        let mut options = BundlerOptions {
            input: Some(vec![InputItem {
                name: Some(self.file_name.clone()),
                import: self.entry.to_string_lossy().into_owned(),
            }]),
            cwd: Some(self.root.clone()),
            format: Some(match self.format {
                Format::Es => OutputFormat::Esm,
                Format::Cjs => OutputFormat::Cjs,
                Format::Umd => OutputFormat::Umd,
            }),
            entry_filenames: Some(ChunkFilenamesOutputOption::String(
                self.format.file_name("[name]"),
            )),
            sourcemap: self.sourcemap.then_some(SourceMapType::File),
            external: Some(self.is_external()),
            platform: Some(match self.platform {
                Platform::Browser => rolldown::Platform::Browser,
                Platform::Node => rolldown::Platform::Node,
                Platform::Neutral => rolldown::Platform::Neutral,
            }),
            inline_dynamic_imports: Some(true),
            resolve: Some(self.resolve_options()),
            ..Default::default()
        };

        if self.format == Format::Umd {
            options.name = self.name.clone();
            options.globals = Some(GlobalsOutputOption::from(self.globals.clone()));
        }
        options
    }

    /// Whether a bare specifier stays external, whichever module imports it.
    ///
    /// The graph stops at `node_modules`, so packages bundled from there may
    /// import a configured external the walk never saw.
    fn matches_external(&self, specifier: &str) -> bool {
        self.externals.iter().any(|s| s == specifier)
            || bale_graph::is_node_builtin(specifier)
            || self.packages.iter().any(|package| {
                specifier == package
                    || specifier
                        .strip_prefix(package.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
    }

    fn is_external(&self) -> IsExternal {
        let plan = Arc::new(self.clone());
        IsExternal::Fn(Some(Arc::new(
            move |specifier: &str, _importer: Option<&str>, is_resolved: bool| {
                // resolved ids are file paths; only raw specifiers are matched
                let external = !is_resolved && plan.matches_external(specifier);
                Box::pin(async move { Ok(external) }) as ExternalFuture
            },
        )))
    }

    fn resolve_options(&self) -> ResolveOptions {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let (conditions, main_fields) = match self.platform {
            Platform::Node => (
                strings(&["node", "import", "require", "default"]),
                strings(&["module", "main"]),
            ),
            Platform::Browser => (
                strings(&["browser", "import", "module", "default"]),
                strings(&["browser", "module", "main"]),
            ),
            Platform::Neutral => (
                strings(&["import", "module", "default"]),
                strings(&["module", "main"]),
            ),
        };

        ResolveOptions {
            condition_names: Some(conditions),
            main_fields: Some(main_fields),
            extensions: Some(strings(&[
                ".ts", ".tsx", ".mts", ".cts", ".js", ".jsx", ".mjs", ".cjs", ".json",
            ])),
            extension_alias: Some(vec![
                (".js".to_string(), strings(&[".ts", ".tsx", ".js"])),
                (".mjs".to_string(), strings(&[".mts", ".mjs"])),
                (".cjs".to_string(), strings(&[".cts", ".cjs"])),
            ]),
            ..Default::default()
        }
    }
}

/// What one rolldown run produced.
#[derive(Debug)]
struct FormatOutput {
    artifacts: Vec<Artifact>,
    /// Absolute ids of every module rendered into the entry chunk.
    module_ids: Vec<String>,
    warnings: Vec<String>,
}

async fn run_format(plan: FormatPlan) -> Result<FormatOutput> {
    let format = plan.format;
    debug!(%format, entry = %plan.entry.display(), "bundling");

    let mut bundler = RolldownBundlerBuilder::default()
        .with_options(plan.bundler_options())
        .build()
        .map_err(|e| Error::from_rolldown_batch(format, &e))?;
    let bundle = bundler
        .generate()
        .await
        .map_err(|e| Error::from_rolldown_batch(format, &e))?;

    let warnings = bundle
        .warnings
        .iter()
        .flat_map(|w| crate::diagnostics::extract_from_rolldown_error(w))
        .map(|d| format!("[{format}] {}", d.message))
        .collect();

    let mut entry = None;
    let mut maps = FxHashMap::default();
    for output in &bundle.assets {
        match output {
            Output::Chunk(chunk) if chunk.is_entry => {
                entry = Some(Arc::clone(chunk));
            }
            Output::Chunk(chunk) => {
                warn!(%format, file = %chunk.filename, "ignoring extra chunk");
            }
            Output::Asset(asset) if asset.filename.ends_with(".map") => {
                maps.insert(asset.filename.to_string(), asset.source.as_bytes().to_vec());
            }
            Output::Asset(asset) => {
                warn!(%format, file = %asset.filename, "ignoring emitted asset");
            }
        }
    }
    let Some(chunk) = entry else {
        return Err(Error::MissingArtifact { format });
    };

    let file_name = chunk.filename.to_string();
    let mut code = chunk.code.clone();
    let mut artifacts = Vec::with_capacity(2);

    if plan.sourcemap {
        let map_name = format!("{file_name}.map");
        let map = match maps.remove(&map_name) {
            Some(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            None => chunk.map.as_ref().map(|m| m.to_json_string()),
        };
        if let Some(map) = map {
            if !code.contains("//# sourceMappingURL=") {
                if !code.ends_with('\n') {
                    code.push('\n');
                }
                code.push_str(&format!("//# sourceMappingURL={map_name}\n"));
            }
            artifacts.push(Artifact::source_map(format, map_name, map));
        }
    }

    let module_ids = chunk.module_ids.iter().map(|id| id.to_string()).collect();
    artifacts.push(Artifact::bundle(format, file_name, code));

    Ok(FormatOutput {
        artifacts,
        module_ids,
        warnings,
    })
}

/// Fail when code of a runtime external made it into a bundle.
fn check_externals(format: Format, externals: &[String], module_ids: &[String]) -> Result<()> {
    for package in externals {
        let marker = format!("/node_modules/{package}/");
        for id in module_ids {
            if id.replace('\\', "/").contains(&marker) {
                return Err(Error::ExternalInlined {
                    package: package.clone(),
                    format,
                    module: id.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Bundles the entry once per configured format.
pub struct BundleStage;

#[async_trait]
impl Stage for BundleStage {
    fn name(&self) -> &'static str {
        "bundle"
    }

    fn phase(&self) -> StagePhase {
        StagePhase::Bundle
    }

    async fn run(&self, ctx: &mut StageContext) -> Result<()> {
        let graph = Arc::clone(ctx.graph()?);
        let specifiers: Vec<String> = graph.external_specifiers().into_iter().collect();
        // configured externals are checked even when only a bundled package imports them
        let mut runtime_packages: Vec<String> = graph.runtime_externals().into_keys().collect();
        for package in &ctx.config.external {
            if !runtime_packages.contains(package) {
                runtime_packages.push(package.clone());
            }
        }

        let mut join_set = JoinSet::new();
        for &format in &ctx.config.formats {
            let plan = FormatPlan::new(&ctx.config, &ctx.root, format, &specifiers);
            join_set.spawn(async move { (format, run_format(plan).await) });
        }

        // every format must finish before any result is used
        let mut results = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            let (format, result) = joined.map_err(|e| Error::Task(e.to_string()))?;
            results.insert(format, result);
        }

        for (format, result) in results {
            let output = result?;
            check_externals(format, &runtime_packages, &output.module_ids)?;
            ctx.warnings.extend(output.warnings);
            for artifact in output.artifacts {
                debug!(file = %artifact.file_name, bytes = artifact.size(), "bundled");
                ctx.artifacts.insert(artifact)?;
            }
        }
        Ok(())
    }
}
