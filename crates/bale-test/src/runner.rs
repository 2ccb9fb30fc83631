//! Discovery, concurrent execution, and the coverage pass.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bale_config::{ConfigError, CoverageConfig, LibraryConfig, resolve_path, validate_schema};
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::coverage::{
    CoverageMap, CoveragePhase, CoverageProvider, CoverageScope, FileSummary, ThresholdFailure,
    V8Provider, check_thresholds, include_untested,
};
use crate::discovery::{FileMatcher, display_path};
use crate::executor::{FileJob, NodeExecutor, ProcessOutput, TestExecutor};
use crate::report::{ReportContext, ReportOutput, write_reports};
use crate::state::{FileReport, FileState, TestStatus, TestSummary};
use crate::{Error, Result, tap};

/// Preload that exposes the `node:test` API as globals.
const GLOBALS_PRELOAD: &str = "import { describe, it, test, before, after, beforeEach, afterEach, mock } from 'node:test';
Object.assign(globalThis, {
  describe, it, test, before, after, beforeEach, afterEach, mock,
  beforeAll: before,
  afterAll: after,
});
";

#[derive(Debug, Clone)]
pub struct CoverageOutcome {
    pub phase: CoveragePhase,
    pub map: CoverageMap,
    pub summary: FileSummary,
    /// `None` when reports were skipped because tests failed.
    pub reports: Option<ReportOutput>,
    pub failures: Vec<ThresholdFailure>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    pub summary: TestSummary,
    pub coverage: Option<CoverageOutcome>,
    pub duration: Duration,
}

impl RunReport {
    pub fn threshold_failed(&self) -> bool {
        self.coverage
            .as_ref()
            .is_some_and(|c| c.phase == CoveragePhase::ThresholdFailed)
    }

    pub fn success(&self) -> bool {
        self.summary.success() && !self.threshold_failed()
    }
}

pub struct TestRunner {
    config: LibraryConfig,
    root: PathBuf,
    executor: Option<Arc<dyn TestExecutor>>,
    provider: Arc<dyn CoverageProvider>,
}

impl TestRunner {
    pub fn new(config: LibraryConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
            executor: None,
            provider: Arc::new(V8Provider),
        }
    }

    /// Replace the node executor, e.g. with a fake in tests.
    pub fn with_executor(mut self, executor: Arc<dyn TestExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn CoverageProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Test files selected by `test.include`/`test.exclude`.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let test = &self.config.test;
        FileMatcher::new(&test.include, &test.exclude)?.walk(&self.root)
    }

    pub async fn run(&self) -> Result<RunReport> {
        let started = Instant::now();
        validate_schema(&self.config)?;
        let test = &self.config.test;

        let setup_files = test
            .setup_files
            .iter()
            .map(|file| {
                let path = resolve_path(&self.root, file);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(ConfigError::SetupFileNotFound(path))
                }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let files = self.discover()?;
        if files.is_empty() {
            if test.pass_with_no_tests {
                info!("no test files found");
                return Ok(RunReport {
                    files: Vec::new(),
                    summary: TestSummary::default(),
                    coverage: None,
                    duration: started.elapsed(),
                });
            }
            return Err(Error::NoTestFiles {
                patterns: test.include.join(", "),
            });
        }
        info!(files = files.len(), workers = test.workers(), "running tests");

        // preload and raw coverage live here; removed when the run ends
        let run_dir = tempfile::Builder::new().prefix("bale-test").tempdir()?;
        let mut imports = Vec::new();
        if test.globals {
            let preload = run_dir.path().join("globals.mjs");
            fs::write(&preload, GLOBALS_PRELOAD)?;
            imports.push(preload);
        }
        imports.extend(setup_files);

        let executor: Arc<dyn TestExecutor> = match &self.executor {
            Some(executor) => Arc::clone(executor),
            None => Arc::new(NodeExecutor::new(test, &self.root, imports)),
        };

        let coverage = &test.coverage;
        let jobs: Vec<FileJob> = files
            .into_iter()
            .enumerate()
            .map(|(index, file)| FileJob {
                file,
                coverage_dir: coverage
                    .enabled
                    .then(|| run_dir.path().join("coverage").join(index.to_string())),
            })
            .collect();

        let reports = self.execute_all(executor, &jobs).await?;
        let summary = TestSummary::from_files(&reports);

        let coverage = if coverage.enabled {
            let dirs: Vec<PathBuf> = jobs.iter().filter_map(|j| j.coverage_dir.clone()).collect();
            Some(self.coverage_pass(dirs, summary.success(), run_dir).await?)
        } else {
            None
        };

        Ok(RunReport {
            files: reports,
            summary,
            coverage,
            duration: started.elapsed(),
        })
    }

    /// Run every job under the worker limit and wait for all of them.
    async fn execute_all(
        &self,
        executor: Arc<dyn TestExecutor>,
        jobs: &[FileJob],
    ) -> Result<Vec<FileReport>> {
        let test = &self.config.test;
        let semaphore = Arc::new(Semaphore::new(test.workers()));
        let file_timeout = test.file_timeout_ms;
        let mut join_set = JoinSet::new();

        for (index, job) in jobs.iter().cloned().enumerate() {
            let executor = Arc::clone(&executor);
            let semaphore = Arc::clone(&semaphore);
            let shown = display_path(&self.root, &job.file);
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Task(e.to_string()))?;
                debug!(file = %shown, state = %FileState::Running, "test file started");
                let output = executor.execute(&job).await?;
                let report = interpret(job.file, shown, output, file_timeout);
                debug!(file = %report.display, state = %report.state, "test file finished");
                Ok::<_, Error>((index, report))
            });
        }

        let mut slots: Vec<Option<FileReport>> = vec![None; jobs.len()];
        while let Some(joined) = join_set.join_next().await {
            let (index, report) = joined.map_err(|e| Error::Task(e.to_string()))??;
            slots[index] = Some(report);
        }
        Ok(slots.into_iter().flatten().collect())
    }

    async fn coverage_pass(
        &self,
        dirs: Vec<PathBuf>,
        tests_passed: bool,
        run_dir: TempDir,
    ) -> Result<CoverageOutcome> {
        let provider = Arc::clone(&self.provider);
        let config = self.config.test.coverage.clone();
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || {
            let outcome = collect_coverage(provider.as_ref(), &config, &root, &dirs, tests_passed);
            drop(run_dir);
            outcome
        })
        .await
        .map_err(|e| Error::Task(e.to_string()))?
    }
}

fn collect_coverage(
    provider: &dyn CoverageProvider,
    config: &CoverageConfig,
    root: &Path,
    dirs: &[PathBuf],
    tests_passed: bool,
) -> Result<CoverageOutcome> {
    let mut phase = CoveragePhase::Collecting;
    debug!(%phase, provider = provider.name(), runs = dirs.len());
    let scope = CoverageScope::new(root, FileMatcher::new(&config.include, &config.exclude)?);
    let mut map = provider.collect(dirs, &scope)?;

    phase = CoveragePhase::Aggregating;
    debug!(%phase, files = map.len());
    if config.all {
        include_untested(provider, &scope, &mut map)?;
    }
    let summary = map.summary();

    let reports = if tests_passed || config.report_on_failure {
        phase = CoveragePhase::Reporting;
        debug!(%phase, reporters = config.reporters.len());
        let ctx = ReportContext::new(root, resolve_path(root, &config.reports_dir));
        Some(write_reports(&map, &config.reporters, &ctx)?)
    } else {
        warn!("tests failed, skipping coverage reports");
        None
    };

    let failures = check_thresholds(&config.thresholds, &map);
    phase = if failures.is_empty() {
        CoveragePhase::ThresholdMet
    } else {
        CoveragePhase::ThresholdFailed
    };
    debug!(%phase, failures = failures.len());

    Ok(CoverageOutcome {
        phase,
        map,
        summary,
        reports,
        failures,
    })
}

/// Decide a file's final state from its process output.
fn interpret(path: PathBuf, display: String, output: ProcessOutput, file_timeout_ms: u64) -> FileReport {
    let tap = tap::parse(&output.stdout);
    let failed = tap.failed();

    let state = if output.timed_out {
        FileState::Failed(format!("timed out after {file_timeout_ms}ms"))
    } else if failed > 0 {
        FileState::Failed(format!("{failed} of {} tests failed", tap.tests.len()))
    } else if output.exit_code != Some(0) {
        FileState::Failed(match output.exit_code {
            Some(code) => format!("exited with code {code}"),
            None => "killed by a signal".to_string(),
        })
    } else if tap.count(TestStatus::Passed) == 0 {
        FileState::Skipped
    } else {
        FileState::Passed
    };

    FileReport {
        path,
        display,
        state,
        tests: tap.tests,
        output: tap.output,
        stderr: output.stderr,
        duration: output.duration,
    }
}
