//! Runner orchestration with a scripted executor in place of node.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bale_config::{LibraryConfig, Reporter};
use bale_test::executor::file_url;
use bale_test::{
    CoveragePhase, Error, FileJob, FileState, ProcessOutput, TestExecutor, TestRunner,
};
use tempfile::TempDir;

const PASSING: &str = "TAP version 13\nok 1 - works\n1..1\n";
const FAILING: &str = "TAP version 13\nnot ok 1 - breaks\n  ---\n  error: 'expected 1 to be 2'\n  ...\n1..1\n";

/// Replays canned TAP output and writes V8 coverage for `covered` files.
#[derive(Default)]
struct ScriptedExecutor {
    failing: Vec<String>,
    covered: Vec<PathBuf>,
    delay: Option<Duration>,
    seen: Mutex<Vec<PathBuf>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedExecutor {
    fn seen(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn write_coverage(&self, dir: &Path) {
        let scripts: Vec<String> = self
            .covered
            .iter()
            .map(|file| {
                let len = fs::read_to_string(file).unwrap().len();
                format!(
                    r#"{{"scriptId":"1","url":"{}","functions":[{{"functionName":"","ranges":[{{"startOffset":0,"endOffset":{len},"count":1}}],"isBlockCoverage":true}}]}}"#,
                    file_url(file)
                )
            })
            .collect();
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join("coverage-1.json"),
            format!(r#"{{"result":[{}]}}"#, scripts.join(",")),
        )
        .unwrap();
    }
}

#[async_trait]
impl TestExecutor for ScriptedExecutor {
    async fn execute(&self, job: &FileJob) -> bale_test::Result<ProcessOutput> {
        self.seen.lock().unwrap().push(job.file.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        if let Some(dir) = &job.coverage_dir {
            self.write_coverage(dir);
        }
        let name = job.file.file_name().unwrap().to_string_lossy();
        let fails = self.failing.iter().any(|f| *f == name);
        Ok(ProcessOutput {
            stdout: if fails { FAILING } else { PASSING }.to_string(),
            exit_code: Some(if fails { 1 } else { 0 }),
            ..Default::default()
        })
    }
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let files = [
        ("src/used.ts", "export const answer = 42;\n"),
        (
            "src/unused.ts",
            "export function idle(): number {\n  return 0;\n}\n",
        ),
        ("src/types.d.ts", "export type Id = string;\n"),
        ("tests/a.test.ts", "test('works', () => {});\n"),
        ("tests/b.test.ts", "test('works', () => {});\n"),
        ("tests/slow.spec.ts", "test('works', () => {});\n"),
        ("node_modules/dep/x.test.ts", "test('never', () => {});\n"),
    ];
    for (rel, contents) in files {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    dir
}

fn config() -> LibraryConfig {
    let mut config = LibraryConfig::default();
    config.test.max_workers = Some(2);
    config.test.coverage.reporters = vec![Reporter::Text, Reporter::Json, Reporter::Lcov];
    config
}

fn executor(root: &Path) -> ScriptedExecutor {
    ScriptedExecutor {
        covered: vec![root.join("src/used.ts")],
        ..Default::default()
    }
}

#[tokio::test]
async fn discovers_matching_files_outside_node_modules() {
    let dir = project();
    let fake = Arc::new(executor(dir.path()));
    let report = TestRunner::new(config(), dir.path())
        .with_executor(fake.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(fake.seen(), vec!["a.test.ts", "b.test.ts", "slow.spec.ts"]);
    assert_eq!(report.summary.files, 3);
    assert_eq!(report.summary.passed, 3);
    assert!(report.success());
    assert!(report.coverage.is_none());
    // files keep discovery order regardless of completion order
    let order: Vec<&str> = report.files.iter().map(|f| f.display.as_str()).collect();
    assert_eq!(order, vec!["tests/a.test.ts", "tests/b.test.ts", "tests/slow.spec.ts"]);
}

#[tokio::test]
async fn exclude_wins_over_include() {
    let dir = project();
    let mut config = config();
    config.test.exclude.push("**/slow.*".to_string());
    let fake = Arc::new(executor(dir.path()));
    TestRunner::new(config, dir.path())
        .with_executor(fake.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(fake.seen(), vec!["a.test.ts", "b.test.ts"]);
}

#[tokio::test]
async fn worker_limit_bounds_concurrency() {
    let dir = project();
    let fake = Arc::new(ScriptedExecutor {
        delay: Some(Duration::from_millis(50)),
        ..executor(dir.path())
    });
    TestRunner::new(config(), dir.path())
        .with_executor(fake.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(fake.seen().len(), 3);
    assert!(fake.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn one_failing_file_fails_the_run() {
    let dir = project();
    let fake = Arc::new(ScriptedExecutor {
        failing: vec!["b.test.ts".to_string()],
        ..executor(dir.path())
    });
    let report = TestRunner::new(config(), dir.path())
        .with_executor(fake)
        .run()
        .await
        .unwrap();

    assert!(!report.success());
    assert_eq!(report.summary.failed_files, 1);
    let states: HashMap<&str, &FileState> = report
        .files
        .iter()
        .map(|f| (f.display.as_str(), &f.state))
        .collect();
    assert_eq!(states["tests/a.test.ts"], &FileState::Passed);
    assert!(states["tests/b.test.ts"].is_failed());
    let failed = &report.files[1].tests[0];
    assert_eq!(failed.error.as_deref(), Some("expected 1 to be 2"));
}

#[tokio::test]
async fn all_scores_untested_files_at_zero() {
    let dir = project();
    let mut config = config();
    config.test.coverage.enabled = true;
    config.test.coverage.all = true;
    let report = TestRunner::new(config.clone(), dir.path())
        .with_executor(Arc::new(executor(dir.path())))
        .run()
        .await
        .unwrap();

    let coverage = report.coverage.unwrap();
    assert_eq!(coverage.phase, CoveragePhase::ThresholdMet);
    let unused = coverage.map.get("src/unused.ts").unwrap();
    assert_eq!(unused.summary().lines.covered, 0);
    assert!(unused.summary().lines.total > 0);
    assert_eq!(unused.summary().functions.total, 1);
    assert!(coverage.map.get("src/used.ts").is_some());
    // declarations are never scored
    assert!(coverage.map.get("src/types.d.ts").is_none());

    config.test.coverage.all = false;
    let report = TestRunner::new(config, dir.path())
        .with_executor(Arc::new(executor(dir.path())))
        .run()
        .await
        .unwrap();
    let coverage = report.coverage.unwrap();
    assert_eq!(coverage.map.len(), 1);
    assert_eq!(coverage.summary.lines.pct(), 100.0);
}

#[tokio::test]
async fn thresholds_gate_the_run() {
    let dir = project();
    let mut config = config();
    config.test.coverage.enabled = true;
    config.test.coverage.thresholds.lines = Some(90.0);
    let report = TestRunner::new(config, dir.path())
        .with_executor(Arc::new(executor(dir.path())))
        .run()
        .await
        .unwrap();

    assert!(report.summary.success());
    assert!(report.threshold_failed());
    assert!(!report.success());
    let coverage = report.coverage.unwrap();
    assert_eq!(coverage.phase, CoveragePhase::ThresholdFailed);
    assert_eq!(coverage.failures.len(), 1);
    assert_eq!(coverage.failures[0].expected, 90.0);
    // reports are still written when only thresholds fail
    assert!(dir.path().join("coverage/lcov.info").is_file());
}

#[tokio::test]
async fn reports_replace_the_reports_dir() {
    let dir = project();
    let stale = dir.path().join("coverage/stale.txt");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "old").unwrap();

    let mut config = config();
    config.test.coverage.enabled = true;
    let report = TestRunner::new(config, dir.path())
        .with_executor(Arc::new(executor(dir.path())))
        .run()
        .await
        .unwrap();

    let reports = report.coverage.unwrap().reports.unwrap();
    assert!(reports.console.unwrap().contains("All files"));
    assert!(dir.path().join("coverage/coverage-final.json").is_file());
    assert!(dir.path().join("coverage/lcov.info").is_file());
    assert!(!stale.exists());
}

#[tokio::test]
async fn failed_tests_skip_reports_unless_configured() {
    let dir = project();
    let mut config = config();
    config.test.coverage.enabled = true;
    let failing = || ScriptedExecutor {
        failing: vec!["a.test.ts".to_string()],
        ..executor(dir.path())
    };

    let report = TestRunner::new(config.clone(), dir.path())
        .with_executor(Arc::new(failing()))
        .run()
        .await
        .unwrap();
    assert!(report.coverage.unwrap().reports.is_none());
    assert!(!dir.path().join("coverage").exists());

    config.test.coverage.report_on_failure = true;
    let report = TestRunner::new(config, dir.path())
        .with_executor(Arc::new(failing()))
        .run()
        .await
        .unwrap();
    assert!(report.coverage.unwrap().reports.is_some());
    assert!(dir.path().join("coverage/lcov.info").is_file());
}

#[tokio::test]
async fn coverage_is_identical_across_runs() {
    let dir = project();
    let mut config = config();
    config.test.coverage.enabled = true;
    let mut maps = Vec::new();
    for _ in 0..2 {
        let report = TestRunner::new(config.clone(), dir.path())
            .with_executor(Arc::new(executor(dir.path())))
            .run()
            .await
            .unwrap();
        maps.push(report.coverage.unwrap().map);
    }
    assert_eq!(maps[0], maps[1]);
    // three processes each loaded the module once
    assert_eq!(maps[0].get("src/used.ts").unwrap().lines[&1], 3);
}

#[tokio::test]
async fn empty_selection_is_an_error_unless_allowed() {
    let dir = project();
    let mut config = config();
    config.test.include = vec!["**/*.nothing.ts".to_string()];

    let err = TestRunner::new(config.clone(), dir.path())
        .with_executor(Arc::new(executor(dir.path())))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoTestFiles { .. }));

    config.test.pass_with_no_tests = true;
    let report = TestRunner::new(config, dir.path())
        .with_executor(Arc::new(executor(dir.path())))
        .run()
        .await
        .unwrap();
    assert!(report.success());
    assert_eq!(report.summary.files, 0);
}

#[tokio::test]
async fn missing_setup_file_is_a_config_error() {
    let dir = project();
    let mut config = config();
    config.test.setup_files = vec![PathBuf::from("tests/setup.ts")];
    let err = TestRunner::new(config, dir.path())
        .with_executor(Arc::new(executor(dir.path())))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
