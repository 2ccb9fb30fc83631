//! Running one test file in its own process.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bale_config::TestConfig;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, trace};
use url::Url;

use crate::{Error, Result};

/// Environment variable V8 writes raw coverage into.
pub const COVERAGE_ENV: &str = "NODE_V8_COVERAGE";

/// One test file to execute.
#[derive(Debug, Clone)]
pub struct FileJob {
    pub file: PathBuf,
    /// Where the process should write raw coverage, when collecting it.
    pub coverage_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal or the timeout.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration: Duration,
}

#[async_trait]
pub trait TestExecutor: Send + Sync {
    /// Run one file to completion.
    ///
    /// Only failures to start the process are errors; test failures and
    /// crashes are reported through [`ProcessOutput`].
    async fn execute(&self, job: &FileJob) -> Result<ProcessOutput>;
}

/// Runs each file with `node --test`, stripping TypeScript types natively.
#[derive(Debug, Clone)]
pub struct NodeExecutor {
    node: String,
    cwd: PathBuf,
    imports: Vec<PathBuf>,
    extra_args: Vec<String>,
    test_timeout: Duration,
    file_timeout: Duration,
}

impl NodeExecutor {
    /// `imports` are preloaded with `--import`, in order.
    pub fn new(config: &TestConfig, cwd: &Path, imports: Vec<PathBuf>) -> Self {
        Self {
            node: config.node.clone(),
            cwd: cwd.to_path_buf(),
            imports,
            extra_args: config.node_args.clone(),
            test_timeout: Duration::from_millis(config.test_timeout_ms),
            file_timeout: Duration::from_millis(config.file_timeout_ms),
        }
    }

    pub fn args(&self, file: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--experimental-strip-types".into(),
            "--no-warnings".into(),
            "--test".into(),
            "--test-reporter=tap".into(),
            format!("--test-timeout={}", self.test_timeout.as_millis()).into(),
        ];
        for import in &self.imports {
            args.push("--import".into());
            args.push(file_url(import).into());
        }
        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(file.as_os_str().to_os_string());
        args
    }
}

#[async_trait]
impl TestExecutor for NodeExecutor {
    async fn execute(&self, job: &FileJob) -> Result<ProcessOutput> {
        let mut command = Command::new(&self.node);
        command
            .args(self.args(&job.file))
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("NO_COLOR", "1")
            .env_remove("NODE_TEST_CONTEXT")
            .kill_on_drop(true);
        match &job.coverage_dir {
            Some(dir) => command.env(COVERAGE_ENV, dir),
            None => command.env_remove(COVERAGE_ENV),
        };

        trace!(file = %job.file.display(), "spawning node");
        let started = Instant::now();
        let child = command.spawn().map_err(|source| Error::Spawn {
            program: self.node.clone(),
            source,
        })?;

        // dropping the wait future on timeout kills the child
        match timeout(self.file_timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output.map_err(|source| Error::Spawn {
                    program: self.node.clone(),
                    source,
                })?;
                Ok(ProcessOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code(),
                    timed_out: false,
                    duration: started.elapsed(),
                })
            }
            Err(_) => {
                debug!(file = %job.file.display(), "file timed out, process killed");
                Ok(ProcessOutput {
                    timed_out: true,
                    duration: started.elapsed(),
                    ..Default::default()
                })
            }
        }
    }
}

/// `file://` URL for an absolute path, as `--import` expects.
///
/// Relative paths are passed through; node resolves them against the cwd.
pub fn file_url(path: &Path) -> String {
    match Url::from_file_path(path) {
        Ok(url) => url.into(),
        Err(()) => path.to_string_lossy().into_owned(),
    }
}

/// Path of a `file://` script URL reported by V8; `None` for `node:` and
/// other schemes.
pub fn url_to_path(url: &str) -> Option<PathBuf> {
    let url = Url::parse(url).ok()?;
    if url.scheme() != "file" {
        return None;
    }
    url.to_file_path().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_arguments_carry_timeout_imports_and_file() {
        let config = TestConfig {
            test_timeout_ms: 2_500,
            node_args: vec!["--enable-source-maps".into()],
            ..Default::default()
        };
        let executor = NodeExecutor::new(
            &config,
            Path::new("/p"),
            vec![PathBuf::from("/tmp/run/globals.mjs"), PathBuf::from("/p/setup.ts")],
        );
        let args: Vec<String> = executor
            .args(Path::new("/p/src/a.test.ts"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "--experimental-strip-types",
                "--no-warnings",
                "--test",
                "--test-reporter=tap",
                "--test-timeout=2500",
                "--import",
                "file:///tmp/run/globals.mjs",
                "--import",
                "file:///p/setup.ts",
                "--enable-source-maps",
                "/p/src/a.test.ts",
            ]
        );
    }

    #[test]
    fn file_urls_round_trip_through_escaping() {
        let path = Path::new("/work/my lib/src/ä.ts");
        let url = file_url(path);
        assert_eq!(url, "file:///work/my%20lib/src/%C3%A4.ts");
        assert_eq!(url_to_path(&url).unwrap(), path);
        assert!(url_to_path("node:internal/main").is_none());
        assert!(url_to_path("not a url").is_none());
    }

    #[test]
    fn relative_imports_are_passed_through() {
        assert_eq!(file_url(Path::new("setup.ts")), "setup.ts");
    }

    #[cfg(windows)]
    #[test]
    fn drive_letter_urls_become_windows_paths() {
        assert_eq!(
            url_to_path("file:///C:/p/src/a.ts").unwrap(),
            PathBuf::from(r"C:\p\src\a.ts")
        );
        assert_eq!(file_url(Path::new(r"C:\p\setup.ts")), "file:///C:/p/setup.ts");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let config = TestConfig {
            node: "bale-definitely-not-a-real-node".into(),
            ..Default::default()
        };
        let executor = NodeExecutor::new(&config, &std::env::temp_dir(), Vec::new());
        let job = FileJob {
            file: PathBuf::from("x.test.ts"),
            coverage_dir: None,
        };
        let err = executor.execute(&job).await.unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }
}
