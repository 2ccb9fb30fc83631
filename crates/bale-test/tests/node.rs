//! Runs real `node --test` processes. Skipped when no suitable node is installed.

use std::fs;
use std::process::Command;

use bale_config::{LibraryConfig, Reporter};
use bale_test::{CoveragePhase, FileState, TestRunner};
use tempfile::TempDir;

/// `--experimental-strip-types` landed in 22.6.
fn node_available() -> bool {
    let Ok(output) = Command::new("node").arg("--version").output() else {
        return false;
    };
    let version = String::from_utf8_lossy(&output.stdout);
    let mut parts = version.trim().trim_start_matches('v').split('.');
    let major: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minor: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    major > 22 || (major == 22 && minor >= 6)
}

fn write(dir: &TempDir, rel: &str, contents: &str) {
    let path = dir.path().join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[tokio::test]
async fn runs_typescript_tests_with_coverage() {
    if !node_available() {
        eprintln!("skipping: node >= 22.6 not found");
        return;
    }
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "src/math.ts",
        "export function add(a: number, b: number): number {\n  return a + b;\n}\n\nexport function sign(n: number): number {\n  if (n < 0) {\n    return -1;\n  }\n  return 1;\n}\n",
    );
    write(
        &dir,
        "tests/math.test.ts",
        "import assert from 'node:assert/strict';\nimport { add } from '../src/math.ts';\n\ndescribe('add', () => {\n  it('sums', () => {\n    assert.equal(add(1, 2), 3);\n  });\n});\n",
    );
    write(
        &dir,
        "tests/broken.test.ts",
        "import assert from 'node:assert/strict';\n\ntest('fails', () => {\n  assert.equal(1, 2);\n});\n",
    );

    let mut config = LibraryConfig::default();
    config.test.coverage.enabled = true;
    config.test.coverage.report_on_failure = true;
    config.test.coverage.reporters = vec![Reporter::Lcov];

    let report = TestRunner::new(config, dir.path()).run().await.unwrap();

    let math = report
        .files
        .iter()
        .find(|f| f.display == "tests/math.test.ts")
        .unwrap();
    assert_eq!(math.state, FileState::Passed, "stderr: {}", math.stderr);
    assert_eq!(math.tests[0].name, "add > sums");

    let broken = report
        .files
        .iter()
        .find(|f| f.display == "tests/broken.test.ts")
        .unwrap();
    assert!(broken.state.is_failed());
    assert!(!report.success());

    let coverage = report.coverage.unwrap();
    assert_eq!(coverage.phase, CoveragePhase::ThresholdMet);
    let file = coverage.map.get("src/math.ts").unwrap();
    assert_eq!(file.lines[&2], 1);
    assert_eq!(file.lines[&7], 0);
    assert!(dir.path().join("coverage/lcov.info").is_file());
}
