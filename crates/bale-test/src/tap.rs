//! Parser for the TAP stream written by `node --test --test-reporter=tap`.
//!
//! Subtests are indented by four spaces per level and precede their parent's
//! test point. Each point may be followed by a YAML diagnostic block between
//! `---` and `...`. Suites (`type: 'suite'`) are folded away so only tests
//! are counted; a failing suite with no failing children is kept so the
//! failure is not lost.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::state::{TestCase, TestStatus};

static TEST_POINT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^(?P<indent>\s*)(?P<ok>not ok|ok) \d+(?: - (?P<name>.*?))?(?: # (?P<directive>SKIP|TODO)\b.*)?$")
        .ok()
});

static SUBTEST: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(?P<indent>\s*)# Subtest: (?P<name>.*)$").ok());

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TapReport {
    pub tests: Vec<TestCase>,
    /// Lines that are not TAP, such as `console.log` output.
    pub output: Vec<String>,
}

impl TapReport {
    pub fn failed(&self) -> usize {
        self.count(TestStatus::Failed)
    }

    pub fn count(&self, status: TestStatus) -> usize {
        self.tests.iter().filter(|t| t.status == status).count()
    }
}

/// A test point with its diagnostics, before suites are folded.
#[derive(Debug)]
struct Point {
    depth: usize,
    name: String,
    status: TestStatus,
    suite: bool,
    duration_ms: Option<f64>,
    error: Option<String>,
}

pub fn parse(input: &str) -> TapReport {
    let (Some(test_point), Some(subtest)) = (TEST_POINT.as_ref(), SUBTEST.as_ref()) else {
        return TapReport::default();
    };

    let lines: Vec<&str> = input.lines().collect();
    let mut points = Vec::new();
    let mut output = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        i += 1;

        if let Some(caps) = test_point.captures(line) {
            let depth = caps["indent"].len() / 4;
            let status = match (&caps["ok"], caps.name("directive").map(|m| m.as_str())) {
                (_, Some("SKIP")) => TestStatus::Skipped,
                (_, Some(_)) => TestStatus::Todo,
                ("ok", None) => TestStatus::Passed,
                _ => TestStatus::Failed,
            };
            let mut point = Point {
                depth,
                name: caps
                    .name("name")
                    .map(|m| unescape(m.as_str()))
                    .unwrap_or_default(),
                status,
                suite: false,
                duration_ms: None,
                error: None,
            };

            if lines.get(i).is_some_and(|l| l.trim() == "---") {
                let start = i + 1;
                let mut end = start;
                while end < lines.len() && lines[end].trim() != "..." {
                    end += 1;
                }
                read_yaml(&lines[start..end], &mut point);
                i = (end + 1).min(lines.len());
            }
            points.push(point);
            continue;
        }

        let trimmed = line.trim_start();
        if subtest.is_match(line)
            || trimmed.starts_with("TAP version")
            || is_plan(trimmed)
            || trimmed.starts_with("# ")
            || trimmed.is_empty()
        {
            continue;
        }
        output.push(line.to_string());
    }

    TapReport {
        tests: fold(points),
        output,
    }
}

fn is_plan(line: &str) -> bool {
    line.strip_prefix("1..")
        .is_some_and(|rest| rest.chars().next().is_some_and(|c| c.is_ascii_digit()))
}

/// Turn points (children before parents) into test cases named by path.
fn fold(points: Vec<Point>) -> Vec<TestCase> {
    // children are emitted before their parent, so a stack of pending
    // children per depth is enough to find each point's descendants
    let mut pending: Vec<Vec<TestCase>> = Vec::new();
    let mut any_failed: Vec<bool> = Vec::new();

    for point in points {
        let depth = point.depth;
        while pending.len() <= depth + 1 {
            pending.push(Vec::new());
            any_failed.push(false);
        }

        let children = std::mem::take(&mut pending[depth + 1]);
        let child_failed = std::mem::replace(&mut any_failed[depth + 1], false);
        let prefix = |mut case: TestCase| {
            case.name = format!("{} > {}", point.name, case.name);
            case
        };

        let mut cases: Vec<TestCase> = children.into_iter().map(prefix).collect();
        let keep_self = !point.suite || (point.status == TestStatus::Failed && !child_failed);
        if keep_self {
            cases.push(TestCase {
                name: point.name.clone(),
                status: point.status,
                duration_ms: point.duration_ms,
                error: point.error.clone(),
            });
        }

        let failed = child_failed || point.status == TestStatus::Failed;
        pending[depth].extend(cases);
        any_failed[depth] |= failed;
    }

    pending.into_iter().next().unwrap_or_default()
}

fn read_yaml(lines: &[&str], point: &mut Point) {
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();
        i += 1;
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key {
            "duration_ms" => point.duration_ms = value.parse().ok(),
            "type" => point.suite = value.trim_matches('\'') == "suite",
            "error" => {
                if value.starts_with('|') || value.is_empty() {
                    // block scalar: indented continuation lines
                    let indent = lines
                        .get(i)
                        .map(|l| l.len() - l.trim_start().len())
                        .unwrap_or(0);
                    let mut text = Vec::new();
                    while i < lines.len() {
                        let raw = lines[i];
                        let this_indent = raw.len() - raw.trim_start().len();
                        if !raw.trim().is_empty() && this_indent < indent {
                            break;
                        }
                        text.push(raw.get(indent..).unwrap_or("").trim_end());
                        i += 1;
                    }
                    point.error = Some(text.join("\n").trim().to_string());
                } else {
                    point.error = Some(unquote(value));
                }
            }
            _ => {}
        }
    }
}

fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        trimmed[1..trimmed.len() - 1].replace("''", "'")
    } else if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].replace("\\\"", "\"")
    } else {
        trimmed.to_string()
    }
}

/// Names escape `#` and `\` in TAP.
fn unescape(name: &str) -> String {
    name.replace("\\#", "#").replace("\\\\", "\\")
}
