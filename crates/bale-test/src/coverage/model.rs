//! Per-file coverage counts and their summaries.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionCoverage {
    pub name: String,
    pub line: u32,
    pub hits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchCoverage {
    pub line: u32,
    pub hits: u64,
}

/// Execution counts for one source file.
///
/// Functions and branches are keyed by their start offset in the source, so
/// results from several processes line up when merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileCoverage {
    pub path: PathBuf,
    /// 1-based line number to hit count, executable lines only.
    pub lines: BTreeMap<u32, u64>,
    pub functions: BTreeMap<u32, FunctionCoverage>,
    pub branches: BTreeMap<u32, BranchCoverage>,
}

impl FileCoverage {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    /// Add another run's counts for the same file.
    pub fn merge(&mut self, other: FileCoverage) {
        for (line, hits) in other.lines {
            *self.lines.entry(line).or_default() += hits;
        }
        for (offset, function) in other.functions {
            self.functions
                .entry(offset)
                .and_modify(|f| f.hits += function.hits)
                .or_insert(function);
        }
        for (offset, branch) in other.branches {
            self.branches
                .entry(offset)
                .and_modify(|b| b.hits += branch.hits)
                .or_insert(branch);
        }
    }

    pub fn summary(&self) -> FileSummary {
        let lines = Metric::count(self.lines.values().copied());
        FileSummary {
            lines,
            // one statement per executable line
            statements: lines,
            functions: Metric::count(self.functions.values().map(|f| f.hits)),
            branches: Metric::count(self.branches.values().map(|b| b.hits)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metric {
    pub covered: usize,
    pub total: usize,
}

impl Metric {
    fn count(hits: impl Iterator<Item = u64>) -> Self {
        let mut metric = Metric::default();
        for hit in hits {
            metric.total += 1;
            if hit > 0 {
                metric.covered += 1;
            }
        }
        metric
    }

    /// Percentage covered. Nothing to cover counts as fully covered.
    pub fn pct(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            // two decimals, so reports and threshold checks agree
            (self.covered as f64 * 10_000.0 / self.total as f64).round() / 100.0
        }
    }

    fn add(&mut self, other: Metric) {
        self.covered += other.covered;
        self.total += other.total;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Lines,
    Statements,
    Functions,
    Branches,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Statements,
        MetricKind::Branches,
        MetricKind::Functions,
        MetricKind::Lines,
    ];
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetricKind::Lines => "lines",
            MetricKind::Statements => "statements",
            MetricKind::Functions => "functions",
            MetricKind::Branches => "branches",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub lines: Metric,
    pub statements: Metric,
    pub functions: Metric,
    pub branches: Metric,
}

impl FileSummary {
    pub fn get(&self, kind: MetricKind) -> Metric {
        match kind {
            MetricKind::Lines => self.lines,
            MetricKind::Statements => self.statements,
            MetricKind::Functions => self.functions,
            MetricKind::Branches => self.branches,
        }
    }

    fn add(&mut self, other: &FileSummary) {
        self.lines.add(other.lines);
        self.statements.add(other.statements);
        self.functions.add(other.functions);
        self.branches.add(other.branches);
    }
}

/// Coverage for every reported file, keyed by root-relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CoverageMap {
    files: BTreeMap<String, FileCoverage>,
}

impl CoverageMap {
    pub fn add(&mut self, display: String, coverage: FileCoverage) {
        match self.files.get_mut(&display) {
            Some(existing) => existing.merge(coverage),
            None => {
                self.files.insert(display, coverage);
            }
        }
    }

    pub fn contains(&self, display: &str) -> bool {
        self.files.contains_key(display)
    }

    pub fn get(&self, display: &str) -> Option<&FileCoverage> {
        self.files.get(display)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileCoverage)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn summary(&self) -> FileSummary {
        let mut total = FileSummary::default();
        for file in self.files.values() {
            total.add(&file.summary());
        }
        total
    }
}
