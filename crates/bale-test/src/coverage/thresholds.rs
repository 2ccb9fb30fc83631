use std::fmt;

use bale_config::Thresholds;
use serde::Serialize;

use crate::coverage::model::{CoverageMap, FileSummary, MetricKind};

/// A metric below its configured minimum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdFailure {
    pub metric: MetricKind,
    /// `None` for the aggregate over every file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub actual: f64,
    pub expected: f64,
}

impl fmt::Display for ThresholdFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(
                f,
                "{} coverage for {file} ({:.2}%) does not meet threshold ({:.2}%)",
                self.metric, self.actual, self.expected
            ),
            None => write!(
                f,
                "{} coverage ({:.2}%) does not meet global threshold ({:.2}%)",
                self.metric, self.actual, self.expected
            ),
        }
    }
}

fn minimum(thresholds: &Thresholds, metric: MetricKind) -> Option<f64> {
    match metric {
        MetricKind::Lines => thresholds.lines,
        MetricKind::Statements => thresholds.statements,
        MetricKind::Functions => thresholds.functions,
        MetricKind::Branches => thresholds.branches,
    }
}

fn check_summary(
    thresholds: &Thresholds,
    summary: &FileSummary,
    file: Option<&str>,
    failures: &mut Vec<ThresholdFailure>,
) {
    for metric in MetricKind::ALL {
        let Some(expected) = minimum(thresholds, metric) else {
            continue;
        };
        let actual = summary.get(metric).pct();
        if actual < expected {
            failures.push(ThresholdFailure {
                metric,
                file: file.map(str::to_string),
                actual,
                expected,
            });
        }
    }
}

/// Compare coverage against the configured minimums.
///
/// With `per_file` every file must meet each minimum on its own; otherwise
/// only the aggregate is checked.
pub fn check_thresholds(thresholds: &Thresholds, map: &CoverageMap) -> Vec<ThresholdFailure> {
    let mut failures = Vec::new();
    if thresholds.is_empty() {
        return failures;
    }
    if thresholds.per_file {
        for (file, coverage) in map.iter() {
            check_summary(thresholds, &coverage.summary(), Some(file), &mut failures);
        }
    } else {
        check_summary(thresholds, &map.summary(), None, &mut failures);
    }
    failures
}
