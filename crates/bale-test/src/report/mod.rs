//! Coverage reporters.
//!
//! Every reporter renders from the same [`CoverageMap`]; file-based reporters
//! write below the reports directory, which is cleared first.

mod html;
mod json;
mod lcov;
mod text;

use std::fs;
use std::path::{Path, PathBuf};

use bale_config::Reporter;
use tracing::debug;

use crate::coverage::CoverageMap;
use crate::{Error, Result};

pub use html::HtmlReporter;
pub use json::JsonReporter;
pub use lcov::LcovReporter;
pub use text::TextReporter;

/// Inputs shared by every reporter.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub root: PathBuf,
    pub reports_dir: PathBuf,
    /// Shown in the HTML footer.
    pub generated_at: String,
}

impl ReportContext {
    pub fn new(root: &Path, reports_dir: PathBuf) -> Self {
        Self {
            root: root.to_path_buf(),
            reports_dir,
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// A file to write, relative to the reports directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFile {
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    /// Printed by the caller.
    Console(String),
    Files(Vec<ReportFile>),
}

pub trait CoverageReporter {
    fn kind(&self) -> Reporter;

    fn render(&self, map: &CoverageMap, ctx: &ReportContext) -> Result<Rendered>;
}

pub fn reporter_for(kind: Reporter) -> Box<dyn CoverageReporter> {
    match kind {
        Reporter::Text => Box::new(TextReporter),
        Reporter::Json => Box::new(JsonReporter),
        Reporter::Html => Box::new(HtmlReporter),
        Reporter::Lcov => Box::new(LcovReporter),
    }
}

/// What the reporters produced.
#[derive(Debug, Clone, Default)]
pub struct ReportOutput {
    pub console: Option<String>,
    pub files: Vec<PathBuf>,
}

/// Render every configured reporter, then replace the reports directory.
///
/// Everything is rendered before the directory is cleared, so a template
/// error leaves old reports in place.
pub fn write_reports(
    map: &CoverageMap,
    reporters: &[Reporter],
    ctx: &ReportContext,
) -> Result<ReportOutput> {
    let mut output = ReportOutput::default();
    let mut files = Vec::new();
    for &kind in reporters {
        match reporter_for(kind).render(map, ctx)? {
            Rendered::Console(text) => output.console = Some(text),
            Rendered::Files(rendered) => files.extend(rendered),
        }
    }

    if files.is_empty() {
        return Ok(output);
    }

    clear_dir(&ctx.root, &ctx.reports_dir)?;
    for file in files {
        let path = ctx.reports_dir.join(&file.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::WriteReport {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, file.contents).map_err(|source| Error::WriteReport {
            path: path.clone(),
            source,
        })?;
        debug!(file = %path.display(), "wrote report");
        output.files.push(path);
    }
    output.files.sort();
    Ok(output)
}

fn clear_dir(root: &Path, dir: &Path) -> Result<()> {
    if dir == root || root.starts_with(dir) {
        return Err(Error::UnsafeReportsDir(dir.to_path_buf()));
    }
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|source| Error::WriteReport {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    fs::create_dir_all(dir).map_err(|source| Error::WriteReport {
        path: dir.to_path_buf(),
        source,
    })
}

/// `83.33`, or `100` for whole numbers.
pub(crate) fn format_pct(pct: f64) -> String {
    if pct.fract() == 0.0 {
        format!("{pct:.0}")
    } else {
        format!("{pct:.2}")
    }
}
