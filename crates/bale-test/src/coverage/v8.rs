//! Coverage from the raw JSON V8 writes into `NODE_V8_COVERAGE`.
//!
//! Each function entry carries a list of ranges. The first range spans the
//! whole function; with block coverage the following ranges are blocks whose
//! count differs from their parent. A line's count is that of the narrowest
//! range containing the line's first code character.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, trace};

use crate::coverage::model::{BranchCoverage, CoverageMap, FileCoverage, FunctionCoverage};
use crate::coverage::source::SourceText;
use crate::coverage::{CoverageProvider, CoverageScope, untested};
use crate::executor::url_to_path;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct RawCoverage {
    result: Vec<ScriptCoverage>,
}

#[derive(Debug, Deserialize)]
struct ScriptCoverage {
    url: String,
    functions: Vec<RawFunction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFunction {
    function_name: String,
    ranges: Vec<RawRange>,
    #[serde(default)]
    is_block_coverage: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRange {
    start_offset: u32,
    end_offset: u32,
    count: u64,
}

impl RawRange {
    fn contains(&self, offset: u32) -> bool {
        self.start_offset <= offset && offset < self.end_offset
    }

    fn width(&self) -> u32 {
        self.end_offset.saturating_sub(self.start_offset)
    }
}

#[derive(Debug, Default)]
pub struct V8Provider;

impl CoverageProvider for V8Provider {
    fn name(&self) -> &'static str {
        "v8"
    }

    fn collect(&self, raw_dirs: &[PathBuf], scope: &CoverageScope) -> Result<CoverageMap> {
        let mut map = CoverageMap::default();
        let mut sources: HashMap<PathBuf, Option<Arc<SourceText>>> = HashMap::new();

        for dir in raw_dirs {
            if !dir.is_dir() {
                // a killed process never writes its coverage
                debug!(dir = %dir.display(), "no coverage written");
                continue;
            }
            for file in json_files(dir)? {
                let raw = read_raw(&file)?;
                for script in raw.result {
                    let Some(path) = url_to_path(&script.url) else {
                        continue;
                    };
                    let Some(rel) = scope.display(&path) else {
                        continue;
                    };
                    let source = sources
                        .entry(path.clone())
                        .or_insert_with(|| {
                            fs::read_to_string(&path)
                                .ok()
                                .map(|text| Arc::new(SourceText::new(text)))
                        })
                        .clone();
                    let Some(source) = source else {
                        debug!(file = %path.display(), "covered file no longer readable");
                        continue;
                    };
                    trace!(file = %rel, functions = script.functions.len(), "converting");
                    map.add(rel, convert(path, &source, &script.functions));
                }
            }
        }
        Ok(map)
    }

    fn untested(&self, path: &Path, source: &SourceText) -> FileCoverage {
        untested::zero_coverage(path, source)
    }
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::CoverageRead {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::CoverageRead {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_raw(file: &Path) -> Result<RawCoverage> {
    let text = fs::read_to_string(file).map_err(|e| Error::CoverageRead {
        path: file.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| Error::CoverageRead {
        path: file.to_path_buf(),
        message: format!("malformed V8 coverage: {e}"),
    })
}

fn convert(path: PathBuf, source: &SourceText, functions: &[RawFunction]) -> FileCoverage {
    let mut coverage = FileCoverage::new(path);
    let ranges: Vec<RawRange> = functions
        .iter()
        .flat_map(|f| f.ranges.iter().copied())
        .collect();

    for line in source.executable_lines() {
        let hits = ranges
            .iter()
            .filter(|r| r.contains(line.utf16_offset))
            .min_by_key(|r| r.width())
            .map_or(0, |r| r.count);
        coverage.lines.insert(line.line, hits);
    }

    let mut anonymous = 0;
    for function in functions {
        let Some(whole) = function.ranges.first() else {
            continue;
        };
        let is_module_scope = whole.start_offset == 0 && whole.end_offset >= source.utf16_len();
        if !is_module_scope {
            let name = if function.function_name.is_empty() {
                anonymous += 1;
                format!("(anonymous_{anonymous})")
            } else {
                function.function_name.clone()
            };
            coverage.functions.insert(
                whole.start_offset,
                FunctionCoverage {
                    name,
                    line: source.line_of_utf16(whole.start_offset),
                    hits: whole.count,
                },
            );
        }

        if function.is_block_coverage {
            for block in &function.ranges[1..] {
                coverage.branches.insert(
                    block.start_offset,
                    BranchCoverage {
                        line: source.line_of_utf16(block.start_offset),
                        hits: block.count,
                    },
                );
            }
        }
    }
    coverage
}
