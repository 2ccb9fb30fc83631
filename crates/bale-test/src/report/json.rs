//! `coverage-final.json` in the istanbul file-coverage layout.

use std::fs;
use std::path::PathBuf;

use bale_config::Reporter;
use indexmap::IndexMap;
use serde::Serialize;

use crate::coverage::{CoverageMap, FileCoverage};
use crate::report::{CoverageReporter, ReportContext, ReportFile, Rendered};
use crate::{Error, Result};

pub struct JsonReporter;

#[derive(Serialize)]
struct Position {
    line: u32,
    column: u32,
}

#[derive(Serialize)]
struct Location {
    start: Position,
    end: Position,
}

#[derive(Serialize)]
struct FnEntry {
    name: String,
    decl: Location,
    loc: Location,
    line: u32,
}

#[derive(Serialize)]
struct BranchEntry {
    #[serde(rename = "type")]
    kind: &'static str,
    line: u32,
    loc: Location,
    locations: Vec<Location>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IstanbulFile {
    path: PathBuf,
    statement_map: IndexMap<String, Location>,
    s: IndexMap<String, u64>,
    fn_map: IndexMap<String, FnEntry>,
    f: IndexMap<String, u64>,
    branch_map: IndexMap<String, BranchEntry>,
    b: IndexMap<String, Vec<u64>>,
}

fn line_location(line: u32, width: u32) -> Location {
    Location {
        start: Position { line, column: 0 },
        end: Position {
            line,
            column: width,
        },
    }
}

fn convert(file: &FileCoverage) -> IstanbulFile {
    let widths: Vec<u32> = fs::read_to_string(&file.path)
        .map(|text| text.lines().map(|l| l.chars().count() as u32).collect())
        .unwrap_or_default();
    let width = |line: u32| {
        (line as usize)
            .checked_sub(1)
            .and_then(|i| widths.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = IstanbulFile {
        path: file.path.clone(),
        statement_map: IndexMap::new(),
        s: IndexMap::new(),
        fn_map: IndexMap::new(),
        f: IndexMap::new(),
        branch_map: IndexMap::new(),
        b: IndexMap::new(),
    };

    for (index, (&line, &hits)) in file.lines.iter().enumerate() {
        let key = index.to_string();
        out.statement_map
            .insert(key.clone(), line_location(line, width(line)));
        out.s.insert(key, hits);
    }
    for (index, function) in file.functions.values().enumerate() {
        let key = index.to_string();
        out.fn_map.insert(
            key.clone(),
            FnEntry {
                name: function.name.clone(),
                decl: line_location(function.line, width(function.line)),
                loc: line_location(function.line, width(function.line)),
                line: function.line,
            },
        );
        out.f.insert(key, function.hits);
    }
    for (index, branch) in file.branches.values().enumerate() {
        let key = index.to_string();
        out.branch_map.insert(
            key.clone(),
            BranchEntry {
                kind: "branch",
                line: branch.line,
                loc: line_location(branch.line, width(branch.line)),
                locations: vec![line_location(branch.line, width(branch.line))],
            },
        );
        out.b.insert(key, vec![branch.hits]);
    }
    out
}

impl CoverageReporter for JsonReporter {
    fn kind(&self) -> Reporter {
        Reporter::Json
    }

    fn render(&self, map: &CoverageMap, _ctx: &ReportContext) -> Result<Rendered> {
        let files: IndexMap<String, IstanbulFile> = map
            .iter()
            .map(|(_, file)| (file.path.to_string_lossy().into_owned(), convert(file)))
            .collect();
        let contents = serde_json::to_string_pretty(&files)
            .map_err(|e| Error::Report(format!("coverage-final.json: {e}")))?;
        Ok(Rendered::Files(vec![ReportFile {
            path: PathBuf::from("coverage-final.json"),
            contents,
        }]))
    }
}
