use bale_config::Reporter;

use crate::Result;
use crate::coverage::{CoverageMap, FileSummary};
use crate::report::{CoverageReporter, ReportContext, Rendered, format_pct};

/// Console table with one row per file and an aggregate row.
pub struct TextReporter;

impl CoverageReporter for TextReporter {
    fn kind(&self) -> Reporter {
        Reporter::Text
    }

    fn render(&self, map: &CoverageMap, _ctx: &ReportContext) -> Result<Rendered> {
        let mut rows = vec![row("All files", &map.summary(), String::new())];
        for (file, coverage) in map.iter() {
            let uncovered: Vec<u32> = coverage
                .lines
                .iter()
                .filter(|(_, hits)| **hits == 0)
                .map(|(line, _)| *line)
                .collect();
            rows.push(row(&format!(" {file}"), &coverage.summary(), line_ranges(&uncovered)));
        }

        let header = [
            "File",
            "% Stmts",
            "% Branch",
            "% Funcs",
            "% Lines",
            "Uncovered Line #s",
        ]
        .map(String::from);
        let mut widths = header.clone().map(|h| h.len());
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        let divider = widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("|");
        let mut out = String::new();
        out.push_str(&divider);
        out.push('\n');
        out.push_str(&format_row(&header, &widths));
        out.push_str(&divider);
        out.push('\n');
        for row in &rows {
            out.push_str(&format_row(row, &widths));
        }
        out.push_str(&divider);
        out.push('\n');
        Ok(Rendered::Console(out))
    }
}

fn row(name: &str, summary: &FileSummary, uncovered: String) -> [String; 6] {
    [
        name.to_string(),
        format_pct(summary.statements.pct()),
        format_pct(summary.branches.pct()),
        format_pct(summary.functions.pct()),
        format_pct(summary.lines.pct()),
        uncovered,
    ]
}

fn format_row(cells: &[String; 6], widths: &[usize; 6]) -> String {
    let mut parts = Vec::with_capacity(6);
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        // numbers right-aligned, names and line lists left-aligned
        if i == 0 || i == 5 {
            parts.push(format!(" {cell:<width$} "));
        } else {
            parts.push(format!(" {cell:>width$} "));
        }
    }
    let mut line = parts.join("|");
    line.truncate(line.trim_end().len());
    line.push('\n');
    line
}

/// `[1, 2, 3, 7]` → `1-3,7`
fn line_ranges(lines: &[u32]) -> String {
    let mut parts = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let start = lines[i];
        let mut end = start;
        while i + 1 < lines.len() && lines[i + 1] == end + 1 {
            i += 1;
            end = lines[i];
        }
        parts.push(if start == end {
            start.to_string()
        } else {
            format!("{start}-{end}")
        });
        i += 1;
    }
    parts.join(",")
}
