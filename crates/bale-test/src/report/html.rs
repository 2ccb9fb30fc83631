//! Static HTML report: an index table plus one annotated source page per file.

use std::fs;
use std::path::PathBuf;

use bale_config::Reporter;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::coverage::{CoverageMap, FileSummary, Metric};
use crate::report::{CoverageReporter, ReportContext, ReportFile, Rendered, format_pct};
use crate::{Error, Result};

const STYLE: &str = r#"body { font-family: system-ui, sans-serif; margin: 2rem; color: #222; }
table { border-collapse: collapse; }
th, td { padding: 0.25rem 0.75rem; border-bottom: 1px solid #ddd; text-align: right; }
th:first-child, td:first-child { text-align: left; }
.high { background: #e6f5d0; } .medium { background: #fff4c2; } .low { background: #fce1e1; }
pre { margin: 0; }
.src td { border: none; padding: 0 0.5rem; font-family: ui-monospace, monospace; text-align: left; }
.src .count { color: #888; text-align: right; }
.src .hit { background: #e6f5d0; } .src .miss { background: #fce1e1; }
footer { margin-top: 2rem; color: #888; font-size: 0.8rem; }"#;

const INDEX: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Coverage report</title><style>{{ style|safe }}</style></head>
<body>
<h1>Coverage report</h1>
<table>
<thead><tr><th>File</th><th>Statements</th><th>Branches</th><th>Functions</th><th>Lines</th></tr></thead>
<tbody>
<tr class="{{ total.class }}"><td><strong>All files</strong></td>{% for m in total.metrics %}<td>{{ m|safe }}</td>{% endfor %}</tr>
{% for file in files %}<tr class="{{ file.class }}"><td><a href="{{ file.href|safe }}">{{ file.name }}</a></td>{% for m in file.metrics %}<td>{{ m|safe }}</td>{% endfor %}</tr>
{% endfor %}</tbody>
</table>
<footer>Generated by bale at {{ generated_at }}</footer>
</body>
</html>
"#;

const FILE: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>{{ name }}</title><style>{{ style|safe }}</style></head>
<body>
<p><a href="{{ index_href|safe }}">All files</a> / {{ name }}</p>
<table class="{{ summary.class }}"><tr><th></th><th>Statements</th><th>Branches</th><th>Functions</th><th>Lines</th></tr>
<tr><td>{{ name }}</td>{% for m in summary.metrics %}<td>{{ m|safe }}</td>{% endfor %}</tr></table>
<table class="src">
{% for line in lines %}<tr class="{{ line.class }}"><td class="count">{{ line.number }}</td><td class="count">{{ line.hits }}</td><td><pre>{{ line.text }}</pre></td></tr>
{% endfor %}</table>
<footer>Generated by bale at {{ generated_at }}</footer>
</body>
</html>
"#;

pub struct HtmlReporter;

#[derive(Serialize)]
struct SummaryRow {
    class: &'static str,
    /// statements, branches, functions, lines
    metrics: Vec<String>,
}

impl SummaryRow {
    fn new(summary: &FileSummary) -> Self {
        Self {
            class: level(summary.lines),
            metrics: [
                summary.statements,
                summary.branches,
                summary.functions,
                summary.lines,
            ]
            .iter()
            .map(|m| format!("{}% ({}/{})", format_pct(m.pct()), m.covered, m.total))
            .collect(),
        }
    }
}

#[derive(Serialize)]
struct FileRow {
    name: String,
    href: String,
    class: &'static str,
    metrics: Vec<String>,
}

#[derive(Serialize)]
struct SourceLine {
    number: usize,
    hits: String,
    class: &'static str,
    text: String,
}

fn level(metric: Metric) -> &'static str {
    match metric.pct() {
        p if p >= 80.0 => "high",
        p if p >= 50.0 => "medium",
        _ => "low",
    }
}

/// Percent-encode the characters that would end or break an attribute.
fn href(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        match ch {
            '"' => out.push_str("%22"),
            '\'' => out.push_str("%27"),
            '<' => out.push_str("%3C"),
            '>' => out.push_str("%3E"),
            '&' => out.push_str("%26"),
            '#' => out.push_str("%23"),
            ' ' => out.push_str("%20"),
            _ => out.push(ch),
        }
    }
    out
}

fn render_err(e: minijinja::Error) -> Error {
    Error::Report(format!("html template: {e}"))
}

impl CoverageReporter for HtmlReporter {
    fn kind(&self) -> Reporter {
        Reporter::Html
    }

    fn render(&self, map: &CoverageMap, ctx: &ReportContext) -> Result<Rendered> {
        let mut env = Environment::new();
        env.add_template("index.html", INDEX).map_err(render_err)?;
        env.add_template("file.html", FILE).map_err(render_err)?;

        let mut files = Vec::with_capacity(map.len() + 1);
        let mut rows = Vec::with_capacity(map.len());

        for (name, coverage) in map.iter() {
            let page = format!("{name}.html");
            let summary = coverage.summary();
            let row = SummaryRow::new(&summary);
            rows.push(FileRow {
                name: name.to_string(),
                href: href(&page),
                class: row.class,
                metrics: row.metrics.clone(),
            });

            let text = fs::read_to_string(&coverage.path).unwrap_or_default();
            let lines: Vec<SourceLine> = text
                .lines()
                .enumerate()
                .map(|(index, text)| {
                    let number = index + 1;
                    let (hits, class) = match coverage.lines.get(&(number as u32)) {
                        Some(0) => ("0".to_string(), "miss"),
                        Some(hits) => (format!("{hits}x"), "hit"),
                        None => (String::new(), ""),
                    };
                    SourceLine {
                        number,
                        hits,
                        class,
                        text: text.to_string(),
                    }
                })
                .collect();

            let depth = name.matches('/').count();
            let index_href = format!("{}index.html", "../".repeat(depth));
            let html = env
                .get_template("file.html")
                .and_then(|t| {
                    t.render(context! {
                        name,
                        style => STYLE,
                        summary => row,
                        lines,
                        index_href,
                        generated_at => &ctx.generated_at,
                    })
                })
                .map_err(render_err)?;
            files.push(ReportFile {
                path: PathBuf::from(page),
                contents: html,
            });
        }

        let index = env
            .get_template("index.html")
            .and_then(|t| {
                t.render(context! {
                    style => STYLE,
                    total => SummaryRow::new(&map.summary()),
                    files => rows,
                    generated_at => &ctx.generated_at,
                })
            })
            .map_err(render_err)?;
        files.insert(
            0,
            ReportFile {
                path: PathBuf::from("index.html"),
                contents: index,
            },
        );

        Ok(Rendered::Files(files))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::coverage::FileCoverage;

    #[test]
    fn pages_link_back_and_escape_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src/lib/a.ts");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "export const tag = '<b>';\nexport const n = 1;\n").unwrap();

        let mut file = FileCoverage::new(path);
        file.lines = [(1, 2), (2, 0)].into();
        let mut map = CoverageMap::default();
        map.add("src/lib/a.ts".into(), file);

        let mut ctx = ReportContext::new(dir.path(), dir.path().join("coverage"));
        ctx.generated_at = "2024-01-01 00:00:00".into();
        let Rendered::Files(files) = HtmlReporter.render(&map, &ctx).unwrap() else {
            panic!("html reporter writes files");
        };

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, PathBuf::from("index.html"));
        assert!(files[0].contents.contains("href=\"src/lib/a.ts.html\""));
        assert!(files[0].contents.contains("50% (1/2)"));

        let page = &files[1];
        assert_eq!(page.path, PathBuf::from("src/lib/a.ts.html"));
        assert!(page.contents.contains("href=\"../../index.html\""));
        assert!(page.contents.contains("&lt;b&gt;"));
        assert!(page.contents.contains("2x"));
        assert!(page.contents.contains("2024-01-01 00:00:00"));
    }
}
