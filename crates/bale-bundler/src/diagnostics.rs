//! Structured diagnostics pulled out of rolldown errors.
//!
//! Rolldown's error types are not stable across releases, so errors are read
//! through their `Debug` output and reduced to a small serializable record.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// `path/to/file.ts:12:5`
static LOCATION: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"([^\s'"`(]+\.(?:[cm]?[jt]sx?|json)):(\d+):(\d+)"#).ok());

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedDiagnostic {
    pub kind: DiagnosticKind,
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub help: Option<String>,
    /// `Caused by:` lines, outermost first.
    pub error_chain: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MissingExport,
    ParseError,
    CircularDependency,
    UnresolvedEntry,
    UnresolvedImport,
    InvalidOption,
    Plugin,
    Other,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagnosticKind::MissingExport => "MissingExport",
            DiagnosticKind::ParseError => "ParseError",
            DiagnosticKind::CircularDependency => "CircularDependency",
            DiagnosticKind::UnresolvedEntry => "UnresolvedEntry",
            DiagnosticKind::UnresolvedImport => "UnresolvedImport",
            DiagnosticKind::InvalidOption => "InvalidOption",
            DiagnosticKind::Plugin => "Plugin",
            DiagnosticKind::Other => "Error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// Break a rolldown error (usually a batch) into individual diagnostics.
pub fn extract_from_rolldown_error(error: &dyn fmt::Debug) -> Vec<ExtractedDiagnostic> {
    let text = format!("{error:?}");
    let parts: Vec<&str> = text
        .split("BuildDiagnostic")
        .map(str::trim)
        .filter(|part| !part.is_empty() && *part != "[" && *part != "]")
        .collect();

    if parts.len() > 1 {
        parts.into_iter().map(extract_single).collect()
    } else {
        vec![extract_single(&text)]
    }
}

fn extract_single(text: &str) -> ExtractedDiagnostic {
    let (file, line, column) = match LOCATION.as_ref().and_then(|re| re.captures(text)) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str().to_string()),
            caps.get(2).and_then(|m| m.as_str().parse().ok()),
            caps.get(3).and_then(|m| m.as_str().parse().ok()),
        ),
        None => (None, None, None),
    };

    let severity = if text.contains("Warning") {
        DiagnosticSeverity::Warning
    } else {
        DiagnosticSeverity::Error
    };

    ExtractedDiagnostic {
        kind: classify(text),
        severity,
        message: first_message(text),
        file,
        line,
        column,
        help: extract_after(text, &["help: ", "Help: ", "hint: ", "Hint: "]),
        error_chain: text
            .lines()
            .filter_map(|line| line.trim().strip_prefix("Caused by:"))
            .map(|cause| cause.trim().to_string())
            .filter(|cause| !cause.is_empty())
            .collect(),
    }
}

fn classify(text: &str) -> DiagnosticKind {
    if text.contains("MissingExport") {
        DiagnosticKind::MissingExport
    } else if text.contains("ParseError") || text.contains("Unexpected token") {
        DiagnosticKind::ParseError
    } else if text.contains("CircularDependency") {
        DiagnosticKind::CircularDependency
    } else if text.contains("UnresolvedEntry") {
        DiagnosticKind::UnresolvedEntry
    } else if text.contains("UnresolvedImport") || text.contains("Could not resolve") {
        DiagnosticKind::UnresolvedImport
    } else if text.contains("InvalidOption") {
        DiagnosticKind::InvalidOption
    } else if text.contains("Plugin") {
        DiagnosticKind::Plugin
    } else {
        DiagnosticKind::Other
    }
}

/// The first quoted message in the debug text, or the text itself.
fn first_message(text: &str) -> String {
    if let Some(start) = text.find("message: \"") {
        let rest = &text[start + "message: \"".len()..];
        if let Some(end) = rest.find('"') {
            return rest[..end].to_string();
        }
    }
    text.lines().next().unwrap_or_default().trim().to_string()
}

fn extract_after(text: &str, markers: &[&str]) -> Option<String> {
    markers.iter().find_map(|marker| {
        let at = text.find(marker)?;
        let line = text[at + marker.len()..].lines().next()?.trim();
        (!line.is_empty()).then(|| line.to_string())
    })
}

/// One-line summary of a list of diagnostics.
pub fn format_diagnostics(diagnostics: &[ExtractedDiagnostic]) -> String {
    match diagnostics {
        [] => "unknown bundler error".to_string(),
        [single] => describe(single),
        many => format!(
            "{} errors: {}",
            many.len(),
            many.iter().map(describe).collect::<Vec<_>>().join("; ")
        ),
    }
}

fn describe(diagnostic: &ExtractedDiagnostic) -> String {
    match (&diagnostic.file, diagnostic.line) {
        (Some(file), Some(line)) => format!(
            "{}: {} ({file}:{line})",
            diagnostic.kind, diagnostic.message
        ),
        _ => format!("{}: {}", diagnostic.kind, diagnostic.message),
    }
}
