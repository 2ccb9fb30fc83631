//! Type-checking configuration discovery.
//!
//! Declaration generation reads a small subset of `tsconfig.json`. The file is
//! JSON with comments and trailing commas, so it is normalized before parsing.
//! Relative `extends` chains are followed; package `extends` are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, Result};

const MAX_EXTENDS_DEPTH: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TsConfig {
    /// File the settings came from; `None` means built-in defaults.
    pub path: Option<PathBuf>,
    /// `compilerOptions.stripInternal`
    pub strip_internal: bool,
}

/// Find the tsconfig used for declaration generation.
///
/// An explicit path must exist. Otherwise `<root>/tsconfig.json` is used when
/// present, falling back to defaults.
pub fn discover_tsconfig(root: &Path, explicit: Option<&Path>) -> Result<TsConfig> {
    let path = match explicit {
        Some(path) => {
            let path = crate::resolve_path(root, path);
            if !path.is_file() {
                return Err(ConfigError::TsconfigNotFound(path));
            }
            path
        }
        None => {
            let candidate = root.join("tsconfig.json");
            if !candidate.is_file() {
                debug!("no tsconfig.json found, using default declaration settings");
                return Ok(TsConfig::default());
            }
            candidate
        }
    };

    let strip_internal = read_strip_internal(&path, 0)?.unwrap_or(false);
    Ok(TsConfig {
        path: Some(path),
        strip_internal,
    })
}

fn read_strip_internal(path: &Path, depth: usize) -> Result<Option<bool>> {
    let value = parse_jsonc_file(path)?;

    if let Some(strip) = value
        .get("compilerOptions")
        .and_then(|opts| opts.get("stripInternal"))
        .and_then(Value::as_bool)
    {
        return Ok(Some(strip));
    }

    let Some(extends) = value.get("extends").and_then(Value::as_str) else {
        return Ok(None);
    };
    if depth >= MAX_EXTENDS_DEPTH || !(extends.starts_with('.') || extends.starts_with('/')) {
        return Ok(None);
    }

    let base = path.parent().unwrap_or(Path::new("."));
    let parent = extends_path(&base.join(extends).clean());
    if !parent.is_file() {
        return Err(ConfigError::TsconfigNotFound(parent));
    }
    read_strip_internal(&parent, depth + 1)
}

/// `./tsconfig.base` means `./tsconfig.base.json`; a name already ending in
/// `.json`, or an existing file, is taken as is.
fn extends_path(target: &Path) -> PathBuf {
    if target.to_string_lossy().ends_with(".json") {
        return target.to_path_buf();
    }
    let with_json = PathBuf::from(format!("{}.json", target.display()));
    if with_json.is_file() || !target.is_file() {
        with_json
    } else {
        target.to_path_buf()
    }
}

fn parse_jsonc_file(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&strip_jsonc(&content)).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Remove comments and trailing commas so `serde_json` accepts tsconfig files.
pub(crate) fn strip_jsonc(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }

    remove_trailing_commas(&out)
}

fn remove_trailing_commas(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&escaped) = chars.get(i + 1) {
                    out.push(escaped);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if !matches!(next, Some('}') | Some(']')) {
                out.push(c);
            }
        } else {
            out.push(c);
        }
        i += 1;
    }

    out
}
