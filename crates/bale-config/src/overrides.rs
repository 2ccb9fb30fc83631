//! Command-line overrides, merged as the highest-priority configuration layer.
//!
//! Every field is optional and omitted from serialization when unset, so only
//! the values the user actually passed replace lower layers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::{Format, Reporter};

#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    pub build: BuildOverrides,
    pub test: TestOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<Format>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<Vec<String>>,
    /// Merged key by key into `build.globals`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub globals: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sourcemap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_out_dir: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dts: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TestOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_timeout_ms: Option<u64>,
    pub coverage: CoverageOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CoverageOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporters: Option<Vec<Reporter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports_dir: Option<PathBuf>,
}
