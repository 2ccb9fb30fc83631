//! Files produced by a build, held in memory until publication.

use std::collections::BTreeMap;

use bale_config::Format;
use serde::Serialize;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "format", rename_all = "snake_case")]
pub enum ArtifactKind {
    Bundle(Format),
    SourceMap(Format),
    Declarations,
}

impl ArtifactKind {
    pub fn label(self) -> String {
        match self {
            ArtifactKind::Bundle(format) => format.as_str().to_string(),
            ArtifactKind::SourceMap(format) => format!("{} map", format.as_str()),
            ArtifactKind::Declarations => "types".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Artifact {
    /// Path relative to the output directory.
    pub file_name: String,
    pub kind: ArtifactKind,
    pub contents: Vec<u8>,
}

impl Artifact {
    pub fn bundle(format: Format, file_name: String, code: String) -> Self {
        Self {
            file_name,
            kind: ArtifactKind::Bundle(format),
            contents: code.into_bytes(),
        }
    }

    pub fn source_map(format: Format, file_name: String, map: String) -> Self {
        Self {
            file_name,
            kind: ArtifactKind::SourceMap(format),
            contents: map.into_bytes(),
        }
    }

    pub fn declarations(file_name: String, text: String) -> Self {
        Self {
            file_name,
            kind: ArtifactKind::Declarations,
            contents: text.into_bytes(),
        }
    }

    pub fn size(&self) -> usize {
        self.contents.len()
    }

    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.contents).ok()
    }
}

/// Artifacts keyed by file name, so iteration order is stable.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    artifacts: BTreeMap<String, Artifact>,
}

impl ArtifactSet {
    /// Add an artifact. Two artifacts may not share a file name.
    pub fn insert(&mut self, artifact: Artifact) -> Result<()> {
        if self.artifacts.contains_key(&artifact.file_name) {
            return Err(Error::DuplicateArtifact(artifact.file_name));
        }
        self.artifacts.insert(artifact.file_name.clone(), artifact);
        Ok(())
    }

    pub fn get(&self, file_name: &str) -> Option<&Artifact> {
        self.artifacts.get(file_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn bundles(&self) -> impl Iterator<Item = (Format, &Artifact)> {
        self.artifacts.values().filter_map(|a| match a.kind {
            ArtifactKind::Bundle(format) => Some((format, a)),
            _ => None,
        })
    }
}
