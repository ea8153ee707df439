//! Discovered source files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Role of a discovered file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    Header,
    Source,
}

/// A file found by the scanner. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceUnit {
    /// Absolute or root-relative path to the file.
    pub path: PathBuf,

    /// Header or implementation file.
    pub role: SourceRole,
}

impl SourceUnit {
    pub fn header(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            role: SourceRole::Header,
        }
    }

    pub fn source(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            role: SourceRole::Source,
        }
    }

    pub fn is_header(&self) -> bool {
        self.role == SourceRole::Header
    }

    /// File stem, e.g. `box` for `include/box.hpp`.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }

    /// Path used in `#include` directives: relative to `root` when possible.
    pub fn include_path(&self, root: &Path) -> String {
        let rel = self.path.strip_prefix(root).unwrap_or(&self.path);
        rel.to_string_lossy().replace('\\', "/")
    }
}
