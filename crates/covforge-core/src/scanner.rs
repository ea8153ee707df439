//! Discovery of candidate C/C++ files under the configured roots.

use crate::config::ProjectConfig;
use crate::domain::{ExtractionError, SourceRole, SourceUnit};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx"];
const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx"];

/// Classify a path by extension.
pub fn role_for(path: &Path) -> Option<SourceRole> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if HEADER_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceRole::Header)
    } else if SOURCE_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceRole::Source)
    } else {
        None
    }
}

/// Walks project roots and collects headers and sources.
#[derive(Debug, Clone)]
pub struct SourceScanner {
    exclude_dirs: BTreeSet<String>,
}

impl SourceScanner {
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            exclude_dirs: config.exclude_dirs.iter().cloned().collect(),
        }
    }

    fn skip_dir(&self, name: &str) -> bool {
        (name.starts_with('.') && name.len() > 1) || self.exclude_dirs.contains(name)
    }

    /// Scan all roots. Missing roots are logged and skipped.
    ///
    /// The result is sorted by path and free of duplicates.
    pub fn scan(&self, roots: &[PathBuf]) -> Vec<SourceUnit> {
        let mut units = BTreeSet::new();
        for root in roots {
            match self.scan_root(root) {
                Ok(found) => units.extend(found),
                Err(e) => warn!(event = "scan.root_skipped", error = %e),
            }
        }
        units.into_iter().collect()
    }

    fn scan_root(&self, root: &Path) -> Result<Vec<SourceUnit>, ExtractionError> {
        if !root.exists() {
            return Err(ExtractionError::MissingRoot(root.to_path_buf()));
        }
        let mut found = Vec::new();
        let walker = WalkDir::new(root).follow_links(false).into_iter();
        for entry in walker.filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !self.skip_dir(&e.file_name().to_string_lossy())
        }) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(role) = role_for(entry.path()) {
                found.push(SourceUnit {
                    path: entry.path().to_path_buf(),
                    role,
                });
            }
        }
        debug!(root = %root.display(), files = found.len(), "scanned root");
        Ok(found)
    }
}

/// Distinct directories containing headers, plus extra include dirs.
pub fn include_dirs(units: &[SourceUnit], extra: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs: BTreeSet<PathBuf> = extra.iter().cloned().collect();
    for unit in units.iter().filter(|u| u.is_header()) {
        if let Some(parent) = unit.path.parent() {
            dirs.insert(parent.to_path_buf());
        }
    }
    dirs.into_iter().collect()
}

/// Implementation files linked into every test binary.
///
/// Files whose stem contains `main` are left out; they would clash with
/// the test runner's entry point.
pub fn project_sources(units: &[SourceUnit]) -> Vec<PathBuf> {
    units
        .iter()
        .filter(|u| u.role == SourceRole::Source)
        .filter(|u| !u.stem().to_ascii_lowercase().contains("main"))
        .map(|u| u.path.clone())
        .collect()
}
