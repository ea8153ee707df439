//! On-disk layout of a run.
//!
//! ```text
//! <output>/
//!   history.json  history.digest  coverage_summary.md
//!   iter-001/
//!     snapshot.json
//!     <artifact-id>/  <artifact-id>.cpp  stub_*.h  binary  *.gcda  *.gcov
//! ```

use crate::domain::{Result, TestArtifact};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const HISTORY_FILE: &str = "history.json";
pub const DIGEST_FILE: &str = "history.digest";
pub const SUMMARY_FILE: &str = "coverage_summary.md";
pub const SNAPSHOT_FILE: &str = "snapshot.json";

#[derive(Debug, Clone)]
pub struct IterationLayout {
    root: PathBuf,
}

impl IterationLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn iteration_dir(&self, iteration: u32) -> PathBuf {
        self.root.join(format!("iter-{:03}", iteration))
    }

    pub fn artifact_dir(&self, iteration: u32, artifact_id: &str) -> PathBuf {
        self.iteration_dir(iteration).join(artifact_id)
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }

    pub fn digest_path(&self) -> PathBuf {
        self.root.join(DIGEST_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.root.join(SUMMARY_FILE)
    }

    /// Create the root; with `clean`, remove output of earlier runs.
    ///
    /// Only covforge's own entries are removed, never unrelated files.
    pub fn prepare(&self, clean: bool) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        if !clean {
            return Ok(());
        }
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if name.starts_with("iter-") && path.is_dir() {
                debug!(path = %path.display(), "removing previous iteration");
                std::fs::remove_dir_all(&path)?;
            } else if [HISTORY_FILE, DIGEST_FILE, SUMMARY_FILE].contains(&name.as_str()) {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

/// Write an artifact's source and stand-in headers into `dir`.
///
/// Returns the path of the written source file.
pub fn write_artifact(dir: &Path, artifact: &TestArtifact) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    for (name, text) in &artifact.support_files {
        std::fs::write(dir.join(name), text)?;
    }
    let path = dir.join(&artifact.file_path);
    std::fs::write(&path, &artifact.source_text)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedHarness;

    #[test]
    fn test_paths() {
        let layout = IterationLayout::new("/out");
        assert_eq!(layout.iteration_dir(7), PathBuf::from("/out/iter-007"));
        assert_eq!(
            layout.artifact_dir(12, "Box_getValue_NoThrow"),
            PathBuf::from("/out/iter-012/Box_getValue_NoThrow")
        );
        assert_eq!(layout.history_path(), PathBuf::from("/out/history.json"));
    }

    #[test]
    fn test_prepare_cleans_only_own_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = IterationLayout::new(tmp.path().join("out"));
        std::fs::create_dir_all(layout.iteration_dir(1)).unwrap();
        std::fs::write(layout.history_path(), "{}").unwrap();
        std::fs::write(layout.root().join("notes.txt"), "keep").unwrap();

        layout.prepare(false).unwrap();
        assert!(layout.iteration_dir(1).exists());

        layout.prepare(true).unwrap();
        assert!(!layout.iteration_dir(1).exists());
        assert!(!layout.history_path().exists());
        assert!(layout.root().join("notes.txt").exists());
    }

    #[test]
    fn test_write_artifact_with_support_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mut artifact = ScriptedHarness::request("Box_x_NoThrow", tmp.path()).artifact;
        artifact.source_text = "TEST(A, B) {}\n".to_string();
        artifact.support_files = vec![("stub_State.h".to_string(), "#pragma once\n".to_string())];
        let path = write_artifact(tmp.path(), &artifact).unwrap();
        assert_eq!(path, tmp.path().join("Box_x_NoThrow.cpp"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "TEST(A, B) {}\n");
        assert!(tmp.path().join("stub_State.h").exists());
    }
}
