//! gcov (and optionally lcov) coverage collection.

use crate::runner::ProcessRunner;
use crate::toolchain::{gcov_command, lcov_command};
use async_trait::async_trait;
use covforge_core::config::ToolchainConfig;
use covforge_core::domain::{CovforgeError, Result};
use covforge_core::harness::{CoverageCollector, RawCoverage};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const LCOV_INFO: &str = "coverage.info";

/// Runs gcov inside an artifact's build directory and gathers its output.
#[derive(Debug, Clone)]
pub struct GcovCollector {
    toolchain: ToolchainConfig,
}

impl GcovCollector {
    pub fn new(toolchain: ToolchainConfig) -> Self {
        Self { toolchain }
    }
}

/// Files under `dir` with the given extension, sorted.
fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(3)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == extension))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Annotated listings as `(file name, contents)`.
fn read_listings(dir: &Path) -> Vec<(String, String)> {
    files_with_extension(dir, "gcov")
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            match std::fs::read(&path) {
                Ok(bytes) => Some((name, String::from_utf8_lossy(&bytes).into_owned())),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "unreadable gcov listing");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl CoverageCollector for GcovCollector {
    async fn collect(&self, build_dir: &Path) -> Result<RawCoverage> {
        let build_dir = build_dir.canonicalize()?;
        let gcda = files_with_extension(&build_dir, "gcda");
        if gcda.is_empty() {
            debug!(dir = %build_dir.display(), "no gcda files");
            return Ok(RawCoverage::default());
        }

        let gcov = ProcessRunner::execute(&gcov_command(&self.toolchain, &build_dir, &gcda))
            .await
            .map_err(|e| CovforgeError::CollaboratorUnavailable {
                name: self.toolchain.gcov.clone(),
                detail: format!("{:#}", e),
            })?;
        if !gcov.passed() {
            warn!(
                dir = %build_dir.display(),
                exit_code = ?gcov.exit_code,
                timed_out = gcov.timed_out,
                "gcov reported a failure"
            );
        }

        let lcov = match &self.toolchain.lcov {
            Some(lcov) => self.capture_lcov(lcov, &build_dir).await,
            None => None,
        };

        Ok(RawCoverage {
            summary: gcov.stdout,
            annotated: read_listings(&build_dir),
            lcov,
        })
    }
}

impl GcovCollector {
    async fn capture_lcov(&self, lcov: &str, build_dir: &Path) -> Option<String> {
        let info = build_dir.join(LCOV_INFO);
        let command = lcov_command(lcov, build_dir, &info, self.toolchain.coverage_timeout_secs);
        match ProcessRunner::execute(&command).await {
            Ok(result) if result.passed() => std::fs::read_to_string(&info).ok(),
            Ok(result) => {
                warn!(exit_code = ?result.exit_code, timed_out = result.timed_out, "lcov capture failed");
                None
            }
            Err(err) => {
                warn!(error = %format!("{:#}", err), "lcov unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_gcda_means_empty_coverage() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("T.cpp"), "").unwrap();
        let raw = GcovCollector::new(ToolchainConfig::default())
            .collect(tmp.path())
            .await
            .unwrap();
        assert!(raw.is_empty());
    }

    #[test]
    fn test_listings_are_read_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("b.cpp.gcov"), "        1:    1:int b;\n").unwrap();
        std::fs::write(tmp.path().join("a.h.gcov"), "    #####:    2:int a;\n").unwrap();
        std::fs::write(tmp.path().join("a.gcda"), "").unwrap();
        let listings = read_listings(tmp.path());
        let names: Vec<&str> = listings.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a.h.gcov", "b.cpp.gcov"]);
    }
}
