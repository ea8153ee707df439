//! Build and coverage collaborator boundary.
//!
//! The core never spawns processes itself. A [`BuildHarness`] compiles and
//! runs artifacts and a [`CoverageCollector`] gathers the raw coverage text;
//! `covforge-build` provides the process-backed implementations.

use crate::domain::{Result, TestArtifact};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// REQUESTS AND RESULTS
// ============================================================================

/// Everything needed to compile one artifact.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub artifact: TestArtifact,

    /// Project translation units linked into the test binary.
    pub project_sources: Vec<PathBuf>,
    pub include_paths: Vec<PathBuf>,

    /// Private directory for the artifact's source, objects and binary.
    pub build_dir: PathBuf,
}

/// Outcome of a compile. Failure is data, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompileResult {
    pub success: bool,
    pub diagnostic_text: String,
    pub binary_path: Option<PathBuf>,
    #[serde(default)]
    pub timed_out: bool,
}

impl CompileResult {
    pub fn compiled(binary_path: PathBuf) -> Self {
        Self {
            success: true,
            binary_path: Some(binary_path),
            ..Default::default()
        }
    }

    pub fn failed(diagnostic_text: impl Into<String>) -> Self {
        Self {
            diagnostic_text: diagnostic_text.into(),
            ..Default::default()
        }
    }
}

/// Outcome of running a test binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawExecutionResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl RawExecutionResult {
    pub fn passed(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

/// Unparsed coverage tool output for one build directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawCoverage {
    /// gcov stdout summaries.
    pub summary: String,

    /// Annotated listings as `(file name, contents)`.
    pub annotated: Vec<(String, String)>,

    /// lcov tracefile, when lcov ran.
    pub lcov: Option<String>,
}

impl RawCoverage {
    pub fn is_empty(&self) -> bool {
        self.summary.trim().is_empty()
            && self.annotated.is_empty()
            && self.lcov.as_deref().map_or(true, |l| l.trim().is_empty())
    }
}

// ============================================================================
// TRAITS
// ============================================================================

#[async_trait]
pub trait BuildHarness: Send + Sync {
    /// Compile one artifact into its build directory.
    async fn compile(&self, request: &CompileRequest) -> Result<CompileResult>;

    /// Run a compiled test binary. A non-zero exit is not an error.
    async fn run(&self, binary_path: &Path) -> Result<RawExecutionResult>;
}

#[async_trait]
pub trait CoverageCollector: Send + Sync {
    /// Gather coverage output produced under `build_dir`.
    async fn collect(&self, build_dir: &Path) -> Result<RawCoverage>;
}

// ============================================================================
// HELPERS
// ============================================================================

/// Compile all requests with at most `workers` in flight.
///
/// Results come back in completion order; one failure never blocks the rest.
pub async fn compile_batch<H>(
    harness: &H,
    requests: Vec<CompileRequest>,
    workers: usize,
) -> Vec<(CompileRequest, Result<CompileResult>)>
where
    H: BuildHarness + ?Sized,
{
    stream::iter(requests)
        .map(|request| async move {
            let result = harness.compile(&request).await;
            (request, result)
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await
}

const SUMMARY_LIMIT: usize = 200;

/// First diagnostic line mentioning an error, trimmed and bounded.
pub fn diagnostic_summary(diagnostics: &str) -> Option<String> {
    let line = diagnostics
        .lines()
        .map(str::trim)
        .find(|l| l.to_ascii_lowercase().contains("error"))?;
    if line.chars().count() <= SUMMARY_LIMIT {
        return Some(line.to_string());
    }
    let mut short: String = line.chars().take(SUMMARY_LIMIT).collect();
    short.push_str("...");
    Some(short)
}
