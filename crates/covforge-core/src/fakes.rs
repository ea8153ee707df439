//! Scripted collaborators for controller and pipeline tests.
//!
//! `ScriptedHarness`, `ScriptedCollector` and `ScriptedCompletion` satisfy
//! the collaborator traits without spawning a compiler, gcov or a model.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::completion::TextCompletion;
use crate::domain::{CovforgeError, Result, ScenarioKind, TestArtifact};
use crate::harness::{
    BuildHarness, CompileRequest, CompileResult, CoverageCollector, RawCoverage, RawExecutionResult,
};

// ---------------------------------------------------------------------------
// ScriptedHarness
// ---------------------------------------------------------------------------

/// Compiles everything except the artifacts it was told to fail.
#[derive(Debug, Default)]
pub struct ScriptedHarness {
    failing_ids: HashSet<String>,
    failing_prefixes: Vec<String>,
    fail_all: bool,
    compiled: Mutex<Vec<String>>,
    runs: AtomicUsize,
}

impl ScriptedHarness {
    /// Fail the artifact with exactly this id.
    pub fn failing(mut self, id: &str) -> Self {
        self.failing_ids.insert(id.to_string());
        self
    }

    /// Fail every artifact whose id starts with `prefix` (whole lineages).
    pub fn failing_prefix(mut self, prefix: &str) -> Self {
        self.failing_prefixes.push(prefix.to_string());
        self
    }

    pub fn failing_everything(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Ids compiled successfully, in completion order.
    pub fn compiled_ids(&self) -> Vec<String> {
        self.compiled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    fn fails(&self, id: &str) -> bool {
        self.fail_all
            || self.failing_ids.contains(id)
            || self.failing_prefixes.iter().any(|p| id.starts_with(p.as_str()))
    }

    /// A minimal request for `id` under `dir`.
    pub fn request(id: &str, dir: &Path) -> CompileRequest {
        CompileRequest {
            artifact: TestArtifact {
                id: id.to_string(),
                class_name: String::new(),
                method_name: id.to_string(),
                scenario_kind: ScenarioKind::NoThrow,
                source_text: String::new(),
                file_path: PathBuf::from(format!("{}.cpp", id)),
                generation: 0,
                parent_id: None,
                iteration: 0,
                support_files: Vec::new(),
                recipe: None,
            },
            project_sources: Vec::new(),
            include_paths: Vec::new(),
            build_dir: dir.join(id),
        }
    }
}

#[async_trait]
impl BuildHarness for ScriptedHarness {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileResult> {
        let id = &request.artifact.id;
        if self.fails(id) {
            return Ok(CompileResult::failed(format!(
                "{}.cpp:1:1: error: scripted failure for {}",
                id, id
            )));
        }
        self.compiled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(id.clone());
        Ok(CompileResult::compiled(request.build_dir.join(id)))
    }

    async fn run(&self, _binary_path: &Path) -> Result<RawExecutionResult> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(RawExecutionResult {
            exit_code: Some(0),
            stdout: "[  PASSED  ] 1 test.".to_string(),
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedCollector
// ---------------------------------------------------------------------------

/// Reports a scripted line percentage per iteration.
///
/// The iteration is read from the `iter-NNN` component of the build
/// directory; iterations past the script repeat its last entry.
#[derive(Debug)]
pub struct ScriptedCollector {
    percentages: Vec<f64>,
    file: String,
    total: u64,
}

impl ScriptedCollector {
    pub fn new(percentages: Vec<f64>) -> Self {
        Self {
            percentages,
            file: "/project/src/box.cpp".to_string(),
            total: 1000,
        }
    }

    fn iteration_of(build_dir: &Path) -> Option<usize> {
        build_dir.components().find_map(|c| {
            c.as_os_str()
                .to_str()
                .and_then(|s| s.strip_prefix("iter-"))
                .and_then(|n| n.parse().ok())
        })
    }
}

#[async_trait]
impl CoverageCollector for ScriptedCollector {
    async fn collect(&self, build_dir: &Path) -> Result<RawCoverage> {
        let index = Self::iteration_of(build_dir).unwrap_or(1).max(1) - 1;
        let Some(pct) = self
            .percentages
            .get(index)
            .or_else(|| self.percentages.last())
        else {
            return Ok(RawCoverage::default());
        };
        let covered = ((pct / 100.0) * self.total as f64).round() as u64;
        let mut annotated = format!("        -:    0:Source:{}\n", self.file);
        for line in 1..=self.total {
            let count = if line <= covered { "1".to_string() } else { "#####".to_string() };
            annotated.push_str(&format!("{:>9}:{:>5}:    if (x > {}) {{ step(); }}\n", count, line, line));
        }
        Ok(RawCoverage {
            annotated: vec![("box.cpp.gcov".to_string(), annotated)],
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedCompletion
// ---------------------------------------------------------------------------

/// Returns a fixed reply, or fails when built with [`ScriptedCompletion::unavailable`].
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| CovforgeError::Completion("connection refused".to_string()))
    }
}
