//! Immutable run configuration.
//!
//! A [`CovforgeConfig`] is loaded once (TOML file, then environment
//! overrides, then CLI flags) and shared by reference with every stage.
//! Nothing reads configuration from globals.

use crate::domain::{CovforgeError, Result, ScenarioKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    /// Directories scanned for headers and sources.
    pub roots: Vec<PathBuf>,

    /// Extra include directories passed to the compiler.
    pub include_dirs: Vec<PathBuf>,

    /// Directory names skipped during scanning.
    pub exclude_dirs: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from(".")],
            include_dirs: Vec::new(),
            exclude_dirs: ["build", "third_party", "external", "vendor", ".git", "output"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Compiler and coverage tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolchainConfig {
    pub compiler: String,
    pub std: String,
    pub extra_flags: Vec<String>,
    pub lib_dirs: Vec<PathBuf>,
    pub libs: Vec<String>,
    pub gcov: String,

    /// Optional lcov binary; when unset only gcov output is parsed.
    pub lcov: Option<String>,

    pub compile_timeout_secs: u64,
    pub run_timeout_secs: u64,
    pub coverage_timeout_secs: u64,

    /// Parallel compile workers; 0 means one per available core.
    pub workers: usize,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: "g++".to_string(),
            std: "c++17".to_string(),
            extra_flags: Vec::new(),
            lib_dirs: Vec::new(),
            libs: vec![
                "gtest".to_string(),
                "gtest_main".to_string(),
                "pthread".to_string(),
            ],
            gcov: "gcov".to_string(),
            lcov: None,
            compile_timeout_secs: 60,
            run_timeout_secs: 30,
            coverage_timeout_secs: 60,
            workers: 0,
        }
    }
}

impl ToolchainConfig {
    /// Effective worker count.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Stop conditions of the convergence loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConvergenceConfig {
    /// Target line coverage percentage.
    pub target_coverage: f64,

    pub max_iterations: u32,

    /// Number of trailing snapshots considered for plateau detection.
    pub plateau_window: usize,

    /// Population variance below which the window counts as a plateau.
    pub plateau_variance: f64,

    /// Compile attempts per artifact lineage, the first compile included.
    pub max_compile_attempts: u32,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            target_coverage: 80.0,
            max_iterations: 3,
            plateau_window: 3,
            plateau_variance: 1.0,
            max_compile_attempts: 3,
        }
    }
}

/// Knobs of the planner, synthesizer and scenario generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Constructors with more parameters than this are infeasible.
    pub constructor_param_ceiling: usize,

    /// Classes allowed to receive a synthesized stand-in subtype.
    pub substitution_classes: Vec<String>,

    pub max_substitute_overrides: usize,

    pub max_free_functions_per_header: usize,

    /// Size of the uncovered-line sample kept in snapshots and prompts.
    pub uncovered_sample: usize,

    /// Enabled scenario kinds; empty enables the full catalogue.
    pub scenario_kinds: Vec<ScenarioKind>,

    pub include_free_functions: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            constructor_param_ceiling: 5,
            substitution_classes: Vec::new(),
            max_substitute_overrides: 10,
            max_free_functions_per_header: 20,
            uncovered_sample: 20,
            scenario_kinds: Vec::new(),
            include_free_functions: true,
        }
    }
}

/// Generative text-completion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,

    /// Upper bound on completion requests per refinement round.
    pub max_prompts_per_iteration: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:11434".to_string(),
            model: "qwen2.5-coder:1.5b".to_string(),
            timeout_secs: 60,
            max_prompts_per_iteration: 3,
        }
    }
}

/// Where generated files go.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub clean_before_run: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            clean_before_run: true,
        }
    }
}

/// Complete covforge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CovforgeConfig {
    pub project: ProjectConfig,
    pub toolchain: ToolchainConfig,
    pub convergence: ConvergenceConfig,
    pub synthesis: SynthesisConfig,
    pub completion: CompletionConfig,
    pub output: OutputConfig,
}

impl CovforgeConfig {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CovforgeError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Apply `COVFORGE_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("COVFORGE_TARGET") {
            self.convergence.target_coverage = v
                .parse()
                .map_err(|_| CovforgeError::Config(format!("COVFORGE_TARGET: {}", v)))?;
        }
        if let Some(v) = lookup("COVFORGE_MAX_ITERATIONS") {
            self.convergence.max_iterations = v
                .parse()
                .map_err(|_| CovforgeError::Config(format!("COVFORGE_MAX_ITERATIONS: {}", v)))?;
        }
        if let Some(v) = lookup("COVFORGE_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("COVFORGE_LLM_ENDPOINT") {
            self.completion.endpoint = v;
            self.completion.enabled = true;
        }
        if let Some(v) = lookup("COVFORGE_LLM_MODEL") {
            self.completion.model = v;
        }
        Ok(())
    }

    /// Reject values the controller cannot work with.
    pub fn validate(&self) -> Result<()> {
        let c = &self.convergence;
        if !(0.0..=100.0).contains(&c.target_coverage) {
            return Err(CovforgeError::Config(format!(
                "target_coverage must be within 0..=100, got {}",
                c.target_coverage
            )));
        }
        if c.max_iterations == 0 {
            return Err(CovforgeError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if c.plateau_window < 2 {
            return Err(CovforgeError::Config(
                "plateau_window must be at least 2".to_string(),
            ));
        }
        if c.plateau_variance < 0.0 {
            return Err(CovforgeError::Config(
                "plateau_variance must not be negative".to_string(),
            ));
        }
        if c.max_compile_attempts == 0 {
            return Err(CovforgeError::Config(
                "max_compile_attempts must be at least 1".to_string(),
            ));
        }
        if self.project.roots.is_empty() {
            return Err(CovforgeError::Config("no project roots".to_string()));
        }
        Ok(())
    }

    /// Primary project root, used for include paths in generated tests.
    pub fn primary_root(&self) -> PathBuf {
        self.project
            .roots
            .first()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
