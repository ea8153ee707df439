//! External tool invocations used by the build harness.

use covforge_core::config::ToolchainConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kinds of external command covforge runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ToolStage {
    /// <compiler> ... --coverage
    Compile,

    /// The generated test binary.
    RunTests,

    /// gcov -b -c <gcda files>
    Gcov,

    /// lcov --capture
    Lcov,

    /// `--version` checks at startup.
    Probe,
}

impl ToolStage {
    pub fn name(&self) -> &'static str {
        match self {
            ToolStage::Compile => "compile",
            ToolStage::RunTests => "run_tests",
            ToolStage::Gcov => "gcov",
            ToolStage::Lcov => "lcov",
            ToolStage::Probe => "probe",
        }
    }
}

/// One command to execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Label used in logs and errors.
    pub name: String,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Working directory; the current one when unset.
    pub current_dir: Option<PathBuf>,

    /// Timeout in seconds; 0 disables it.
    pub timeout_secs: u64,
}

impl CommandConfig {
    pub fn for_stage(stage: ToolStage, command: Vec<String>, timeout_secs: u64) -> Self {
        Self::custom(stage.name().to_string(), command, timeout_secs)
    }

    pub fn custom(name: String, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name,
            command,
            current_dir: None,
            timeout_secs,
        }
    }

    /// Run the command inside `dir`.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// `<compiler> -std=<std> <flags> -o <bin> <test.cpp> <sources...> -I<dirs...>
/// -L<dirs...> -l<libs...> --coverage`
pub fn compile_command(
    toolchain: &ToolchainConfig,
    test_source: &Path,
    binary: &Path,
    project_sources: &[PathBuf],
    include_paths: &[PathBuf],
) -> CommandConfig {
    let mut command = vec![toolchain.compiler.clone(), format!("-std={}", toolchain.std)];
    command.extend(toolchain.extra_flags.iter().cloned());
    command.push("-o".to_string());
    command.push(path_arg(binary));
    command.push(path_arg(test_source));
    command.extend(project_sources.iter().map(|p| path_arg(p)));
    command.extend(include_paths.iter().map(|p| format!("-I{}", p.display())));
    command.extend(toolchain.lib_dirs.iter().map(|p| format!("-L{}", p.display())));
    command.extend(toolchain.libs.iter().map(|l| format!("-l{}", l)));
    command.push("--coverage".to_string());
    CommandConfig::for_stage(ToolStage::Compile, command, toolchain.compile_timeout_secs)
}

/// `gcov -b -c <gcda files>`, run inside `build_dir`.
pub fn gcov_command(toolchain: &ToolchainConfig, build_dir: &Path, gcda_files: &[PathBuf]) -> CommandConfig {
    let mut command = vec![toolchain.gcov.clone(), "-b".to_string(), "-c".to_string()];
    command.extend(gcda_files.iter().map(|p| path_arg(p)));
    CommandConfig::for_stage(ToolStage::Gcov, command, toolchain.coverage_timeout_secs).in_dir(build_dir)
}

/// `lcov --capture --directory <dir> --output-file <info>`.
pub fn lcov_command(lcov: &str, build_dir: &Path, info: &Path, timeout_secs: u64) -> CommandConfig {
    let command = vec![
        lcov.to_string(),
        "--capture".to_string(),
        "--directory".to_string(),
        path_arg(build_dir),
        "--output-file".to_string(),
        path_arg(info),
    ];
    CommandConfig::for_stage(ToolStage::Lcov, command, timeout_secs).in_dir(build_dir)
}
