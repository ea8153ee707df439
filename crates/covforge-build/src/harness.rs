//! GCC/Clang-style build harness.

use crate::runner::ProcessRunner;
use crate::toolchain::{compile_command, CommandConfig, ToolStage};
use async_trait::async_trait;
use covforge_core::config::ToolchainConfig;
use covforge_core::controller::write_artifact;
use covforge_core::domain::{CovforgeError, Result};
use covforge_core::harness::{BuildHarness, CompileRequest, CompileResult, RawExecutionResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Compiles each artifact with `--coverage` into its own build directory.
#[derive(Debug, Clone)]
pub struct GccHarness {
    toolchain: ToolchainConfig,
}

impl GccHarness {
    pub fn new(toolchain: ToolchainConfig) -> Self {
        Self { toolchain }
    }

    pub fn toolchain(&self) -> &ToolchainConfig {
        &self.toolchain
    }
}

fn harness_error(err: anyhow::Error) -> CovforgeError {
    CovforgeError::Harness(format!("{:#}", err))
}

/// Absolute form of `dir`, creating it first.
fn prepare_dir(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    Ok(dir.canonicalize()?)
}

#[async_trait]
impl BuildHarness for GccHarness {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileResult> {
        let build_dir = prepare_dir(&request.build_dir)?;
        let source = write_artifact(&build_dir, &request.artifact)?;
        let binary = build_dir.join(&request.artifact.id);

        let command = compile_command(
            &self.toolchain,
            &source,
            &binary,
            &request.project_sources,
            &request.include_paths,
        );
        let result = ProcessRunner::execute(&command).await.map_err(harness_error)?;
        debug!(
            artifact = %request.artifact.id,
            exit_code = ?result.exit_code,
            duration_ms = result.duration_ms,
            "compiled"
        );

        if result.timed_out {
            return Ok(CompileResult {
                success: false,
                diagnostic_text: result.stderr,
                binary_path: None,
                timed_out: true,
            });
        }
        if !result.passed() {
            return Ok(CompileResult::failed(result.combined_output()));
        }
        if !binary.exists() {
            return Ok(CompileResult::failed(format!(
                "error: {} exited successfully but produced no binary",
                self.toolchain.compiler
            )));
        }
        Ok(CompileResult::compiled(binary))
    }

    async fn run(&self, binary_path: &Path) -> Result<RawExecutionResult> {
        let mut command = CommandConfig::for_stage(
            ToolStage::RunTests,
            vec![binary_path.to_string_lossy().into_owned()],
            self.toolchain.run_timeout_secs,
        );
        if let Some(dir) = binary_path.parent() {
            command = command.in_dir(dir);
        }
        let result = ProcessRunner::execute(&command).await.map_err(harness_error)?;
        Ok(RawExecutionResult {
            exit_code: result.exit_code,
            stdout: result.stdout,
            stderr: result.stderr,
            timed_out: result.timed_out,
        })
    }
}
