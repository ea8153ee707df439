//! Startup checks for required collaborators.

use crate::runner::ProcessRunner;
use crate::toolchain::{CommandConfig, ToolStage};
use covforge_core::config::ToolchainConfig;
use covforge_core::domain::{CovforgeError, Result};
use covforge_core::obs;
use tracing::info;

const PROBE_TIMEOUT_SECS: u64 = 10;

/// First line of each tool's `--version` output.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolchainReport {
    pub compiler: String,
    pub gcov: String,

    /// `None` when lcov is not configured or did not answer.
    pub lcov: Option<String>,
}

/// Run `<tool> --version`, returning the first output line.
pub async fn probe_tool(tool: &str) -> Result<String> {
    let command = CommandConfig::for_stage(
        ToolStage::Probe,
        vec![tool.to_string(), "--version".to_string()],
        PROBE_TIMEOUT_SECS,
    );
    let unavailable = |detail: String| CovforgeError::CollaboratorUnavailable {
        name: tool.to_string(),
        detail,
    };
    let result = ProcessRunner::execute(&command)
        .await
        .map_err(|e| unavailable(format!("{:#}", e)))?;
    if !result.passed() {
        return Err(unavailable(format!(
            "`{} --version` exited with {:?}",
            tool, result.exit_code
        )));
    }
    let text = if result.stdout.trim().is_empty() {
        result.stderr
    } else {
        result.stdout
    };
    Ok(text.lines().next().unwrap_or_default().trim().to_string())
}

/// Check the compiler and gcov before any iteration runs.
///
/// A missing compiler or gcov is fatal; a missing lcov only disables it.
pub async fn probe_toolchain(toolchain: &ToolchainConfig) -> Result<ToolchainReport> {
    let compiler = probe_tool(&toolchain.compiler).await?;
    let gcov = probe_tool(&toolchain.gcov).await?;
    let lcov = match &toolchain.lcov {
        Some(tool) => match probe_tool(tool).await {
            Ok(version) => Some(version),
            Err(err) => {
                obs::emit_collaborator_unavailable(tool, &err);
                None
            }
        },
        None => None,
    };
    info!(compiler = %compiler, gcov = %gcov, lcov = ?lcov, "toolchain probed");
    Ok(ToolchainReport { compiler, gcov, lcov })
}
