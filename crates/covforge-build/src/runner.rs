//! Timeout-bounded process execution.

use crate::toolchain::CommandConfig;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Result of one command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub name: String,

    /// `None` when the process was killed (signal or timeout).
    pub exit_code: Option<i32>,

    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl CommandResult {
    /// Whether the command exited with code 0 in time.
    pub fn passed(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    /// stderr followed by stdout, for compiler diagnostics.
    pub fn combined_output(&self) -> String {
        match (self.stderr.trim().is_empty(), self.stdout.trim().is_empty()) {
            (false, false) => format!("{}\n{}", self.stderr, self.stdout),
            (false, true) => self.stderr.clone(),
            _ => self.stdout.clone(),
        }
    }
}

/// Runs [`CommandConfig`]s as child processes.
pub struct ProcessRunner;

impl ProcessRunner {
    /// Execute a command and capture its output.
    ///
    /// A timeout kills the child and yields a result with `timed_out` set;
    /// only a command that cannot be spawned is an error.
    pub async fn execute(config: &CommandConfig) -> anyhow::Result<CommandResult> {
        let start = Instant::now();

        if config.command.is_empty() {
            anyhow::bail!("Command {} is empty", config.name);
        }

        let exe = &config.command[0];
        let args = &config.command[1..];

        let mut command = Command::new(exe);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.current_dir {
            command.current_dir(dir);
        }
        let child = command
            .spawn()
            .map_err(|e| anyhow::anyhow!("Command {} could not start {}: {}", config.name, exe, e))?;

        let output = if config.timeout_secs > 0 {
            match tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                child.wait_with_output(),
            )
            .await
            {
                Ok(output) => output?,
                Err(_) => {
                    debug!(
                        command = %config.name,
                        timeout_secs = config.timeout_secs,
                        "command timed out"
                    );
                    return Ok(CommandResult {
                        name: config.name.clone(),
                        exit_code: None,
                        stdout: String::new(),
                        stderr: format!(
                            "Command {} timed out after {} seconds",
                            config.name, config.timeout_secs
                        ),
                        duration_ms: start.elapsed().as_millis() as u64,
                        timed_out: true,
                    });
                }
            }
        } else {
            child.wait_with_output().await?
        };

        Ok(CommandResult {
            name: config.name.clone(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
            timed_out: false,
        })
    }
}
