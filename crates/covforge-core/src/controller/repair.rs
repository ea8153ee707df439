//! Compile an artifact set, regenerating failures a bounded number of times.

use crate::harness::{compile_batch, diagnostic_summary, BuildHarness, CompileRequest};
use crate::obs;
use crate::scenario::ScenarioGenerator;
use crate::domain::TestArtifact;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Compile attempts allowed per artifact lineage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RepairPolicy {
    /// Attempts including the first compile.
    pub max_attempts: u32,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Where and how one batch is built.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Each artifact builds in `<iteration_dir>/<artifact-id>/`.
    pub iteration_dir: PathBuf,
    pub project_sources: Vec<PathBuf>,
    pub include_paths: Vec<PathBuf>,
    pub workers: usize,
}

#[derive(Debug, Clone)]
pub struct CompiledArtifact {
    pub artifact: TestArtifact,
    pub binary_path: PathBuf,
    pub build_dir: PathBuf,
    pub attempts: u32,
}

/// A lineage given up on after its last failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AbandonedLineage {
    pub last_id: String,
    pub attempts: u32,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BuildRound {
    /// Sorted by artifact id.
    pub compiled: Vec<CompiledArtifact>,
    pub abandoned: Vec<AbandonedLineage>,

    /// Replacement artifacts created during the round.
    pub regenerated: usize,
}

/// Compile `artifacts`, replacing failures through
/// [`ScenarioGenerator::regenerate`] until each lineage compiles, runs out
/// of attempts, or has no replacement.
///
/// Harness errors (as opposed to compile failures) abandon the lineage at
/// once; a new artifact cannot fix a broken toolchain.
pub async fn compile_with_repair<H>(
    harness: &H,
    generator: &ScenarioGenerator,
    artifacts: Vec<TestArtifact>,
    context: &BuildContext,
    policy: RepairPolicy,
) -> BuildRound
where
    H: BuildHarness + ?Sized,
{
    let mut round = BuildRound::default();
    let mut pending: Vec<(TestArtifact, u32)> = artifacts.into_iter().map(|a| (a, 1)).collect();

    while !pending.is_empty() {
        let attempts: HashMap<String, u32> =
            pending.iter().map(|(a, n)| (a.id.clone(), *n)).collect();
        let requests: Vec<CompileRequest> = pending
            .drain(..)
            .map(|(artifact, _)| CompileRequest {
                build_dir: context.iteration_dir.join(&artifact.id),
                artifact,
                project_sources: context.project_sources.clone(),
                include_paths: context.include_paths.clone(),
            })
            .collect();

        for (request, result) in compile_batch(harness, requests, context.workers).await {
            let attempt = attempts.get(&request.artifact.id).copied().unwrap_or(1);
            let diagnostics = match result {
                Ok(compiled) if compiled.success => {
                    if let Some(binary_path) = compiled.binary_path {
                        round.compiled.push(CompiledArtifact {
                            artifact: request.artifact,
                            binary_path,
                            build_dir: request.build_dir,
                            attempts: attempt,
                        });
                        continue;
                    }
                    "compiler reported success but produced no binary".to_string()
                }
                Ok(compiled) if compiled.timed_out => {
                    format!("error: compile timed out\n{}", compiled.diagnostic_text)
                }
                Ok(compiled) => compiled.diagnostic_text,
                Err(err) => {
                    let summary = err.to_string();
                    obs::emit_compile_failed(&request.artifact.id, attempt, &summary);
                    obs::emit_artifact_abandoned(&request.artifact.id, attempt);
                    round.abandoned.push(AbandonedLineage {
                        last_id: request.artifact.id,
                        attempts: attempt,
                        summary: Some(summary),
                    });
                    continue;
                }
            };

            let summary = diagnostic_summary(&diagnostics);
            obs::emit_compile_failed(
                &request.artifact.id,
                attempt,
                summary.as_deref().unwrap_or("no diagnostic"),
            );
            if attempt < policy.max_attempts {
                if let Some(replacement) = generator.regenerate(&request.artifact, &diagnostics, attempt) {
                    round.regenerated += 1;
                    pending.push((replacement, attempt + 1));
                    continue;
                }
            }
            obs::emit_artifact_abandoned(&request.artifact.id, attempt);
            round.abandoned.push(AbandonedLineage {
                last_id: request.artifact.id,
                attempts: attempt,
                summary,
            });
        }
    }

    round.compiled.sort_by(|a, b| a.artifact.id.cmp(&b.artifact.id));
    round.abandoned.sort_by(|a, b| a.last_id.cmp(&b.last_id));
    round
}
