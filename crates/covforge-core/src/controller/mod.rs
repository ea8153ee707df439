//! The convergence loop.
//!
//! ```text
//! Measuring ─► Analyzing ─┬─► Satisfied | Plateaued | Exhausted
//!     ▲                   │
//!     └──── Iterating ◄───┘          (any phase) ─► Fatal
//! ```
//!
//! Each iteration compiles the current artifact set (regenerating failed
//! artifacts), runs every binary, merges coverage into one snapshot and
//! decides whether to stop. Otherwise the generator refines the set toward
//! the uncovered sample and the loop repeats.

pub mod layout;
pub mod repair;
pub mod state;

pub use layout::{write_artifact, IterationLayout};
pub use repair::{compile_with_repair, AbandonedLineage, BuildContext, BuildRound, CompiledArtifact, RepairPolicy};
pub use state::{population_variance, Outcome, Phase, StopPolicy};

use crate::completion::{extract_test_body, test_prompt, TextCompletion};
use crate::config::CovforgeConfig;
use crate::coverage::CoverageModelBuilder;
use crate::domain::{CoverageSnapshot, IterationHistory, IterationRecord, TestArtifact};
use crate::harness::{BuildHarness, CoverageCollector, RawCoverage};
use crate::obs::{self, RunSpan};
use crate::reporting;
use crate::scenario::{GapStrategy, ScenarioGenerator};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// TYPES
// ============================================================================

/// Project inputs shared by every compile of a run.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub project_sources: Vec<PathBuf>,
    pub include_paths: Vec<PathBuf>,

    /// Classes in the model table, reported at run start.
    pub classes: usize,
}

/// Terminal outcome plus the full history of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConvergenceReport {
    pub run_id: String,
    pub outcome: Outcome,
    pub history: IterationHistory,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ConvergenceReport {
    /// Line percentage of the last measured iteration.
    pub fn final_percentage(&self) -> f64 {
        self.history.last().map_or(0.0, |r| r.snapshot.percentage)
    }
}

/// Result of one Measuring phase.
struct Measurement {
    snapshot: CoverageSnapshot,
    survivors: Vec<TestArtifact>,
    compiled: usize,
    abandoned: usize,
    regenerated: usize,
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct ConvergenceController<H, C> {
    harness: Arc<H>,
    collector: Arc<C>,
    config: Arc<CovforgeConfig>,
    completion: Option<Arc<dyn TextCompletion>>,
    layout: IterationLayout,
}

impl<H, C> ConvergenceController<H, C>
where
    H: BuildHarness,
    C: CoverageCollector,
{
    pub fn new(harness: Arc<H>, collector: Arc<C>, config: Arc<CovforgeConfig>) -> Self {
        let layout = IterationLayout::new(config.output.dir.clone());
        Self {
            harness,
            collector,
            config,
            completion: None,
            layout,
        }
    }

    /// Offer refinement targets to a text-completion collaborator.
    pub fn with_completion(mut self, completion: Arc<dyn TextCompletion>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn layout(&self) -> &IterationLayout {
        &self.layout
    }

    /// Drive the loop to a terminal outcome.
    ///
    /// Never fails: errors that stop the loop become [`Outcome::Fatal`], and
    /// the report always carries every iteration recorded so far.
    pub async fn run(
        &self,
        generator: &ScenarioGenerator,
        initial: Vec<TestArtifact>,
        context: &RunContext,
    ) -> ConvergenceReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let _span = RunSpan::enter(&run_id);
        let started_at = Utc::now();
        obs::emit_run_started(
            &run_id,
            context.classes,
            initial.len(),
            self.config.convergence.target_coverage,
        );

        let mut history = IterationHistory::new();
        let outcome = self.drive(generator, initial, context, &mut history).await;

        let report = ConvergenceReport {
            run_id,
            outcome,
            history,
            started_at,
            finished_at: Utc::now(),
        };
        if let Err(err) = reporting::write_history(&self.layout, &report) {
            warn!(error = %err, "failed to write history");
        }
        if let Err(err) = reporting::write_summary(&self.layout, &report) {
            warn!(error = %err, "failed to write coverage summary");
        }
        let duration_ms = (report.finished_at - report.started_at)
            .num_milliseconds()
            .max(0) as u64;
        obs::emit_run_finished(
            &report.run_id,
            report.outcome.name(),
            report.history.len(),
            report.final_percentage(),
            duration_ms,
        );
        report
    }

    async fn drive(
        &self,
        generator: &ScenarioGenerator,
        initial: Vec<TestArtifact>,
        context: &RunContext,
        history: &mut IterationHistory,
    ) -> Outcome {
        if let Err(err) = self.layout.prepare(self.config.output.clean_before_run) {
            return Outcome::Fatal {
                reason: format!("cannot prepare output directory: {}", err),
            };
        }
        if initial.is_empty() {
            return Outcome::Fatal {
                reason: "nothing to measure".to_string(),
            };
        }

        let policy = StopPolicy::from(&self.config.convergence);
        let mut current = initial;
        let mut generated = current.len();
        let mut strategies: BTreeSet<String> = BTreeSet::new();
        let mut iteration = 1u32;

        loop {
            debug!(iteration, phase = Phase::Measuring.name(), artifacts = current.len(), "phase");
            let measured = self.measure(generator, current, context, iteration).await;

            debug!(iteration, phase = Phase::Analyzing.name(), "phase");
            history.push(IterationRecord {
                iteration_index: iteration,
                snapshot: measured.snapshot.clone(),
                artifacts_generated_this_round: generated + measured.regenerated,
                strategies_applied: std::mem::take(&mut strategies),
                artifacts_compiled: measured.compiled,
                artifacts_abandoned: measured.abandoned,
                recorded_at: Utc::now(),
            });
            obs::emit_iteration_measured(
                iteration,
                measured.snapshot.percentage,
                measured.compiled,
                measured.abandoned,
            );

            if measured.compiled == 0 {
                return Outcome::Fatal {
                    reason: format!("no artifact compiled in iteration {}", iteration),
                };
            }
            if let Some(outcome) = policy.evaluate(history, iteration) {
                info!(iteration, outcome = outcome.name(), "convergence loop stopped");
                return outcome;
            }

            debug!(iteration, phase = Phase::Iterating.name(), "phase");
            let next = iteration + 1;
            let refinement = generator.refine(&measured.snapshot, next);
            strategies = refinement.strategies.iter().map(|s| s.name().to_string()).collect();
            let mut fresh = refinement.artifacts;
            let completed = self.complete(generator, &measured.snapshot, next).await;
            if !completed.is_empty() {
                strategies.insert(GapStrategy::Completion.name().to_string());
                fresh.extend(completed);
            }

            let mut ids: HashSet<String> = measured.survivors.iter().map(|a| a.id.clone()).collect();
            fresh.retain(|a| ids.insert(a.id.clone()));
            generated = fresh.len();
            current = measured.survivors;
            current.extend(fresh);
            iteration = next;
        }
    }

    async fn measure(
        &self,
        generator: &ScenarioGenerator,
        artifacts: Vec<TestArtifact>,
        context: &RunContext,
        iteration: u32,
    ) -> Measurement {
        let iteration_dir = self.layout.iteration_dir(iteration);
        let workers = self.config.toolchain.worker_count();
        let build = BuildContext {
            iteration_dir: iteration_dir.clone(),
            project_sources: context.project_sources.clone(),
            include_paths: context.include_paths.clone(),
            workers,
        };
        let policy = RepairPolicy {
            max_attempts: self.config.convergence.max_compile_attempts,
        };
        let round = compile_with_repair(self.harness.as_ref(), generator, artifacts, &build, policy).await;

        let reports: Vec<RawCoverage> = stream::iter(round.compiled.iter())
            .map(|compiled| self.execute(compiled))
            .buffer_unordered(workers.max(1))
            .filter_map(|raw| async move { raw })
            .collect()
            .await;

        let snapshot = if round.compiled.is_empty() {
            CoverageSnapshot::empty()
        } else {
            self.coverage_builder(&round.compiled).merge(reports.iter())
        };
        if let Err(err) = reporting::write_snapshot(&iteration_dir, &snapshot) {
            warn!(iteration, error = %err, "failed to write snapshot");
        }

        Measurement {
            snapshot,
            compiled: round.compiled.len(),
            abandoned: round.abandoned.len(),
            regenerated: round.regenerated,
            survivors: round.compiled.into_iter().map(|c| c.artifact).collect(),
        }
    }

    /// Run one binary and collect its coverage. A failing test still
    /// produces coverage; only harness errors drop the report.
    async fn execute(&self, compiled: &CompiledArtifact) -> Option<RawCoverage> {
        match self.harness.run(&compiled.binary_path).await {
            Ok(result) if !result.passed() => debug!(
                artifact = %compiled.artifact.id,
                exit_code = ?result.exit_code,
                timed_out = result.timed_out,
                "test binary did not pass"
            ),
            Ok(_) => {}
            Err(err) => {
                warn!(artifact = %compiled.artifact.id, error = %err, "test binary could not run");
            }
        }
        match self.collector.collect(&compiled.build_dir).await {
            Ok(raw) => Some(raw),
            Err(err) => {
                warn!(artifact = %compiled.artifact.id, error = %err, "coverage collection failed");
                None
            }
        }
    }

    /// Builder that ignores generated tests and stand-in headers.
    fn coverage_builder(&self, compiled: &[CompiledArtifact]) -> CoverageModelBuilder {
        let mut exclude = vec!["/iter-".to_string()];
        for c in compiled {
            exclude.push(c.artifact.file_path.to_string_lossy().into_owned());
            exclude.extend(c.artifact.support_files.iter().map(|(name, _)| name.clone()));
        }
        exclude.sort();
        exclude.dedup();
        CoverageModelBuilder::new(exclude, self.config.synthesis.uncovered_sample)
    }

    /// Ask the completion collaborator for extra bodies.
    ///
    /// The first collaborator error ends the round's requests; template
    /// artifacts are unaffected.
    async fn complete(
        &self,
        generator: &ScenarioGenerator,
        snapshot: &CoverageSnapshot,
        iteration: u32,
    ) -> Vec<TestArtifact> {
        let Some(completion) = self.completion.as_ref() else {
            return Vec::new();
        };
        if !generator.strategies().use_completion {
            return Vec::new();
        }
        let limit = self.config.completion.max_prompts_per_iteration;
        let mut artifacts = Vec::new();
        for target in generator.completion_targets(snapshot, limit) {
            let prompt = test_prompt(&target, &snapshot.uncovered_lines);
            let text = match completion.complete(&prompt).await {
                Ok(text) => text,
                Err(err) => {
                    obs::emit_collaborator_unavailable("completion", &err);
                    break;
                }
            };
            match extract_test_body(&text).and_then(|body| generator.from_completion(&target, &body, iteration)) {
                Some(artifact) => artifacts.push(artifact),
                None => debug!(target = %target, "completion reply had no usable test body"),
            }
        }
        artifacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SynthesisConfig;
    use crate::domain::SourceUnit;
    use crate::extract::StructuralModelExtractor;
    use crate::fakes::{ScriptedCollector, ScriptedCompletion, ScriptedHarness};
    use crate::plan::InstantiationPlanner;
    use crate::scenario::StrategySet;
    use std::path::Path;

    const BOX: &str = "class Box { public: Box(); int getValue(); void resize(int width); };";

    fn generator(use_completion: bool) -> ScenarioGenerator {
        let table = StructuralModelExtractor::default().extract_text(&SourceUnit::header("/project/src/box.h"), BOX);
        let plans = InstantiationPlanner::new(&table, &SynthesisConfig::default(), Path::new("/project"))
            .plan_all();
        let mut strategies = StrategySet::default();
        strategies.use_completion = use_completion;
        ScenarioGenerator::new(Arc::new(table), Arc::new(plans), strategies, Path::new("/project"))
    }

    fn config(out: &Path, max_iterations: u32) -> Arc<CovforgeConfig> {
        let mut config = CovforgeConfig::default();
        config.output.dir = out.to_path_buf();
        config.convergence.max_iterations = max_iterations;
        config.toolchain.workers = 2;
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_plateau_stops_at_third_iteration() {
        let tmp = tempfile::tempdir().unwrap();
        let g = generator(false);
        let controller = ConvergenceController::new(
            Arc::new(ScriptedHarness::default()),
            Arc::new(ScriptedCollector::new(vec![40.0, 41.0, 40.5])),
            config(tmp.path(), 10),
        );
        let report = controller.run(&g, g.generate_for_table(), &RunContext::default()).await;
        assert_eq!(report.outcome, Outcome::Plateaued);
        assert_eq!(report.history.percentages(), vec![40.0, 41.0, 40.5]);
        assert!(controller.layout().iteration_dir(3).join("snapshot.json").exists());
        assert!(controller.layout().history_path().exists());
    }

    #[tokio::test]
    async fn test_refinement_round_records_strategies() {
        let tmp = tempfile::tempdir().unwrap();
        let g = generator(false);
        let controller = ConvergenceController::new(
            Arc::new(ScriptedHarness::default()),
            Arc::new(ScriptedCollector::new(vec![20.0, 50.0])),
            config(tmp.path(), 2),
        );
        let initial = g.generate_for_table();
        let initial_len = initial.len();
        let report = controller.run(&g, initial, &RunContext::default()).await;
        assert_eq!(report.outcome, Outcome::Exhausted);

        let second = &report.history.records()[1];
        assert!(second.strategies_applied.contains("branch"));
        assert!(second.strategies_applied.contains("boundary"));
        assert!(second.strategies_applied.contains("edge_case"));
        assert!(second.artifacts_generated_this_round > 0);
        assert_eq!(
            second.artifacts_compiled,
            initial_len + second.artifacts_generated_this_round
        );
        assert!(controller.layout().iteration_dir(2).join("snapshot.json").exists());
        assert!(controller.layout().summary_path().exists());
    }

    #[tokio::test]
    async fn test_satisfied_on_first_iteration() {
        let tmp = tempfile::tempdir().unwrap();
        let g = generator(false);
        let controller = ConvergenceController::new(
            Arc::new(ScriptedHarness::default()),
            Arc::new(ScriptedCollector::new(vec![85.0])),
            config(tmp.path(), 5),
        );
        let report = controller.run(&g, g.generate_for_table(), &RunContext::default()).await;
        assert_eq!(report.outcome, Outcome::Satisfied);
        assert_eq!(report.history.len(), 1);
        assert_eq!(report.final_percentage(), 85.0);
    }

    #[tokio::test]
    async fn test_nothing_compiles_is_fatal_after_recording() {
        let tmp = tempfile::tempdir().unwrap();
        let g = generator(false);
        let controller = ConvergenceController::new(
            Arc::new(ScriptedHarness::default().failing_everything()),
            Arc::new(ScriptedCollector::new(vec![50.0])),
            config(tmp.path(), 5),
        );
        let report = controller.run(&g, g.generate_for_table(), &RunContext::default()).await;
        assert!(report.outcome.is_fatal());
        assert_eq!(report.history.len(), 1);
        assert_eq!(report.history.records()[0].artifacts_compiled, 0);
        assert_eq!(report.final_percentage(), 0.0);
    }

    #[tokio::test]
    async fn test_empty_initial_set_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let g = generator(false);
        let controller = ConvergenceController::new(
            Arc::new(ScriptedHarness::default()),
            Arc::new(ScriptedCollector::new(vec![50.0])),
            config(tmp.path(), 5),
        );
        let report = controller.run(&g, Vec::new(), &RunContext::default()).await;
        assert_eq!(
            report.outcome,
            Outcome::Fatal {
                reason: "nothing to measure".to_string()
            }
        );
        assert!(report.history.is_empty());
    }

    #[tokio::test]
    async fn test_completion_bodies_join_next_round() {
        let tmp = tempfile::tempdir().unwrap();
        let g = generator(true);
        let completion = Arc::new(ScriptedCompletion::replying(
            "```cpp\nTEST(Box, Smoke) { Box b; b.resize(3); }\n```",
        ));
        let controller = ConvergenceController::new(
            Arc::new(ScriptedHarness::default()),
            Arc::new(ScriptedCollector::new(vec![20.0, 30.0])),
            config(tmp.path(), 2),
        )
        .with_completion(completion.clone());
        let report = controller.run(&g, g.generate_for_table(), &RunContext::default()).await;
        assert_eq!(report.outcome, Outcome::Exhausted);
        assert!(completion.calls() > 0);
        assert!(report.history.records()[1].strategies_applied.contains("completion"));
    }

    #[tokio::test]
    async fn test_unavailable_completion_falls_back_to_templates() {
        let tmp = tempfile::tempdir().unwrap();
        let g = generator(true);
        let completion = Arc::new(ScriptedCompletion::unavailable());
        let controller = ConvergenceController::new(
            Arc::new(ScriptedHarness::default()),
            Arc::new(ScriptedCollector::new(vec![20.0, 30.0])),
            config(tmp.path(), 2),
        )
        .with_completion(completion.clone());
        let report = controller.run(&g, g.generate_for_table(), &RunContext::default()).await;
        assert_eq!(report.outcome, Outcome::Exhausted);
        assert_eq!(completion.calls(), 1);
        let second = &report.history.records()[1];
        assert!(!second.strategies_applied.contains("completion"));
        assert!(second.strategies_applied.contains("edge_case"));
    }
}
