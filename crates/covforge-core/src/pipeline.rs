//! Analysis front half: scan, extract, plan and generate the initial set.

use crate::config::CovforgeConfig;
use crate::controller::{write_artifact, RunContext};
use crate::domain::{ModelTable, Result, SourceUnit, TestArtifact};
use crate::extract::{ExtractOptions, StructuralModelExtractor};
use crate::plan::{InstantiationPlanner, PlanCache};
use crate::scanner::{include_dirs, project_sources, SourceScanner};
use crate::scenario::{ScenarioGenerator, StrategySet};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Everything the convergence loop needs about a project.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub units: Vec<SourceUnit>,
    pub table: Arc<ModelTable>,
    pub plans: Arc<PlanCache>,
    pub generator: ScenarioGenerator,
    pub initial: Vec<TestArtifact>,
    pub context: RunContext,
}

impl Analysis {
    /// Scan the configured roots and build the initial artifact set.
    pub async fn prepare(config: &CovforgeConfig) -> Result<Self> {
        let root = config.primary_root();
        let units = SourceScanner::new(&config.project).scan(&config.project.roots);
        let extractor = StructuralModelExtractor::new(ExtractOptions::from(&config.synthesis));
        let table = extractor.extract_concurrent(&units).await;
        let plans = InstantiationPlanner::new(&table, &config.synthesis, &root).plan_all();
        info!(
            units = units.len(),
            classes = table.class_count(),
            free_functions = table.free_functions.len(),
            feasible = plans.feasible_count(),
            stand_ins = plans.stand_ins().len(),
            "project analysed"
        );

        let table = Arc::new(table);
        let plans = Arc::new(plans);
        let strategies = StrategySet::from_config(&config.synthesis, &config.completion);
        let generator = ScenarioGenerator::new(table.clone(), plans.clone(), strategies, &root);
        let initial = generator.generate_for_table();

        let mut extra = config.project.roots.clone();
        extra.extend(config.project.include_dirs.iter().cloned());
        let context = RunContext {
            project_sources: project_sources(&units),
            include_paths: include_dirs(&units, &extra),
            classes: table.class_count(),
        };
        Ok(Self {
            units,
            table,
            plans,
            generator,
            initial,
            context,
        })
    }
}

/// Write artifacts as `<dir>/<id>/<id>.cpp` without building them.
pub fn write_artifacts(dir: &Path, artifacts: &[TestArtifact]) -> Result<usize> {
    for artifact in artifacts {
        write_artifact(&dir.join(&artifact.id), artifact)?;
    }
    Ok(artifacts.len())
}
