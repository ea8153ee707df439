//! covforge core: drive C/C++ test coverage toward a target.
//!
//! Headers are scanned into a structural model, each class gets an
//! instantiation plan, and GoogleTest scenarios are synthesized from both.
//! A convergence controller then compiles, runs and measures the tests,
//! refining them toward uncovered code until coverage is satisfied,
//! plateaus, or the iteration budget runs out.

/// Lazily compiled regex for a constant pattern.
macro_rules! static_regex {
    ($re:literal) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).expect("static regex"))
    }};
}

pub mod completion;
pub mod config;
pub mod controller;
pub mod coverage;
pub mod domain;
pub mod extract;
pub mod fakes;
pub mod harness;
pub mod obs;
pub mod pipeline;
pub mod plan;
pub mod reporting;
pub mod scanner;
pub mod scenario;
pub mod synth;
pub mod telemetry;

pub use completion::{OllamaClient, StreamDecoder, TextCompletion};
pub use config::CovforgeConfig;
pub use controller::{ConvergenceController, ConvergenceReport, Outcome, RunContext, StopPolicy};
pub use coverage::CoverageModelBuilder;
pub use domain::{
    ClassModel, CoverageSnapshot, CovforgeError, IterationHistory, IterationRecord, MethodModel,
    ModelTable, Result, ScenarioKind, SourceUnit, TestArtifact,
};
pub use extract::StructuralModelExtractor;
pub use harness::{BuildHarness, CompileRequest, CompileResult, CoverageCollector, RawCoverage, RawExecutionResult};
pub use pipeline::Analysis;
pub use plan::{InstantiationPlan, InstantiationPlanner, PlanCache, PlanStrategy};
pub use scanner::SourceScanner;
pub use scenario::{ScenarioGenerator, StrategySet};
pub use telemetry::init_tracing;

/// covforge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
