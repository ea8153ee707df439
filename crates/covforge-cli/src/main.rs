//! covforge - coverage-driven unit test synthesis for C/C++ codebases
//!
//! ## Commands
//!
//! - `scan`: list the headers and sources found under a root
//! - `extract`: print the structural model of every class
//! - `plan`: print how each class will be instantiated
//! - `generate`: write the initial GoogleTest artifacts without building them
//! - `run`: compile, measure and refine until coverage converges

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use covforge_build::{probe_toolchain, GccHarness, GcovCollector};
use covforge_core::completion::{OllamaClient, TextCompletion};
use covforge_core::domain::{ClassModel, FreeFunction, SourceRole};
use covforge_core::plan::PlanStrategy;
use covforge_core::pipeline::{write_artifacts, Analysis};
use covforge_core::scanner::SourceScanner;
use covforge_core::{obs, ConvergenceController, CovforgeConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "covforge")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Coverage-driven GoogleTest synthesis for C/C++ projects", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "COVFORGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered headers and sources
    Scan {
        /// Project root
        #[arg(default_value = ".")]
        root: PathBuf,
    },

    /// Print the extracted model table
    Extract {
        #[arg(default_value = ".")]
        root: PathBuf,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Print each class's instantiation plan
    Plan {
        #[arg(default_value = ".")]
        root: PathBuf,
    },

    /// Write the initial test artifacts without building them
    Generate {
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Output directory (default: the configured output dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Run the convergence loop
    Run {
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Target line coverage percentage
        #[arg(long)]
        target: Option<f64>,

        /// Iteration budget
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Overrides given on the command line, applied last.
#[derive(Debug, Default)]
struct Overrides {
    root: Option<PathBuf>,
    target: Option<f64>,
    max_iterations: Option<u32>,
    out: Option<PathBuf>,
}

/// File, then environment, then flags.
fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<CovforgeConfig> {
    let config = match path {
        Some(path) => CovforgeConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CovforgeConfig::default(),
    };
    let mut config = config
        .with_env_overrides()
        .context("Invalid COVFORGE_* environment override")?;
    if let Some(root) = overrides.root {
        config.project.roots = vec![root];
    }
    if let Some(target) = overrides.target {
        config.convergence.target_coverage = target;
    }
    if let Some(max_iterations) = overrides.max_iterations {
        config.convergence.max_iterations = max_iterations;
    }
    if let Some(out) = overrides.out {
        config.output.dir = out;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    covforge_core::init_tracing(cli.json, level);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Scan { root } => {
            let config = load_config(config_path, Overrides { root: Some(root), ..Default::default() })?;
            cmd_scan(&config)
        }
        Commands::Extract { root, format } => {
            let config = load_config(config_path, Overrides { root: Some(root), ..Default::default() })?;
            cmd_extract(&config, format).await
        }
        Commands::Plan { root } => {
            let config = load_config(config_path, Overrides { root: Some(root), ..Default::default() })?;
            cmd_plan(&config).await
        }
        Commands::Generate { root, out } => {
            let config = load_config(
                config_path,
                Overrides {
                    root: Some(root),
                    out,
                    ..Default::default()
                },
            )?;
            cmd_generate(&config).await
        }
        Commands::Run {
            root,
            target,
            max_iterations,
            out,
        } => {
            let config = load_config(
                config_path,
                Overrides {
                    root: Some(root),
                    target,
                    max_iterations,
                    out,
                },
            )?;
            cmd_run(config).await
        }
    }
}

fn cmd_scan(config: &CovforgeConfig) -> Result<()> {
    let units = SourceScanner::new(&config.project).scan(&config.project.roots);
    if units.is_empty() {
        println!("No C/C++ files found.");
        return Ok(());
    }
    for unit in &units {
        let role = match unit.role {
            SourceRole::Header => "header",
            SourceRole::Source => "source",
        };
        println!("{:<7} {}", role, unit.path.display());
    }
    println!("{} files", units.len());
    Ok(())
}

#[derive(Serialize)]
struct ModelDump<'a> {
    classes: Vec<&'a ClassModel>,
    free_functions: &'a [FreeFunction],
}

async fn cmd_extract(config: &CovforgeConfig, format: Format) -> Result<()> {
    let analysis = Analysis::prepare(config).await.context("Failed to analyse project")?;
    let table = &analysis.table;
    if format == Format::Json {
        let dump = ModelDump {
            classes: table.classes.values().collect(),
            free_functions: &table.free_functions,
        };
        println!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(());
    }

    for class in table.classes.values() {
        let kind = if class.is_struct_kind { "struct" } else { "class" };
        let mut traits = Vec::new();
        if class.is_abstract {
            traits.push("abstract");
        }
        if class.has_default_constructor {
            traits.push("default-constructible");
        }
        println!(
            "{} {} ({}) [{}]",
            kind,
            class.qualified_name(),
            class.source_header.path.display(),
            traits.join(", ")
        );
        for method in &class.methods {
            println!("    {:?} {}", method.access, covforge_core::completion::signature(method));
        }
    }
    for function in &table.free_functions {
        println!("fn {}", function.qualified_name());
    }
    println!(
        "{} classes, {} methods, {} free functions",
        table.class_count(),
        table.method_count(),
        table.free_functions.len()
    );
    Ok(())
}

async fn cmd_plan(config: &CovforgeConfig) -> Result<()> {
    let analysis = Analysis::prepare(config).await.context("Failed to analyse project")?;
    for plan in analysis.plans.plans() {
        let detail = match &plan.strategy {
            PlanStrategy::Default => String::new(),
            PlanStrategy::ParameterizedConstructor { constructor, substitutions } => format!(
                " via {}{}",
                covforge_core::completion::signature(constructor),
                if substitutions.is_empty() {
                    String::new()
                } else {
                    format!(" ({} stand-ins)", substitutions.len())
                }
            ),
            PlanStrategy::Substitute { stand_in } => format!(" as {}", stand_in),
            PlanStrategy::Infeasible { reason } => format!(": {}", reason),
        };
        println!("{:<40} {}{}", plan.class.qualified_name(), plan.label(), detail);
    }
    println!(
        "{} of {} classes instantiable",
        analysis.plans.feasible_count(),
        analysis.plans.len()
    );
    Ok(())
}

async fn cmd_generate(config: &CovforgeConfig) -> Result<()> {
    let analysis = Analysis::prepare(config).await.context("Failed to analyse project")?;
    let written = write_artifacts(&config.output.dir, &analysis.initial)
        .with_context(|| format!("Failed to write artifacts to {}", config.output.dir.display()))?;
    println!("Wrote {} test artifacts to {}", written, config.output.dir.display());
    Ok(())
}

async fn cmd_run(config: CovforgeConfig) -> Result<()> {
    let toolchain = probe_toolchain(&config.toolchain)
        .await
        .context("Required toolchain is unavailable")?;
    info!(compiler = %toolchain.compiler, gcov = %toolchain.gcov, "toolchain ready");

    let analysis = Analysis::prepare(&config).await.context("Failed to analyse project")?;
    let config = Arc::new(config);
    let mut controller = ConvergenceController::new(
        Arc::new(GccHarness::new(config.toolchain.clone())),
        Arc::new(GcovCollector::new(config.toolchain.clone())),
        config.clone(),
    );
    if config.completion.enabled {
        let client = OllamaClient::new(&config.completion).context("Failed to build completion client")?;
        if client.is_available().await {
            let completion: Arc<dyn TextCompletion> = Arc::new(client);
            controller = controller.with_completion(completion);
        } else {
            obs::emit_collaborator_unavailable("completion", &client.endpoint());
        }
    }

    let report = controller
        .run(&analysis.generator, analysis.initial.clone(), &analysis.context)
        .await;

    println!("Outcome:    {}", report.outcome);
    println!("Iterations: {}", report.history.len());
    println!("Coverage:   {:.2}%", report.final_percentage());
    println!("History:    {}", controller.layout().history_path().display());
    println!("Summary:    {}", controller.layout().summary_path().display());

    if report.outcome.is_fatal() {
        anyhow::bail!("Convergence run failed: {}", report.outcome);
    }
    Ok(())
}
