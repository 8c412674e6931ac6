//! Command-line interface
//!
//! `zennas search` runs an evolutionary search and writes the best structure
//! string plus a JSON report to the output directory; `zennas info` prints a
//! parsed summary of a structure string.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::arch::Architecture;
use crate::budget::{BudgetChecker, BudgetConfig};
use crate::driver::{EvolutionConfig, EvolutionDriver, SearchReport};
use crate::error::{Result, ZennasError};
use crate::fitness::FitnessEvaluator;
use crate::population::{InitPolicy, PopulationManager};
use crate::proxy::{
    AnalyticMeasure, ArchMeasure, FixedScorer, ZenScoreConfig, ZenScorer, ZeroCostScorer,
};
use crate::space::{SearchSpace, SearchSpaceConfig};

fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
}

#[derive(Parser)]
#[command(name = "zennas")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Training-free evolutionary neural architecture search")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an evolutionary search under the configured budgets
    Search {
        /// Maximum parameter count
        #[arg(long)]
        max_params: Option<u64>,

        /// Maximum FLOP count
        #[arg(long)]
        max_flops: Option<u64>,

        /// Maximum block count
        #[arg(long, default_value = "18")]
        max_layers: usize,

        /// Population size
        #[arg(long, default_value = "64")]
        population_size: usize,

        /// Maximum iteration count
        #[arg(long, default_value = "100000")]
        max_iter: usize,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Initial structure: an inline encoding, or @path to a file
        #[arg(long)]
        initial_structure: Option<String>,

        /// Ignore the initial structure when filling the population
        #[arg(long, default_value = "false")]
        random_init: bool,

        /// Zero-cost scorer (zen, or flat for a plumbing dry run)
        #[arg(long, default_value = "zen")]
        scorer: String,

        /// Scorer evaluation batch size
        #[arg(long, default_value = "16")]
        batch_size: usize,

        /// Input resolution
        #[arg(long, default_value = "224")]
        resolution: usize,

        /// Number of output classes
        #[arg(long, default_value = "1000")]
        num_classes: usize,

        /// Emit a progress snapshot every this many ticks
        #[arg(long, default_value = "1000")]
        progress_every: usize,

        /// Wall-clock budget in seconds
        #[arg(long)]
        time_budget_secs: Option<u64>,

        /// Directory for best_structure.txt and search_report.json
        #[arg(short, long, default_value = "zennas_out")]
        output_dir: PathBuf,
    },

    /// Parse a structure string and print its summary and measurement
    Info {
        /// An inline encoding, or @path to a file
        #[arg(long)]
        structure: String,

        /// Input resolution for the FLOP count
        #[arg(long, default_value = "224")]
        resolution: usize,
    },
}

/// Search settings bundled off the clap surface.
#[derive(Debug, Clone)]
pub struct SearchArgs {
    pub max_params: Option<u64>,
    pub max_flops: Option<u64>,
    pub max_layers: usize,
    pub population_size: usize,
    pub max_iter: usize,
    pub seed: u64,
    pub initial_structure: Option<String>,
    pub random_init: bool,
    pub scorer: String,
    pub batch_size: usize,
    pub resolution: usize,
    pub num_classes: usize,
    pub progress_every: usize,
    pub time_budget_secs: Option<u64>,
    pub output_dir: PathBuf,
}

/// Resolve an inline structure string or `@path` reference.
fn load_structure(spec: &str) -> Result<Architecture> {
    let text = match spec.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => spec.to_string(),
    };
    Architecture::parse(&text)
}

fn make_scorer(name: &str, config: ZenScoreConfig) -> Result<Arc<dyn ZeroCostScorer>> {
    match name {
        "zen" => Ok(Arc::new(ZenScorer::new(config))),
        "flat" => Ok(Arc::new(FixedScorer(0.0))),
        other => Err(ZennasError::ConfigError(format!(
            "unknown scorer '{other}' (expected zen or flat)"
        ))),
    }
}

pub fn cmd_search(args: &SearchArgs) -> Result<SearchReport> {
    section("zennas search");

    // fail fast on a malformed seed, before any collaborator call
    let initial = args
        .initial_structure
        .as_deref()
        .map(load_structure)
        .transpose()?;
    if let Some(arch) = &initial {
        step_ok(&format!("seed structure parsed ({} blocks)", arch.depth()));
    }

    let space = SearchSpace::new(SearchSpaceConfig::default().with_max_layers(args.max_layers))?;
    let mut budgets = BudgetConfig::new(args.max_layers);
    if let Some(limit) = args.max_params {
        budgets = budgets.with_max_params(limit);
    }
    if let Some(limit) = args.max_flops {
        budgets = budgets.with_max_flops(limit);
    }

    let budget = BudgetChecker::new(budgets, Arc::new(AnalyticMeasure::new(args.resolution)));
    let scorer = make_scorer(
        &args.scorer,
        ZenScoreConfig {
            seed: args.seed,
            batch_size: args.batch_size,
            resolution: args.resolution,
            num_classes: args.num_classes,
        },
    )?;
    let fitness = FitnessEvaluator::new(scorer);
    let manager = PopulationManager::new(space, budget, fitness, args.population_size)?;

    let config = EvolutionConfig {
        max_iter: args.max_iter,
        progress_every: args.progress_every,
        time_budget: args.time_budget_secs.map(Duration::from_secs),
        seed: args.seed,
        init_policy: if args.random_init {
            InitPolicy::RandomOnly
        } else {
            InitPolicy::SeedPlusRandom
        },
    };
    let mut driver = EvolutionDriver::new(config, manager);
    let report = driver.run(initial.as_ref())?;

    std::fs::create_dir_all(&args.output_dir)?;
    let structure_path = args.output_dir.join("best_structure.txt");
    std::fs::write(&structure_path, format!("{}\n", report.best_structure))?;
    let report_path = args.output_dir.join("search_report.json");
    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;

    step_ok(&format!(
        "best fitness {} ({} of {} ticks accepted)",
        format!("{:.4}", report.best_fitness).white().bold(),
        report.stats.accepted,
        report.stats.attempted
    ));
    step_ok(&format!(
        "params {} flops {}",
        report.measurement.param_count, report.measurement.flop_count
    ));
    step_ok(&format!(
        "wrote {}",
        accent(&structure_path.display().to_string())
    ));
    step_ok(&format!(
        "wrote {}",
        accent(&report_path.display().to_string())
    ));

    Ok(report)
}

pub fn cmd_info(structure: &str, resolution: usize) -> Result<()> {
    let arch = load_structure(structure)?;
    let measurement = AnalyticMeasure::new(resolution).measure(&arch)?;

    section("structure");
    for (i, block) in arch.blocks().iter().enumerate() {
        println!("  {:>3}  {}", i, block.serialize());
    }
    section("measurement");
    println!("  blocks       {}", arch.depth());
    println!("  total stride {}", arch.total_stride());
    println!("  params       {}", measurement.param_count);
    println!("  flops        {}", measurement.flop_count);
    Ok(())
}
