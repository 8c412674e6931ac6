//! Evolution driver
//!
//! Orchestrates the iterate-mutate-score-select loop: up to
//! `evolution_max_iter` ticks, each performing exactly one population step,
//! with a cooperative stop flag and optional wall-clock deadline checked once
//! per tick. Whatever stops the loop, `best_ever` is left as the valid,
//! serializable result.

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::arch::Architecture;
use crate::error::Result;
use crate::population::{InitPolicy, PopulationManager, TickStats};
use crate::proxy::Measurement;

/// Evolution loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Maximum number of ticks
    pub max_iter: usize,
    /// Emit a progress snapshot every this many ticks
    pub progress_every: usize,
    /// Optional wall-clock budget
    pub time_budget: Option<Duration>,
    /// Seed for the run's single random generator
    pub seed: u64,
    /// Initialization policy
    pub init_policy: InitPolicy,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            max_iter: 100_000,
            progress_every: 1_000,
            time_budget: None,
            seed: 0,
            init_policy: InitPolicy::SeedPlusRandom,
        }
    }
}

/// Final artifact of a search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    /// Canonical textual encoding of the best architecture found
    pub best_structure: String,
    pub best_fitness: f64,
    pub measurement: Measurement,
    pub stats: TickStats,
    pub elapsed_secs: f64,
    /// True when the loop ended before `max_iter` (stop signal or deadline)
    pub stopped_early: bool,
    pub finished_at: DateTime<Utc>,
}

pub struct EvolutionDriver {
    config: EvolutionConfig,
    manager: PopulationManager,
    stop: Arc<AtomicBool>,
}

impl EvolutionDriver {
    pub fn new(config: EvolutionConfig, manager: PopulationManager) -> Self {
        Self {
            config,
            manager,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag for external cancellation (e.g. a ctrl-c handler).
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Run the full search: initialize the population, then tick until the
    /// iteration budget, deadline, or stop signal is reached.
    pub fn run(&mut self, seed: Option<&Architecture>) -> Result<SearchReport> {
        let started = Instant::now();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);

        match (seed, self.config.init_policy, self.config.max_iter) {
            // zero ticks with an injected seed: the output is the seed, so
            // random co-seeding would be wasted collaborator calls
            (Some(seed), InitPolicy::SeedPlusRandom, 0) => {
                self.manager.initialize_seed_only(seed)?;
            }
            _ => {
                self.manager
                    .initialize(seed, self.config.init_policy, &mut rng)?;
            }
        }
        let initial_best = self
            .manager
            .best_ever()
            .map(|c| c.fitness)
            .unwrap_or(f64::NEG_INFINITY);
        info!(
            population = self.manager.members().len(),
            best = initial_best,
            "population initialized"
        );

        let mut stopped_early = false;
        for tick in 0..self.config.max_iter {
            if self.stop.load(Ordering::Relaxed) {
                info!(tick, "stop signal received");
                stopped_early = true;
                break;
            }
            if let Some(budget) = self.config.time_budget {
                if started.elapsed() >= budget {
                    info!(tick, "wall-clock budget reached");
                    stopped_early = true;
                    break;
                }
            }

            self.manager.tick(&mut rng);

            if self.config.progress_every > 0 && (tick + 1) % self.config.progress_every == 0 {
                self.log_progress(tick + 1);
            }
        }

        let best = self
            .manager
            .best_ever()
            .expect("initialized population always has a best candidate")
            .clone();
        let stats = self.manager.stats();
        info!(
            best = best.fitness,
            attempted = stats.attempted,
            accepted = stats.accepted,
            "search finished"
        );

        Ok(SearchReport {
            best_structure: best.architecture.serialize(),
            best_fitness: best.fitness,
            measurement: best.measurement,
            stats,
            elapsed_secs: started.elapsed().as_secs_f64(),
            stopped_early,
            finished_at: Utc::now(),
        })
    }

    fn log_progress(&self, tick: usize) {
        let stats = self.manager.stats();
        let (min, mean, max) = self.manager.fitness_distribution();
        let best = self.manager.best_ever().map(|c| c.fitness).unwrap_or(0.0);
        info!(
            tick,
            best,
            pop_min = min,
            pop_mean = mean,
            pop_max = max,
            attempted = stats.attempted,
            accepted = stats.accepted,
            "progress"
        );
    }
}
