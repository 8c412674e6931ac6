//! Population manager
//!
//! Fixed-capacity set of scored candidates with uniform-random parent
//! selection and age-based replacement. Uniform selection (no fitness bias)
//! favors exploration in the noisy zero-cost-proxy regime; replacing the
//! oldest member bounds how long a lucky high score can squat in the
//! population. `best_ever` is retained separately and only ever superseded by
//! strictly greater fitness.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::arch::Architecture;
use crate::budget::{BudgetChecker, Feasibility, Rejection};
use crate::error::{Result, ZennasError};
use crate::fitness::FitnessEvaluator;
use crate::proxy::Measurement;
use crate::space::SearchSpace;

/// Random seeding attempts allowed per population slot before the space is
/// declared exhausted.
const SEED_ATTEMPTS_PER_SLOT: usize = 100;

/// A scored, feasible member of the population.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub architecture: Architecture,
    pub fitness: f64,
    pub measurement: Measurement,
}

/// How the population is initially filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitPolicy {
    /// Inject the supplied seed structure as the first candidate, fill the
    /// rest randomly (the run never does worse than the seed)
    SeedPlusRandom,
    /// Ignore any supplied seed and fill the whole population randomly
    RandomOnly,
}

/// Attempted-vs-accepted counters, exposed so a degenerate configuration
/// (near-100% rejection) is observable in the progress log.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TickStats {
    pub attempted: usize,
    pub accepted: usize,
    pub rejected_budget: usize,
    pub score_failures: usize,
    pub mutation_failures: usize,
}

/// Outcome of a single evolution tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Accepted { fitness: f64 },
    RejectedBudget(Rejection),
    ScoreUnavailable,
    MutationFailed,
}

pub struct PopulationManager {
    space: SearchSpace,
    budget: BudgetChecker,
    fitness: FitnessEvaluator,
    capacity: usize,
    members: Vec<Candidate>,
    next_replace: usize,
    best_ever: Option<Candidate>,
    stats: TickStats,
}

impl PopulationManager {
    pub fn new(
        space: SearchSpace,
        budget: BudgetChecker,
        fitness: FitnessEvaluator,
        capacity: usize,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(ZennasError::ConfigError(
                "population size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            space,
            budget,
            fitness,
            capacity,
            members: Vec::with_capacity(capacity),
            next_replace: 0,
            best_ever: None,
            stats: TickStats::default(),
        })
    }

    /// Fill the population with feasible, scored candidates.
    ///
    /// The supplied seed (if any, under [`InitPolicy::SeedPlusRandom`]) is
    /// admitted first and strictly: an infeasible or unscorable seed is a
    /// configuration error. Random seeding then proceeds in rayon-parallel
    /// batches until the population is full; if the attempt cap is hit first,
    /// the space is exhausted and the run is fatal.
    pub fn initialize(
        &mut self,
        seed: Option<&Architecture>,
        policy: InitPolicy,
        rng: &mut impl Rng,
    ) -> Result<()> {
        if let (Some(seed), InitPolicy::SeedPlusRandom) = (seed, policy) {
            let candidate = self.admit_seed(seed)?;
            self.push_best(&candidate);
            self.members.push(candidate);
        }

        let max_attempts = self.capacity * SEED_ATTEMPTS_PER_SLOT;
        let mut attempts = 0;
        while self.members.len() < self.capacity {
            if attempts >= max_attempts {
                return Err(ZennasError::SearchSpaceExhausted { attempts });
            }
            let remaining = self.capacity - self.members.len();
            let batch_size = (remaining * 2).min(max_attempts - attempts);

            // sampling is serial (one seeded generator), admission is the
            // expensive part and fans out
            let samples: Vec<Architecture> = (0..batch_size)
                .map(|_| {
                    let hint =
                        rng.gen_range(self.space.min_depth()..=self.space.max_layers());
                    self.space.sample_seed(hint, rng)
                })
                .collect();
            attempts += batch_size;

            let admitted: Vec<Candidate> = samples
                .par_iter()
                .filter_map(|arch| self.try_admit(arch))
                .collect();

            for candidate in admitted {
                if self.members.len() == self.capacity {
                    break;
                }
                self.push_best(&candidate);
                self.members.push(candidate);
            }
        }
        Ok(())
    }

    /// Inject the seed as the sole member, without random fill. Used for
    /// zero-iteration runs, where the final output must be exactly the seed.
    pub fn initialize_seed_only(&mut self, seed: &Architecture) -> Result<()> {
        let candidate = self.admit_seed(seed)?;
        self.push_best(&candidate);
        self.members.push(candidate);
        Ok(())
    }

    /// One steady-state step: uniform parent, one mutation, budget check,
    /// score, replace-oldest. Infeasible or unscorable offspring waste the
    /// tick without consuming a replacement slot.
    pub fn tick(&mut self, rng: &mut impl Rng) -> TickOutcome {
        self.stats.attempted += 1;

        let parent = self.members[rng.gen_range(0..self.members.len())]
            .architecture
            .clone();

        let offspring = match self.space.mutate(&parent, rng) {
            Ok(arch) => arch,
            Err(err) => {
                debug!(error = %err, "mutation produced no candidate");
                self.stats.mutation_failures += 1;
                return TickOutcome::MutationFailed;
            }
        };

        let measurement = match self.budget.check(&offspring) {
            Ok(Feasibility::Feasible(measurement)) => measurement,
            Ok(Feasibility::Rejected(rejection)) => {
                self.stats.rejected_budget += 1;
                return TickOutcome::RejectedBudget(rejection);
            }
            Err(err) => {
                debug!(error = %err, "measurement collaborator failed");
                self.stats.score_failures += 1;
                return TickOutcome::ScoreUnavailable;
            }
        };

        let fitness = match self.fitness.evaluate(&offspring) {
            Ok(fitness) => fitness,
            Err(err) => {
                debug!(error = %err, "scorer collaborator failed");
                self.stats.score_failures += 1;
                return TickOutcome::ScoreUnavailable;
            }
        };

        let candidate = Candidate {
            architecture: offspring,
            fitness,
            measurement,
        };
        self.push_best(&candidate);
        self.members[self.next_replace] = candidate;
        self.next_replace = (self.next_replace + 1) % self.capacity;
        self.stats.accepted += 1;
        TickOutcome::Accepted { fitness }
    }

    /// Admit the injected seed strictly: any rejection is a config error.
    fn admit_seed(&self, seed: &Architecture) -> Result<Candidate> {
        let measurement = match self.budget.check(seed)? {
            Feasibility::Feasible(measurement) => measurement,
            Feasibility::Rejected(rejection) => {
                return Err(ZennasError::ConfigError(format!(
                    "initial structure violates the budget: {rejection}"
                )));
            }
        };
        let fitness = self.fitness.evaluate(seed)?;
        Ok(Candidate {
            architecture: seed.clone(),
            fitness,
            measurement,
        })
    }

    /// Admission for random seeding: collaborator failures and budget
    /// rejections discard the sample rather than the run.
    fn try_admit(&self, arch: &Architecture) -> Option<Candidate> {
        let measurement = match self.budget.check(arch) {
            Ok(Feasibility::Feasible(measurement)) => measurement,
            Ok(Feasibility::Rejected(_)) | Err(_) => return None,
        };
        let fitness = self.fitness.evaluate(arch).ok()?;
        Some(Candidate {
            architecture: arch.clone(),
            fitness,
            measurement,
        })
    }

    fn push_best(&mut self, candidate: &Candidate) {
        let superseded = match &self.best_ever {
            None => true,
            Some(best) => candidate.fitness > best.fitness,
        };
        if superseded {
            self.best_ever = Some(candidate.clone());
        }
    }

    pub fn members(&self) -> &[Candidate] {
        &self.members
    }

    pub fn best_ever(&self) -> Option<&Candidate> {
        self.best_ever.as_ref()
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    /// (min, mean, max) fitness over the live population.
    pub fn fitness_distribution(&self) -> (f64, f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for member in &self.members {
            min = min.min(member.fitness);
            max = max.max(member.fitness);
            sum += member.fitness;
        }
        (min, sum / self.members.len().max(1) as f64, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetConfig;
    use crate::proxy::{AnalyticMeasure, FixedScorer, ZenScoreConfig, ZenScorer, ZeroCostScorer};
    use crate::space::SearchSpaceConfig;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::sync::Arc;

    const SEED: &str =
        "SuperConvK3BNRELU(3,32,2,1)SuperResK3(32,64,2,32,2)SuperResK5(64,128,2,64,1)";

    fn manager(capacity: usize, budgets: BudgetConfig) -> PopulationManager {
        let space = SearchSpace::new(
            SearchSpaceConfig::default().with_max_layers(budgets.max_layers),
        )
        .unwrap();
        let budget = BudgetChecker::new(budgets, Arc::new(AnalyticMeasure::new(64)));
        let fitness = FitnessEvaluator::new(Arc::new(ZenScorer::new(ZenScoreConfig {
            resolution: 64,
            num_classes: 10,
            ..ZenScoreConfig::default()
        })));
        PopulationManager::new(space, budget, fitness, capacity).unwrap()
    }

    #[test]
    fn test_initialize_fills_population() {
        let mut mgr = manager(8, BudgetConfig::new(6));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        mgr.initialize(None, InitPolicy::RandomOnly, &mut rng).unwrap();
        assert_eq!(mgr.members().len(), 8);
        assert!(mgr.best_ever().is_some());
    }

    #[test]
    fn test_seed_is_injected_first() {
        let mut mgr = manager(4, BudgetConfig::new(6));
        let seed = Architecture::parse(SEED).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        mgr.initialize(Some(&seed), InitPolicy::SeedPlusRandom, &mut rng)
            .unwrap();
        assert_eq!(mgr.members()[0].architecture, seed);
        let seed_fitness = mgr.members()[0].fitness;
        assert!(mgr.best_ever().unwrap().fitness >= seed_fitness);
    }

    #[test]
    fn test_infeasible_seed_is_config_error() {
        let mut mgr = manager(4, BudgetConfig::new(6).with_max_params(10));
        let seed = Architecture::parse(SEED).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let err = mgr
            .initialize(Some(&seed), InitPolicy::SeedPlusRandom, &mut rng)
            .unwrap_err();
        assert!(matches!(err, ZennasError::ConfigError(_)));
    }

    #[test]
    fn test_impossible_budget_exhausts_space() {
        // nothing the space can emit fits 10 parameters
        let mut mgr = manager(4, BudgetConfig::new(6).with_max_params(10));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let err = mgr
            .initialize(None, InitPolicy::RandomOnly, &mut rng)
            .unwrap_err();
        match err {
            ZennasError::SearchSpaceExhausted { attempts } => assert!(attempts >= 400),
            other => panic!("expected exhaustion, got {other}"),
        }
    }

    #[test]
    fn test_tick_replaces_oldest() {
        let mut mgr = manager(3, BudgetConfig::new(6));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        mgr.initialize(None, InitPolicy::RandomOnly, &mut rng).unwrap();

        // run until three offspring have been accepted; the replacement
        // cursor must walk the slots in age order: 0, 1, 2, 0, ...
        let mut accepted = 0;
        for _ in 0..1000 {
            if matches!(mgr.tick(&mut rng), TickOutcome::Accepted { .. }) {
                accepted += 1;
                assert_eq!(mgr.next_replace, accepted % 3);
            }
            if accepted == 3 {
                break;
            }
        }
        assert_eq!(accepted, 3, "search made no progress");
        assert_eq!(mgr.members().len(), 3);
    }

    #[test]
    fn test_best_ever_monotone_across_ticks() {
        let mut mgr = manager(6, BudgetConfig::new(6));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        mgr.initialize(None, InitPolicy::RandomOnly, &mut rng).unwrap();
        let mut best = mgr.best_ever().unwrap().fitness;
        for _ in 0..300 {
            mgr.tick(&mut rng);
            let now = mgr.best_ever().unwrap().fitness;
            assert!(now >= best);
            best = now;
        }
    }

    #[test]
    fn test_failed_ticks_do_not_consume_slots() {
        struct AlwaysBroken;
        impl ZeroCostScorer for AlwaysBroken {
            fn score(&self, _arch: &Architecture) -> crate::error::Result<f64> {
                Err(ZennasError::ScoreUnavailable("broken".to_string()))
            }
        }
        let space =
            SearchSpace::new(SearchSpaceConfig::default().with_max_layers(6)).unwrap();
        let budget = BudgetChecker::new(BudgetConfig::new(6), Arc::new(AnalyticMeasure::new(64)));
        // population seeded with a working scorer, then swapped semantics by
        // building the manager directly around the broken one
        let fitness = FitnessEvaluator::new(Arc::new(FixedScorer(1.0)));
        let mut mgr = PopulationManager::new(space, budget, fitness, 3).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        mgr.initialize(None, InitPolicy::RandomOnly, &mut rng).unwrap();

        let broken = FitnessEvaluator::new(Arc::new(AlwaysBroken));
        mgr.fitness = broken;
        let snapshot: Vec<Architecture> = mgr
            .members()
            .iter()
            .map(|c| c.architecture.clone())
            .collect();
        for _ in 0..50 {
            let outcome = mgr.tick(&mut rng);
            assert!(!matches!(outcome, TickOutcome::Accepted { .. }));
        }
        let stats = mgr.stats();
        assert_eq!(stats.attempted, 50);
        assert_eq!(stats.accepted, 0);
        for (member, original) in mgr.members().iter().zip(&snapshot) {
            assert_eq!(member.architecture, *original);
        }
    }

    #[test]
    fn test_stats_track_attempted_vs_accepted() {
        let mut mgr = manager(4, BudgetConfig::new(6));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        mgr.initialize(None, InitPolicy::RandomOnly, &mut rng).unwrap();
        for _ in 0..100 {
            mgr.tick(&mut rng);
        }
        let stats = mgr.stats();
        assert_eq!(stats.attempted, 100);
        assert_eq!(
            stats.attempted,
            stats.accepted + stats.rejected_budget + stats.score_failures
                + stats.mutation_failures
        );
    }
}
