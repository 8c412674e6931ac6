//! Integration test: evolutionary search end-to-end

use std::sync::Arc;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use zennas::prelude::*;

const SEED_STRUCTURE: &str =
    "SuperConvK3BNRELU(3,32,2,1)SuperResK3(32,64,2,32,2)SuperResK5(64,128,2,64,1)";

fn small_scorer(seed: u64) -> ZenScoreConfig {
    ZenScoreConfig {
        seed,
        batch_size: 4,
        resolution: 32,
        num_classes: 10,
    }
}

fn build_driver(
    budgets: BudgetConfig,
    population_size: usize,
    config: EvolutionConfig,
) -> EvolutionDriver {
    let space = SearchSpace::new(
        SearchSpaceConfig::default().with_max_layers(budgets.max_layers),
    )
    .unwrap();
    let budget = BudgetChecker::new(budgets, Arc::new(AnalyticMeasure::new(32)));
    let fitness = FitnessEvaluator::new(Arc::new(ZenScorer::new(small_scorer(config.seed))));
    let manager = PopulationManager::new(space, budget, fitness, population_size).unwrap();
    EvolutionDriver::new(config, manager)
}

#[test]
fn test_round_trip_over_sampled_architectures() {
    let space = SearchSpace::new(SearchSpaceConfig::default()).unwrap();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
    for _ in 0..100 {
        let arch = space.sample_seed(6, &mut rng);
        let text = arch.serialize();
        assert_eq!(Architecture::parse(&text).unwrap(), arch);
        assert_eq!(Architecture::parse(&text).unwrap().serialize(), text);
    }
}

#[test]
fn test_mutated_architectures_stay_continuous_and_bounded() {
    let space = SearchSpace::new(SearchSpaceConfig::default().with_max_layers(5)).unwrap();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
    let mut arch = Architecture::parse(SEED_STRUCTURE).unwrap();
    for _ in 0..300 {
        arch = space.mutate(&arch, &mut rng).unwrap();
        assert!(arch.depth() <= 5);
        for pair in arch.blocks().windows(2) {
            assert_eq!(pair[0].out_channels(), pair[1].in_channels());
        }
    }
}

#[test]
fn test_end_to_end_bounded_search() {
    let seed = Architecture::parse(SEED_STRUCTURE).unwrap();
    let seed_fitness = ZenScorer::new(small_scorer(7)).score(&seed).unwrap();

    let budgets = BudgetConfig::new(5).with_max_params(1_000_000);
    let config = EvolutionConfig {
        max_iter: 100,
        progress_every: 0,
        seed: 7,
        ..EvolutionConfig::default()
    };
    let mut driver = build_driver(budgets, 8, config);
    let report = driver.run(Some(&seed)).unwrap();

    assert_eq!(report.stats.attempted, 100);
    let best = Architecture::parse(&report.best_structure).unwrap();
    assert!(best.depth() <= 5);
    assert!(best.depth() >= 2);
    assert!(report.measurement.param_count <= 1_000_000);
    assert!(report.best_fitness >= seed_fitness);
}

#[test]
fn test_impossible_budget_raises_exhaustion() {
    // no architecture the space can emit fits in 10 parameters; the run must
    // fail with an attempt count instead of looping forever
    let budgets = BudgetConfig::new(5).with_max_params(10);
    let config = EvolutionConfig {
        max_iter: 100,
        progress_every: 0,
        seed: 3,
        ..EvolutionConfig::default()
    };
    let mut driver = build_driver(budgets, 8, config);
    match driver.run(None) {
        Err(ZennasError::SearchSpaceExhausted { attempts }) => assert!(attempts > 0),
        other => panic!("expected SearchSpaceExhausted, got {other:?}"),
    }
}

#[test]
fn test_fitness_cache_idempotent_across_configs() {
    let scorer = ZenScorer::new(small_scorer(11));
    let evaluator = FitnessEvaluator::new(Arc::new(scorer.clone()));
    let arch = Architecture::parse(SEED_STRUCTURE).unwrap();
    let direct = scorer.score(&arch).unwrap();
    assert_eq!(evaluator.evaluate(&arch).unwrap(), direct);
    assert_eq!(
        evaluator
            .evaluate(&Architecture::parse(SEED_STRUCTURE).unwrap())
            .unwrap(),
        direct
    );
}

#[test]
fn test_cli_zero_iteration_run_outputs_seed() {
    let dir = tempfile::tempdir().unwrap();
    let args = zennas::cli::SearchArgs {
        max_params: None,
        max_flops: None,
        max_layers: 5,
        population_size: 4,
        max_iter: 0,
        seed: 0,
        initial_structure: Some(SEED_STRUCTURE.to_string()),
        random_init: false,
        scorer: "zen".to_string(),
        batch_size: 4,
        resolution: 32,
        num_classes: 10,
        progress_every: 0,
        time_budget_secs: None,
        output_dir: dir.path().to_path_buf(),
    };
    let report = zennas::cli::cmd_search(&args).unwrap();
    assert_eq!(report.best_structure, SEED_STRUCTURE);

    let written = std::fs::read_to_string(dir.path().join("best_structure.txt")).unwrap();
    assert_eq!(written.trim(), SEED_STRUCTURE);
    assert!(dir.path().join("search_report.json").exists());
}

#[test]
fn test_cli_malformed_seed_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let args = zennas::cli::SearchArgs {
        max_params: None,
        max_flops: None,
        max_layers: 5,
        population_size: 4,
        max_iter: 100,
        seed: 0,
        initial_structure: Some("SuperConvK3BNRELU(3,32".to_string()),
        random_init: false,
        scorer: "zen".to_string(),
        batch_size: 4,
        resolution: 32,
        num_classes: 10,
        progress_every: 0,
        time_budget_secs: None,
        output_dir: dir.path().to_path_buf(),
    };
    let err = zennas::cli::cmd_search(&args).unwrap_err();
    assert!(matches!(err, ZennasError::MalformedStructure(_)));
    assert!(!dir.path().join("best_structure.txt").exists());
}

#[test]
fn test_seed_file_reference_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let seed_path = dir.path().join("seed.txt");
    std::fs::write(&seed_path, format!("{SEED_STRUCTURE}\n")).unwrap();

    let args = zennas::cli::SearchArgs {
        max_params: Some(1_000_000),
        max_flops: None,
        max_layers: 5,
        population_size: 4,
        max_iter: 0,
        seed: 0,
        initial_structure: Some(format!("@{}", seed_path.display())),
        random_init: false,
        scorer: "zen".to_string(),
        batch_size: 4,
        resolution: 32,
        num_classes: 10,
        progress_every: 0,
        time_budget_secs: None,
        output_dir: dir.path().join("out"),
    };
    let report = zennas::cli::cmd_search(&args).unwrap();
    assert_eq!(report.best_structure, SEED_STRUCTURE);
}
