//! Fitness evaluator
//!
//! Wraps the opaque zero-cost scorer with a cache keyed by canonical textual
//! form: mutation frequently reintroduces previously seen encodings (e.g. by
//! reverting a change), and the proxy call may be costly. Scorer failures are
//! reported as `ScoreUnavailable` and never cached, so they stay non-fatal
//! per candidate.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::arch::Architecture;
use crate::error::{Result, ZennasError};
use crate::proxy::ZeroCostScorer;

pub struct FitnessEvaluator {
    scorer: Arc<dyn ZeroCostScorer>,
    cache: RwLock<HashMap<String, f64>>,
}

impl FitnessEvaluator {
    pub fn new(scorer: Arc<dyn ZeroCostScorer>) -> Self {
        Self {
            scorer,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Scalar fitness of a feasible candidate; higher is better. Idempotent
    /// per canonical encoding for the run's lifetime.
    pub fn evaluate(&self, arch: &Architecture) -> Result<f64> {
        let key = arch.serialize();
        if let Some(cached) = self.cache.read().get(&key) {
            return Ok(*cached);
        }
        let fitness = self.scorer.score(arch).map_err(|err| match err {
            err @ ZennasError::ScoreUnavailable(_) => err,
            other => ZennasError::ScoreUnavailable(other.to_string()),
        })?;
        if !fitness.is_finite() {
            return Err(ZennasError::ScoreUnavailable(format!(
                "scorer returned non-finite fitness {fitness}"
            )));
        }
        self.cache.write().insert(key, fitness);
        Ok(fitness)
    }

    pub fn cache_size(&self) -> usize {
        self.cache.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::FixedScorer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SEED: &str = "SuperConvK3BNRELU(3,32,2,1)SuperResK3(32,64,2,32,2)";

    struct CountingScorer(AtomicUsize);
    impl ZeroCostScorer for CountingScorer {
        fn score(&self, _arch: &Architecture) -> Result<f64> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(1.25)
        }
    }

    struct BrokenScorer;
    impl ZeroCostScorer for BrokenScorer {
        fn score(&self, _arch: &Architecture) -> Result<f64> {
            Err(ZennasError::ScoreUnavailable("numerical blowup".to_string()))
        }
    }

    #[test]
    fn test_cache_idempotence() {
        let counting = Arc::new(CountingScorer(AtomicUsize::new(0)));
        let evaluator = FitnessEvaluator::new(counting.clone());
        let arch = Architecture::parse(SEED).unwrap();

        let a = evaluator.evaluate(&arch).unwrap();
        let b = evaluator.evaluate(&Architecture::parse(SEED).unwrap()).unwrap();
        assert_eq!(a, b);
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
        assert_eq!(evaluator.cache_size(), 1);
    }

    #[test]
    fn test_scorer_failure_is_score_unavailable() {
        let evaluator = FitnessEvaluator::new(Arc::new(BrokenScorer));
        let arch = Architecture::parse(SEED).unwrap();
        let err = evaluator.evaluate(&arch).unwrap_err();
        assert!(matches!(err, ZennasError::ScoreUnavailable(_)));
        assert_eq!(evaluator.cache_size(), 0);
    }

    #[test]
    fn test_non_finite_fitness_rejected() {
        let evaluator = FitnessEvaluator::new(Arc::new(FixedScorer(f64::NAN)));
        let arch = Architecture::parse(SEED).unwrap();
        assert!(matches!(
            evaluator.evaluate(&arch),
            Err(ZennasError::ScoreUnavailable(_))
        ));
    }
}
