//! Zen-style expressivity proxy
//!
//! Training-free score for an untrained plain network: a per-channel
//! second-moment statistic is propagated through the block sequence with
//! randomly drawn weight scales, and the score accumulates the log of the
//! pre-normalization variance at every block boundary (wider, deeper networks
//! that keep their signal alive score higher). Deterministic for a fixed seed
//! and architecture: the generator is re-seeded from the configured seed and
//! the canonical textual form on every call.

use ndarray::Array1;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::arch::{Architecture, Block};
use crate::error::{Result, ZennasError};
use crate::proxy::ZeroCostScorer;

/// Configuration for the zen-style proxy
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZenScoreConfig {
    /// Base random seed; combined with the architecture hash per evaluation
    pub seed: u64,
    /// Number of weight-scale draws averaged per output channel
    pub batch_size: usize,
    /// Input resolution; architectures that downsample below 1x1 are
    /// degenerate and score as unavailable
    pub resolution: usize,
    /// Output classes of the final projection
    pub num_classes: usize,
}

impl Default for ZenScoreConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            batch_size: 16,
            resolution: 224,
            num_classes: 1000,
        }
    }
}

/// Zen-style zero-cost scorer.
#[derive(Debug, Clone)]
pub struct ZenScorer {
    config: ZenScoreConfig,
}

impl ZenScorer {
    pub fn new(config: ZenScoreConfig) -> Self {
        Self { config }
    }

    fn rng_for(&self, arch: &Architecture) -> Xoshiro256PlusPlus {
        let mut hasher = DefaultHasher::new();
        arch.serialize().hash(&mut hasher);
        Xoshiro256PlusPlus::seed_from_u64(self.config.seed ^ hasher.finish())
    }

    /// Mean squared weight scale for one conv, averaged over the batch.
    fn draw_gain(&self, rng: &mut Xoshiro256PlusPlus) -> f64 {
        let draws = self.config.batch_size.max(1);
        let mut acc = 0.0;
        for _ in 0..draws {
            let w: f64 = rng.gen_range(0.5..1.5);
            acc += w * w;
        }
        acc / draws as f64
    }

    /// Propagate the per-channel second moment through one convolution and
    /// return the new statistic (fan-in times mean input moment, scaled).
    fn conv_forward(
        &self,
        moment: &Array1<f64>,
        k: usize,
        cout: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Array1<f64> {
        let fan_in = (k * k) as f64 * moment.len() as f64;
        let mean_in = moment.mean().unwrap_or(0.0);
        // MSRA-style init keeps gain near 2/fan_in; the drawn factor models
        // the spread across random initializations
        Array1::from_shape_fn(cout, |_| {
            mean_in * fan_in * (2.0 / fan_in) * self.draw_gain(rng)
        })
    }
}

impl ZeroCostScorer for ZenScorer {
    fn score(&self, arch: &Architecture) -> Result<f64> {
        if arch.total_stride() > self.config.resolution {
            return Err(ZennasError::ScoreUnavailable(format!(
                "total stride {} collapses a {}px input",
                arch.total_stride(),
                self.config.resolution
            )));
        }

        let mut rng = self.rng_for(arch);
        let mut moment = Array1::<f64>::ones(arch.input_channels());
        let mut score = 0.0;

        for block in arch.blocks() {
            match block {
                Block::ConvKxBnRelu {
                    kernel_size,
                    out_channels,
                    sub_layers,
                    ..
                } => {
                    for _ in 0..*sub_layers {
                        moment = self.conv_forward(&moment, *kernel_size, *out_channels, &mut rng);
                    }
                }
                Block::ResKx {
                    kernel_size,
                    out_channels,
                    bottleneck_channels,
                    sub_layers,
                    ..
                } => {
                    for _ in 0..*sub_layers {
                        let shortcut = moment.mean().unwrap_or(0.0);
                        let mid =
                            self.conv_forward(&moment, *kernel_size, *bottleneck_channels, &mut rng);
                        moment = self.conv_forward(&mid, *kernel_size, *out_channels, &mut rng);
                        // residual add of the (projected) shortcut moment
                        moment += shortcut;
                    }
                }
            }

            let variance = moment.mean().unwrap_or(0.0);
            if !variance.is_finite() || variance <= 0.0 {
                return Err(ZennasError::ScoreUnavailable(format!(
                    "non-finite activation statistic at {}",
                    block.serialize()
                )));
            }
            score += variance.ln() + (block.out_channels() as f64).ln();
            // BN at the block boundary renormalizes the statistic
            moment.mapv_inplace(|v| v / variance);
        }

        // final projection onto the class logits
        score += (arch.output_channels() as f64 / self.config.num_classes as f64).ln();

        if !score.is_finite() {
            return Err(ZennasError::ScoreUnavailable(
                "non-finite final score".to_string(),
            ));
        }
        Ok(score)
    }
}
