//! Search space definition
//!
//! Declares the block-type catalog, each type's legal parameter domains, and
//! random seed generation. Pure configuration data plus small deterministic
//! generators; all randomness comes from the caller's generator.

pub mod mutation;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::arch::block::{Block, RES_KERNELS};
use crate::arch::Architecture;
use crate::error::{Result, ZennasError};

pub use mutation::MutationOp;

/// Channel multiplier ladder applied when resizing a width.
const CHANNEL_MULTIPLIERS: [f64; 9] = [
    2.5,
    2.0,
    1.5,
    1.25,
    1.0,
    1.0 / 1.25,
    1.0 / 1.5,
    0.5,
    0.4,
];

/// Sub-layer count deltas applied when resizing a repeat count.
const SUBLAYER_DELTAS: [i64; 4] = [-2, -1, 1, 2];

/// Configuration for the search space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSpaceConfig {
    /// Kernel sizes admissible for residual groups
    pub res_kernels: Vec<usize>,
    /// Channel widths are rounded to a multiple of this base
    pub channel_round_base: usize,
    /// Minimum channel width
    pub min_channels: usize,
    /// Maximum channel width
    pub max_channels: usize,
    /// Maximum sub-layer (repeat) count per block
    pub max_sub_layers: usize,
    /// Minimum-depth floor (stem plus at least one body block)
    pub min_depth: usize,
    /// Maximum block count
    pub max_layers: usize,
    /// Probability that a mutation changes the block count
    pub structure_mutation_prob: f64,
    /// Input image channels (fixed by the dataset)
    pub input_channels: usize,
    /// Stem width used when sampling random seeds
    pub stem_channels: usize,
}

impl Default for SearchSpaceConfig {
    fn default() -> Self {
        Self {
            res_kernels: RES_KERNELS.to_vec(),
            channel_round_base: 8,
            min_channels: 8,
            max_channels: 2048,
            max_sub_layers: 8,
            min_depth: 2,
            max_layers: 18,
            structure_mutation_prob: 0.2,
            input_channels: 3,
            stem_channels: 32,
        }
    }
}

impl SearchSpaceConfig {
    pub fn with_max_layers(mut self, max_layers: usize) -> Self {
        self.max_layers = max_layers;
        self
    }

    /// Basic validity of the configuration itself.
    pub fn validate(&self) -> Result<()> {
        if self.res_kernels.is_empty() {
            return Err(ZennasError::ConfigError(
                "search space declares no residual kernel sizes".to_string(),
            ));
        }
        if let Some(&k) = self.res_kernels.iter().find(|&&k| !RES_KERNELS.contains(&k)) {
            return Err(ZennasError::ConfigError(format!(
                "kernel size {k} is not a known residual kernel"
            )));
        }
        if self.min_depth < 2 || self.max_layers < self.min_depth {
            return Err(ZennasError::ConfigError(format!(
                "depth bounds [{}, {}] are not usable",
                self.min_depth, self.max_layers
            )));
        }
        if self.channel_round_base == 0 || self.min_channels < self.channel_round_base {
            return Err(ZennasError::ConfigError(
                "channel rounding base must divide the minimum width".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.structure_mutation_prob) {
            return Err(ZennasError::ConfigError(
                "structure mutation probability must be in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// The search space: block catalog plus parameter-domain generators.
#[derive(Debug, Clone)]
pub struct SearchSpace {
    config: SearchSpaceConfig,
}

impl SearchSpace {
    pub fn new(config: SearchSpaceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SearchSpaceConfig {
        &self.config
    }

    pub fn max_layers(&self) -> usize {
        self.config.max_layers
    }

    pub fn min_depth(&self) -> usize {
        self.config.min_depth
    }

    /// Round a width to the nearest multiple of the base, floored at the
    /// minimum width.
    pub fn round_channels(&self, raw: f64) -> usize {
        let base = self.config.channel_round_base as f64;
        let rounded = ((raw / base).round() * base) as usize;
        rounded.clamp(self.config.min_channels, self.config.max_channels)
    }

    /// Discrete width choices around a current width, widest first.
    pub fn channel_choices(&self, current: usize) -> Vec<usize> {
        let mut choices: Vec<usize> = CHANNEL_MULTIPLIERS
            .iter()
            .map(|m| self.round_channels(current as f64 * m))
            .collect();
        choices.sort_unstable_by(|a, b| b.cmp(a));
        choices.dedup();
        choices
    }

    /// Discrete sub-layer choices around a current count, largest first.
    pub fn sublayer_choices(&self, current: usize) -> Vec<usize> {
        let mut choices: Vec<usize> = SUBLAYER_DELTAS
            .iter()
            .map(|d| (current as i64 + d).max(1) as usize)
            .map(|n| n.min(self.config.max_sub_layers))
            .collect();
        choices.push(current);
        choices.sort_unstable_by(|a, b| b.cmp(a));
        choices.dedup();
        choices
    }

    /// Sample a random initial individual of roughly `depth_hint` blocks.
    ///
    /// The result always satisfies channel continuity and the depth bounds;
    /// whether it fits the resource budgets is for the budget checker.
    pub fn sample_seed(&self, depth_hint: usize, rng: &mut impl Rng) -> Architecture {
        let depth = depth_hint.clamp(self.config.min_depth, self.config.max_layers);
        let stem_out = self.round_channels(self.config.stem_channels as f64);

        let mut blocks = vec![Block::ConvKxBnRelu {
            kernel_size: 3,
            in_channels: self.config.input_channels,
            out_channels: stem_out,
            stride: 2,
            sub_layers: 1,
        }];

        let mut width = stem_out;
        for _ in 1..depth {
            let grow = [1.0, 1.0, 1.5, 2.0][rng.gen_range(0..4)];
            let out = self.round_channels(width as f64 * grow);
            let kernel = self.config.res_kernels[rng.gen_range(0..self.config.res_kernels.len())];
            let stride = if rng.gen_bool(0.5) { 2 } else { 1 };
            blocks.push(Block::ResKx {
                kernel_size: kernel,
                in_channels: width,
                out_channels: out,
                stride,
                bottleneck_channels: self.round_channels(out as f64 * 0.5),
                sub_layers: rng.gen_range(1..=3),
            });
            width = out;
        }

        // construction cannot fail: widths are continuous by construction
        Architecture::new(blocks).expect("sampled seed must be channel-continuous")
    }
}
