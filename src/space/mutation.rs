//! Mutation operators
//!
//! Two operator families: parameter perturbation of a single block (block
//! count preserved, downstream channels repaired) and structural
//! insert/remove of one block (subject to the depth bounds). Every operator
//! yields a channel-continuous architecture within the depth bound, so the
//! budget checker only ever reasons about resource cost.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::SearchSpace;
use crate::arch::Architecture;
use crate::arch::Block;
use crate::error::{Result, ZennasError};

/// Mutation operators admissible on a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationOp {
    /// Resize `out_channels` within the type's discrete width ladder
    ResizeChannels,
    /// Resize `bottleneck_channels` within the width ladder
    ResizeBottleneck,
    /// Switch to another admissible kernel size
    ChangeKernel,
    /// Change the internal repeat count
    ChangeSubLayers,
    /// Insert one block after this one
    InsertBlock,
    /// Remove this block
    RemoveBlock,
}

impl MutationOp {
    fn is_structural(self) -> bool {
        matches!(self, MutationOp::InsertBlock | MutationOp::RemoveBlock)
    }
}

impl SearchSpace {
    /// Operators admissible for a block, per its type.
    ///
    /// A 1x1 conv group is a projection head; its width and kernel are
    /// pinned, matching the original search space's "never change fc" rule.
    pub fn legal_mutations(&self, block: &Block) -> Vec<MutationOp> {
        match block {
            Block::ConvKxBnRelu { kernel_size: 1, .. } => vec![MutationOp::ChangeSubLayers],
            Block::ConvKxBnRelu { .. } => {
                vec![MutationOp::ResizeChannels, MutationOp::ChangeSubLayers]
            }
            Block::ResKx { .. } => vec![
                MutationOp::ResizeChannels,
                MutationOp::ResizeBottleneck,
                MutationOp::ChangeKernel,
                MutationOp::ChangeSubLayers,
                MutationOp::InsertBlock,
                MutationOp::RemoveBlock,
            ],
        }
    }

    /// Apply one random legal parameter perturbation to one random block.
    ///
    /// Never changes the block count. Downstream `in_channels` are repaired
    /// when the mutated block's `out_channels` changed.
    pub fn mutate_one_block(
        &self,
        arch: &Architecture,
        rng: &mut impl Rng,
    ) -> Result<Architecture> {
        let mut indices: Vec<usize> = (0..arch.depth()).collect();
        indices.shuffle(rng);

        for index in indices {
            let block = &arch.blocks()[index];
            let mut ops: Vec<MutationOp> = self
                .legal_mutations(block)
                .into_iter()
                .filter(|op| !op.is_structural())
                .collect();
            ops.shuffle(rng);

            for op in ops {
                if let Some(mutated) = self.perturb(block, op, rng) {
                    return arch.replace_block(index, mutated);
                }
            }
        }

        Err(ZennasError::ConfigError(
            "no block admits any parameter mutation".to_string(),
        ))
    }

    /// Insert or remove one block, re-wiring channel continuity.
    ///
    /// When the rolled choice would violate the depth bounds it retries with
    /// the other choice; when both are blocked it falls back to a parameter
    /// mutation so the tick still produces a candidate.
    pub fn mutate_structure(
        &self,
        arch: &Architecture,
        rng: &mut impl Rng,
    ) -> Result<Architecture> {
        // only blocks whose operator set admits removal are candidates; the
        // stem and conv heads stay put
        let removable: Vec<usize> = (1..arch.depth())
            .filter(|&i| {
                self.legal_mutations(&arch.blocks()[i])
                    .contains(&MutationOp::RemoveBlock)
            })
            .collect();
        let can_insert = arch.depth() < self.max_layers();
        let can_remove = arch.depth() > self.min_depth() && !removable.is_empty();
        let insert = match (can_insert, can_remove) {
            (true, true) => rng.gen_bool(0.5),
            (true, false) => true,
            (false, true) => false,
            (false, false) => return self.mutate_one_block(arch, rng),
        };

        if insert {
            // insert after a random existing block, identity width, stride 1
            let position = rng.gen_range(1..=arch.depth());
            let width = arch.blocks()[position - 1].out_channels();
            let kernels = &self.config().res_kernels;
            let block = Block::ResKx {
                kernel_size: kernels[rng.gen_range(0..kernels.len())],
                in_channels: width,
                out_channels: width,
                stride: 1,
                bottleneck_channels: self.round_channels(width as f64 * 0.5),
                sub_layers: 1,
            };
            arch.insert_block(position, block)
        } else {
            let index = removable[rng.gen_range(0..removable.len())];
            arch.remove_block(index)
        }
    }

    /// One mutation step: structural with the configured probability,
    /// otherwise a parameter perturbation.
    pub fn mutate(&self, arch: &Architecture, rng: &mut impl Rng) -> Result<Architecture> {
        if rng.gen_bool(self.config().structure_mutation_prob) {
            self.mutate_structure(arch, rng)
        } else {
            self.mutate_one_block(arch, rng)
        }
    }

    /// One perturbed copy of `block` under `op`, or `None` when the domain
    /// offers no alternative value.
    fn perturb(&self, block: &Block, op: MutationOp, rng: &mut impl Rng) -> Option<Block> {
        match op {
            MutationOp::ResizeChannels => {
                let current = block.out_channels();
                let choice = pick_other(&self.channel_choices(current), current, rng)?;
                Some(block.with_out_channels(choice))
            }
            MutationOp::ResizeBottleneck => match block {
                Block::ResKx {
                    bottleneck_channels,
                    ..
                } => {
                    let choice =
                        pick_other(&self.channel_choices(*bottleneck_channels), *bottleneck_channels, rng)?;
                    let mut mutated = block.clone();
                    if let Block::ResKx {
                        bottleneck_channels,
                        ..
                    } = &mut mutated
                    {
                        *bottleneck_channels = choice;
                    }
                    Some(mutated)
                }
                Block::ConvKxBnRelu { .. } => None,
            },
            MutationOp::ChangeKernel => match block {
                Block::ResKx { kernel_size, .. } => {
                    let choice = pick_other(&self.config().res_kernels, *kernel_size, rng)?;
                    let mut mutated = block.clone();
                    if let Block::ResKx { kernel_size, .. } = &mut mutated {
                        *kernel_size = choice;
                    }
                    Some(mutated)
                }
                Block::ConvKxBnRelu { .. } => None,
            },
            MutationOp::ChangeSubLayers => {
                let current = block.sub_layers();
                let choice = pick_other(&self.sublayer_choices(current), current, rng)?;
                let mut mutated = block.clone();
                match &mut mutated {
                    Block::ConvKxBnRelu { sub_layers, .. } | Block::ResKx { sub_layers, .. } => {
                        *sub_layers = choice;
                    }
                }
                Some(mutated)
            }
            MutationOp::InsertBlock | MutationOp::RemoveBlock => None,
        }
    }
}

/// A uniformly random element of `choices` different from `current`.
fn pick_other<T: Copy + PartialEq>(choices: &[T], current: T, rng: &mut impl Rng) -> Option<T> {
    let alternatives: Vec<T> = choices.iter().copied().filter(|c| *c != current).collect();
    if alternatives.is_empty() {
        None
    } else {
        Some(alternatives[rng.gen_range(0..alternatives.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::SearchSpaceConfig;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    const SEED: &str =
        "SuperConvK3BNRELU(3,32,2,1)SuperResK3(32,64,2,32,2)SuperResK5(64,128,2,64,1)";

    fn space_with_max_layers(max_layers: usize) -> SearchSpace {
        SearchSpace::new(SearchSpaceConfig::default().with_max_layers(max_layers)).unwrap()
    }

    fn assert_continuous(arch: &Architecture) {
        for pair in arch.blocks().windows(2) {
            assert_eq!(pair[0].out_channels(), pair[1].in_channels());
        }
    }

    #[test]
    fn test_legal_mutations_per_type() {
        let space = space_with_max_layers(10);
        let head = Block::ConvKxBnRelu {
            kernel_size: 1,
            in_channels: 128,
            out_channels: 512,
            stride: 1,
            sub_layers: 1,
        };
        assert_eq!(space.legal_mutations(&head), vec![MutationOp::ChangeSubLayers]);

        let res = Block::ResKx {
            kernel_size: 3,
            in_channels: 32,
            out_channels: 64,
            stride: 1,
            bottleneck_channels: 32,
            sub_layers: 2,
        };
        assert!(space.legal_mutations(&res).contains(&MutationOp::ChangeKernel));
    }

    #[test]
    fn test_mutate_one_block_preserves_depth_and_continuity() {
        let space = space_with_max_layers(10);
        let arch = Architecture::parse(SEED).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);

        for _ in 0..200 {
            let mutated = space.mutate_one_block(&arch, &mut rng).unwrap();
            assert_eq!(mutated.depth(), arch.depth());
            assert_continuous(&mutated);
            assert_ne!(mutated, arch, "a mutation must change something");
        }
    }

    #[test]
    fn test_mutate_structure_respects_depth_bounds() {
        let space = space_with_max_layers(5);
        let arch = Architecture::parse(SEED).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);

        for _ in 0..200 {
            let mutated = space.mutate_structure(&arch, &mut rng).unwrap();
            assert!(mutated.depth() >= space.min_depth());
            assert!(mutated.depth() <= space.max_layers());
            assert_continuous(&mutated);
        }
    }

    #[test]
    fn test_mutate_structure_at_max_depth_only_shrinks_or_perturbs() {
        let space = space_with_max_layers(3);
        let arch = Architecture::parse(SEED).unwrap();
        assert_eq!(arch.depth(), space.max_layers());
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);

        for _ in 0..100 {
            let mutated = space.mutate_structure(&arch, &mut rng).unwrap();
            assert!(mutated.depth() <= 3);
        }
    }

    #[test]
    fn test_mutate_structure_never_removes_stem() {
        let space = space_with_max_layers(5);
        let arch = Architecture::parse(SEED).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(13);

        for _ in 0..100 {
            let mutated = space.mutate_structure(&arch, &mut rng).unwrap();
            assert!(matches!(
                mutated.blocks()[0],
                Block::ConvKxBnRelu { .. }
            ));
            assert_eq!(mutated.input_channels(), 3);
        }
    }

    #[test]
    fn test_mutate_structure_never_removes_conv_head() {
        // a projection head in the seed is pinned, like the stem
        let space = space_with_max_layers(6);
        let arch = Architecture::parse(
            "SuperConvK3BNRELU(3,32,2,1)SuperResK3(32,64,2,32,2)SuperConvK1BNRELU(64,512,1,1)",
        )
        .unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(17);

        for _ in 0..100 {
            let mutated = space.mutate_structure(&arch, &mut rng).unwrap();
            let heads = mutated
                .blocks()
                .iter()
                .filter(|b| matches!(b, Block::ConvKxBnRelu { kernel_size: 1, .. }))
                .count();
            assert_eq!(heads, 1);
            assert!(matches!(mutated.blocks()[0], Block::ConvKxBnRelu { .. }));
        }
    }

    #[test]
    fn test_mutation_runs_repairable_chain() {
        // long random walk stays structurally valid
        let space = space_with_max_layers(8);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(99);
        let mut arch = Architecture::parse(SEED).unwrap();
        for _ in 0..500 {
            arch = space.mutate(&arch, &mut rng).unwrap();
            assert_continuous(&arch);
            assert!(arch.depth() >= 2 && arch.depth() <= 8);
        }
    }
}
