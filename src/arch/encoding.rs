//! Architecture encoding
//!
//! An [`Architecture`] is an ordered, channel-continuous sequence of blocks
//! with a stable one-line textual form: block specs concatenated with no
//! separator, e.g.
//! `SuperConvK3BNRELU(3,32,2,1)SuperResK3(32,64,2,32,2)SuperResK5(64,128,2,64,1)`.
//! The textual form is canonical and round-trippable; it doubles as the cache
//! key for measurement and fitness results.

use serde::{Deserialize, Serialize};

use super::block::Block;
use crate::error::{Result, ZennasError};

/// Immutable ordered sequence of super-blocks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Architecture {
    blocks: Vec<Block>,
}

impl Architecture {
    /// Build from a block sequence, enforcing channel continuity.
    pub fn new(blocks: Vec<Block>) -> Result<Self> {
        if blocks.is_empty() {
            return Err(ZennasError::MalformedStructure(
                "architecture has no blocks".to_string(),
            ));
        }
        for block in &blocks {
            block.validate()?;
        }
        for (i, pair) in blocks.windows(2).enumerate() {
            if pair[0].out_channels() != pair[1].in_channels() {
                return Err(ZennasError::MalformedStructure(format!(
                    "channel discontinuity between block {} ({} out) and block {} ({} in)",
                    i,
                    pair[0].out_channels(),
                    i + 1,
                    pair[1].in_channels()
                )));
            }
        }
        Ok(Self { blocks })
    }

    /// Parse the one-line structure string.
    pub fn parse(text: &str) -> Result<Self> {
        let mut blocks = Vec::new();
        let mut rest = text.trim();
        while !rest.is_empty() {
            let open = rest.find('(').ok_or_else(|| {
                ZennasError::MalformedStructure(format!(
                    "expected '(' in block spec near '{}'",
                    truncate(rest)
                ))
            })?;
            let close = rest.find(')').ok_or_else(|| {
                ZennasError::MalformedStructure(format!(
                    "unbalanced parentheses near '{}'",
                    truncate(rest)
                ))
            })?;
            if close < open {
                return Err(ZennasError::MalformedStructure(format!(
                    "unexpected ')' near '{}'",
                    truncate(rest)
                )));
            }
            let name = &rest[..open];
            let params = rest[open + 1..close]
                .split(',')
                .map(|p| {
                    p.trim().parse::<usize>().map_err(|_| {
                        ZennasError::MalformedStructure(format!(
                            "non-integer parameter '{}' in {}",
                            p.trim(),
                            name
                        ))
                    })
                })
                .collect::<Result<Vec<usize>>>()?;
            blocks.push(Block::from_parts(name, &params)?);
            rest = &rest[close + 1..];
        }
        Self::new(blocks)
    }

    /// Canonical textual form; inverse of [`Architecture::parse`].
    pub fn serialize(&self) -> String {
        self.blocks.iter().map(|b| b.serialize()).collect()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block count (the architecture's depth for budget purposes).
    pub fn depth(&self) -> usize {
        self.blocks.len()
    }

    pub fn input_channels(&self) -> usize {
        self.blocks[0].in_channels()
    }

    pub fn output_channels(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_channels()
    }

    /// Total stride from input to output.
    pub fn total_stride(&self) -> usize {
        self.blocks.iter().map(|b| b.stride()).product()
    }

    /// Replacement of one block plus downstream channel repair: every block
    /// after `index` has its `in_channels` re-wired to its predecessor's
    /// `out_channels`.
    pub fn replace_block(&self, index: usize, block: Block) -> Result<Self> {
        let mut blocks = self.blocks.clone();
        blocks[index] = block;
        repair_downstream(&mut blocks, index);
        Self::new(blocks)
    }

    /// Insertion of a block at `index` with downstream repair.
    pub fn insert_block(&self, index: usize, block: Block) -> Result<Self> {
        let mut blocks = self.blocks.clone();
        blocks.insert(index, block);
        if index > 0 {
            let prev_out = blocks[index - 1].out_channels();
            blocks[index] = blocks[index].with_in_channels(prev_out);
        }
        repair_downstream(&mut blocks, index);
        Self::new(blocks)
    }

    /// Removal of the block at `index` with downstream repair.
    pub fn remove_block(&self, index: usize) -> Result<Self> {
        let mut blocks = self.blocks.clone();
        blocks.remove(index);
        if index > 0 && index < blocks.len() {
            let prev_out = blocks[index - 1].out_channels();
            blocks[index] = blocks[index].with_in_channels(prev_out);
        }
        if !blocks.is_empty() {
            let from = index.min(blocks.len() - 1);
            repair_downstream(&mut blocks, from);
        }
        Self::new(blocks)
    }
}

fn repair_downstream(blocks: &mut [Block], from: usize) {
    for i in from + 1..blocks.len() {
        let prev_out = blocks[i - 1].out_channels();
        if blocks[i].in_channels() != prev_out {
            blocks[i] = blocks[i].with_in_channels(prev_out);
        }
    }
}

fn truncate(s: &str) -> &str {
    if s.len() <= 32 {
        s
    } else {
        s.get(..32).unwrap_or(s)
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.serialize())
    }
}
