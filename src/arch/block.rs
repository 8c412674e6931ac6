//! Super-block definitions
//!
//! A block is a parameterized, composable unit of a plain network. Each
//! variant carries only its own parameter fields; the kernel size is part of
//! the block's textual type name (`SuperConvK3BNRELU`, `SuperResK5`, ...).

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZennasError};

/// Kernel sizes a conv group may use
pub const CONV_KERNELS: [usize; 4] = [1, 3, 5, 7];

/// Kernel sizes a residual group may use
pub const RES_KERNELS: [usize; 3] = [3, 5, 7];

/// A single super-block in an architecture.
///
/// Immutable once constructed; mutation produces a new `Block`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Block {
    /// Conv + BN + ReLU group: `sub_layers` stacked convolutions, the first
    /// carrying the stride.
    ConvKxBnRelu {
        kernel_size: usize,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        sub_layers: usize,
    },
    /// Residual bottleneck group: `sub_layers` stacked two-conv residual
    /// units through `bottleneck_channels`.
    ResKx {
        kernel_size: usize,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        bottleneck_channels: usize,
        sub_layers: usize,
    },
}

impl Block {
    pub fn in_channels(&self) -> usize {
        match self {
            Block::ConvKxBnRelu { in_channels, .. } | Block::ResKx { in_channels, .. } => {
                *in_channels
            }
        }
    }

    pub fn out_channels(&self) -> usize {
        match self {
            Block::ConvKxBnRelu { out_channels, .. } | Block::ResKx { out_channels, .. } => {
                *out_channels
            }
        }
    }

    pub fn stride(&self) -> usize {
        match self {
            Block::ConvKxBnRelu { stride, .. } | Block::ResKx { stride, .. } => *stride,
        }
    }

    pub fn kernel_size(&self) -> usize {
        match self {
            Block::ConvKxBnRelu { kernel_size, .. } | Block::ResKx { kernel_size, .. } => {
                *kernel_size
            }
        }
    }

    pub fn sub_layers(&self) -> usize {
        match self {
            Block::ConvKxBnRelu { sub_layers, .. } | Block::ResKx { sub_layers, .. } => {
                *sub_layers
            }
        }
    }

    pub fn bottleneck_channels(&self) -> Option<usize> {
        match self {
            Block::ConvKxBnRelu { .. } => None,
            Block::ResKx {
                bottleneck_channels,
                ..
            } => Some(*bottleneck_channels),
        }
    }

    /// Copy of this block with a different input width (channel repair).
    pub fn with_in_channels(&self, channels: usize) -> Block {
        let mut block = self.clone();
        match &mut block {
            Block::ConvKxBnRelu { in_channels, .. } | Block::ResKx { in_channels, .. } => {
                *in_channels = channels;
            }
        }
        block
    }

    /// Copy of this block with a different output width.
    pub fn with_out_channels(&self, channels: usize) -> Block {
        let mut block = self.clone();
        match &mut block {
            Block::ConvKxBnRelu { out_channels, .. } | Block::ResKx { out_channels, .. } => {
                *out_channels = channels;
            }
        }
        block
    }

    /// Textual type name, kernel size included (`SuperResK5` etc.).
    pub fn type_name(&self) -> String {
        match self {
            Block::ConvKxBnRelu { kernel_size, .. } => format!("SuperConvK{kernel_size}BNRELU"),
            Block::ResKx { kernel_size, .. } => format!("SuperResK{kernel_size}"),
        }
    }

    /// Canonical textual form, e.g. `SuperResK3(32,64,2,32,2)`.
    pub fn serialize(&self) -> String {
        match self {
            Block::ConvKxBnRelu {
                in_channels,
                out_channels,
                stride,
                sub_layers,
                ..
            } => format!(
                "{}({in_channels},{out_channels},{stride},{sub_layers})",
                self.type_name()
            ),
            Block::ResKx {
                in_channels,
                out_channels,
                stride,
                bottleneck_channels,
                sub_layers,
                ..
            } => format!(
                "{}({in_channels},{out_channels},{stride},{bottleneck_channels},{sub_layers})",
                self.type_name()
            ),
        }
    }

    /// Build a block from its type name and comma-split parameters.
    pub fn from_parts(name: &str, params: &[usize]) -> Result<Block> {
        if let Some(kernel) = parse_kernel(name, "SuperConvK", "BNRELU") {
            if !CONV_KERNELS.contains(&kernel) {
                return Err(malformed(format!("unsupported conv kernel size {kernel}")));
            }
            let [in_channels, out_channels, stride, sub_layers] = expect_params::<4>(name, params)?;
            let block = Block::ConvKxBnRelu {
                kernel_size: kernel,
                in_channels,
                out_channels,
                stride,
                sub_layers,
            };
            block.validate()?;
            return Ok(block);
        }
        if let Some(kernel) = parse_kernel(name, "SuperResK", "") {
            if !RES_KERNELS.contains(&kernel) {
                return Err(malformed(format!("unsupported res kernel size {kernel}")));
            }
            let [in_channels, out_channels, stride, bottleneck_channels, sub_layers] =
                expect_params::<5>(name, params)?;
            let block = Block::ResKx {
                kernel_size: kernel,
                in_channels,
                out_channels,
                stride,
                bottleneck_channels,
                sub_layers,
            };
            block.validate()?;
            return Ok(block);
        }
        Err(malformed(format!("unrecognized block type '{name}'")))
    }

    /// Structural sanity independent of any neighbor block.
    pub fn validate(&self) -> Result<()> {
        if self.in_channels() == 0 || self.out_channels() == 0 {
            return Err(malformed(format!(
                "{}: zero channel width",
                self.serialize()
            )));
        }
        if self.sub_layers() == 0 {
            return Err(malformed(format!(
                "{}: zero sub-layers",
                self.serialize()
            )));
        }
        if !matches!(self.stride(), 1 | 2) {
            return Err(malformed(format!(
                "{}: stride must be 1 or 2",
                self.serialize()
            )));
        }
        if let Some(bottleneck) = self.bottleneck_channels() {
            if bottleneck == 0 {
                return Err(malformed(format!(
                    "{}: zero bottleneck width",
                    self.serialize()
                )));
            }
        }
        Ok(())
    }
}

fn malformed(msg: String) -> ZennasError {
    ZennasError::MalformedStructure(msg)
}

/// Extract the kernel size embedded in a block type name, if the name
/// matches `<prefix><digits><suffix>` exactly.
fn parse_kernel(name: &str, prefix: &str, suffix: &str) -> Option<usize> {
    let rest = name.strip_prefix(prefix)?;
    let digits = rest.strip_suffix(suffix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn expect_params<const N: usize>(name: &str, params: &[usize]) -> Result<[usize; N]> {
    <[usize; N]>::try_from(params).map_err(|_| {
        malformed(format!(
            "{name}: expected {N} parameters, got {}",
            params.len()
        ))
    })
}
