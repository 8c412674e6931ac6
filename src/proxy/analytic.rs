//! Analytic resource measurement
//!
//! Counts parameters and FLOPs directly from block shapes, expanding each
//! super-block into its constituent convolutions: a conv group is
//! `sub_layers` stacked k x k convolutions (the first carrying the stride), a
//! residual group is `sub_layers` two-conv bottleneck units with a 1x1
//! projection on the shortcut when shape changes. FLOPs are multiply-adds
//! counted as 2 ops at the post-stride spatial size.

use crate::arch::{Architecture, Block};
use crate::error::Result;
use crate::proxy::{ArchMeasure, Measurement};

/// Default input resolution used when none is configured.
pub const DEFAULT_RESOLUTION: usize = 224;

/// Analytic parameter/FLOP counter.
#[derive(Debug, Clone, Copy)]
pub struct AnalyticMeasure {
    resolution: usize,
}

impl AnalyticMeasure {
    pub fn new(resolution: usize) -> Self {
        Self {
            resolution: resolution.max(1),
        }
    }
}

impl Default for AnalyticMeasure {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLUTION)
    }
}

impl ArchMeasure for AnalyticMeasure {
    fn measure(&self, arch: &Architecture) -> Result<Measurement> {
        let mut params: u64 = 0;
        let mut flops: u64 = 0;
        let mut spatial = self.resolution as u64;

        for block in arch.blocks() {
            let (block_params, block_flops, out_spatial) = measure_block(block, spatial);
            params += block_params;
            flops += block_flops;
            spatial = out_spatial;
        }

        Ok(Measurement {
            param_count: params,
            flop_count: flops,
        })
    }
}

/// Params and FLOPs of one k x k convolution plus its BN, at the given
/// output spatial size.
fn conv_bn(k: u64, cin: u64, cout: u64, spatial: u64) -> (u64, u64) {
    let params = k * k * cin * cout + 2 * cout;
    let flops = 2 * k * k * cin * cout * spatial * spatial;
    (params, flops)
}

fn strided(spatial: u64, stride: u64) -> u64 {
    spatial.div_ceil(stride).max(1)
}

fn measure_block(block: &Block, in_spatial: u64) -> (u64, u64, u64) {
    let k = block.kernel_size() as u64;
    let cin = block.in_channels() as u64;
    let cout = block.out_channels() as u64;
    let out_spatial = strided(in_spatial, block.stride() as u64);

    let mut params = 0;
    let mut flops = 0;

    match block {
        Block::ConvKxBnRelu { sub_layers, .. } => {
            let mut last = cin;
            for _ in 0..*sub_layers {
                let (p, f) = conv_bn(k, last, cout, out_spatial);
                params += p;
                flops += f;
                last = cout;
            }
        }
        Block::ResKx {
            bottleneck_channels,
            sub_layers,
            stride,
            ..
        } => {
            let mid = *bottleneck_channels as u64;
            let mut last = cin;
            let mut unit_stride = *stride as u64;
            for _ in 0..*sub_layers {
                let (p1, f1) = conv_bn(k, last, mid, out_spatial);
                let (p2, f2) = conv_bn(k, mid, cout, out_spatial);
                params += p1 + p2;
                flops += f1 + f2;
                // shortcut projection where the unit changes shape
                if last != cout || unit_stride != 1 {
                    let (p3, f3) = conv_bn(1, last, cout, out_spatial);
                    params += p3;
                    flops += f3;
                }
                last = cout;
                unit_stride = 1;
            }
        }
    }

    (params, flops, out_spatial)
}
