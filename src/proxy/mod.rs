//! Opaque collaborator seam
//!
//! The search core depends on the measurement and scoring subsystems only
//! through the two narrow synchronous traits below. The bundled
//! implementations ([`analytic::AnalyticMeasure`], [`zen::ZenScorer`]) are
//! deterministic stand-ins with the same contract as a real builder/proxy;
//! any implementation is substitutable and independently testable.

pub mod analytic;
pub mod zen;

use serde::{Deserialize, Serialize};

use crate::arch::Architecture;
use crate::error::Result;

pub use analytic::AnalyticMeasure;
pub use zen::{ZenScoreConfig, ZenScorer};

/// Resource measurement of one architecture. Derived, cached per canonical
/// textual form, never mutated after computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub param_count: u64,
    pub flop_count: u64,
}

/// Network-construction / resource-counting collaborator.
pub trait ArchMeasure: Send + Sync {
    fn measure(&self, arch: &Architecture) -> Result<Measurement>;
}

/// Zero-cost scoring collaborator. Higher is better; deterministic for a
/// fixed seed and architecture.
pub trait ZeroCostScorer: Send + Sync {
    fn score(&self, arch: &Architecture) -> Result<f64>;
}

/// Stub scorer returning a fixed value, for tests and dry runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedScorer(pub f64);

impl ZeroCostScorer for FixedScorer {
    fn score(&self, _arch: &Architecture) -> Result<f64> {
        Ok(self.0)
    }
}

/// Stub measurement collaborator returning fixed values.
#[derive(Debug, Clone, Copy)]
pub struct FixedMeasure(pub Measurement);

impl ArchMeasure for FixedMeasure {
    fn measure(&self, _arch: &Architecture) -> Result<Measurement> {
        Ok(self.0)
    }
}
