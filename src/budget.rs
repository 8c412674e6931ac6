//! Budget checker
//!
//! Classifies candidate architectures as feasible or rejected against the
//! configured resource limits. Depth is a pure count and is checked before
//! the (potentially expensive) measurement collaborator is invoked;
//! measurements are cached by canonical textual form because identical
//! sub-structures recur frequently under mutation. An unset budget axis
//! disables that check.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::arch::Architecture;
use crate::error::Result;
use crate::proxy::{ArchMeasure, Measurement};

/// Resource limits for the search
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Maximum parameter count (`None` disables the check)
    pub max_params: Option<u64>,
    /// Maximum FLOP count (`None` disables the check)
    pub max_flops: Option<u64>,
    /// Maximum block count
    pub max_layers: usize,
}

impl BudgetConfig {
    pub fn new(max_layers: usize) -> Self {
        Self {
            max_params: None,
            max_flops: None,
            max_layers,
        }
    }

    pub fn with_max_params(mut self, limit: u64) -> Self {
        self.max_params = Some(limit);
        self
    }

    pub fn with_max_flops(mut self, limit: u64) -> Self {
        self.max_flops = Some(limit);
        self
    }
}

/// Why a candidate was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    OverParamBudget { actual: u64, limit: u64 },
    OverFlopBudget { actual: u64, limit: u64 },
    OverDepthBudget { actual: usize, limit: usize },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::OverParamBudget { actual, limit } => {
                write!(f, "param count {actual} exceeds budget {limit}")
            }
            Rejection::OverFlopBudget { actual, limit } => {
                write!(f, "FLOP count {actual} exceeds budget {limit}")
            }
            Rejection::OverDepthBudget { actual, limit } => {
                write!(f, "depth {actual} exceeds budget {limit}")
            }
        }
    }
}

/// Feasibility classification of one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feasibility {
    Feasible(Measurement),
    Rejected(Rejection),
}

impl Feasibility {
    pub fn is_feasible(&self) -> bool {
        matches!(self, Feasibility::Feasible(_))
    }
}

/// Checks candidates against the configured budgets, caching measurements.
pub struct BudgetChecker {
    budgets: BudgetConfig,
    measure: Arc<dyn ArchMeasure>,
    cache: RwLock<HashMap<String, Measurement>>,
}

impl BudgetChecker {
    pub fn new(budgets: BudgetConfig, measure: Arc<dyn ArchMeasure>) -> Self {
        Self {
            budgets,
            measure,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn budgets(&self) -> &BudgetConfig {
        &self.budgets
    }

    /// Measurement for an architecture, computed once per canonical form.
    ///
    /// Concurrent misses for the same key may both invoke the collaborator;
    /// the collaborator is deterministic per key, so last-write-wins is
    /// harmless.
    pub fn measure(&self, arch: &Architecture) -> Result<Measurement> {
        let key = arch.serialize();
        if let Some(cached) = self.cache.read().get(&key) {
            return Ok(*cached);
        }
        let measurement = self.measure.measure(arch)?;
        self.cache.write().insert(key, measurement);
        Ok(measurement)
    }

    /// Classify a candidate. Depth first (no collaborator call), then the
    /// configured resource axes; all configured budgets must pass.
    pub fn check(&self, arch: &Architecture) -> Result<Feasibility> {
        if arch.depth() > self.budgets.max_layers {
            return Ok(Feasibility::Rejected(Rejection::OverDepthBudget {
                actual: arch.depth(),
                limit: self.budgets.max_layers,
            }));
        }

        let measurement = self.measure(arch)?;

        if let Some(limit) = self.budgets.max_params {
            if measurement.param_count > limit {
                return Ok(Feasibility::Rejected(Rejection::OverParamBudget {
                    actual: measurement.param_count,
                    limit,
                }));
            }
        }
        if let Some(limit) = self.budgets.max_flops {
            if measurement.flop_count > limit {
                return Ok(Feasibility::Rejected(Rejection::OverFlopBudget {
                    actual: measurement.flop_count,
                    limit,
                }));
            }
        }

        Ok(Feasibility::Feasible(measurement))
    }

    pub fn cache_size(&self) -> usize {
        self.cache.read().len()
    }
}
