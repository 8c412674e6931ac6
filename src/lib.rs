//! zennas - Training-free evolutionary neural architecture search
//!
//! Searches a space of convolutional super-blocks for a layer sequence that
//! maximizes a zero-cost proxy score under hard resource budgets (parameters,
//! optional FLOPs, depth), without training any network.
//!
//! # Modules
//!
//! ## Search core
//! - [`arch`] - Architecture encoding: super-blocks and the structure string
//! - [`space`] - Search space: block catalog, parameter domains, mutations
//! - [`budget`] - Budget checker with cached resource measurements
//! - [`fitness`] - Cached zero-cost fitness evaluation
//! - [`population`] - Fixed-size population with age-based replacement
//! - [`driver`] - Bounded evolution loop with progress reporting
//!
//! ## Collaborators
//! - [`proxy`] - Measurement and scorer traits plus bundled implementations
//!
//! ## Services
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Search core
pub mod arch;
pub mod space;
pub mod budget;
pub mod fitness;
pub mod population;
pub mod driver;

// Collaborators
pub mod proxy;

// Services
pub mod cli;

pub use error::{Result, ZennasError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::arch::{Architecture, Block};
    pub use crate::budget::{BudgetChecker, BudgetConfig, Feasibility, Rejection};
    pub use crate::driver::{EvolutionConfig, EvolutionDriver, SearchReport};
    pub use crate::error::{Result, ZennasError};
    pub use crate::fitness::FitnessEvaluator;
    pub use crate::population::{Candidate, InitPolicy, PopulationManager, TickStats};
    pub use crate::proxy::{
        AnalyticMeasure, ArchMeasure, Measurement, ZenScoreConfig, ZenScorer, ZeroCostScorer,
    };
    pub use crate::space::{MutationOp, SearchSpace, SearchSpaceConfig};
}
