//! # efficient-frontier
//!
//! Mean-variance efficient frontiers from historical daily prices.
//!
//! The crate turns price histories into an aligned returns matrix, formulates
//! long-only, fully invested portfolio problems, solves them in parallel with
//! the Clarabel solver, and reports realized risk, return and Sharpe ratio
//! for every point of the frontier.
//!
//! ## Quick Start
//!
//! ```ignore
//! use efficient_frontier::prelude::*;
//!
//! let returns = ReturnsBuilder::new()
//!     .history_cutoff(cutoff)
//!     .build(&series)?;
//!
//! let config = FrontierConfig { n_points: 50, parallelism: 4, ..Default::default() };
//! let report = EfficientFrontier::with_clarabel(config)?.compute(&returns)?;
//!
//! for point in report.frontier.solved() {
//!     println!("{:.5} -> risk {:.5}", point.actual_return, point.actual_risk);
//! }
//! ```
//!
//! ## Problems
//!
//! Every problem constrains the weights to `0 <= w_i <= 1` and
//! `sum(w) == 1`. Two objectives exist:
//!
//! - **Maximize mean**: `max w . mu`, solved once to bound the frontier
//! - **Minimize variance**: `min w' Sigma w` subject to `w . mu == target`
//!
//! ## Architecture
//!
//! - **Returns matrix** built once and shared read-only
//! - **Problem descriptors** carry no data; moments live behind an `Arc`
//! - **Matrix stuffing** into Clarabel's `(P, q, A, b, cones)` form
//! - **Batch optimizer** on a rayon pool, order preserving, failures contained
//! - **Metrics** recomputed from realized weights, annualized on request

pub mod batch;
pub mod config;
pub mod constraints;
pub mod data;
pub mod error;
pub mod frontier;
pub mod problem;
pub mod solver;
pub mod sparse;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use efficient_frontier::prelude::*;
/// ```
pub mod prelude {
    // Inputs
    pub use crate::data::{
        collect_series, AlignmentPolicy, AssetSeries, ExclusionReason, PriceField, PricePoint,
        PriceSource, ReturnKind, ReturnMoments, ReturnsBuilder, ReturnsMatrix, SourceError,
    };

    // Problems
    pub use crate::constraints::{Constraint, ConstraintSet};
    pub use crate::problem::{build_problem, ObjectiveKind, PortfolioProblem};

    // Solving
    pub use crate::batch::{BatchOptimizer, OptimizationResult, RetryPolicy};
    pub use crate::solver::{ClarabelSolver, PortfolioSolver, Settings, Solution, SolveStatus};

    // Frontier
    pub use crate::frontier::{
        AnnualizedPoint, Annualization, EfficientFrontier, Frontier, FrontierGenerator,
        FrontierPoint, FrontierReport,
    };

    // Configuration
    pub use crate::config::{FrontierConfig, MetricsConfig, ReturnsConfig, TRADING_DAYS_PER_YEAR};

    // Errors
    pub use crate::error::{FrontierError, Result};
}

// Re-export main types at crate root
pub use error::{FrontierError, Result};
pub use frontier::{EfficientFrontier, Frontier, FrontierReport};
