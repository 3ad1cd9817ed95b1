//! Efficient frontier construction.
//!
//! [`EfficientFrontier::compute`] runs the whole pipeline on a returns
//! matrix:
//!
//! 1. estimate mean returns and covariance once, shared by every solve
//! 2. solve the max-return problem and space the target returns
//! 3. solve one minimum-variance problem per target in a parallel batch
//! 4. recompute realized risk, return and Sharpe ratio per point
//! 5. pick and annualize the best points
//!
//! ```ignore
//! let engine = EfficientFrontier::with_clarabel(config)?;
//! let report = engine.compute(&returns)?;
//! println!("max Sharpe at {}", report.best_sharpe.unwrap().target_return);
//! ```

pub mod generator;
pub mod metrics;

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::batch::BatchOptimizer;
use crate::config::FrontierConfig;
use crate::data::{AssetSeries, ReturnMoments, ReturnsBuilder, ReturnsMatrix};
use crate::error::{FrontierError, Result};
use crate::problem::PortfolioProblem;
use crate::solver::{ClarabelSolver, PortfolioSolver};

pub use generator::{linspace, FrontierGenerator, TargetGrid};
pub use metrics::{sharpe_ratio, AnnualizedPoint, Annualization, Frontier, FrontierPoint};

/// Result of a frontier run.
#[derive(Debug, Clone, Serialize)]
pub struct FrontierReport {
    /// Highest achievable mean daily return.
    pub max_return: f64,
    /// All requested points, solved or not.
    pub frontier: Frontier,
    /// Point with the best Sharpe ratio; `None` if every solved point has
    /// zero risk.
    pub best_sharpe: Option<AnnualizedPoint>,
    /// Point with the highest realized return.
    pub best_return: AnnualizedPoint,
}

/// Frontier pipeline bound to a configuration and a solver.
#[derive(Debug)]
pub struct EfficientFrontier<S> {
    config: FrontierConfig,
    solver: S,
}

impl EfficientFrontier<ClarabelSolver> {
    /// Pipeline backed by Clarabel using `config.solver` settings.
    pub fn with_clarabel(config: FrontierConfig) -> Result<Self> {
        let solver = ClarabelSolver::new(config.solver.clone())?;
        Self::new(config, solver)
    }
}

impl<S: PortfolioSolver> EfficientFrontier<S> {
    /// Create a pipeline, validating the configuration.
    pub fn new(config: FrontierConfig, solver: S) -> Result<Self> {
        config.validate()?;
        Ok(EfficientFrontier { config, solver })
    }

    pub fn config(&self) -> &FrontierConfig {
        &self.config
    }

    /// Build the returns matrix from raw series per `config.returns`, then
    /// compute the frontier.
    pub fn compute_from_series(&self, series: &[AssetSeries]) -> Result<FrontierReport> {
        let returns = ReturnsBuilder::from_config(&self.config.returns).build(series)?;
        self.compute(&returns)
    }

    /// Compute the frontier for a returns matrix.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` for bad frontier parameters
    /// - `FrontierUnsolvable` if the max-return solve fails
    /// - `NoSolvedPoints` if no frontier point could be solved
    pub fn compute(&self, returns: &ReturnsMatrix) -> Result<FrontierReport> {
        let config = &self.config;
        let moments = Arc::new(ReturnMoments::from_returns(returns));
        let batch = BatchOptimizer::new(&self.solver, Arc::clone(&moments)).with_retry(config.retry);

        let grid = FrontierGenerator::new(&batch).generate(config.n_points, config.min_target_return)?;

        let problems = grid
            .targets
            .iter()
            .map(|&t| PortfolioProblem::minimize_variance(moments.assets(), t))
            .collect::<Result<Vec<_>>>()?;
        let results = batch.run(problems, config.parallelism)?;

        let frontier = Frontier::from_results(&grid.targets, results, returns, &config.metrics)?;

        let annualization = Annualization::from_config(&config.metrics, returns.kind());
        let best_return = frontier
            .best_by_return()
            .map(|p| annualization.annualize(p))
            .ok_or(FrontierError::NoSolvedPoints)?;
        let best_sharpe = frontier.best_by_sharpe().map(|p| annualization.annualize(p));

        info!(
            points = frontier.len(),
            solved = frontier.n_solved(),
            max_return = grid.max_return,
            "efficient frontier computed"
        );

        Ok(FrontierReport {
            max_return: grid.max_return,
            frontier,
            best_sharpe,
            best_return,
        })
    }
}
