//! Target-return grid generation.

use tracing::debug;

use crate::batch::{BatchOptimizer, OptimizationResult};
use crate::error::{FrontierError, Result};
use crate::problem::PortfolioProblem;
use crate::solver::PortfolioSolver;

/// The bounding solve and the targets it spans.
#[derive(Debug, Clone)]
pub struct TargetGrid {
    /// Highest achievable mean daily return.
    pub max_return: f64,
    /// Strictly increasing targets from the minimum to `max_return`.
    pub targets: Vec<f64>,
    /// Result of the max-return solve.
    pub max_result: OptimizationResult,
}

/// Produces the frontier's target returns.
#[derive(Debug)]
pub struct FrontierGenerator<'a, S> {
    batch: &'a BatchOptimizer<S>,
}

impl<'a, S: PortfolioSolver> FrontierGenerator<'a, S> {
    pub fn new(batch: &'a BatchOptimizer<S>) -> Self {
        FrontierGenerator { batch }
    }

    /// Solve for the maximum achievable return and space `n_points` targets
    /// evenly over `[min_target_return, max_return]`.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` if `n_points < 2`, the minimum is not
    ///   finite, or the minimum is not below the maximum
    /// - `FrontierUnsolvable` if the max-return solve fails
    pub fn generate(&self, n_points: usize, min_target_return: f64) -> Result<TargetGrid> {
        if n_points < 2 {
            return Err(FrontierError::InvalidConfiguration(format!(
                "a frontier needs at least 2 points, got {n_points}"
            )));
        }
        if !min_target_return.is_finite() {
            return Err(FrontierError::InvalidConfiguration(
                "min_target_return must be finite".into(),
            ));
        }

        let moments = self.batch.moments();
        let problem = PortfolioProblem::maximize_mean(moments.assets())?;
        let max_result = self
            .batch
            .run(vec![problem], 1)?
            .pop()
            .ok_or_else(|| FrontierError::FrontierUnsolvable("no result for max-return solve".into()))?;

        let weights = match (&max_result.weights, max_result.is_solved()) {
            (Some(w), true) => w,
            _ => {
                return Err(FrontierError::FrontierUnsolvable(format!(
                    "max-return solve ended with status {:?}: {}",
                    max_result.status,
                    max_result.message.as_deref().unwrap_or("no detail")
                )))
            }
        };
        let max_return = moments.portfolio_mean(weights);

        if min_target_return >= max_return {
            return Err(FrontierError::InvalidConfiguration(format!(
                "min_target_return {min_target_return} is not below the maximum achievable return {max_return}"
            )));
        }

        let targets = linspace(min_target_return, max_return, n_points);
        debug!(max_return, n_points, "generated target grid");

        Ok(TargetGrid {
            max_return,
            targets,
            max_result,
        })
    }
}

/// `n` evenly spaced values from `start` to `end`, both endpoints exact.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}
