//! Solver interface.
//!
//! This module provides:
//! - The narrow [`PortfolioSolver`] seam the batch optimizer drives
//! - Matrix stuffing of portfolio problems into `(P, q, A, b, cones)` form
//! - Clarabel solver integration

pub mod clarabel;
pub mod stuffing;

use serde::Serialize;

use crate::data::ReturnMoments;
use crate::problem::PortfolioProblem;

pub use self::clarabel::{ClarabelSolver, Settings};
pub use stuffing::{stuff_problem, ConeDims, StuffedProblem};

/// Outcome class of a single solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Optimal weights found.
    Solved,
    /// The constraints cannot be met (e.g. target return out of reach).
    Infeasible,
    /// Numerical failure, iteration/time limit, or a malformed problem.
    SolverError,
}

impl SolveStatus {
    pub fn is_solved(&self) -> bool {
        matches!(self, SolveStatus::Solved)
    }
}

/// Solution from a solver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    /// Solution status.
    pub status: SolveStatus,
    /// Achieved objective (variance or mean return), if solved.
    pub value: Option<f64>,
    /// Weights aligned to the problem's asset order, if solved.
    pub weights: Option<Vec<f64>>,
    /// Solve time in seconds.
    pub solve_time: f64,
    /// Number of iterations.
    pub iterations: u32,
    /// Diagnostic for unsolved outcomes.
    pub message: Option<String>,
}

impl Solution {
    /// A successful solve.
    pub fn solved(weights: Vec<f64>, value: f64) -> Self {
        Solution {
            status: SolveStatus::Solved,
            value: Some(value),
            weights: Some(weights),
            solve_time: 0.0,
            iterations: 0,
            message: None,
        }
    }

    /// An unsolved outcome with a diagnostic.
    pub fn failed(status: SolveStatus, message: impl Into<String>) -> Self {
        Solution {
            status,
            value: None,
            weights: None,
            solve_time: 0.0,
            iterations: 0,
            message: Some(message.into()),
        }
    }
}

/// A numerical backend able to solve portfolio problems.
///
/// Implementations must be stateless across calls: the batch optimizer
/// invokes `solve` concurrently from several workers and expects identical
/// inputs to produce identical outputs. Failures are reported through
/// [`Solution::status`], never by panicking.
pub trait PortfolioSolver: Send + Sync {
    /// Solve one problem against the shared moments.
    fn solve(&self, problem: &PortfolioProblem, moments: &ReturnMoments) -> Solution;
}

impl<S: PortfolioSolver + ?Sized> PortfolioSolver for &S {
    fn solve(&self, problem: &PortfolioProblem, moments: &ReturnMoments) -> Solution {
        (**self).solve(problem, moments)
    }
}

impl<S: PortfolioSolver + ?Sized> PortfolioSolver for std::sync::Arc<S> {
    fn solve(&self, problem: &PortfolioProblem, moments: &ReturnMoments) -> Solution {
        (**self).solve(problem, moments)
    }
}
