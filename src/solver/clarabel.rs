//! Clarabel solver integration.
//!
//! This module provides the [`PortfolioSolver`] implementation backed by the
//! Clarabel interior-point solver.

use clarabel::algebra::CscMatrix as ClarabelCsc;
use clarabel::solver::{
    DefaultSettings, DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::stuffing::{compute_objective, stuff_problem, ConeDims, StuffedProblem};
use super::{PortfolioSolver, Solution, SolveStatus};
use crate::constraints::Constraint;
use crate::data::ReturnMoments;
use crate::error::{FrontierError, Result};
use crate::problem::{ObjectiveKind, PortfolioProblem};

impl From<SolverStatus> for SolveStatus {
    fn from(status: SolverStatus) -> Self {
        match status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => SolveStatus::Solved,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                SolveStatus::Infeasible
            }
            _ => SolveStatus::SolverError,
        }
    }
}

/// Solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Print solver output.
    pub verbose: bool,
    /// Maximum iterations.
    pub max_iter: u32,
    /// Time limit per solve in seconds; `None` means unbounded.
    pub time_limit: Option<f64>,
    /// Absolute duality gap tolerance.
    pub tol_gap_abs: f64,
    /// Relative duality gap tolerance.
    pub tol_gap_rel: f64,
    /// Primal/dual feasibility tolerance.
    pub tol_feas: f64,
    /// Largest constraint violation accepted on returned weights.
    pub weight_tolerance: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            verbose: false,
            max_iter: 200,
            time_limit: Some(30.0),
            tol_gap_abs: 1e-9,
            tol_gap_rel: 1e-9,
            tol_feas: 1e-8,
            weight_tolerance: 1e-6,
        }
    }
}

/// Portfolio solver backed by Clarabel.
///
/// Each call builds a fresh Clarabel instance, so the solver can be shared
/// across threads.
#[derive(Debug, Clone)]
pub struct ClarabelSolver {
    settings: Settings,
    clarabel_settings: DefaultSettings<f64>,
}

impl ClarabelSolver {
    /// Create a solver, validating the settings up front.
    pub fn new(settings: Settings) -> Result<Self> {
        if !(settings.weight_tolerance.is_finite() && settings.weight_tolerance > 0.0) {
            return Err(FrontierError::SolverSetup(format!(
                "weight_tolerance must be positive, got {}",
                settings.weight_tolerance
            )));
        }
        let time_limit = match settings.time_limit {
            Some(t) if t > 0.0 => t,
            Some(t) => {
                return Err(FrontierError::SolverSetup(format!(
                    "time_limit must be positive, got {t}"
                )))
            }
            None => f64::INFINITY,
        };

        let clarabel_settings = DefaultSettingsBuilder::default()
            .verbose(settings.verbose)
            .max_iter(settings.max_iter)
            .time_limit(time_limit)
            .tol_gap_abs(settings.tol_gap_abs)
            .tol_gap_rel(settings.tol_gap_rel)
            .tol_feas(settings.tol_feas)
            .build()
            .map_err(|e| FrontierError::SolverSetup(e.to_string()))?;

        Ok(ClarabelSolver {
            settings,
            clarabel_settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Solve an already stuffed problem.
    pub fn solve_stuffed(&self, problem: &StuffedProblem) -> Solution {
        let p = to_clarabel_csc(&problem.p);
        let a = to_clarabel_csc(&problem.a);
        let cones = to_clarabel_cones(&problem.cone_dims);

        let mut solver = DefaultSolver::new(
            &p,
            &problem.q,
            &a,
            &problem.b,
            &cones,
            self.clarabel_settings.clone(),
        );
        solver.solve();

        let raw_status = solver.solution.status;
        let status: SolveStatus = raw_status.into();
        let solve_time = solver.solution.solve_time;
        let iterations = solver.info.iterations;
        trace!(status = ?raw_status, iterations, solve_time, "clarabel finished");

        if status == SolveStatus::Solved {
            let x = solver.solution.x.clone();
            let value = compute_objective(&x, &problem.p, &problem.q) * problem.objective_scale;
            Solution {
                status,
                value: Some(value),
                weights: Some(x),
                solve_time,
                iterations,
                message: None,
            }
        } else {
            Solution {
                status,
                value: None,
                weights: None,
                solve_time,
                iterations,
                message: Some(format!("clarabel status {raw_status:?}")),
            }
        }
    }
}

impl PortfolioSolver for ClarabelSolver {
    fn solve(&self, problem: &PortfolioProblem, moments: &ReturnMoments) -> Solution {
        let stuffed = match stuff_problem(problem, moments) {
            Ok(s) => s,
            Err(e) => return Solution::failed(SolveStatus::SolverError, e.to_string()),
        };

        let mut solution = self.solve_stuffed(&stuffed);

        if let Some(raw) = solution.weights.take() {
            let violation = problem.constraints().max_violation(&raw, moments.mean());
            if violation > self.settings.weight_tolerance {
                solution.status = SolveStatus::SolverError;
                solution.value = None;
                solution.message = Some(format!(
                    "weights violate constraints by {violation:e} (tolerance {:e})",
                    self.settings.weight_tolerance
                ));
            } else {
                let weights = polish_weights(raw, problem);
                solution.value = Some(match problem.objective() {
                    ObjectiveKind::MinimizeVariance => moments.portfolio_variance(&weights),
                    ObjectiveKind::MaximizeMean => moments.portfolio_mean(&weights),
                });
                solution.weights = Some(weights);
            }
        }

        solution
    }
}

/// Remove interior-point residue: clip into the bounds and rescale onto the
/// budget.
fn polish_weights(mut weights: Vec<f64>, problem: &PortfolioProblem) -> Vec<f64> {
    for c in problem.constraints().iter() {
        if let Constraint::Bounds { lower, upper } = *c {
            for w in weights.iter_mut() {
                *w = w.clamp(lower, upper);
            }
        }
    }
    for c in problem.constraints().iter() {
        if let Constraint::Budget { total } = *c {
            let sum: f64 = weights.iter().sum();
            if sum > 0.0 {
                for w in weights.iter_mut() {
                    *w *= total / sum;
                }
            }
        }
    }
    weights
}

/// Convert nalgebra CSC to Clarabel CSC.
fn to_clarabel_csc(m: &nalgebra_sparse::CscMatrix<f64>) -> ClarabelCsc<f64> {
    ClarabelCsc::new(
        m.nrows(),
        m.ncols(),
        m.col_offsets().to_vec(),
        m.row_indices().to_vec(),
        m.values().to_vec(),
    )
}

/// Convert cone dimensions to Clarabel cones.
fn to_clarabel_cones(dims: &ConeDims) -> Vec<SupportedConeT<f64>> {
    let mut cones = Vec::new();

    if dims.zero > 0 {
        cones.push(SupportedConeT::ZeroConeT(dims.zero));
    }

    if dims.nonneg > 0 {
        cones.push(SupportedConeT::NonnegativeConeT(dims.nonneg));
    }

    cones
}
