//! Matrix stuffing: converts portfolio problems to solver format.
//!
//! This module builds the matrices (P, q, A, b) and cone specifications
//! required by Clarabel, which solves
//!
//! ```text
//! minimize    (1/2) x' P x + q' x
//! subject to  A x + s = b,  s in K
//! ```
//!
//! Zero-cone rows come first, followed by nonnegative-cone rows.
//!
//! Daily moments are tiny (variances near 1e-4, objectives near 1e-10), far
//! below the solver's absolute tolerances. The objective is divided by the
//! largest variance (or largest absolute mean) and the target-return row by
//! the largest absolute mean, so the solver works on quantities of order one.

use nalgebra_sparse::CscMatrix;

use crate::constraints::{ConeKind, Constraint};
use crate::data::ReturnMoments;
use crate::error::{FrontierError, Result};
use crate::problem::{ObjectiveKind, PortfolioProblem};
use crate::sparse::{csc_from_triplets, upper_triangle_to_csc};

/// Magnitudes below this are treated as zero when choosing a scale.
const MIN_SCALE: f64 = 1e-12;

/// Cone dimensions for Clarabel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConeDims {
    /// Number of zero cone (equality) rows.
    pub zero: usize,
    /// Number of nonnegative cone rows.
    pub nonneg: usize,
}

impl ConeDims {
    /// Total number of constraint rows.
    pub fn total(&self) -> usize {
        self.zero + self.nonneg
    }
}

/// Stuffed problem ready for Clarabel.
#[derive(Debug)]
pub struct StuffedProblem {
    /// Quadratic cost matrix P (n x n, upper triangle).
    pub p: CscMatrix<f64>,
    /// Linear cost vector q (n).
    pub q: Vec<f64>,
    /// Constraint matrix A (m x n).
    pub a: CscMatrix<f64>,
    /// Constraint vector b (m).
    pub b: Vec<f64>,
    /// Cone dimensions.
    pub cone_dims: ConeDims,
    /// Multiplier turning the solver objective into the reported one:
    /// the objective scale, negated for maximization.
    pub objective_scale: f64,
}

/// Build the stuffed problem for `problem` against `moments`.
///
/// # Errors
///
/// Returns `InvalidConfiguration` when the problem's assets differ from the
/// moments' assets.
pub fn stuff_problem(problem: &PortfolioProblem, moments: &ReturnMoments) -> Result<StuffedProblem> {
    if problem.assets()[..] != moments.assets()[..] {
        return Err(FrontierError::InvalidConfiguration(
            "problem assets do not match the return moments".into(),
        ));
    }
    let n = problem.n_assets();

    let mean_scale = mean_scale(moments);

    // Objective: w' Sigma w is (1/2) w' (2 Sigma) w; max mu . w is min -mu . w.
    let (p, q, objective_scale) = match problem.objective() {
        ObjectiveKind::MinimizeVariance => {
            let scale = variance_scale(moments);
            (
                upper_triangle_to_csc(moments.covariance(), 2.0 / scale),
                vec![0.0; n],
                scale,
            )
        }
        ObjectiveKind::MaximizeMean => (
            CscMatrix::zeros(n, n),
            moments.mean().iter().map(|m| -m / mean_scale).collect(),
            -mean_scale,
        ),
    };

    let (a, b, cone_dims) = stuff_constraints(problem, moments, mean_scale);

    Ok(StuffedProblem {
        p,
        q,
        a,
        b,
        cone_dims,
        objective_scale,
    })
}

/// Largest asset variance, or 1 for a riskless universe.
fn variance_scale(moments: &ReturnMoments) -> f64 {
    let max = moments.covariance().diagonal().amax();
    if max > MIN_SCALE {
        max
    } else {
        1.0
    }
}

/// Largest absolute mean return, or 1 if every mean is zero.
fn mean_scale(moments: &ReturnMoments) -> f64 {
    let max = moments.mean().amax();
    if max > MIN_SCALE {
        max
    } else {
        1.0
    }
}

/// Stuff the constraints into A, b and cone dimensions.
///
/// The target-return row is divided by `mean_scale`.
fn stuff_constraints(
    problem: &PortfolioProblem,
    moments: &ReturnMoments,
    mean_scale: f64,
) -> (CscMatrix<f64>, Vec<f64>, ConeDims) {
    let n = problem.n_assets();
    let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
    let mut b = Vec::new();
    let mut dims = ConeDims::default();

    let ordered = problem
        .constraints()
        .iter()
        .filter(|c| c.cone() == ConeKind::Zero)
        .chain(problem.constraints().iter().filter(|c| c.cone() == ConeKind::NonNeg));

    for constraint in ordered {
        let row = b.len();
        match *constraint {
            Constraint::Budget { total } => {
                triplets.extend((0..n).map(|j| (row, j, 1.0)));
                b.push(total);
            }
            Constraint::TargetReturn { target } => {
                triplets.extend(
                    moments
                        .mean()
                        .iter()
                        .enumerate()
                        .map(|(j, &m)| (row, j, m / mean_scale)),
                );
                b.push(target / mean_scale);
            }
            Constraint::Bounds { lower, upper } => {
                // -w + s = -lower and w + s = upper, s >= 0
                for j in 0..n {
                    triplets.push((row + j, j, -1.0));
                    b.push(-lower);
                }
                for j in 0..n {
                    triplets.push((row + n + j, j, 1.0));
                    b.push(upper);
                }
            }
        }
        match constraint.cone() {
            ConeKind::Zero => dims.zero += constraint.rows(n),
            ConeKind::NonNeg => dims.nonneg += constraint.rows(n),
        }
    }

    let a = csc_from_triplets(b.len(), n, triplets);
    (a, b, dims)
}

/// Compute objective value: (1/2) x' P x + q' x, with P stored as its upper triangle.
pub fn compute_objective(x: &[f64], p: &CscMatrix<f64>, q: &[f64]) -> f64 {
    let linear: f64 = q.iter().zip(x.iter()).map(|(qi, xi)| qi * xi).sum();

    let mut quadratic = 0.0;
    for (row, col, val) in p.triplet_iter() {
        if row == col {
            quadratic += 0.5 * *val * x[row] * x[col];
        } else {
            quadratic += *val * x[row] * x[col];
        }
    }

    linear + quadratic
}
