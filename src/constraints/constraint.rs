//! Constraint types for portfolio problems.
//!
//! Constraints map to cone constraints in the solver:
//! - Budget: sum(w) == total (zero cone)
//! - TargetReturn: w . mu == target (zero cone)
//! - Bounds: lower <= w_i <= upper (nonnegative orthant, two rows per asset)

use nalgebra::DVector;
use serde::Serialize;

/// Cone a constraint is stuffed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConeKind {
    /// Equality rows.
    Zero,
    /// Inequality rows.
    NonNeg,
}

/// A constraint on the weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Weights sum to `total`.
    Budget { total: f64 },

    /// Every weight lies in `[lower, upper]`.
    Bounds { lower: f64, upper: f64 },

    /// Expected return `w . mu` equals `target`.
    TargetReturn { target: f64 },
}

impl Constraint {
    /// Create a budget constraint: sum(w) == total.
    pub fn budget(total: f64) -> Self {
        Constraint::Budget { total }
    }

    /// Create a box constraint on every weight.
    pub fn bounds(lower: f64, upper: f64) -> Self {
        Constraint::Bounds { lower, upper }
    }

    /// Create a target-return constraint: w . mu == target.
    pub fn target_return(target: f64) -> Self {
        Constraint::TargetReturn { target }
    }

    /// The cone this constraint's rows belong to.
    pub fn cone(&self) -> ConeKind {
        match self {
            Constraint::Budget { .. } | Constraint::TargetReturn { .. } => ConeKind::Zero,
            Constraint::Bounds { .. } => ConeKind::NonNeg,
        }
    }

    /// Number of solver rows for `n` assets.
    pub fn rows(&self, n: usize) -> usize {
        match self {
            Constraint::Budget { .. } | Constraint::TargetReturn { .. } => 1,
            Constraint::Bounds { .. } => 2 * n,
        }
    }

    /// Largest violation of this constraint at `weights` (zero when satisfied).
    pub fn violation(&self, weights: &[f64], mean: &DVector<f64>) -> f64 {
        match *self {
            Constraint::Budget { total } => (weights.iter().sum::<f64>() - total).abs(),
            Constraint::Bounds { lower, upper } => weights
                .iter()
                .map(|&w| (lower - w).max(w - upper).max(0.0))
                .fold(0.0, f64::max),
            Constraint::TargetReturn { target } => {
                let achieved: f64 = weights.iter().zip(mean.iter()).map(|(w, m)| w * m).sum();
                (achieved - target).abs()
            }
        }
    }
}

/// Ordered set of constraints of one problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    /// No leverage, no shorting: `sum(w) == 1` and `0 <= w_i <= 1`.
    pub fn fully_invested_long_only() -> Self {
        ConstraintSet {
            constraints: vec![Constraint::budget(1.0), Constraint::bounds(0.0, 1.0)],
        }
    }

    /// Add a constraint.
    pub fn with(mut self, c: Constraint) -> Self {
        self.constraints.push(c);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// The target return, if the set pins one.
    pub fn target_return(&self) -> Option<f64> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::TargetReturn { target } => Some(*target),
            _ => None,
        })
    }

    /// Largest violation over all constraints.
    pub fn max_violation(&self, weights: &[f64], mean: &DVector<f64>) -> f64 {
        self.constraints
            .iter()
            .map(|c| c.violation(weights, mean))
            .fold(0.0, f64::max)
    }
}
