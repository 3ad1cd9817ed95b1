//! Portfolio problem descriptors.
//!
//! A `PortfolioProblem` names the assets, the objective, and the constraint
//! set. It carries no market data: the solver reads the mean vector and
//! covariance from the shared [`ReturnMoments`](crate::data::ReturnMoments).
//!
//! ```ignore
//! let problem = build_problem(moments.assets(), ObjectiveKind::MinimizeVariance, Some(0.001))?;
//! ```

use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::constraints::{Constraint, ConstraintSet};
use crate::error::{FrontierError, Result};

/// Objective type for portfolio problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    /// Minimize `w' Sigma w` at a pinned expected return.
    MinimizeVariance,
    /// Maximize `w . mu` (internally converted to minimization).
    MaximizeMean,
}

impl ObjectiveKind {
    /// Check if this is a minimization.
    pub fn is_minimize(&self) -> bool {
        matches!(self, ObjectiveKind::MinimizeVariance)
    }
}

/// An immutable portfolio optimization problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioProblem {
    #[serde(serialize_with = "serialize_assets")]
    assets: Arc<[String]>,
    objective: ObjectiveKind,
    constraints: ConstraintSet,
}

impl PortfolioProblem {
    /// Minimize variance at `target_return`.
    pub fn minimize_variance(assets: &Arc<[String]>, target_return: f64) -> Result<Self> {
        build_problem(assets, ObjectiveKind::MinimizeVariance, Some(target_return))
    }

    /// Maximize expected return.
    pub fn maximize_mean(assets: &Arc<[String]>) -> Result<Self> {
        build_problem(assets, ObjectiveKind::MaximizeMean, None)
    }

    /// Asset identifiers, in weight order.
    pub fn assets(&self) -> &Arc<[String]> {
        &self.assets
    }

    pub fn n_assets(&self) -> usize {
        self.assets.len()
    }

    pub fn objective(&self) -> ObjectiveKind {
        self.objective
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// The pinned expected return, for variance problems.
    pub fn target_return(&self) -> Option<f64> {
        self.constraints.target_return()
    }
}

/// Build a portfolio problem.
///
/// Every problem is fully invested and long-only. `MinimizeVariance`
/// requires a finite `target_return`; `MaximizeMean` must not get one.
///
/// # Errors
///
/// Returns `InvalidConfiguration` for an empty asset list or a target
/// return that does not fit the objective.
pub fn build_problem(
    assets: &Arc<[String]>,
    objective: ObjectiveKind,
    target_return: Option<f64>,
) -> Result<PortfolioProblem> {
    if assets.is_empty() {
        return Err(FrontierError::InvalidConfiguration(
            "a portfolio problem needs at least one asset".into(),
        ));
    }

    let mut constraints = ConstraintSet::fully_invested_long_only();

    match (objective, target_return) {
        (ObjectiveKind::MinimizeVariance, Some(t)) if t.is_finite() => {
            constraints = constraints.with(Constraint::target_return(t));
        }
        (ObjectiveKind::MinimizeVariance, Some(t)) => {
            return Err(FrontierError::InvalidConfiguration(format!(
                "target return must be finite, got {t}"
            )));
        }
        (ObjectiveKind::MinimizeVariance, None) => {
            return Err(FrontierError::InvalidConfiguration(
                "variance minimization requires a target return".into(),
            ));
        }
        (ObjectiveKind::MaximizeMean, Some(_)) => {
            return Err(FrontierError::InvalidConfiguration(
                "mean maximization does not take a target return".into(),
            ));
        }
        (ObjectiveKind::MaximizeMean, None) => {}
    }

    Ok(PortfolioProblem {
        assets: Arc::clone(assets),
        objective,
        constraints,
    })
}

fn serialize_assets<S: Serializer>(assets: &Arc<[String]>, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_seq(assets.iter())
}
