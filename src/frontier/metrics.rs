//! Frontier metrics.
//!
//! Realized risk and return are recomputed from each point's weights and the
//! returns matrix, not taken from the solver's objective value.

use serde::Serialize;

use crate::batch::OptimizationResult;
use crate::config::MetricsConfig;
use crate::data::moments::{mean, sample_std_dev};
use crate::data::{ReturnKind, ReturnsMatrix};
use crate::error::{FrontierError, Result};

/// Unannualized Sharpe ratio with a zero risk-free rate.
///
/// `NaN` when `risk` is at or below `zero_risk_tolerance` or not finite.
pub fn sharpe_ratio(ret: f64, risk: f64, zero_risk_tolerance: f64) -> f64 {
    if !risk.is_finite() || risk <= zero_risk_tolerance {
        return f64::NAN;
    }
    ret / risk
}

/// One point of the frontier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrontierPoint {
    pub target_return: f64,
    pub result: OptimizationResult,
    /// Sample standard deviation of the daily portfolio returns.
    pub actual_risk: f64,
    /// Mean daily portfolio return.
    pub actual_return: f64,
    pub actual_sharpe: f64,
}

impl FrontierPoint {
    /// Derive realized metrics for a result; unsolved results get `NaN`s.
    pub fn evaluate(
        target_return: f64,
        result: OptimizationResult,
        returns: &ReturnsMatrix,
        zero_risk_tolerance: f64,
    ) -> Self {
        let series = result
            .weights
            .as_deref()
            .filter(|_| result.is_solved())
            .and_then(|w| returns.portfolio_returns(w));

        let (actual_risk, actual_return, actual_sharpe) = match series {
            Some(series) => {
                let s = series.as_slice();
                let risk = sample_std_dev(s);
                let ret = mean(s);
                (risk, ret, sharpe_ratio(ret, risk, zero_risk_tolerance))
            }
            None => (f64::NAN, f64::NAN, f64::NAN),
        };

        FrontierPoint {
            target_return,
            result,
            actual_risk,
            actual_return,
            actual_sharpe,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.result.is_solved()
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.result.weights.as_deref()
    }
}

/// Ordered frontier points, ascending by target return.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frontier {
    points: Vec<FrontierPoint>,
}

impl Frontier {
    /// Wrap points, ordering them by ascending target return.
    pub fn new(mut points: Vec<FrontierPoint>) -> Self {
        points.sort_by(|a, b| a.target_return.total_cmp(&b.target_return));
        Frontier { points }
    }

    /// Evaluate batch results against the returns matrix.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `targets` and `results` differ in
    /// length.
    pub fn from_results(
        targets: &[f64],
        results: Vec<OptimizationResult>,
        returns: &ReturnsMatrix,
        config: &MetricsConfig,
    ) -> Result<Self> {
        if targets.len() != results.len() {
            return Err(FrontierError::InvalidConfiguration(format!(
                "{} targets but {} results",
                targets.len(),
                results.len()
            )));
        }
        let points = targets
            .iter()
            .zip(results)
            .map(|(&t, r)| FrontierPoint::evaluate(t, r, returns, config.zero_risk_tolerance))
            .collect();
        Ok(Self::new(points))
    }

    pub fn points(&self) -> &[FrontierPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn solved(&self) -> impl Iterator<Item = &FrontierPoint> {
        self.points.iter().filter(|p| p.is_solved())
    }

    pub fn n_solved(&self) -> usize {
        self.solved().count()
    }

    /// Solved point with the highest finite Sharpe ratio; ties go to the
    /// lowest target return.
    pub fn best_by_sharpe(&self) -> Option<&FrontierPoint> {
        best_by(self.solved(), |p| p.actual_sharpe)
    }

    /// Solved point with the highest realized return; ties go to the lowest
    /// target return.
    pub fn best_by_return(&self) -> Option<&FrontierPoint> {
        best_by(self.solved(), |p| p.actual_return)
    }
}

fn best_by<'a>(
    points: impl Iterator<Item = &'a FrontierPoint>,
    key: impl Fn(&FrontierPoint) -> f64,
) -> Option<&'a FrontierPoint> {
    points
        .filter(|p| key(p).is_finite())
        .fold(None, |best: Option<&FrontierPoint>, p| match best {
            Some(b)
                if key(b) > key(p)
                    || (key(b) == key(p) && b.target_return <= p.target_return) =>
            {
                Some(b)
            }
            _ => Some(p),
        })
}

/// Converts daily metrics to annual ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annualization {
    pub trading_days: f64,
    pub return_kind: ReturnKind,
}

impl Annualization {
    pub fn new(trading_days: f64, return_kind: ReturnKind) -> Self {
        Annualization {
            trading_days,
            return_kind,
        }
    }

    pub fn from_config(config: &MetricsConfig, return_kind: ReturnKind) -> Self {
        Self::new(config.trading_days_per_year, return_kind)
    }

    /// `(1 + r)^days - 1` for simple returns, `exp(r * days) - 1` for log.
    pub fn annual_return(&self, daily_return: f64) -> f64 {
        self.return_kind.compound(daily_return, self.trading_days)
    }

    /// `risk * sqrt(days)`.
    pub fn annual_risk(&self, daily_risk: f64) -> f64 {
        daily_risk * self.trading_days.sqrt()
    }

    /// Annualize one frontier point.
    pub fn annualize(&self, point: &FrontierPoint) -> AnnualizedPoint {
        AnnualizedPoint {
            target_return: point.target_return,
            weights: point.weights().map(<[f64]>::to_vec).unwrap_or_default(),
            daily_return: point.actual_return,
            daily_risk: point.actual_risk,
            daily_sharpe: point.actual_sharpe,
            annual_return: self.annual_return(point.actual_return),
            annual_risk: self.annual_risk(point.actual_risk),
        }
    }
}

/// A frontier point's metrics on both daily and annual scales.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnualizedPoint {
    pub target_return: f64,
    pub weights: Vec<f64>,
    pub daily_return: f64,
    pub daily_risk: f64,
    pub daily_sharpe: f64,
    pub annual_return: f64,
    pub annual_risk: f64,
}
