//! Sample moments of a returns matrix.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use super::ReturnsMatrix;
use crate::error::{FrontierError, Result};

/// Mean daily returns and sample covariance of the matrix columns.
///
/// Built once per frontier and shared read-only by every solve.
#[derive(Debug, Clone)]
pub struct ReturnMoments {
    assets: Arc<[String]>,
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
}

impl ReturnMoments {
    /// Estimate moments from a returns matrix (covariance uses `n - 1`).
    pub fn from_returns(returns: &ReturnsMatrix) -> Self {
        let values = returns.values();
        let rows = values.nrows();
        let mean = values.row_mean().transpose();

        let covariance = if rows < 2 {
            DMatrix::zeros(values.ncols(), values.ncols())
        } else {
            let mut centered = values.clone();
            for (j, mut col) in centered.column_iter_mut().enumerate() {
                col.add_scalar_mut(-mean[j]);
            }
            let cov = centered.transpose() * &centered / (rows - 1) as f64;
            // Exact symmetry; the product can differ in the last bit.
            (&cov + cov.transpose()) * 0.5
        };

        ReturnMoments {
            assets: Arc::clone(returns.assets()),
            mean,
            covariance,
        }
    }

    /// Build moments directly, e.g. from an external estimator.
    pub fn new(assets: Vec<String>, mean: DVector<f64>, covariance: DMatrix<f64>) -> Result<Self> {
        let n = assets.len();
        if n == 0 {
            return Err(FrontierError::InvalidConfiguration("no assets".into()));
        }
        if mean.len() != n || covariance.nrows() != n || covariance.ncols() != n {
            return Err(FrontierError::InvalidConfiguration(format!(
                "moments for {n} assets need a mean of length {n} and an {n}x{n} covariance"
            )));
        }
        if mean.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
            return Err(FrontierError::InvalidConfiguration(
                "moments contain non-finite values".into(),
            ));
        }
        let asymmetry = (&covariance - covariance.transpose()).amax();
        if asymmetry > 1e-12 * covariance.amax().max(1.0) {
            return Err(FrontierError::InvalidConfiguration(
                "covariance matrix is not symmetric".into(),
            ));
        }
        Ok(ReturnMoments {
            assets: assets.into(),
            mean,
            covariance,
        })
    }

    pub fn assets(&self) -> &Arc<[String]> {
        &self.assets
    }

    pub fn n_assets(&self) -> usize {
        self.assets.len()
    }

    /// Mean daily return per asset.
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Model expected return `w . mu`.
    pub fn portfolio_mean(&self, weights: &[f64]) -> f64 {
        weights.iter().zip(self.mean.iter()).map(|(w, m)| w * m).sum()
    }

    /// Model variance `w' Sigma w`.
    pub fn portfolio_variance(&self, weights: &[f64]) -> f64 {
        let w = DVector::from_column_slice(weights);
        w.dot(&(&self.covariance * &w))
    }
}

/// Arithmetic mean; `NaN` for an empty series.
pub fn mean(series: &[f64]) -> f64 {
    if series.is_empty() {
        return f64::NAN;
    }
    series.iter().sum::<f64>() / series.len() as f64
}

/// Sample standard deviation (`n - 1`); `NaN` below two observations.
pub fn sample_std_dev(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(series);
    let ss: f64 = series.iter().map(|x| (x - m) * (x - m)).sum();
    (ss / (n - 1) as f64).sqrt()
}
