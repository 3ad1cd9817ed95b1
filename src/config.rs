//! Run configuration.
//!
//! Everything tunable about a frontier run lives in one [`FrontierConfig`],
//! passed at startup. It can be built in code or parsed from TOML:
//!
//! ```toml
//! n_points = 50
//! min_target_return = 0.0001
//! parallelism = 4
//!
//! [returns]
//! history_cutoff = "2018-01-02"
//! alignment = { policy = "intersect_dates" }
//!
//! [solver]
//! time_limit = 10.0
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::batch::RetryPolicy;
use crate::data::returns::DEFAULT_MIN_ROWS;
use crate::data::{AlignmentPolicy, PriceField, ReturnKind};
use crate::error::{FrontierError, Result};
use crate::solver::Settings;

/// Trading days per year used to annualize daily figures.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Sharpe ratios are undefined at or below this daily risk.
pub const DEFAULT_ZERO_RISK_TOLERANCE: f64 = 1e-12;

/// Returns-matrix construction options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReturnsConfig {
    pub price_field: PriceField,
    pub return_kind: ReturnKind,
    pub alignment: AlignmentPolicy,
    /// Assets whose history starts after this date are excluded.
    pub history_cutoff: Option<NaiveDate>,
    /// Minimum aligned rows required.
    pub min_rows: usize,
}

impl Default for ReturnsConfig {
    fn default() -> Self {
        ReturnsConfig {
            price_field: PriceField::default(),
            return_kind: ReturnKind::default(),
            alignment: AlignmentPolicy::default(),
            history_cutoff: None,
            min_rows: DEFAULT_MIN_ROWS,
        }
    }
}

/// Metrics and annualization options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub trading_days_per_year: f64,
    pub zero_risk_tolerance: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            trading_days_per_year: TRADING_DAYS_PER_YEAR,
            zero_risk_tolerance: DEFAULT_ZERO_RISK_TOLERANCE,
        }
    }
}

/// Configuration of a frontier run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontierConfig {
    /// Number of frontier points, at least 2.
    pub n_points: usize,
    /// Lowest daily target return on the frontier.
    pub min_target_return: f64,
    /// Worker count; zero or negative picks the rayon default.
    pub parallelism: i64,
    pub retry: RetryPolicy,
    pub returns: ReturnsConfig,
    pub solver: Settings,
    pub metrics: MetricsConfig,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        FrontierConfig {
            n_points: 100,
            min_target_return: 0.0001,
            parallelism: 0,
            retry: RetryPolicy::default(),
            returns: ReturnsConfig::default(),
            solver: Settings::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl FrontierConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: FrontierConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check frontier and metrics parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.n_points < 2 {
            return Err(FrontierError::InvalidConfiguration(format!(
                "n_points must be at least 2, got {}",
                self.n_points
            )));
        }
        if !self.min_target_return.is_finite() {
            return Err(FrontierError::InvalidConfiguration(
                "min_target_return must be finite".into(),
            ));
        }
        let days = self.metrics.trading_days_per_year;
        if !(days.is_finite() && days > 0.0) {
            return Err(FrontierError::InvalidConfiguration(format!(
                "trading_days_per_year must be positive, got {days}"
            )));
        }
        let tol = self.metrics.zero_risk_tolerance;
        if !(tol.is_finite() && tol >= 0.0) {
            return Err(FrontierError::InvalidConfiguration(format!(
                "zero_risk_tolerance must be non-negative, got {tol}"
            )));
        }
        Ok(())
    }
}
