//! Returns matrix construction.
//!
//! Turns per-asset price histories into a rectangular matrix of daily
//! returns: rows are dates shared by every retained asset, columns are
//! assets. Column order is the weight-vector index convention used by every
//! downstream component.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AssetSeries, PriceField};
use crate::config::ReturnsConfig;
use crate::error::{FrontierError, Result};

/// Default minimum number of aligned return rows.
pub const DEFAULT_MIN_ROWS: usize = 30;

/// How a daily return is derived from two consecutive prices.
///
/// The kind also fixes the annualization formula: simple returns compound
/// geometrically, log returns compound continuously.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    /// `(p_t - p_{t-1}) / p_{t-1}`
    #[default]
    Simple,
    /// `ln(p_t / p_{t-1})`
    Log,
}

impl ReturnKind {
    /// Return between two strictly positive prices.
    pub fn compute(self, previous: f64, current: f64) -> f64 {
        match self {
            ReturnKind::Simple => (current - previous) / previous,
            ReturnKind::Log => (current / previous).ln(),
        }
    }

    /// Compound a mean per-period return over `periods` periods.
    pub fn compound(self, per_period: f64, periods: f64) -> f64 {
        match self {
            ReturnKind::Simple => (1.0 + per_period).powf(periods) - 1.0,
            ReturnKind::Log => (per_period * periods).exp() - 1.0,
        }
    }
}

/// What to do with dates that are not present for every asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AlignmentPolicy {
    /// Per-date exclusion: keep only dates every asset has.
    #[default]
    IntersectDates,
    /// Per-asset exclusion: drop assets covering less than `min_coverage`
    /// (a fraction in `[0, 1]`) of the union calendar, then intersect the rest.
    ExcludeAssets { min_coverage: f64 },
}

/// Why an asset was left out of the matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// The identifier appeared more than once; later copies are dropped.
    DuplicateAsset,
    /// Fewer than two observations, so no return can be computed.
    TooFewObservations { count: usize },
    /// Zero, negative or non-finite price in the selected field.
    InvalidPrice { date: NaiveDate },
    /// History starts after the configured cutoff.
    StartsAfterCutoff {
        first_date: NaiveDate,
        cutoff: NaiveDate,
    },
    /// Not enough of the shared calendar is covered.
    InsufficientCoverage { coverage: f64, required: f64 },
}

/// An asset dropped while building the matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedAsset {
    pub asset: String,
    pub reason: ExclusionReason,
}

/// Aligned daily returns, immutable once built.
#[derive(Debug, Clone)]
pub struct ReturnsMatrix {
    assets: Arc<[String]>,
    dates: Vec<NaiveDate>,
    values: DMatrix<f64>,
    kind: ReturnKind,
    excluded: Vec<ExcludedAsset>,
}

impl ReturnsMatrix {
    /// Assemble a matrix from already aligned data.
    ///
    /// `values` must be `dates.len() x assets.len()`, finite, with unique
    /// asset identifiers and strictly increasing dates.
    pub fn from_parts(
        assets: Vec<String>,
        dates: Vec<NaiveDate>,
        values: DMatrix<f64>,
        kind: ReturnKind,
    ) -> Result<Self> {
        if values.nrows() != dates.len() || values.ncols() != assets.len() {
            return Err(FrontierError::InvalidConfiguration(format!(
                "returns shape {}x{} does not match {} dates and {} assets",
                values.nrows(),
                values.ncols(),
                dates.len(),
                assets.len()
            )));
        }
        let unique: HashSet<&str> = assets.iter().map(String::as_str).collect();
        if unique.len() != assets.len() {
            return Err(FrontierError::InvalidConfiguration(
                "duplicate asset identifiers".into(),
            ));
        }
        if dates.windows(2).any(|w| w[1] <= w[0]) {
            return Err(FrontierError::InvalidConfiguration(
                "return dates must be strictly increasing".into(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(FrontierError::InvalidConfiguration(
                "returns contain non-finite values".into(),
            ));
        }

        Ok(ReturnsMatrix {
            assets: assets.into(),
            dates,
            values,
            kind,
            excluded: Vec::new(),
        })
    }

    /// Column identifiers, in weight-vector order.
    pub fn assets(&self) -> &Arc<[String]> {
        &self.assets
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// The `dates x assets` return values.
    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn kind(&self) -> ReturnKind {
        self.kind
    }

    /// Assets dropped during construction, with reasons.
    pub fn excluded(&self) -> &[ExcludedAsset] {
        &self.excluded
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_assets(&self) -> usize {
        self.values.ncols()
    }

    /// Daily return series of the portfolio with the given weights.
    ///
    /// Returns `None` if the weight vector length does not match the
    /// number of assets.
    pub fn portfolio_returns(&self, weights: &[f64]) -> Option<DVector<f64>> {
        if weights.len() != self.n_assets() {
            return None;
        }
        Some(&self.values * DVector::from_column_slice(weights))
    }
}

/// Builder for [`ReturnsMatrix`].
///
/// ```ignore
/// let matrix = ReturnsBuilder::new()
///     .history_cutoff(cutoff)
///     .alignment(AlignmentPolicy::IntersectDates)
///     .build(&series)?;
/// ```
#[derive(Debug, Clone)]
pub struct ReturnsBuilder {
    price_field: PriceField,
    return_kind: ReturnKind,
    alignment: AlignmentPolicy,
    history_cutoff: Option<NaiveDate>,
    min_rows: usize,
}

impl Default for ReturnsBuilder {
    fn default() -> Self {
        ReturnsBuilder {
            price_field: PriceField::default(),
            return_kind: ReturnKind::default(),
            alignment: AlignmentPolicy::default(),
            history_cutoff: None,
            min_rows: DEFAULT_MIN_ROWS,
        }
    }
}

impl ReturnsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preconfigured from a [`ReturnsConfig`].
    pub fn from_config(config: &ReturnsConfig) -> Self {
        ReturnsBuilder {
            price_field: config.price_field,
            return_kind: config.return_kind,
            alignment: config.alignment,
            history_cutoff: config.history_cutoff,
            min_rows: config.min_rows,
        }
    }

    pub fn price_field(mut self, field: PriceField) -> Self {
        self.price_field = field;
        self
    }

    pub fn return_kind(mut self, kind: ReturnKind) -> Self {
        self.return_kind = kind;
        self
    }

    pub fn alignment(mut self, policy: AlignmentPolicy) -> Self {
        self.alignment = policy;
        self
    }

    /// Exclude assets whose first observation is later than `cutoff`.
    pub fn history_cutoff(mut self, cutoff: NaiveDate) -> Self {
        self.history_cutoff = Some(cutoff);
        self
    }

    pub fn min_rows(mut self, rows: usize) -> Self {
        self.min_rows = rows;
        self
    }

    /// Build the aligned returns matrix.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` if the alignment policy is malformed
    /// - `InsufficientData` if fewer than two assets or fewer than
    ///   `min_rows` dates remain
    pub fn build(&self, series: &[AssetSeries]) -> Result<ReturnsMatrix> {
        if let AlignmentPolicy::ExcludeAssets { min_coverage } = self.alignment {
            if !(0.0..=1.0).contains(&min_coverage) {
                return Err(FrontierError::InvalidConfiguration(format!(
                    "min_coverage must lie in [0, 1], got {min_coverage}"
                )));
            }
        }

        let mut excluded = Vec::new();
        let mut columns: Vec<(String, BTreeMap<NaiveDate, f64>)> = Vec::new();
        let mut seen = HashSet::new();

        for s in series {
            match self.asset_returns(s, &mut seen) {
                Ok(returns) => columns.push((s.asset().to_string(), returns)),
                Err(reason) => exclude(&mut excluded, s.asset(), reason),
            }
        }

        if let AlignmentPolicy::ExcludeAssets { min_coverage } = self.alignment {
            let calendar: BTreeSet<NaiveDate> = columns
                .iter()
                .flat_map(|(_, r)| r.keys().copied())
                .collect();
            let total = calendar.len().max(1) as f64;
            columns.retain(|(asset, returns)| {
                let coverage = returns.len() as f64 / total;
                if coverage < min_coverage {
                    exclude(
                        &mut excluded,
                        asset,
                        ExclusionReason::InsufficientCoverage {
                            coverage,
                            required: min_coverage,
                        },
                    );
                    false
                } else {
                    true
                }
            });
        }

        if columns.len() < 2 {
            return Err(FrontierError::InsufficientData(format!(
                "{} usable asset(s) after exclusions, need at least 2",
                columns.len()
            )));
        }

        let dates: Vec<NaiveDate> = columns[0]
            .1
            .keys()
            .copied()
            .filter(|d| columns[1..].iter().all(|(_, r)| r.contains_key(d)))
            .collect();

        let union_len = columns
            .iter()
            .flat_map(|(_, r)| r.keys())
            .collect::<BTreeSet<_>>()
            .len();
        if union_len > dates.len() {
            debug!(
                dropped = union_len - dates.len(),
                kept = dates.len(),
                "dropped dates missing for at least one asset"
            );
        }

        if dates.len() < self.min_rows.max(1) {
            return Err(FrontierError::InsufficientData(format!(
                "{} aligned return rows, need at least {}",
                dates.len(),
                self.min_rows.max(1)
            )));
        }

        let values = DMatrix::from_fn(dates.len(), columns.len(), |r, c| columns[c].1[&dates[r]]);
        let assets: Vec<String> = columns.into_iter().map(|(asset, _)| asset).collect();

        debug!(
            assets = assets.len(),
            rows = dates.len(),
            excluded = excluded.len(),
            "built returns matrix"
        );

        Ok(ReturnsMatrix {
            assets: assets.into(),
            dates,
            values,
            kind: self.return_kind,
            excluded,
        })
    }

    /// Per-asset returns keyed by the later date of each price pair.
    fn asset_returns(
        &self,
        series: &AssetSeries,
        seen: &mut HashSet<String>,
    ) -> std::result::Result<BTreeMap<NaiveDate, f64>, ExclusionReason> {
        if !seen.insert(series.asset().to_string()) {
            return Err(ExclusionReason::DuplicateAsset);
        }

        let points = series.points();
        if points.len() < 2 {
            return Err(ExclusionReason::TooFewObservations {
                count: points.len(),
            });
        }

        if let (Some(cutoff), Some(first_date)) = (self.history_cutoff, series.first_date()) {
            if first_date > cutoff {
                return Err(ExclusionReason::StartsAfterCutoff { first_date, cutoff });
            }
        }

        if let Some(bad) = points.iter().find(|p| {
            let v = p.get(self.price_field);
            !v.is_finite() || v <= 0.0
        }) {
            return Err(ExclusionReason::InvalidPrice { date: bad.date });
        }

        Ok(points
            .windows(2)
            .map(|w| {
                let prev = w[0].get(self.price_field);
                let cur = w[1].get(self.price_field);
                (w[1].date, self.return_kind.compute(prev, cur))
            })
            .collect())
    }
}

fn exclude(excluded: &mut Vec<ExcludedAsset>, asset: &str, reason: ExclusionReason) {
    warn!(asset, reason = ?reason, "excluding asset from returns matrix");
    excluded.push(ExcludedAsset {
        asset: asset.to_string(),
        reason,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    fn series(asset: &str, start: i64, prices: &[f64]) -> AssetSeries {
        AssetSeries::from_prices(
            asset,
            prices
                .iter()
                .enumerate()
                .map(|(i, &p)| (date(start + i as i64), p)),
        )
        .unwrap()
    }

    #[test]
    fn test_simple_and_log_returns() {
        assert!((ReturnKind::Simple.compute(100.0, 101.0) - 0.01).abs() < 1e-12);
        assert!((ReturnKind::Log.compute(100.0, 101.0) - (1.01f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_compound() {
        let simple = ReturnKind::Simple.compound(0.001, 252.0);
        assert!((simple - (1.001f64.powf(252.0) - 1.0)).abs() < 1e-12);
        let log = ReturnKind::Log.compound(0.001, 252.0);
        assert!((log - (0.252f64.exp() - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_build_small_matrix() {
        let a = series("A", 0, &[100.0, 110.0, 121.0]);
        let b = series("B", 0, &[50.0, 50.0, 25.0]);
        let m = ReturnsBuilder::new().min_rows(2).build(&[a, b]).unwrap();

        assert_eq!(m.n_rows(), 2);
        assert_eq!(m.n_assets(), 2);
        assert_eq!(m.dates(), &[date(1), date(2)]);
        assert!((m.values()[(0, 0)] - 0.1).abs() < 1e-12);
        assert!((m.values()[(1, 1)] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_asset_is_excluded() {
        let a = series("A", 0, &[1.0, 2.0, 3.0]);
        let b = series("B", 0, &[1.0, 2.0, 3.0]);
        let m = ReturnsBuilder::new()
            .min_rows(2)
            .build(&[a.clone(), b, a])
            .unwrap();
        assert_eq!(m.n_assets(), 2);
        assert_eq!(m.excluded()[0].reason, ExclusionReason::DuplicateAsset);
    }

    #[test]
    fn test_invalid_price_is_excluded() {
        let a = series("A", 0, &[1.0, 2.0, 3.0]);
        let b = series("B", 0, &[1.0, 2.0, 3.0]);
        let c = series("C", 0, &[1.0, 0.0, 3.0]);
        let m = ReturnsBuilder::new().min_rows(2).build(&[a, b, c]).unwrap();
        assert_eq!(m.n_assets(), 2);
        assert_eq!(
            m.excluded()[0].reason,
            ExclusionReason::InvalidPrice { date: date(1) }
        );
    }

    #[test]
    fn test_coverage_out_of_range_rejected() {
        let a = series("A", 0, &[1.0, 2.0, 3.0]);
        let b = series("B", 0, &[1.0, 2.0, 3.0]);
        let err = ReturnsBuilder::new()
            .alignment(AlignmentPolicy::ExcludeAssets { min_coverage: 1.5 })
            .build(&[a, b])
            .unwrap_err();
        assert!(matches!(err, FrontierError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_portfolio_returns_length_mismatch() {
        let a = series("A", 0, &[1.0, 2.0, 3.0]);
        let b = series("B", 0, &[1.0, 2.0, 3.0]);
        let m = ReturnsBuilder::new().min_rows(2).build(&[a, b]).unwrap();
        assert!(m.portfolio_returns(&[1.0]).is_none());
        let p = m.portfolio_returns(&[0.5, 0.5]).unwrap();
        assert!((p[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_parts_checks_shape() {
        let err = ReturnsMatrix::from_parts(
            vec!["A".into(), "B".into()],
            vec![date(0)],
            DMatrix::zeros(2, 2),
            ReturnKind::Simple,
        )
        .unwrap_err();
        assert!(matches!(err, FrontierError::InvalidConfiguration(_)));
    }
}
