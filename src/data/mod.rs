//! Price history inputs.
//!
//! This module provides:
//! - [`AssetSeries`], the per-asset price history consumed by the returns builder
//! - The [`PriceSource`] seam for market-data providers
//! - [`collect_series`], which gathers series while tolerating per-asset failures

pub mod moments;
pub mod returns;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{FrontierError, Result};

pub use moments::ReturnMoments;
pub use returns::{
    AlignmentPolicy, ExcludedAsset, ExclusionReason, ReturnKind, ReturnsBuilder, ReturnsMatrix,
};

/// Which column of a [`PricePoint`] feeds the return computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    /// Raw closing price.
    Close,
    /// Closing price adjusted for splits and distributions.
    #[default]
    AdjustedClose,
}

/// One daily observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
    pub adjusted_close: f64,
}

impl PricePoint {
    /// Observation where close and adjusted close coincide.
    pub fn new(date: NaiveDate, price: f64) -> Self {
        PricePoint {
            date,
            close: price,
            adjusted_close: price,
        }
    }

    /// Read the selected field.
    pub fn get(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Close => self.close,
            PriceField::AdjustedClose => self.adjusted_close,
        }
    }
}

/// Price history of a single asset, dates strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetSeries {
    asset: String,
    points: Vec<PricePoint>,
}

impl AssetSeries {
    /// Create a series, rejecting out-of-order or duplicate dates.
    pub fn new(asset: impl Into<String>, points: Vec<PricePoint>) -> Result<Self> {
        let asset = asset.into();
        if asset.is_empty() {
            return Err(FrontierError::InvalidSeries {
                asset,
                reason: "empty asset identifier".into(),
            });
        }
        if let Some(w) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(FrontierError::InvalidSeries {
                asset,
                reason: format!("dates not strictly increasing at {}", w[1].date),
            });
        }
        Ok(AssetSeries { asset, points })
    }

    /// Create a series from `(date, price)` pairs using the same value for
    /// both price fields.
    pub fn from_prices(
        asset: impl Into<String>,
        prices: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self> {
        let points = prices
            .into_iter()
            .map(|(date, price)| PricePoint::new(date, price))
            .collect();
        Self::new(asset, points)
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First available date, if any.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }
}

/// Failure reported by a [`PriceSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    /// The provider has no history for this identifier.
    #[error("no data for {0}")]
    NotFound(String),
    /// The provider could not be reached or returned garbage.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Market-data provider.
///
/// Implementations may return partial history; the returns builder decides
/// whether it is usable.
pub trait PriceSource {
    /// Fetch history for `asset` starting at `start`.
    fn fetch(&self, asset: &str, start: NaiveDate) -> std::result::Result<AssetSeries, SourceError>;
}

/// An asset the source failed to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub asset: String,
    pub reason: String,
}

/// Output of [`collect_series`].
#[derive(Debug, Clone, Default)]
pub struct CollectedSeries {
    pub series: Vec<AssetSeries>,
    pub failures: Vec<SourceFailure>,
}

/// Fetch every asset from `source`, skipping the ones that fail.
///
/// Failed or empty fetches are logged and listed in
/// [`CollectedSeries::failures`]; they never abort the collection.
pub fn collect_series<S, I>(source: &S, assets: I, start: NaiveDate) -> CollectedSeries
where
    S: PriceSource + ?Sized,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out = CollectedSeries::default();

    for asset in assets {
        let asset = asset.as_ref();
        match source.fetch(asset, start) {
            Ok(series) if series.is_empty() => {
                warn!(asset, "price source returned an empty series, skipping");
                out.failures.push(SourceFailure {
                    asset: asset.to_string(),
                    reason: "empty series".into(),
                });
            }
            Ok(series) => {
                debug!(asset, observations = series.len(), "fetched price history");
                out.series.push(series);
            }
            Err(e) => {
                warn!(asset, error = %e, "price source failed, skipping asset");
                out.failures.push(SourceFailure {
                    asset: asset.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    out
}
