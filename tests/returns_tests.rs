//! Returns-matrix construction tests.

use std::collections::{BTreeSet, HashMap};

use chrono::{Duration, NaiveDate};
use efficient_frontier::prelude::*;

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + Duration::days(offset)
}

/// Geometric price path over `days` with daily return `r`, skipping `gaps`.
fn series(asset: &str, start: i64, days: i64, r: f64, gaps: &[i64]) -> AssetSeries {
    let mut price = 100.0;
    let mut points = Vec::new();
    for d in start..start + days {
        price *= 1.0 + r + 0.001 * ((d % 3) as f64 - 1.0);
        if !gaps.contains(&d) {
            points.push((day(d), price));
        }
    }
    AssetSeries::from_prices(asset, points).unwrap()
}

/// Dates on which an asset has a return (the later date of each pair).
fn return_dates(s: &AssetSeries) -> BTreeSet<NaiveDate> {
    s.points().iter().skip(1).map(|p| p.date).collect()
}

#[test]
fn test_alignment_invariant_intersect_dates() {
    let inputs = vec![
        series("A", 0, 60, 0.001, &[]),
        series("B", 0, 60, 0.002, &[10, 20]),
        series("C", 5, 55, -0.001, &[33]),
    ];
    let m = ReturnsBuilder::new().build(&inputs).unwrap();

    assert_eq!(m.n_assets(), 3);
    assert!(m.n_rows() > 0);
    assert_eq!(m.values().nrows(), m.dates().len());
    for s in &inputs {
        let dates = return_dates(s);
        assert!(
            m.dates().iter().all(|d| dates.contains(d)),
            "{} lacks an aligned date",
            s.asset()
        );
    }
    assert!(m.dates().windows(2).all(|w| w[0] < w[1]));
    assert!(!m.dates().contains(&day(10)));
    assert!(!m.dates().contains(&day(33)));
    assert!(m.excluded().is_empty());
}

#[test]
fn test_exclude_assets_policy_drops_gappy_asset() {
    let gaps: Vec<i64> = (10..25).collect();
    let inputs = vec![
        series("A", 0, 60, 0.001, &[]),
        series("B", 0, 60, 0.002, &[]),
        series("GAPPY", 0, 60, 0.003, &gaps),
    ];
    let m = ReturnsBuilder::new()
        .alignment(AlignmentPolicy::ExcludeAssets { min_coverage: 0.95 })
        .build(&inputs)
        .unwrap();

    assert_eq!(&m.assets()[..], &["A".to_string(), "B".to_string()]);
    assert_eq!(m.n_rows(), 59);
    assert_eq!(m.excluded().len(), 1);
    assert_eq!(m.excluded()[0].asset, "GAPPY");
    assert!(matches!(
        m.excluded()[0].reason,
        ExclusionReason::InsufficientCoverage { .. }
    ));

    // The same inputs under per-date exclusion keep every asset.
    let m = ReturnsBuilder::new().build(&inputs).unwrap();
    assert_eq!(m.n_assets(), 3);
    assert!(m.n_rows() < 59);
}

#[test]
fn test_history_cutoff_is_explicit() {
    let inputs = vec![
        series("OLD1", 0, 80, 0.001, &[]),
        series("OLD2", 0, 80, 0.002, &[]),
        series("NEW", 40, 40, 0.003, &[]),
    ];
    let m = ReturnsBuilder::new()
        .history_cutoff(day(5))
        .build(&inputs)
        .unwrap();

    assert_eq!(m.n_assets(), 2);
    assert_eq!(m.n_rows(), 79);
    assert_eq!(
        m.excluded()[0].reason,
        ExclusionReason::StartsAfterCutoff {
            first_date: day(40),
            cutoff: day(5)
        }
    );
}

#[test]
fn test_insufficient_assets() {
    let inputs = vec![
        series("A", 0, 60, 0.001, &[]),
        series("LATE", 50, 10, 0.001, &[]),
    ];
    let err = ReturnsBuilder::new()
        .history_cutoff(day(0))
        .build(&inputs)
        .unwrap_err();
    assert!(matches!(err, FrontierError::InsufficientData(_)));
}

#[test]
fn test_insufficient_rows() {
    let inputs = vec![
        series("A", 0, 20, 0.001, &[]),
        series("B", 0, 20, 0.002, &[]),
    ];
    let err = ReturnsBuilder::new().build(&inputs).unwrap_err();
    assert!(matches!(err, FrontierError::InsufficientData(_)));

    let m = ReturnsBuilder::new().min_rows(10).build(&inputs).unwrap();
    assert_eq!(m.n_rows(), 19);
}

#[test]
fn test_log_returns_and_price_field() {
    let points: Vec<PricePoint> = (0..40)
        .map(|d| PricePoint {
            date: day(d),
            close: 100.0 + d as f64,
            adjusted_close: 50.0 * 1.01f64.powi(d as i32),
        })
        .collect();
    let a = AssetSeries::new("A", points).unwrap();
    let b = series("B", 0, 40, 0.001, &[]);

    let m = ReturnsBuilder::new()
        .return_kind(ReturnKind::Log)
        .price_field(PriceField::AdjustedClose)
        .build(&[a.clone(), b.clone()])
        .unwrap();
    assert_eq!(m.kind(), ReturnKind::Log);
    let col = m.assets().iter().position(|a| a == "A").unwrap();
    assert!(m
        .values()
        .column(col)
        .iter()
        .all(|r| (r - 1.01f64.ln()).abs() < 1e-12));

    let m = ReturnsBuilder::new()
        .price_field(PriceField::Close)
        .build(&[a, b])
        .unwrap();
    assert!((m.values()[(0, 0)] - 0.01).abs() < 1e-12);
}

struct FlakySource {
    data: HashMap<&'static str, AssetSeries>,
}

impl PriceSource for FlakySource {
    fn fetch(&self, asset: &str, start: NaiveDate) -> std::result::Result<AssetSeries, SourceError> {
        let s = self
            .data
            .get(asset)
            .ok_or_else(|| SourceError::Unavailable(format!("timeout fetching {asset}")))?;
        let points = s
            .points()
            .iter()
            .copied()
            .filter(|p| p.date >= start)
            .collect();
        Ok(AssetSeries::new(asset, points).unwrap())
    }
}

#[test]
fn test_source_failures_do_not_stop_the_build() {
    let mut data = HashMap::new();
    data.insert("A", series("A", 0, 60, 0.001, &[]));
    data.insert("B", series("B", 0, 60, 0.002, &[]));
    data.insert("C", series("C", 30, 30, 0.002, &[]));
    let source = FlakySource { data };

    let collected = collect_series(&source, ["A", "DOWN", "B", "C"], day(0));
    assert_eq!(collected.failures.len(), 1);
    assert_eq!(collected.failures[0].asset, "DOWN");

    let m = ReturnsBuilder::new()
        .history_cutoff(day(10))
        .build(&collected.series)
        .unwrap();
    assert_eq!(&m.assets()[..], &["A".to_string(), "B".to_string()]);
    assert_eq!(m.excluded()[0].asset, "C");
}
