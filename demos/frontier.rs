//! Efficient Frontier Example
//!
//! Builds a frontier for four synthetic assets:
//!
//! minimize    w' Σ w                (minimize risk)
//! subject to  μ' w == target        (target daily return)
//!             sum(w) = 1            (fully invested)
//!             0 <= w <= 1           (long-only)
//!
//! Set `RUST_LOG=efficient_frontier=debug` to watch the batch run.

use chrono::{Duration, NaiveDate};
use efficient_frontier::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

/// Synthetic daily closes: drift plus uniform noise of the given width.
fn synthetic_series(asset: &str, days: usize, drift: f64, noise: f64, rng: &mut StdRng) -> AssetSeries {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut price = 100.0;
    let mut prices = Vec::with_capacity(days);
    for i in 0..days {
        prices.push((start + Duration::days(i as i64), price));
        price *= 1.0 + drift + rng.gen_range(-noise..noise);
    }
    AssetSeries::from_prices(asset, prices).unwrap()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Efficient Frontier ===\n");

    let mut rng = StdRng::seed_from_u64(42);
    let series = vec![
        synthetic_series("BOND", 500, 0.0002, 0.004, &mut rng),
        synthetic_series("VALUE", 500, 0.0004, 0.015, &mut rng),
        synthetic_series("GROWTH", 500, 0.0007, 0.025, &mut rng),
        synthetic_series("CRYPTO", 500, 0.0012, 0.06, &mut rng),
    ];

    let config = FrontierConfig {
        n_points: 20,
        min_target_return: 0.0002,
        parallelism: 4,
        ..Default::default()
    };
    let report = EfficientFrontier::with_clarabel(config)?.compute_from_series(&series)?;

    println!("Max daily return: {:.5}\n", report.max_return);
    println!("{:>10} {:>10} {:>10} {:>8}", "target", "return", "risk", "sharpe");
    for p in report.frontier.points() {
        if p.is_solved() {
            println!(
                "{:>10.5} {:>10.5} {:>10.5} {:>8.3}",
                p.target_return, p.actual_return, p.actual_risk, p.actual_sharpe
            );
        } else {
            println!("{:>10.5} {:>10}", p.target_return, format!("{:?}", p.result.status));
        }
    }

    let assets = ["BOND", "VALUE", "GROWTH", "CRYPTO"];
    let show = |label: &str, point: &AnnualizedPoint| {
        println!("\n{label}:");
        println!("  Annual return: {:.2}%", point.annual_return * 100.0);
        println!("  Annual risk:   {:.2}%", point.annual_risk * 100.0);
        for (asset, w) in assets.iter().zip(&point.weights) {
            println!("  {asset:>7}: {:.2}%", w * 100.0);
        }
    };

    if let Some(best) = &report.best_sharpe {
        show("Best Sharpe ratio", best);
    }
    show("Best return", &report.best_return);

    Ok(())
}
