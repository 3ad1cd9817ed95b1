//! Solve tests against the Clarabel backend.
//!
//! Pattern: define test cases as data with closed-form answers, then run
//! them programmatically.

use std::sync::Arc;

use efficient_frontier::prelude::*;
use nalgebra::{DMatrix, DVector};

/// Tolerance for comparing floating point results
const TOL: f64 = 1e-4;

/// Tolerance for weight validity
const WEIGHT_TOL: f64 = 1e-6;

/// A test case definition
struct TestCase {
    name: &'static str,
    /// Builds (moments, problem, expected weights, expected objective)
    build: fn() -> (ReturnMoments, PortfolioProblem, Vec<f64>, f64),
}

fn diagonal_moments(mean: &[f64], variances: &[f64]) -> ReturnMoments {
    let assets = (0..mean.len()).map(|i| format!("asset{i}")).collect();
    ReturnMoments::new(
        assets,
        DVector::from_column_slice(mean),
        DMatrix::from_diagonal(&DVector::from_column_slice(variances)),
    )
    .unwrap()
}

fn test_cases() -> Vec<TestCase> {
    vec![
        TestCase {
            name: "two_assets_pinned_by_target",
            build: || {
                // budget + target pin w = [0.5, 0.5]
                // variance = 0.25 * 0.04 + 0.25 * 0.01 = 0.0125
                let m = diagonal_moments(&[0.10, 0.05], &[0.04, 0.01]);
                let p = PortfolioProblem::minimize_variance(m.assets(), 0.075).unwrap();
                (m, p, vec![0.5, 0.5], 0.0125)
            },
        },
        TestCase {
            name: "three_assets_inverse_variance",
            build: || {
                // target equals the mean of the global minimum-variance
                // portfolio w ~ 1/sigma^2 = [4/7, 2/7, 1/7], variance 1/175
                let m = diagonal_moments(&[0.1, 0.2, 0.3], &[0.01, 0.02, 0.04]);
                let p = PortfolioProblem::minimize_variance(m.assets(), 1.1 / 7.0).unwrap();
                (m, p, vec![4.0 / 7.0, 2.0 / 7.0, 1.0 / 7.0], 1.0 / 175.0)
            },
        },
        TestCase {
            name: "max_mean_concentrates",
            build: || {
                let m = diagonal_moments(&[0.1, 0.2, 0.3], &[0.01, 0.02, 0.04]);
                let p = PortfolioProblem::maximize_mean(m.assets()).unwrap();
                (m, p, vec![0.0, 0.0, 1.0], 0.3)
            },
        },
        TestCase {
            name: "max_mean_daily_scale",
            build: || {
                let m = diagonal_moments(&[0.001, 0.002, -0.0005], &[1e-8, 1e-4, 1e-8]);
                let p = PortfolioProblem::maximize_mean(m.assets()).unwrap();
                (m, p, vec![0.0, 1.0, 0.0], 0.002)
            },
        },
        TestCase {
            name: "correlated_pair_at_upper_target",
            build: || {
                // only asset 1 reaches the target
                let m = ReturnMoments::new(
                    vec!["x".into(), "y".into()],
                    DVector::from_vec(vec![0.01, 0.03]),
                    DMatrix::from_row_slice(2, 2, &[0.02, 0.01, 0.01, 0.05]),
                )
                .unwrap();
                let p = PortfolioProblem::minimize_variance(m.assets(), 0.03).unwrap();
                (m, p, vec![0.0, 1.0], 0.05)
            },
        },
    ]
}

fn assert_valid_weights(name: &str, weights: &[f64]) {
    let sum: f64 = weights.iter().sum();
    assert!((sum - 1.0).abs() < WEIGHT_TOL, "{name}: weights sum to {sum}");
    for &w in weights {
        assert!((0.0..=1.0).contains(&w), "{name}: weight {w} outside [0, 1]");
    }
}

#[test]
fn test_closed_form_cases() {
    let solver = ClarabelSolver::new(Settings::default()).unwrap();

    for case in test_cases() {
        let (moments, problem, expected_weights, expected_value) = (case.build)();
        let solution = solver.solve(&problem, &moments);

        assert_eq!(
            solution.status,
            SolveStatus::Solved,
            "{}: status {:?} ({:?})",
            case.name,
            solution.status,
            solution.message
        );
        let weights = solution.weights.expect("solved without weights");
        assert_valid_weights(case.name, &weights);

        for (i, (w, e)) in weights.iter().zip(&expected_weights).enumerate() {
            assert!(
                (w - e).abs() < TOL,
                "{}: weight {i} expected {e}, got {w}",
                case.name
            );
        }

        let value = solution.value.expect("solved without value");
        assert!(
            (value - expected_value).abs() < TOL * expected_value.abs().max(1e-3),
            "{}: objective expected {expected_value}, got {value}",
            case.name
        );
    }
}

#[test]
fn test_unreachable_target_is_infeasible() {
    let solver = ClarabelSolver::new(Settings::default()).unwrap();
    let m = diagonal_moments(&[0.1, 0.2, 0.3], &[0.01, 0.02, 0.04]);
    let problem = PortfolioProblem::minimize_variance(m.assets(), 0.5).unwrap();

    let solution = solver.solve(&problem, &m);
    assert_eq!(solution.status, SolveStatus::Infeasible);
    assert!(solution.weights.is_none());
    assert!(solution.value.is_none());
}

#[test]
fn test_iteration_limit_is_solver_error() {
    let settings = Settings {
        max_iter: 1,
        ..Settings::default()
    };
    let solver = ClarabelSolver::new(settings).unwrap();
    let m = diagonal_moments(&[0.1, 0.2, 0.3], &[0.01, 0.02, 0.04]);
    let problem = PortfolioProblem::minimize_variance(m.assets(), 0.2).unwrap();

    let solution = solver.solve(&problem, &m);
    assert_eq!(solution.status, SolveStatus::SolverError);
}

#[test]
fn test_mismatched_assets_is_solver_error() {
    let solver = ClarabelSolver::new(Settings::default()).unwrap();
    let m = diagonal_moments(&[0.1, 0.2], &[0.01, 0.02]);
    let other: Arc<[String]> = vec!["p".to_string(), "q".to_string()].into();
    let problem = PortfolioProblem::maximize_mean(&other).unwrap();

    let solution = solver.solve(&problem, &m);
    assert_eq!(solution.status, SolveStatus::SolverError);
    assert!(solution.message.is_some());
}

#[test]
fn test_batch_with_clarabel_contains_infeasible_points() {
    let m = Arc::new(diagonal_moments(&[0.1, 0.2, 0.3], &[0.01, 0.02, 0.04]));
    let targets = [0.15, 0.5, 0.25, -1.0];
    let problems = targets
        .iter()
        .map(|&t| PortfolioProblem::minimize_variance(m.assets(), t).unwrap())
        .collect();

    let batch = BatchOptimizer::new(ClarabelSolver::new(Settings::default()).unwrap(), m);
    let results = batch.run(problems, 2).unwrap();

    let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            SolveStatus::Solved,
            SolveStatus::Infeasible,
            SolveStatus::Solved,
            SolveStatus::Infeasible
        ]
    );
    for (r, &t) in results.iter().zip(&targets) {
        assert_eq!(r.problem.target_return(), Some(t));
        if let Some(w) = &r.weights {
            assert_valid_weights("batch", w);
        }
    }
}

#[test]
fn test_daily_scale_reaches_zero_risk_mix() {
    // A and C carry no risk and bracket the target, so the optimum
    // avoids B entirely: w = [13/15, 0, 2/15], variance 0.
    let solver = ClarabelSolver::new(Settings::default()).unwrap();
    let m = diagonal_moments(&[0.001, 0.002, -0.0005], &[0.0, 1e-4, 0.0]);
    let problem = PortfolioProblem::minimize_variance(m.assets(), 0.0008).unwrap();

    let solution = solver.solve(&problem, &m);
    assert_eq!(solution.status, SolveStatus::Solved, "{:?}", solution.message);
    let weights = solution.weights.unwrap();
    assert_valid_weights("zero_risk_mix", &weights);
    assert!(weights[1] < 1e-4, "risky weight {}", weights[1]);
    assert!((weights[0] - 13.0 / 15.0).abs() < 1e-4);
    assert!((weights[2] - 2.0 / 15.0).abs() < 1e-4);
    assert!(m.portfolio_variance(&weights) < 1e-12);
}

#[test]
fn test_reported_value_matches_returned_weights() {
    let solver = ClarabelSolver::new(Settings::default()).unwrap();
    let m = diagonal_moments(&[0.001, 0.002, 0.003], &[1e-4, 2e-4, 4e-4]);

    let problem = PortfolioProblem::minimize_variance(m.assets(), 0.0018).unwrap();
    let solution = solver.solve(&problem, &m);
    let weights = solution.weights.unwrap();
    assert_eq!(solution.value, Some(m.portfolio_variance(&weights)));

    let problem = PortfolioProblem::maximize_mean(m.assets()).unwrap();
    let solution = solver.solve(&problem, &m);
    let weights = solution.weights.unwrap();
    assert_eq!(solution.value, Some(m.portfolio_mean(&weights)));
}
