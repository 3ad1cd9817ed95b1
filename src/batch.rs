//! Batch optimizer.
//!
//! Solves many independent portfolio problems on a fixed-size worker pool.
//! Problems are split into contiguous chunks, one chunk per worker, and
//! [`BatchOptimizer::run`] blocks until every chunk is done. Results come
//! back in input order whatever the scheduling.
//!
//! A failed solve never aborts the batch: infeasibility, numerical trouble,
//! hitting the solver's iteration or time limit, and even a solver panic
//! are recorded on that problem's [`OptimizationResult`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::ReturnMoments;
use crate::error::Result;
use crate::problem::PortfolioProblem;
use crate::solver::{PortfolioSolver, Solution, SolveStatus};

/// How often a problem is re-dispatched after a `SolverError`.
///
/// Infeasible problems are never retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Retry each failed solve up to `n` times.
    pub fn retries(n: u32) -> Self {
        RetryPolicy { max_retries: n }
    }
}

/// Outcome of one problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    /// The problem this result belongs to.
    pub problem: PortfolioProblem,
    pub status: SolveStatus,
    /// Weights aligned to the problem's assets, present only when solved.
    pub weights: Option<Vec<f64>>,
    /// Achieved objective, present only when solved.
    pub objective_value: Option<f64>,
    pub iterations: u32,
    pub solve_time: f64,
    /// Dispatches used, including retries.
    pub attempts: u32,
    pub message: Option<String>,
}

impl OptimizationResult {
    fn from_solution(problem: PortfolioProblem, solution: Solution, attempts: u32) -> Self {
        let Solution {
            mut status,
            mut value,
            mut weights,
            solve_time,
            iterations,
            mut message,
        } = solution;

        if status.is_solved() {
            let n = problem.n_assets();
            match weights.as_ref().map(Vec::len) {
                Some(len) if len == n => {}
                other => {
                    status = SolveStatus::SolverError;
                    message = Some(format!(
                        "solver reported success with {} weights for {n} assets",
                        other.unwrap_or(0)
                    ));
                }
            }
        }
        if !status.is_solved() {
            weights = None;
            value = None;
        }

        OptimizationResult {
            problem,
            status,
            weights,
            objective_value: value,
            iterations,
            solve_time,
            attempts,
            message,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.status.is_solved()
    }
}

/// Clamp a requested worker count into `[1, n_problems]`.
///
/// Zero or negative requests use the rayon default thread count.
pub fn normalize_parallelism(requested: i64, n_problems: usize) -> usize {
    let wanted = if requested <= 0 {
        rayon::current_num_threads()
    } else {
        usize::try_from(requested).unwrap_or(usize::MAX)
    };
    wanted.clamp(1, n_problems.max(1))
}

/// Executes independent portfolio solves in parallel.
#[derive(Debug)]
pub struct BatchOptimizer<S> {
    solver: S,
    moments: Arc<ReturnMoments>,
    retry: RetryPolicy,
}

impl<S: PortfolioSolver> BatchOptimizer<S> {
    pub fn new(solver: S, moments: Arc<ReturnMoments>) -> Self {
        BatchOptimizer {
            solver,
            moments,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn moments(&self) -> &Arc<ReturnMoments> {
        &self.moments
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Solve every problem, blocking until all are done.
    ///
    /// `result[i]` always corresponds to `problems[i]`.
    ///
    /// # Errors
    ///
    /// Only fails if the worker pool cannot be created; per-problem
    /// failures are reported through each result's status.
    pub fn run(
        &self,
        problems: Vec<PortfolioProblem>,
        parallelism: i64,
    ) -> Result<Vec<OptimizationResult>> {
        if problems.is_empty() {
            return Ok(Vec::new());
        }

        let total = problems.len();
        let workers = normalize_parallelism(parallelism, total);
        let chunk_size = total.div_ceil(workers);
        debug!(problems = total, workers, chunk_size, "dispatching batch");

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("frontier-worker-{i}"))
            .build()?;

        let chunks: Vec<Vec<OptimizationResult>> = pool.install(|| {
            problems
                .into_par_iter()
                .chunks(chunk_size)
                .map(|chunk| chunk.into_iter().map(|p| self.solve_one(p)).collect::<Vec<_>>())
                .collect()
        });

        let results: Vec<OptimizationResult> = chunks.into_iter().flatten().collect();
        let solved = results.iter().filter(|r| r.is_solved()).count();
        debug!(problems = total, solved, "batch complete");

        Ok(results)
    }

    /// Solve one problem, applying the retry policy.
    fn solve_one(&self, problem: PortfolioProblem) -> OptimizationResult {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let solution = self.dispatch(&problem);

            if solution.status == SolveStatus::SolverError && attempts <= self.retry.max_retries {
                debug!(
                    target_return = ?problem.target_return(),
                    attempt = attempts,
                    message = ?solution.message,
                    "retrying failed solve"
                );
                continue;
            }

            let result = OptimizationResult::from_solution(problem, solution, attempts);
            if !result.is_solved() {
                warn!(
                    target_return = ?result.problem.target_return(),
                    objective = ?result.problem.objective(),
                    status = ?result.status,
                    message = ?result.message,
                    "portfolio solve did not succeed"
                );
            }
            return result;
        }
    }

    /// Run the solver once, turning a panic into a `SolverError`.
    fn dispatch(&self, problem: &PortfolioProblem) -> Solution {
        catch_unwind(AssertUnwindSafe(|| self.solver.solve(problem, &self.moments)))
            .unwrap_or_else(|payload| {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                Solution::failed(SolveStatus::SolverError, format!("solver panicked: {reason}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn moments() -> Arc<ReturnMoments> {
        Arc::new(
            ReturnMoments::new(
                vec!["A".into(), "B".into()],
                DVector::from_vec(vec![0.001, 0.002]),
                DMatrix::identity(2, 2) * 1e-4,
            )
            .unwrap(),
        )
    }

    /// Puts all weight on the first asset; scripted failures by target.
    struct ScriptedSolver {
        calls: AtomicU32,
        fail_first: u32,
    }

    impl PortfolioSolver for ScriptedSolver {
        fn solve(&self, problem: &PortfolioProblem, _moments: &ReturnMoments) -> Solution {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Solution::failed(SolveStatus::SolverError, "transient");
            }
            match problem.target_return() {
                Some(t) if t < 0.0 => Solution::failed(SolveStatus::Infeasible, "negative"),
                Some(t) if t > 1.0 => panic!("target too large"),
                _ => Solution::solved(vec![1.0, 0.0], 0.0),
            }
        }
    }

    fn scripted(fail_first: u32) -> ScriptedSolver {
        ScriptedSolver {
            calls: AtomicU32::new(0),
            fail_first,
        }
    }

    #[test]
    fn test_normalize_parallelism() {
        assert_eq!(normalize_parallelism(4, 10), 4);
        assert_eq!(normalize_parallelism(40, 10), 10);
        assert_eq!(normalize_parallelism(3, 0), 1);
        let auto = normalize_parallelism(0, 1000);
        assert!(auto >= 1 && auto <= 1000);
        assert_eq!(normalize_parallelism(-5, 1), 1);
    }

    #[test]
    fn test_empty_batch() {
        let batch = BatchOptimizer::new(scripted(0), moments());
        assert!(batch.run(Vec::new(), 4).unwrap().is_empty());
    }

    #[test]
    fn test_failures_are_contained() {
        let m = moments();
        let problems = vec![
            PortfolioProblem::minimize_variance(m.assets(), 0.001).unwrap(),
            PortfolioProblem::minimize_variance(m.assets(), -0.5).unwrap(),
            PortfolioProblem::minimize_variance(m.assets(), 2.0).unwrap(),
            PortfolioProblem::minimize_variance(m.assets(), 0.002).unwrap(),
        ];
        let results = BatchOptimizer::new(scripted(0), m).run(problems, 2).unwrap();

        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                SolveStatus::Solved,
                SolveStatus::Infeasible,
                SolveStatus::SolverError,
                SolveStatus::Solved
            ]
        );
        assert!(results[1].weights.is_none());
        assert!(results[2]
            .message
            .as_deref()
            .unwrap()
            .contains("target too large"));
    }

    #[test]
    fn test_retry_policy() {
        let m = moments();
        let problem = PortfolioProblem::maximize_mean(m.assets()).unwrap();

        let without = BatchOptimizer::new(scripted(1), Arc::clone(&m));
        let r = without.run(vec![problem.clone()], 1).unwrap();
        assert_eq!(r[0].status, SolveStatus::SolverError);
        assert_eq!(r[0].attempts, 1);

        let with = BatchOptimizer::new(scripted(1), m).with_retry(RetryPolicy::retries(1));
        let r = with.run(vec![problem], 1).unwrap();
        assert_eq!(r[0].status, SolveStatus::Solved);
        assert_eq!(r[0].attempts, 2);
    }

    #[test]
    fn test_infeasible_is_not_retried() {
        let m = moments();
        let problem = PortfolioProblem::minimize_variance(m.assets(), -1.0).unwrap();
        let batch = BatchOptimizer::new(scripted(0), m).with_retry(RetryPolicy::retries(3));
        let r = batch.run(vec![problem], 1).unwrap();
        assert_eq!(r[0].status, SolveStatus::Infeasible);
        assert_eq!(r[0].attempts, 1);
    }

    #[test]
    fn test_wrong_weight_length_is_error() {
        struct ShortSolver;
        impl PortfolioSolver for ShortSolver {
            fn solve(&self, _: &PortfolioProblem, _: &ReturnMoments) -> Solution {
                Solution::solved(vec![1.0], 0.0)
            }
        }
        let m = moments();
        let problem = PortfolioProblem::maximize_mean(m.assets()).unwrap();
        let r = BatchOptimizer::new(ShortSolver, m).run(vec![problem], 1).unwrap();
        assert_eq!(r[0].status, SolveStatus::SolverError);
        assert!(r[0].weights.is_none());
    }
}
