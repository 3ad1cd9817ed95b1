//! Error types for frontier construction.

use thiserror::Error;

/// Error type for frontier operations.
///
/// Per-point solver failures are not errors; they are recorded as a
/// [`SolveStatus`](crate::solver::SolveStatus) on the point's result.
#[derive(Debug, Error)]
pub enum FrontierError {
    /// Too few assets or dates survived returns-matrix construction.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Malformed frontier or problem parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The bounding max-return solve failed; no frontier can be produced.
    #[error("Frontier unsolvable: {0}")]
    FrontierUnsolvable(String),

    /// A summary was requested but no frontier point was solved.
    #[error("No frontier point was solved")]
    NoSolvedPoints,

    /// A price series violates its invariants.
    #[error("Invalid series for {asset}: {reason}")]
    InvalidSeries { asset: String, reason: String },

    /// Solver settings were rejected.
    #[error("Solver setup error: {0}")]
    SolverSetup(String),

    /// The worker pool could not be created.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Configuration text could not be parsed.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<rayon::ThreadPoolBuildError> for FrontierError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        FrontierError::WorkerPool(e.to_string())
    }
}

impl From<toml::de::Error> for FrontierError {
    fn from(e: toml::de::Error) -> Self {
        FrontierError::Config(e.to_string())
    }
}

/// Result type for frontier operations.
pub type Result<T> = std::result::Result<T, FrontierError>;
