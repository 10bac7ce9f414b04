//! Error types for the flux uncertainty engine

use thiserror::Error;

/// Engine error type.
///
/// Every variant is fatal to the current analysis run: the inputs are
/// deterministic, so retrying without changing them cannot succeed. The
/// surrounding tool reports the error and exits.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid binning specification, unknown category name, or otherwise
    /// malformed configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Fewer than two universes available where a sample variance is required.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A correlation entry is undefined: nonzero covariance over a zero
    /// diagonal term.
    #[error("Singular bin: {0}")]
    SingularBin(String),

    /// Eigen-decomposition input has a negative eigenvalue beyond the
    /// numerical tolerance.
    #[error("Matrix is not positive semi-definite: {0}")]
    NonPositiveSemiDefinite(String),

    /// Matrices combined with incompatible flat-index orderings. This is a
    /// programming-contract violation; callers must abort the run.
    #[error("Flat-index mismatch: {0}")]
    IndexMismatch(String),

    /// JSON parsing error from configuration deserialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
