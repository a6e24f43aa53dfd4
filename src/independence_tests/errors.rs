//! independence_tests::errors — shared error types and Python bridges.
//!
//! Purpose
//! -------
//! Provide the error enum and result alias used by every independence test
//! in this crate (distance transforms, base statistics, lag aggregation,
//! resampling), together with a conversion layer to Python exceptions for
//! PyO3-based bindings.
//!
//! Key behaviors
//! -------------
//! - Define [`IndepResult`] and [`IndepError`] as the canonical result and
//!   error types for the crate.
//! - Attach human-readable `Display` messages to each variant, embedding the
//!   offending value (lag, sample counts, block size) so that logs are
//!   meaningful without additional context.
//! - Implement `From<IndepError> for PyErr` when the `python-bindings`
//!   feature is enabled.
//!
//! Invariants & assumptions
//! ------------------------
//! - All validation failures are detected synchronously at call entry,
//!   before any statistic or replicate is computed; no partial results are
//!   ever attached to an error.
//! - Degenerate null variance (fast mode) and a zero empirical p-value
//!   (exact mode) are *policies*, not errors, and have no variant here.
//!
//! Conventions
//! -----------
//! - Messages are phrased in terms of domain constraints ("max_lag must
//!   satisfy max_lag < n - 4") rather than low-level details.
//!
//! Testing notes
//! -------------
//! - Unit tests verify that each variant's `Display` message embeds its
//!   payload.

#[cfg(feature = "python-bindings")]
use pyo3::{PyErr, exceptions::PyValueError};

pub type IndepResult<T> = Result<T, IndepError>;

/// IndepError — error conditions for distance-based independence tests.
///
/// Variants
/// --------
/// - `InvalidShape { x_rows, y_rows }`
///   X and Y do not share the same number of samples `n`.
/// - `InvalidLag { max_lag, n }`
///   The lag bound violates `max_lag < n - 4`.
/// - `InsufficientSubsampleSize { subsample_size, n }`
///   Fast mode: fewer than 4 disjoint subsamples of `subsample_size` fit
///   into `n` observations.
/// - `InvalidSubsampleSize { subsample_size, min }`
///   Fast mode: an explicit subsample size is below `max_lag + 10`.
/// - `InvalidBlockSize(block_size)`
///   Block permutation requires `block_size >= 1`.
/// - `InvalidReplicationFactor(replication_factor)`
///   The permutation test requires at least one replicate.
/// - `EmptySample`
///   An input matrix has no rows or no columns.
/// - `NonFiniteData { row, col, value }`
///   A raw observation is NaN or ±∞.
/// - `InvalidDistanceOutput { expected, rows, cols }`
///   A custom distance function did not return an `n × n` matrix.
/// - `Numerical { reason }`
///   A distribution or numerical routine rejected its parameters.
/// - `ThreadPool(reason)`
///   A dedicated worker pool could not be built.
#[derive(Debug, Clone, PartialEq)]
pub enum IndepError {
    //------ Input validation errors ------
    InvalidShape { x_rows: usize, y_rows: usize },
    InvalidLag { max_lag: usize, n: usize },
    InsufficientSubsampleSize { subsample_size: usize, n: usize },
    InvalidSubsampleSize { subsample_size: usize, min: usize },
    InvalidBlockSize(usize),
    InvalidReplicationFactor(usize),
    EmptySample,
    NonFiniteData { row: usize, col: usize, value: f64 },
    InvalidDistanceOutput { expected: usize, rows: usize, cols: usize },

    //------ Runtime errors ------
    Numerical { reason: String },
    ThreadPool(String),
}

impl std::error::Error for IndepError {}

impl std::fmt::Display for IndepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndepError::InvalidShape { x_rows, y_rows } => write!(
                f,
                "Matrices X and Y must have the same number of samples: got {x_rows} and {y_rows}."
            ),
            IndepError::InvalidLag { max_lag, n } => {
                write!(f, "Invalid max_lag {max_lag} for n = {n}. Must satisfy max_lag < n - 4.")
            }
            IndepError::InsufficientSubsampleSize { subsample_size, n } => write!(
                f,
                "Subsample size {subsample_size} leaves fewer than 4 disjoint subsamples in n = {n}."
            ),
            IndepError::InvalidSubsampleSize { subsample_size, min } => write!(
                f,
                "Invalid subsample size {subsample_size}. Must be at least max_lag + 10 = {min}."
            ),
            IndepError::InvalidBlockSize(block_size) => {
                write!(f, "Invalid block size {block_size}. Must be at least 1.")
            }
            IndepError::InvalidReplicationFactor(r) => {
                write!(f, "Invalid replication factor {r}. Must be at least 1.")
            }
            IndepError::EmptySample => write!(f, "Input matrix must have at least one row and column."),
            IndepError::NonFiniteData { row, col, value } => {
                write!(f, "Invalid data value {value} at ({row}, {col}). Must be a finite number.")
            }
            IndepError::InvalidDistanceOutput { expected, rows, cols } => write!(
                f,
                "Distance function returned a {rows} x {cols} matrix; expected {expected} x {expected}."
            ),
            IndepError::Numerical { reason } => write!(f, "Numerical error: {reason}"),
            IndepError::ThreadPool(reason) => write!(f, "Failed to build worker pool: {reason}"),
        }
    }
}

#[cfg(feature = "python-bindings")]
impl From<IndepError> for PyErr {
    fn from(err: IndepError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}
