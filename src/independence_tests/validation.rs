//! independence_tests::validation — shared input guards for the tests.
//!
//! Purpose
//! -------
//! Centralize the preconditions of the lag aggregator and the resampling
//! engine so that every entry point rejects bad inputs before any distance
//! matrix or replicate is computed.
//!
//! Key behaviors
//! -------------
//! - Check sample-count agreement, the lag bound, block sizes, replication
//!   counts and fast-mode subsample sizes.
//! - Resolve the defaults that depend on `n`: the lag bound `⌈ln n⌉`, the
//!   block size `⌈√n⌉` and the subsample size `max(M + 10, ⌊√n⌋)`.
//!
//! Invariants & assumptions
//! ------------------------
//! - The lag bound satisfies `M < n − 4`, so every shifted pair keeps at
//!   least 5 rows.
//! - Fast mode needs at least 4 disjoint subsamples.
//!
//! Conventions
//! -----------
//! - Every helper returns `IndepResult` and never panics.

use crate::independence_tests::errors::{IndepError, IndepResult};

/// Minimum number of disjoint blocks in fast mode.
pub const MIN_SUBSAMPLES: usize = 4;

/// Margin added to the lag bound to obtain the smallest subsample size.
pub const SUBSAMPLE_LAG_MARGIN: usize = 10;

/// Require X and Y to share the sample count.
pub fn validate_sample_counts(x_rows: usize, y_rows: usize) -> IndepResult<()> {
    if x_rows != y_rows {
        return Err(IndepError::InvalidShape { x_rows, y_rows });
    }
    Ok(())
}

/// Validate the lag bound against the sample count.
///
/// Parameters
/// ----------
/// - `max_lag`: `usize`
///   Largest lag M to evaluate.
/// - `n`: `usize`
///   Number of samples.
///
/// Errors
/// ------
/// - `IndepError::InvalidLag { max_lag, n }` when `max_lag ≥ n − 4`
///   (including every `n ≤ 4`).
pub fn validate_max_lag(max_lag: usize, n: usize) -> IndepResult<()> {
    if n < 5 || max_lag >= n - 4 {
        return Err(IndepError::InvalidLag { max_lag, n });
    }
    Ok(())
}

/// Resolve an optional lag bound, defaulting to `⌈ln n⌉`, and validate it.
pub fn resolve_max_lag(max_lag: Option<usize>, n: usize) -> IndepResult<usize> {
    let resolved = max_lag.unwrap_or_else(|| default_max_lag(n));
    validate_max_lag(resolved, n)?;
    Ok(resolved)
}

/// Default lag bound `⌈ln n⌉` (0 for `n ≤ 1`).
pub fn default_max_lag(n: usize) -> usize {
    if n <= 1 { 0 } else { (n as f64).ln().ceil() as usize }
}

/// Resolve an optional block size, defaulting to `⌈√n⌉`.
///
/// Errors
/// ------
/// - `IndepError::InvalidBlockSize(0)` for an explicit zero block size.
pub fn resolve_block_size(block_size: Option<usize>, n: usize) -> IndepResult<usize> {
    match block_size {
        Some(0) => Err(IndepError::InvalidBlockSize(0)),
        Some(b) => Ok(b),
        None => Ok(((n as f64).sqrt().ceil() as usize).max(1)),
    }
}

/// Require at least one permutation replicate.
pub fn validate_replication_factor(replication_factor: usize) -> IndepResult<()> {
    if replication_factor == 0 {
        return Err(IndepError::InvalidReplicationFactor(replication_factor));
    }
    Ok(())
}

/// Resolve and validate the fast-mode subsample size.
///
/// Parameters
/// ----------
/// - `subsample_size`: `Option<usize>`
///   Explicit size, or `None` for `max(M + 10, ⌊√n⌋)`.
/// - `max_lag`: `usize`
///   Resolved lag bound M.
/// - `n`: `usize`
///   Number of samples.
///
/// Returns
/// -------
/// `IndepResult<(usize, usize)>`
///   `(subsample_size, num_samples)` with `num_samples = ⌊n / s⌋ ≥ 4`.
///
/// Errors
/// ------
/// - `IndepError::InvalidSubsampleSize { .. }` for an explicit size below
///   `M + 10`.
/// - `IndepError::InsufficientSubsampleSize { .. }` when fewer than 4
///   blocks fit.
pub fn resolve_subsample_size(
    subsample_size: Option<usize>, max_lag: usize, n: usize,
) -> IndepResult<(usize, usize)> {
    let min = max_lag.saturating_add(SUBSAMPLE_LAG_MARGIN);
    let size = match subsample_size {
        Some(s) if s < min => {
            return Err(IndepError::InvalidSubsampleSize { subsample_size: s, min });
        }
        Some(s) => s,
        None => min.max((n as f64).sqrt().floor() as usize),
    };
    let num_samples = n / size;
    if num_samples < MIN_SUBSAMPLES {
        return Err(IndepError::InsufficientSubsampleSize { subsample_size: size, n });
    }
    Ok((size, num_samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The lag bound at and around n − 4.
    // - Default resolution of lag, block and subsample sizes.
    // - Each error branch of the subsample resolution.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Check the boundary of the lag bound.
    //
    // Given
    // -----
    // - n = 10, lags 5 and 6; n = 4 with lag 0; n = 20 with `usize::MAX`.
    //
    // Expect
    // ------
    // - Lag 5 passes; the others are `InvalidLag` without overflowing.
    fn validate_max_lag_enforces_strict_bound() {
        assert!(validate_max_lag(5, 10).is_ok());
        assert_eq!(validate_max_lag(6, 10), Err(IndepError::InvalidLag { max_lag: 6, n: 10 }));
        assert_eq!(validate_max_lag(0, 4), Err(IndepError::InvalidLag { max_lag: 0, n: 4 }));
        assert_eq!(
            validate_max_lag(usize::MAX, 20),
            Err(IndepError::InvalidLag { max_lag: usize::MAX, n: 20 })
        );
        assert_eq!(resolve_max_lag(Some(usize::MAX - 3), 20).unwrap_err(), IndepError::InvalidLag {
            max_lag: usize::MAX - 3,
            n: 20,
        });
    }

    #[test]
    // Purpose
    // -------
    // Verify the n-dependent defaults.
    //
    // Given
    // -----
    // - n = 100.
    //
    // Expect
    // ------
    // - Lag ⌈ln 100⌉ = 5, block ⌈√100⌉ = 10, explicit values kept.
    fn defaults_resolve_from_sample_count() {
        assert_eq!(resolve_max_lag(None, 100), Ok(5));
        assert_eq!(resolve_max_lag(Some(2), 100), Ok(2));
        assert_eq!(resolve_block_size(None, 100), Ok(10));
        assert_eq!(resolve_block_size(Some(3), 100), Ok(3));
        assert_eq!(resolve_block_size(Some(0), 100), Err(IndepError::InvalidBlockSize(0)));
        assert_eq!(
            validate_replication_factor(0),
            Err(IndepError::InvalidReplicationFactor(0))
        );
    }

    #[test]
    // Purpose
    // -------
    // Cover the fast-mode subsample rules.
    //
    // Given
    // -----
    // - n = 100, M = 1: default size max(11, 10) = 11.
    // - Explicit size 5 < 11.
    // - n = 40 with the default size 11 → 3 blocks.
    //
    // Expect
    // ------
    // - (11, 9), `InvalidSubsampleSize`, `InsufficientSubsampleSize`.
    fn resolve_subsample_size_covers_all_branches() {
        assert_eq!(resolve_subsample_size(None, 1, 100), Ok((11, 9)));
        assert_eq!(
            resolve_subsample_size(Some(5), 1, 100),
            Err(IndepError::InvalidSubsampleSize { subsample_size: 5, min: 11 })
        );
        assert_eq!(
            resolve_subsample_size(None, 1, 40),
            Err(IndepError::InsufficientSubsampleSize { subsample_size: 11, n: 40 })
        );
        assert!(validate_sample_counts(3, 3).is_ok());
        assert_eq!(
            validate_sample_counts(3, 4),
            Err(IndepError::InvalidShape { x_rows: 3, y_rows: 4 })
        );
    }
}
