//! independence_tests::resampling — null distributions and p-values.
//!
//! Purpose
//! -------
//! Estimate the significance of a lagged dependence statistic under the
//! null hypothesis of independence, either from a full block-permutation
//! null distribution or from a single permutation split into disjoint
//! subsamples with a χ²(1) approximation.
//!
//! Key behaviors
//! -------------
//! - [`block_permutation`] draws circular-block resampling indices that
//!   preserve short-range serial structure within blocks.
//! - [`permute_symmetric`] relabels a distance matrix without recomputing
//!   distances.
//! - [`permutation_test`] runs `replication_factor` independent replicates
//!   (in parallel with the `parallel` feature) and converts the null
//!   distribution with [`empirical_p_value`].
//! - [`fast_subsample_test`] evaluates the statistic on disjoint blocks of
//!   one permuted copy and maps the standardized observation through
//!   [`chi_squared_p_value`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Replicate `i` draws from its own `Xoshiro256PlusPlus` stream seeded by
//!   [`counter_rng_seed`]`(seed, i)`, so a fixed seed reproduces the null
//!   distribution independently of thread count or scheduling.
//! - Only Y is relabelled; X and its distance matrix are shared read-only.
//! - Returned p-values lie in (0, 1].
//!
//! Conventions
//! -----------
//! - Empirical p-values count strictly larger null values and are floored
//!   at `1 / R`.
//! - A null standard deviation below [`DEGENERATE_NULL_STD`] maps the fast
//!   statistic to 0 (p = 1) and logs a warning.
//!
//! Downstream usage
//! ----------------
//! - Called by `TimeSeriesIndependenceTest::p_value` after inputs have been
//!   validated and the observed statistic computed.
//!
//! Testing notes
//! -------------
//! - Unit tests cover index validity, the χ² mapping, the p-value floor,
//!   seeded reproducibility and thread-count independence.

use crate::independence_tests::{
    base::BaseStatistic,
    errors::{IndepError, IndepResult},
    lag::LagAggregator,
    validation::{resolve_block_size, resolve_subsample_size, validate_replication_factor},
};
use log::{debug, trace, warn};
use ndarray::{Array2, ArrayView2, Axis, s};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use statrs::distribution::{ChiSquared, ContinuousCDF};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Null standard deviations below this value are treated as degenerate.
pub const DEGENERATE_NULL_STD: f64 = 1e-4;

/// Default number of permutation replicates.
pub const DEFAULT_REPLICATION_FACTOR: usize = 1000;

/// How the null distribution is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResamplingMode {
    /// Full block-permutation null with `replication_factor` replicates.
    #[default]
    Permutation,
    /// One block permutation, disjoint subsamples, χ²(1) approximation.
    FastSubsample,
}

/// PValueOptions — configuration for p-value estimation.
///
/// Fields
/// ------
/// - `replication_factor`: `usize`
///   Number of permutation replicates R (permutation mode only). Default
///   1000.
/// - `mode`: [`ResamplingMode`]
///   Exact permutation (default) or fast subsampling.
/// - `block_size`: `Option<usize>`
///   Circular block length; `None` resolves to `⌈√n⌉`.
/// - `subsample_size`: `Option<usize>`
///   Fast-mode block length; `None` resolves to `max(M + 10, ⌊√n⌋)`.
/// - `seed`: `Option<u64>`
///   Base seed of the per-replicate streams; `None` draws one from the
///   thread RNG.
/// - `num_threads`: `Option<usize>`
///   Size of a dedicated worker pool; `None` uses rayon's global pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PValueOptions {
    pub replication_factor: usize,
    pub mode: ResamplingMode,
    pub block_size: Option<usize>,
    pub subsample_size: Option<usize>,
    pub seed: Option<u64>,
    pub num_threads: Option<usize>,
}

impl PValueOptions {
    /// Construct options for `replication_factor` replicates in `mode`.
    ///
    /// Errors
    /// ------
    /// - `IndepError::InvalidReplicationFactor(0)`.
    pub fn new(replication_factor: usize, mode: ResamplingMode) -> IndepResult<Self> {
        validate_replication_factor(replication_factor)?;
        Ok(PValueOptions { replication_factor, mode, ..PValueOptions::default() })
    }

    /// Default options switched to fast subsampling.
    pub fn fast() -> Self {
        PValueOptions { mode: ResamplingMode::FastSubsample, ..PValueOptions::default() }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    pub fn with_subsample_size(mut self, subsample_size: usize) -> Self {
        self.subsample_size = Some(subsample_size);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }
}

impl Default for PValueOptions {
    fn default() -> Self {
        PValueOptions {
            replication_factor: DEFAULT_REPLICATION_FACTOR,
            mode: ResamplingMode::Permutation,
            block_size: None,
            subsample_size: None,
            seed: None,
            num_threads: None,
        }
    }
}

/// P-value together with the null statistics it was derived from.
///
/// In fast mode `null_distribution` holds the per-subsample statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct PValueOutcome {
    pub value: f64,
    pub null_distribution: Vec<f64>,
}

/// Mix a base seed and a replicate counter into an independent stream seed.
///
/// SplitMix64 finalizer applied to `base + counter·φ` (φ = 2⁶⁴/golden
/// ratio), so neighbouring counters give unrelated streams.
#[inline]
pub fn counter_rng_seed(base: u64, counter: u64) -> u64 {
    let mut z = base.wrapping_add(counter.wrapping_mul(0x9e37_79b9_7f4a_7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Circular block resampling indices.
///
/// Parameters
/// ----------
/// - `n`: `usize`
///   Series length.
/// - `block_size`: `usize`
///   Block length b, clamped into `[1, n]`.
/// - `rng`: `&mut R`
///   Source of block start offsets.
///
/// Returns
/// -------
/// `Vec<usize>`
///   Length-`n` index vector: `⌈n/b⌉ + 1` start offsets drawn uniformly
///   from `[0, n)` with replacement, each expanded to `b` consecutive
///   indices modulo n, concatenated and truncated to n.
pub fn block_permutation<R: Rng + ?Sized>(n: usize, block_size: usize, rng: &mut R) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let block_size = block_size.clamp(1, n);
    let num_blocks = n.div_ceil(block_size) + 1;
    let mut indices = Vec::with_capacity(n);
    for _ in 0..num_blocks {
        let start = rng.random_range(0..n);
        let take = block_size.min(n - indices.len());
        indices.extend((0..take).map(|k| (start + k) % n));
    }
    indices
}

/// Relabel a distance matrix: `D'[i,j] = D[idx[i], idx[j]]`.
pub fn permute_symmetric(d: ArrayView2<'_, f64>, indices: &[usize]) -> Array2<f64> {
    d.select(Axis(0), indices).select(Axis(1), indices)
}

/// Empirical permutation p-value `#(null > observed) / R`, floored at `1/R`.
///
/// An empty null distribution yields 1.
pub fn empirical_p_value(observed: f64, null: &[f64]) -> f64 {
    if null.is_empty() {
        return 1.0;
    }
    let r = null.len() as f64;
    let exceed = null.iter().filter(|&&v| v > observed).count();
    if exceed == 0 { 1.0 / r } else { exceed as f64 / r }
}

/// Upper-tail χ²(1) probability of `max(x, 0)`, clamped into (0, 1].
///
/// Errors
/// ------
/// - `IndepError::Numerical` if the χ² distribution cannot be built.
pub fn chi_squared_p_value(x: f64) -> IndepResult<f64> {
    let chi2 = ChiSquared::new(1.0)
        .map_err(|e| IndepError::Numerical { reason: format!("chi-squared: {e:?}") })?;
    Ok(chi2.sf(x.max(0.0)).clamp(f64::MIN_POSITIVE, 1.0))
}

/// Exact block-permutation test of a lagged statistic.
///
/// Parameters
/// ----------
/// - `aggregator`: `&LagAggregator<S>`
///   Lagged statistic recomputed on every replicate.
/// - `dx`, `dy`: `ArrayView2<f64>`
///   Distance matrices; only `dy` is permuted.
/// - `max_lag`: `usize`
///   Resolved lag bound.
/// - `observed`: `f64`
///   Statistic on the unpermuted data.
/// - `options`: `&PValueOptions`
///   Replicates, block size, seed and worker pool.
///
/// Returns
/// -------
/// `IndepResult<PValueOutcome>`
///   Empirical p-value and the `R` null statistics.
///
/// Errors
/// ------
/// - `InvalidReplicationFactor`, `InvalidBlockSize`, `ThreadPool`, or any
///   error of the lagged statistic (the first failing replicate aborts the
///   call).
pub fn permutation_test<S: BaseStatistic>(
    aggregator: &LagAggregator<S>, dx: ArrayView2<'_, f64>, dy: ArrayView2<'_, f64>,
    max_lag: usize, observed: f64, options: &PValueOptions,
) -> IndepResult<PValueOutcome> {
    let n = dx.nrows();
    validate_replication_factor(options.replication_factor)?;
    let block_size = resolve_block_size(options.block_size, n)?;
    let seed = resolve_seed(options.seed);
    debug!(
        "permutation test: n = {n}, max_lag = {max_lag}, block_size = {block_size}, replicates = {}",
        options.replication_factor
    );

    let null = run_replicates(options.replication_factor, options.num_threads, |i| {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(seed, i as u64));
        let indices = block_permutation(n, block_size, &mut rng);
        let dy_perm = permute_symmetric(dy, &indices);
        let stat = aggregator.statistic(dx, dy_perm.view(), max_lag)?;
        trace!("replicate {i}: {}", stat.value);
        Ok(stat.value)
    })?;

    Ok(PValueOutcome { value: empirical_p_value(observed, &null), null_distribution: null })
}

/// Fast subsampling approximation to the permutation test.
///
/// Purpose
/// -------
/// Avoid `R` full recomputations: permute Y once, cut both series into
/// `num_samples = ⌊n/s⌋` disjoint contiguous blocks of length `s`, compute
/// the lagged statistic per block, standardize the observed statistic
/// against their mean μ and population standard deviation σ and read the
/// p-value off χ²(1).
///
/// Returns
/// -------
/// `IndepResult<PValueOutcome>`
///   `value = P(χ²₁ > x)` with `x = num_samples·(observed − μ)/σ + 1`
///   (`x = 0` when σ < [`DEGENERATE_NULL_STD`]); the null distribution holds
///   the per-block statistics.
///
/// Errors
/// ------
/// - `InvalidSubsampleSize`, `InsufficientSubsampleSize`,
///   `InvalidBlockSize`, `ThreadPool`, `Numerical`, or any error of the
///   lagged statistic.
pub fn fast_subsample_test<S: BaseStatistic>(
    aggregator: &LagAggregator<S>, dx: ArrayView2<'_, f64>, dy: ArrayView2<'_, f64>,
    max_lag: usize, observed: f64, options: &PValueOptions,
) -> IndepResult<PValueOutcome> {
    let n = dx.nrows();
    let (size, num_samples) = resolve_subsample_size(options.subsample_size, max_lag, n)?;
    let block_size = resolve_block_size(options.block_size, n)?;
    let seed = resolve_seed(options.seed);
    debug!("fast subsample test: n = {n}, subsample_size = {size}, num_samples = {num_samples}");

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(seed, 0));
    let indices = block_permutation(n, block_size, &mut rng);
    let dy_perm = permute_symmetric(dy, &indices);

    let block_stats = run_replicates(num_samples, options.num_threads, |b| {
        let (lo, hi) = (b * size, (b + 1) * size);
        let stat = aggregator.statistic(
            dx.slice(s![lo..hi, lo..hi]),
            dy_perm.slice(s![lo..hi, lo..hi]),
            max_lag,
        )?;
        Ok(stat.value)
    })?;

    let k = block_stats.len() as f64;
    let mean = block_stats.iter().sum::<f64>() / k;
    let std = (block_stats.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / k).sqrt();
    let x = if std < DEGENERATE_NULL_STD {
        warn!("fast subsample null is degenerate (std = {std:e}); reporting p = 1");
        0.0
    } else {
        num_samples as f64 * (observed - mean) / std + 1.0
    };

    Ok(PValueOutcome { value: chi_squared_p_value(x)?, null_distribution: block_stats })
}

/// Base seed for a call: the explicit seed or a fresh one from the thread RNG.
pub(crate) fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| rand::rng().random::<u64>())
}

/// Run `count` independent jobs, in parallel when the `parallel` feature is
/// enabled. The first error aborts the whole batch.
pub(crate) fn run_replicates<T, F>(
    count: usize, num_threads: Option<usize>, job: F,
) -> IndepResult<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> IndepResult<T> + Send + Sync,
{
    #[cfg(feature = "parallel")]
    let results = {
        let run = || (0..count).into_par_iter().map(&job).collect::<IndepResult<Vec<T>>>();
        match num_threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| IndepError::ThreadPool(e.to_string()))?;
                pool.install(run)
            }
            None => run(),
        }
    };

    #[cfg(not(feature = "parallel"))]
    let results = {
        let _ = num_threads;
        (0..count).map(job).collect::<IndepResult<Vec<T>>>()
    };

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::euclidean_distance;
    use crate::independence_tests::{dcorr::Dcorr, lag::AggregationPolicy};
    use approx::assert_relative_eq;
    use ndarray::{Array1, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Validity and block structure of circular block indices.
    // - Symmetric relabelling of distance matrices.
    // - The empirical p-value floor and the χ²(1) tail mapping.
    // - Seeded reproducibility and thread-count independence of the null.
    // - Clamping of oversized block lengths.
    // - Fast mode on dependent data and on a degenerate null.
    //
    // They intentionally DO NOT cover:
    // - Calibration (uniform p-values under the null), which needs many
    //   repetitions.
    // -------------------------------------------------------------------------

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        (0..n).map(|_| rng.random::<f64>() - 0.5).collect()
    }

    fn distances(values: &[f64]) -> Array2<f64> {
        euclidean_distance(Array1::from(values.to_vec()).view().insert_axis(Axis(1)))
    }

    #[test]
    // Purpose
    // -------
    // Block indices are in range, of length n, and consecutive mod n
    // within each block.
    //
    // Given
    // -----
    // - n = 23, b = 5; and b = n.
    //
    // Expect
    // ------
    // - All indices < n, length n, in-block steps of +1 mod n.
    // - With b = n the indices are a rotation of 0..n.
    fn block_permutation_yields_valid_circular_blocks() {
        // Arrange
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);

        // Act
        let idx = block_permutation(23, 5, &mut rng);
        let rotation = block_permutation(23, 23, &mut rng);

        // Assert
        assert_eq!(idx.len(), 23);
        assert!(idx.iter().all(|&i| i < 23));
        for chunk in idx.chunks(5) {
            for w in chunk.windows(2) {
                assert_eq!(w[1], (w[0] + 1) % 23);
            }
        }
        let mut sorted = rotation.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..23).collect::<Vec<_>>());
    }

    #[test]
    // Purpose
    // -------
    // Block sizes beyond n behave like b = n and never size the buffer from
    // the requested block length.
    //
    // Given
    // -----
    // - n = 20 with b = usize::MAX / 2 and b = 20, same seed.
    //
    // Expect
    // ------
    // - Identical length-20 rotations of 0..20.
    fn oversized_block_is_clamped_to_series_length() {
        // Arrange
        let mut huge_rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let mut exact_rng = Xoshiro256PlusPlus::seed_from_u64(4);

        // Act
        let huge = block_permutation(20, usize::MAX / 2, &mut huge_rng);
        let exact = block_permutation(20, 20, &mut exact_rng);

        // Assert
        assert_eq!(huge, exact);
        let mut sorted = huge.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    // Purpose
    // -------
    // A permutation test with an oversized block size still completes.
    //
    // Given
    // -----
    // - n = 20 noise series, DCorr with M = 1, R = 10, b = usize::MAX / 2.
    //
    // Expect
    // ------
    // - 10 null statistics and a p-value in (0, 1].
    fn permutation_test_accepts_oversized_block() {
        // Arrange
        let (dx, dy) = (distances(&noise(20, 8)), distances(&noise(20, 9)));
        let agg = LagAggregator::new(Dcorr::biased(), AggregationPolicy::LinearDecay);
        let observed = agg.statistic(dx.view(), dy.view(), 1).unwrap().value;
        let options = PValueOptions::new(10, ResamplingMode::Permutation)
            .unwrap()
            .with_block_size(usize::MAX / 2)
            .with_seed(3);

        // Act
        let out = permutation_test(&agg, dx.view(), dy.view(), 1, observed, &options).unwrap();

        // Assert
        assert_eq!(out.null_distribution.len(), 10);
        assert!(out.value > 0.0 && out.value <= 1.0);
    }

    #[test]
    // Purpose
    // -------
    // Identical subsample statistics make the fast null degenerate, which
    // maps to p = 1.
    //
    // Given
    // -----
    // - n = 60 constant X and Y (all distances 0), DCorr with M = 1,
    //   subsample size 15.
    //
    // Expect
    // ------
    // - p = 1 and 4 equal null statistics.
    fn fast_subsample_degenerate_null_gives_unit_p_value() {
        // Arrange
        let d = distances(&[1.5; 60]);
        let agg = LagAggregator::new(Dcorr::biased(), AggregationPolicy::LinearDecay);
        let observed = agg.statistic(d.view(), d.view(), 1).unwrap().value;
        let options = PValueOptions::fast().with_subsample_size(15).with_seed(2);

        // Act
        let out = fast_subsample_test(&agg, d.view(), d.view(), 1, observed, &options).unwrap();

        // Assert
        assert_eq!(out.value, 1.0);
        assert_eq!(out.null_distribution.len(), 4);
        assert!(out.null_distribution.iter().all(|&v| v == out.null_distribution[0]));
    }

    #[test]
    // Purpose
    // -------
    // Relabelling applies the same index vector to rows and columns.
    //
    // Given
    // -----
    // - A 3 × 3 matrix and indices [2, 0, 0].
    //
    // Expect
    // ------
    // - D'[i,j] = D[idx[i], idx[j]].
    fn permute_symmetric_reindexes_rows_and_columns() {
        // Arrange
        let d = array![[0.0, 1.0, 2.0], [1.0, 0.0, 3.0], [2.0, 3.0, 0.0]];

        // Act
        let p = permute_symmetric(d.view(), &[2, 0, 0]);

        // Assert
        assert_eq!(p, array![[0.0, 2.0, 2.0], [2.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
    }

    #[test]
    // Purpose
    // -------
    // Check the p-value conversions.
    //
    // Given
    // -----
    // - A null of 4 values none above the observation; one with 2 above.
    // - χ² inputs 0, a negative value and the 95 % quantile 3.8415.
    //
    // Expect
    // ------
    // - 1/4 floor and 2/4; χ² tails 1, 1 and ≈ 0.05.
    fn p_value_conversions_follow_documented_rules() {
        assert_relative_eq!(empirical_p_value(10.0, &[1.0, 2.0, 3.0, 4.0]), 0.25);
        assert_relative_eq!(empirical_p_value(2.5, &[1.0, 2.0, 3.0, 4.0]), 0.5);
        assert_relative_eq!(chi_squared_p_value(0.0).unwrap(), 1.0);
        assert_relative_eq!(chi_squared_p_value(-3.0).unwrap(), 1.0);
        assert_relative_eq!(chi_squared_p_value(3.841_458_820_694_124).unwrap(), 0.05, epsilon = 1e-9);
        assert!(chi_squared_p_value(1e6).unwrap() > 0.0);
    }

    #[test]
    // Purpose
    // -------
    // A fixed seed reproduces the null distribution regardless of the
    // worker pool size.
    //
    // Given
    // -----
    // - n = 30 noise series, DCorr with M = 1, R = 40, seed 99.
    // - Runs on the default pool and on a 2-thread pool.
    //
    // Expect
    // ------
    // - Identical null distributions and p-values in (0, 1].
    fn seeded_permutation_test_is_reproducible() {
        // Arrange
        let (dx, dy) = (distances(&noise(30, 1)), distances(&noise(30, 2)));
        let agg = LagAggregator::new(Dcorr::biased(), AggregationPolicy::LinearDecay);
        let observed = agg.statistic(dx.view(), dy.view(), 1).unwrap().value;
        let options = PValueOptions::new(40, ResamplingMode::Permutation).unwrap().with_seed(99);
        let pooled = options.clone().with_num_threads(2);

        // Act
        let a = permutation_test(&agg, dx.view(), dy.view(), 1, observed, &options).unwrap();
        let b = permutation_test(&agg, dx.view(), dy.view(), 1, observed, &pooled).unwrap();

        // Assert
        assert_eq!(a, b);
        assert_eq!(a.null_distribution.len(), 40);
        assert!(a.value > 0.0 && a.value <= 1.0);
    }

    #[test]
    // Purpose
    // -------
    // Fast mode reports a small p-value for strongly dependent data and
    // one statistic per subsample.
    //
    // Given
    // -----
    // - n = 200, Y = X, M = 1, default subsample size max(11, 14) = 14.
    //
    // Expect
    // ------
    // - ⌊200/14⌋ = 14 block statistics and p < 0.05.
    fn fast_subsample_detects_identical_series() {
        // Arrange
        let x = noise(200, 3);
        let d = distances(&x);
        let agg = LagAggregator::new(Dcorr::biased(), AggregationPolicy::LinearDecay);
        let observed = agg.statistic(d.view(), d.view(), 1).unwrap().value;
        let options = PValueOptions::fast().with_seed(5);

        // Act
        let out = fast_subsample_test(&agg, d.view(), d.view(), 1, observed, &options).unwrap();

        // Assert
        assert_eq!(out.null_distribution.len(), 14);
        assert!(out.value < 0.05, "p = {}", out.value);
        assert!(out.value > 0.0);
    }
}
