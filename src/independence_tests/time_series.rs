//! independence_tests::time_series — the time-series independence test.
//!
//! Purpose
//! -------
//! Provide [`TimeSeriesIndependenceTest`], the entry point that composes a
//! distance transform, a lag aggregator around any base statistic and the
//! resampling engine behind `test_statistic` / `p_value` / `name`.
//!
//! Key behaviors
//! -------------
//! - Inputs (vectors, `n × p` observations or distance matrices) are
//!   validated and converted to distance matrices once per call.
//! - The lag bound is resolved per call: the configured value, or `⌈ln n⌉`.
//! - `p_value` recomputes the observed statistic and dispatches to the
//!   permutation or fast subsampling engine.
//!
//! Invariants & assumptions
//! ------------------------
//! - The test object is immutable after construction; concurrent calls on
//!   one instance are safe and share nothing.
//! - All validation happens before any statistic or replicate is computed.
//!
//! Conventions
//! -----------
//! - The default name is the base statistic's name with an `x` suffix
//!   (`"mgcx"`, `"dcorrx"`, `"hhgx"`).
//!
//! Downstream usage
//! ----------------
//! - Construct with a base statistic and chain the `with_*` builders;
//!   `Box<dyn BaseStatistic>` works when the base is chosen at runtime (as
//!   in the Python bindings).
//!
//! Testing notes
//! -------------
//! - Unit tests cover naming, lag resolution and dispatch; end-to-end
//!   behavior lives in `tests/`.

use crate::{
    distance::{DistanceTransform, Sample},
    independence_tests::{
        base::BaseStatistic,
        errors::IndepResult,
        lag::{AggregationPolicy, LagAggregator, LagStatistic},
        resampling::{PValueOptions, PValueOutcome, ResamplingMode, fast_subsample_test, permutation_test},
        validation::{
            resolve_block_size, resolve_max_lag, resolve_subsample_size, validate_replication_factor,
            validate_sample_counts,
        },
    },
};
use log::debug;
use ndarray::Array2;

/// TimeSeriesIndependenceTest — lagged dependence test around a base
/// statistic.
///
/// Fields
/// ------
/// - `aggregator`: [`LagAggregator<S>`]
///   Base statistic plus aggregation policy.
/// - `distance`: [`DistanceTransform`]
///   Strategy turning raw observations into distance matrices.
/// - `max_lag`: `Option<usize>`
///   Fixed lag bound, or `None` for `⌈ln n⌉` per call.
/// - `name`: `String`
///   Display name of the test.
#[derive(Debug, Clone)]
pub struct TimeSeriesIndependenceTest<S> {
    aggregator: LagAggregator<S>,
    distance: DistanceTransform,
    max_lag: Option<usize>,
    name: String,
}

impl<S: BaseStatistic> TimeSeriesIndependenceTest<S> {
    /// Test with the Euclidean metric, default lag bound and linear decay.
    pub fn new(base: S) -> Self {
        let name = format!("{}x", base.name());
        TimeSeriesIndependenceTest {
            aggregator: LagAggregator::new(base, AggregationPolicy::default()),
            distance: DistanceTransform::default(),
            max_lag: None,
            name,
        }
    }

    pub fn with_max_lag(mut self, max_lag: usize) -> Self {
        self.max_lag = Some(max_lag);
        self
    }

    pub fn with_policy(self, policy: AggregationPolicy) -> Self {
        let TimeSeriesIndependenceTest { aggregator, distance, max_lag, name } = self;
        let base = aggregator.into_base();
        TimeSeriesIndependenceTest {
            aggregator: LagAggregator::new(base, policy),
            distance,
            max_lag,
            name,
        }
    }

    pub fn with_distance(mut self, distance: DistanceTransform) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_lag(&self) -> Option<usize> {
        self.max_lag
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.aggregator.policy()
    }

    pub fn base(&self) -> &S {
        self.aggregator.base()
    }

    /// Lagged dependence statistic between X and Y.
    ///
    /// Parameters
    /// ----------
    /// - `x`, `y`: `impl Into<Sample>`
    ///   Length-`n` vectors, `n × p` observation matrices or `n × n`
    ///   distance matrices (detected automatically).
    ///
    /// Returns
    /// -------
    /// `IndepResult<LagStatistic>`
    ///   Total over lags `0..=M` with per-lag values, optimal lag and, for
    ///   multiscale bases, the optimal scale.
    ///
    /// Errors
    /// ------
    /// - `InvalidShape`, `EmptySample`, `NonFiniteData`,
    ///   `InvalidDistanceOutput` from input conversion.
    /// - `InvalidLag` when the lag bound is not below `n − 4`.
    ///
    /// Examples
    /// --------
    /// ```rust
    /// # use ts_independence::prelude::*;
    /// let x: Vec<f64> = (0..30).map(|t| (t as f64 * 0.9).sin()).collect();
    /// let y: Vec<f64> = (0..30).map(|t| (t as f64 * 0.9 + 0.3).cos()).collect();
    /// let test = TimeSeriesIndependenceTest::new(Dcorr::biased()).with_max_lag(2);
    /// let stat = test.test_statistic(&x, &y).unwrap();
    /// assert_eq!(stat.metadata.dependence_by_lag.len(), 3);
    /// assert_eq!(test.name(), "dcorrx");
    /// ```
    pub fn test_statistic<'x, 'y>(
        &self, x: impl Into<Sample<'x>>, y: impl Into<Sample<'y>>,
    ) -> IndepResult<LagStatistic> {
        let (dx, dy, max_lag) = self.prepare(x.into(), y.into())?;
        self.aggregator.statistic(dx.view(), dy.view(), max_lag)
    }

    /// Statistic and p-value of the test.
    ///
    /// Parameters
    /// ----------
    /// - `x`, `y`: `impl Into<Sample>`
    ///   As in [`TimeSeriesIndependenceTest::test_statistic`].
    /// - `options`: `&PValueOptions`
    ///   Resampling mode, replicates, block/subsample sizes, seed, pool.
    ///
    /// Returns
    /// -------
    /// `IndepResult<PValueOutcome>`
    ///   p-value in (0, 1] and the null statistics.
    ///
    /// Errors
    /// ------
    /// - Every error of [`TimeSeriesIndependenceTest::test_statistic`].
    /// - `InvalidReplicationFactor`, `InvalidBlockSize` (permutation mode).
    /// - `InvalidSubsampleSize`, `InsufficientSubsampleSize` (fast mode).
    /// - `ThreadPool` if a dedicated pool cannot be built.
    pub fn p_value<'x, 'y>(
        &self, x: impl Into<Sample<'x>>, y: impl Into<Sample<'y>>, options: &PValueOptions,
    ) -> IndepResult<PValueOutcome> {
        let (dx, dy, max_lag) = self.prepare(x.into(), y.into())?;
        let n = dx.nrows();
        resolve_block_size(options.block_size, n)?;
        match options.mode {
            ResamplingMode::Permutation => validate_replication_factor(options.replication_factor)?,
            ResamplingMode::FastSubsample => {
                resolve_subsample_size(options.subsample_size, max_lag, n)?;
            }
        }
        let observed = self.aggregator.statistic(dx.view(), dy.view(), max_lag)?;
        debug!("{}: observed = {}, mode = {:?}", self.name, observed.value, options.mode);

        match options.mode {
            ResamplingMode::Permutation => permutation_test(
                &self.aggregator,
                dx.view(),
                dy.view(),
                max_lag,
                observed.value,
                options,
            ),
            ResamplingMode::FastSubsample => fast_subsample_test(
                &self.aggregator,
                dx.view(),
                dy.view(),
                max_lag,
                observed.value,
                options,
            ),
        }
    }

    fn prepare(
        &self, x: Sample<'_>, y: Sample<'_>,
    ) -> IndepResult<(Array2<f64>, Array2<f64>, usize)> {
        let n = x.n_samples();
        validate_sample_counts(n, y.n_samples())?;
        let max_lag = resolve_max_lag(self.max_lag, n)?;
        let (dx, dy) = self.distance.transform_pair(x, y)?;
        debug!("{}: n = {n}, max_lag = {max_lag}", self.name);
        Ok((dx, dy, max_lag))
    }
}
