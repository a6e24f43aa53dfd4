//! independence_tests::lag — cross-lag aggregation of a base statistic.
//!
//! Purpose
//! -------
//! Turn any [`BaseStatistic`] into a time-series dependence measure by
//! evaluating it between X and lagged copies of Y and combining the
//! per-lag values into one non-negative total.
//!
//! Key behaviors
//! -------------
//! - [`LagAggregator::statistic`] evaluates lags `0..=M` on index-sliced
//!   views of the two distance matrices (no recomputation of distances).
//! - [`AggregationPolicy`] selects how per-lag values are weighted:
//!   `LinearDecay` (one direction, weight `(n − j)/n`) or `QuadraticDecay`
//!   (both directions, extra weight `(1 − j/(√n(M + 1)))²`).
//! - [`LagStatistic`] carries the total plus per-lag values, the arg-max lag
//!   and, for multiscale bases, the optimal scale at that lag.
//!
//! Invariants & assumptions
//! ------------------------
//! - `M < n − 4`; every shifted pair therefore keeps at least 5 rows.
//! - Per-lag values are floored at 0 before weighting, so every entry of
//!   `dependence_by_lag` and the total are non-negative.
//! - At lag j ≥ 1 the "forward" pair is (X[j..], Y[..n−j]): X at time t + j
//!   against Y at time t. The "backward" pair swaps the roles.
//!
//! Conventions
//! -----------
//! - `optimal_lag` is the first index attaining the maximum (strict `>`
//!   while scanning), so ties resolve to the earliest lag.
//!
//! Testing notes
//! -------------
//! - Unit tests check the lag-0 reduction, explicit per-lag weights for both
//!   policies and recovery of a planted lag.

use crate::independence_tests::{
    base::{BaseStatistic, OptimalScale, StatisticOutcome},
    errors::IndepResult,
    validation::{validate_max_lag, validate_sample_counts},
};
use log::trace;
use ndarray::{ArrayView2, s};

/// How per-lag statistics are weighted and combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationPolicy {
    /// `(n − j)/n · max(0, s_j)` with X leading Y.
    #[default]
    LinearDecay,
    /// `w_j · (n − j)/n · (max(0, s→) + max(0, s←))`,
    /// `w_j = (1 − j/(√n(M + 1)))²`.
    QuadraticDecay,
}

/// Metadata attached to a lagged statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct LagMetadata {
    pub optimal_lag: usize,
    pub dependence_by_lag: Vec<f64>,
    pub optimal_scale: Option<OptimalScale>,
}

/// Aggregated cross-lag statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct LagStatistic {
    pub value: f64,
    pub metadata: LagMetadata,
}

/// `LagAggregator` — base statistic evaluated across lags `0..=M`.
///
/// Fields
/// ------
/// - `base`: `S`
///   Any dependence measure implementing [`BaseStatistic`].
/// - `policy`: [`AggregationPolicy`]
///   Weighting scheme across lags.
#[derive(Debug, Clone)]
pub struct LagAggregator<S> {
    base: S,
    policy: AggregationPolicy,
}

impl<S: BaseStatistic> LagAggregator<S> {
    pub fn new(base: S, policy: AggregationPolicy) -> Self {
        LagAggregator { base, policy }
    }

    pub fn base(&self) -> &S {
        &self.base
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    pub fn into_base(self) -> S {
        self.base
    }

    /// Aggregate the base statistic over lags `0..=max_lag`.
    ///
    /// Parameters
    /// ----------
    /// - `dx`, `dy`: `ArrayView2<f64>`
    ///   `n × n` distance matrices of X and Y.
    /// - `max_lag`: `usize`
    ///   Largest lag M; must satisfy `M < n − 4`.
    ///
    /// Returns
    /// -------
    /// `IndepResult<LagStatistic>`
    ///   Total `Σ_j dependence_by_lag[j]` with metadata of length `M + 1`.
    ///
    /// Errors
    /// ------
    /// - `IndepError::InvalidShape { .. }` if `dx` and `dy` differ in `n`.
    /// - `IndepError::InvalidLag { .. }` if `M ≥ n − 4`.
    /// - Any error returned by the base statistic.
    pub fn statistic(
        &self, dx: ArrayView2<'_, f64>, dy: ArrayView2<'_, f64>, max_lag: usize,
    ) -> IndepResult<LagStatistic> {
        let n = dx.nrows();
        validate_sample_counts(n, dy.nrows())?;
        validate_max_lag(max_lag, n)?;

        let mut dependence_by_lag = Vec::with_capacity(max_lag + 1);
        let mut scales = Vec::with_capacity(max_lag + 1);

        let lag0 = self.base.statistic(dx, dy)?;
        dependence_by_lag.push(lag0.value.max(0.0));
        scales.push(lag0.metadata.optimal_scale);

        let n_f = n as f64;
        for j in 1..=max_lag {
            let weight = (n - j) as f64 / n_f;
            let forward = self.base.statistic(dx.slice(s![j.., j..]), dy.slice(s![..n - j, ..n - j]))?;
            let (value, scale) = match self.policy {
                AggregationPolicy::LinearDecay => {
                    (weight * forward.value.max(0.0), forward.metadata.optimal_scale)
                }
                AggregationPolicy::QuadraticDecay => {
                    let backward =
                        self.base.statistic(dx.slice(s![..n - j, ..n - j]), dy.slice(s![j.., j..]))?;
                    let decay = (1.0 - j as f64 / (n_f.sqrt() * (max_lag + 1) as f64)).powi(2);
                    let combined = forward.value.max(0.0) + backward.value.max(0.0);
                    (decay * weight * combined, stronger_scale(&forward, &backward))
                }
            };
            trace!("lag {j}: {} = {value}", self.base.name());
            dependence_by_lag.push(value);
            scales.push(scale);
        }

        let mut optimal_lag = 0;
        for (j, &v) in dependence_by_lag.iter().enumerate() {
            if v > dependence_by_lag[optimal_lag] {
                optimal_lag = j;
            }
        }

        Ok(LagStatistic {
            value: dependence_by_lag.iter().sum(),
            metadata: LagMetadata {
                optimal_lag,
                optimal_scale: scales[optimal_lag],
                dependence_by_lag,
            },
        })
    }
}

fn stronger_scale(forward: &StatisticOutcome, backward: &StatisticOutcome) -> Option<OptimalScale> {
    if backward.value > forward.value {
        backward.metadata.optimal_scale
    } else {
        forward.metadata.optimal_scale
    }
}
