//! independence_tests::base — the dependence-statistic interface.
//!
//! Purpose
//! -------
//! Define the seam between the lag/resampling machinery and the concrete
//! dependence measures (HHG, MGC, distance correlation). Every measure is a
//! pure function of two distance matrices of matching size.
//!
//! Key behaviors
//! -------------
//! - [`BaseStatistic`] exposes `statistic(dx, dy) -> StatisticOutcome` and a
//!   short `name`.
//! - [`StatisticOutcome`] carries the scalar value plus
//!   [`StatisticMetadata`]; multiscale measures report an [`OptimalScale`].
//! - `Box<dyn BaseStatistic>` and `&S` are themselves base statistics, so
//!   the aggregator can be configured at runtime.
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are `n × n` distance matrices with the same `n`; implementations
//!   may assume this and do not re-validate it.
//! - Implementations are stateless and `Send + Sync` so that resampling
//!   replicates can share one instance across worker threads.

use crate::independence_tests::errors::IndepResult;
use ndarray::ArrayView2;

/// Neighbourhood sizes `(x, y)` at which a multiscale statistic peaks.
///
/// Both indices are 1-based, so `(n, n)` denotes the global scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimalScale {
    pub x: usize,
    pub y: usize,
}

/// Statistic-specific metadata. Empty for single-scale measures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticMetadata {
    pub optimal_scale: Option<OptimalScale>,
}

impl StatisticMetadata {
    /// Whether the statistic reported no metadata at all.
    pub fn is_empty(&self) -> bool {
        self.optimal_scale.is_none()
    }
}

/// Value of a base statistic together with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticOutcome {
    pub value: f64,
    pub metadata: StatisticMetadata,
}

impl StatisticOutcome {
    /// Outcome with empty metadata.
    pub fn scalar(value: f64) -> Self {
        StatisticOutcome { value, metadata: StatisticMetadata::default() }
    }

    /// Outcome carrying an optimal scale.
    pub fn with_scale(value: f64, scale: OptimalScale) -> Self {
        StatisticOutcome { value, metadata: StatisticMetadata { optimal_scale: Some(scale) } }
    }
}

/// BaseStatistic — a dependence measure computed from two distance matrices.
///
/// Required methods
/// ----------------
/// - `statistic(dx, dy)`
///   Compute the measure on `n × n` distance matrices `dx`, `dy`. Views may
///   be index-sliced submatrices of larger matrices (lag shifts, subsample
///   blocks).
/// - `name()`
///   Short identifier such as `"hhg"` or `"mgc"`.
///
/// Notes
/// -----
/// - The trait is object safe; `Box<dyn BaseStatistic>` implements it.
pub trait BaseStatistic: Send + Sync {
    fn statistic(
        &self, dx: ArrayView2<'_, f64>, dy: ArrayView2<'_, f64>,
    ) -> IndepResult<StatisticOutcome>;

    fn name(&self) -> &str;
}

impl<S: BaseStatistic + ?Sized> BaseStatistic for Box<S> {
    fn statistic(
        &self, dx: ArrayView2<'_, f64>, dy: ArrayView2<'_, f64>,
    ) -> IndepResult<StatisticOutcome> {
        (**self).statistic(dx, dy)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<S: BaseStatistic + ?Sized> BaseStatistic for &S {
    fn statistic(
        &self, dx: ArrayView2<'_, f64>, dy: ArrayView2<'_, f64>,
    ) -> IndepResult<StatisticOutcome> {
        (**self).statistic(dx, dy)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
