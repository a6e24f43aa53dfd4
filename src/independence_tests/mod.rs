//! independence_tests — distance-based dependence statistics and tests.
//!
//! Purpose
//! -------
//! Collect the dependence measures (HHG, MGC, distance correlation), the
//! cross-lag aggregator, the resampling engine and the test objects that
//! compose them into paired and time-series independence tests.
//!
//! Key behaviors
//! -------------
//! - [`BaseStatistic`] is the seam every dependence measure implements.
//! - [`LagAggregator`] turns a base statistic into a lagged one under an
//!   [`AggregationPolicy`].
//! - [`TimeSeriesIndependenceTest`] validates inputs, builds distance
//!   matrices once and returns statistics and p-values; [`IndependenceTest`]
//!   is its exchangeable (no-lag) counterpart.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every public entry point validates before computing and reports
//!   failures through [`IndepResult`]; no entry point panics on user input.
//! - Test objects are immutable and `Send + Sync`; replicates share them
//!   across worker threads.
//!
//! Downstream usage
//! ----------------
//! - Typical Rust code imports the prelude:
//!
//!   ```rust
//!   use ts_independence::independence_tests::prelude::*;
//!
//!   let test = TimeSeriesIndependenceTest::new(Mgc::new()).with_max_lag(1);
//!   assert_eq!(test.name(), "mgcx");
//!   ```
//!
//! Testing notes
//! -------------
//! - Each submodule carries unit tests; end-to-end and property tests live
//!   in the crate's `tests/` directory.

pub mod base;
pub mod dcorr;
pub mod errors;
pub mod hhg;
pub mod iid;
pub mod lag;
pub mod mgc;
pub mod resampling;
pub mod time_series;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::base::{BaseStatistic, OptimalScale, StatisticMetadata, StatisticOutcome};
pub use self::dcorr::{Dcorr, DcorrVariant};
pub use self::errors::{IndepError, IndepResult};
pub use self::hhg::Hhg;
pub use self::iid::IndependenceTest;
pub use self::lag::{AggregationPolicy, LagAggregator, LagMetadata, LagStatistic};
pub use self::mgc::Mgc;
pub use self::resampling::{PValueOptions, PValueOutcome, ResamplingMode};
pub use self::time_series::TimeSeriesIndependenceTest;

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::base::{BaseStatistic, OptimalScale, StatisticOutcome};
    pub use super::dcorr::{Dcorr, DcorrVariant};
    pub use super::errors::{IndepError, IndepResult};
    pub use super::hhg::Hhg;
    pub use super::iid::IndependenceTest;
    pub use super::lag::{AggregationPolicy, LagStatistic};
    pub use super::mgc::Mgc;
    pub use super::resampling::{PValueOptions, PValueOutcome, ResamplingMode};
    pub use super::time_series::TimeSeriesIndependenceTest;
    pub use crate::distance::{DistanceTransform, Sample};
}
