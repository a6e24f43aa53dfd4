//! ts_independence — distance-based independence tests for paired and lagged
//! time series, with optional Python bindings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that
//! exposes the tests to Python via the `_ts_independence` extension module.
//!
//! Key behaviors
//! -------------
//! - Re-export the core modules (`distance`, `independence_tests`) and a
//!   crate-level [`prelude`].
//! - With `python-bindings`, define the `TimeSeriesTest` and
//!   `PermutationTest` classes and register them under
//!   `ts_independence.independence_tests`.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in the inner modules; this file performs FFI
//!   glue and error mapping only.
//! - The GIL is released while statistics and p-values are computed.
//!
//! Conventions
//! -----------
//! - Python methods return `(value, metadata_dict)` tuples.
//! - Errors from the core are converted to `ValueError` at the boundary.
//!
//! Testing notes
//! -------------
//! - Core behavior is covered by unit tests in the inner modules and by the
//!   integration and property tests under `tests/`.

pub mod distance;
pub mod independence_tests;
pub mod utils;

/// Crate-level prelude: the test objects, base statistics and options.
pub mod prelude {
    pub use crate::independence_tests::prelude::*;
}

#[cfg(feature = "python-bindings")]
use pyo3::{
    prelude::*,
    types::{PyAny, PyDict},
};

#[cfg(feature = "python-bindings")]
use crate::{
    independence_tests::{
        base::BaseStatistic, iid::IndependenceTest, time_series::TimeSeriesIndependenceTest,
    },
    utils::{
        build_p_value_options, extract_sample, parse_base, parse_policy, DEPENDENCE_BY_LAG_KEY,
        NULL_DISTRIBUTION_KEY, OPTIMAL_LAG_KEY, OPTIMAL_SCALE_KEY,
    },
};

/// TimeSeriesTest — Python-facing wrapper for the lagged independence test.
///
/// Parameters
/// ----------
/// Constructed from Python via
/// `TimeSeriesTest(base="mgc", max_lag=None, policy="linear")`:
/// - `base`: `str`
///   `"mgc"`, `"hhg"`, `"dcorr"` or `"unbiased"`.
/// - `max_lag`: `Optional[int]`
///   Lag bound M; `None` resolves to `⌈ln n⌉` per call.
/// - `policy`: `str`
///   `"linear"` or `"quadratic"` aggregation.
///
/// Notes
/// -----
/// - Native Rust code should use [`TimeSeriesIndependenceTest`] directly.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "ts_independence.independence_tests", frozen)]
pub struct TimeSeriesTest {
    inner: TimeSeriesIndependenceTest<Box<dyn BaseStatistic>>,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl TimeSeriesTest {
    #[new]
    #[pyo3(signature = (base = "mgc", max_lag = None, policy = "linear"))]
    pub fn new(base: &str, max_lag: Option<usize>, policy: &str) -> PyResult<Self> {
        let mut inner = TimeSeriesIndependenceTest::new(parse_base(base)?).with_policy(parse_policy(policy)?);
        if let Some(m) = max_lag {
            inner = inner.with_max_lag(m);
        }
        Ok(TimeSeriesTest { inner })
    }

    #[getter]
    pub fn name(&self) -> String {
        self.inner.name().to_string()
    }

    /// Lagged statistic and `{"optimal_lag", "dependence_by_lag",
    /// "optimal_scale"}` metadata.
    pub fn test_statistic<'py>(
        &self, py: Python<'py>, x: &Bound<'py, PyAny>, y: &Bound<'py, PyAny>,
    ) -> PyResult<(f64, Bound<'py, PyDict>)> {
        let (x, y) = (extract_sample(x)?, extract_sample(y)?);
        let stat = py.allow_threads(|| self.inner.test_statistic(&x, &y))?;

        let metadata = PyDict::new(py);
        metadata.set_item(OPTIMAL_LAG_KEY, stat.metadata.optimal_lag)?;
        metadata.set_item(DEPENDENCE_BY_LAG_KEY, stat.metadata.dependence_by_lag)?;
        if let Some(scale) = stat.metadata.optimal_scale {
            metadata.set_item(OPTIMAL_SCALE_KEY, (scale.x, scale.y))?;
        }
        Ok((stat.value, metadata))
    }

    /// P-value and `{"null_distribution"}` metadata.
    #[pyo3(signature = (
        x, y, replication_factor = 1000, is_fast = false, block_size = None,
        subsample_size = -1, seed = None, num_threads = None
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn p_value<'py>(
        &self, py: Python<'py>, x: &Bound<'py, PyAny>, y: &Bound<'py, PyAny>,
        replication_factor: usize, is_fast: bool, block_size: Option<usize>, subsample_size: i64,
        seed: Option<u64>, num_threads: Option<usize>,
    ) -> PyResult<(f64, Bound<'py, PyDict>)> {
        let options = build_p_value_options(
            replication_factor,
            is_fast,
            block_size,
            subsample_size,
            seed,
            num_threads,
        )?;
        let (x, y) = (extract_sample(x)?, extract_sample(y)?);
        let outcome = py.allow_threads(|| self.inner.p_value(&x, &y, &options))?;

        let metadata = PyDict::new(py);
        metadata.set_item(NULL_DISTRIBUTION_KEY, outcome.null_distribution)?;
        Ok((outcome.value, metadata))
    }
}

/// PermutationTest — Python-facing wrapper for the exchangeable-sample test.
///
/// Constructed via `PermutationTest(base="hhg")`.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "ts_independence.independence_tests", frozen)]
pub struct PermutationTest {
    inner: IndependenceTest<Box<dyn BaseStatistic>>,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl PermutationTest {
    #[new]
    #[pyo3(signature = (base = "hhg"))]
    pub fn new(base: &str) -> PyResult<Self> {
        Ok(PermutationTest { inner: IndependenceTest::new(parse_base(base)?) })
    }

    #[getter]
    pub fn name(&self) -> String {
        self.inner.name().to_string()
    }

    /// Base statistic and `{"optimal_scale"}` metadata when available.
    pub fn test_statistic<'py>(
        &self, py: Python<'py>, x: &Bound<'py, PyAny>, y: &Bound<'py, PyAny>,
    ) -> PyResult<(f64, Bound<'py, PyDict>)> {
        let (x, y) = (extract_sample(x)?, extract_sample(y)?);
        let stat = py.allow_threads(|| self.inner.test_statistic(&x, &y))?;

        let metadata = PyDict::new(py);
        if let Some(scale) = stat.metadata.optimal_scale {
            metadata.set_item(OPTIMAL_SCALE_KEY, (scale.x, scale.y))?;
        }
        Ok((stat.value, metadata))
    }

    /// Permutation p-value and `{"null_distribution"}` metadata.
    #[pyo3(signature = (x, y, replication_factor = 1000, seed = None, num_threads = None))]
    pub fn p_value<'py>(
        &self, py: Python<'py>, x: &Bound<'py, PyAny>, y: &Bound<'py, PyAny>,
        replication_factor: usize, seed: Option<u64>, num_threads: Option<usize>,
    ) -> PyResult<(f64, Bound<'py, PyDict>)> {
        let options = build_p_value_options(replication_factor, false, None, -1, seed, num_threads)?;
        let (x, y) = (extract_sample(x)?, extract_sample(y)?);
        let outcome = py.allow_threads(|| self.inner.p_value(&x, &y, &options))?;

        let metadata = PyDict::new(py);
        metadata.set_item(NULL_DISTRIBUTION_KEY, outcome.null_distribution)?;
        Ok((outcome.value, metadata))
    }
}

/// _ts_independence — PyO3 module initializer for the Python extension.
///
/// Creates the `independence_tests` submodule, attaches it to the parent
/// module and registers it in `sys.modules` so that dotted imports work.
///
/// Errors
/// ------
/// - `PyErr` if creating the submodule or updating `sys.modules` fails.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _ts_independence<'py>(py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    let tests_mod = PyModule::new(py, "independence_tests")?;
    tests_mod.add_class::<TimeSeriesTest>()?;
    tests_mod.add_class::<PermutationTest>()?;
    m.add_submodule(&tests_mod)?;

    // Register the submodule for dot-notation imports.
    py.import("sys")?
        .getattr("modules")?
        .set_item("ts_independence.independence_tests", tests_mod)?;
    Ok(())
}
