//! utils — conversion helpers for the Python bindings.
//!
//! Apart from the metadata key names, everything here is compiled only with
//! the `python-bindings` feature and turns Python arguments into the crate's
//! Rust types.

#[cfg(feature = "python-bindings")]
use ndarray::{Array1, Array2, Axis};

#[cfg(feature = "python-bindings")]
use numpy::{PyReadonlyArray1, PyReadonlyArray2};

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyTypeError, PyValueError},
    prelude::*,
    types::PyAny,
};

#[cfg(feature = "python-bindings")]
use crate::independence_tests::{
    base::BaseStatistic,
    dcorr::Dcorr,
    hhg::Hhg,
    lag::AggregationPolicy,
    mgc::Mgc,
    resampling::{PValueOptions, ResamplingMode},
};

/// Metadata dictionary keys returned to Python, named after the fields of
/// `LagMetadata` and `PValueOutcome`.
pub const OPTIMAL_LAG_KEY: &str = "optimal_lag";
pub const DEPENDENCE_BY_LAG_KEY: &str = "dependence_by_lag";
pub const OPTIMAL_SCALE_KEY: &str = "optimal_scale";
pub const NULL_DISTRIBUTION_KEY: &str = "null_distribution";

/// Convert a 1-D or 2-D array-like (numpy array, pandas object, nested
/// sequence) into an owned `n × p` matrix. 1-D inputs become `n × 1`.
#[cfg(feature = "python-bindings")]
pub fn extract_sample<'py>(raw: &Bound<'py, PyAny>) -> PyResult<Array2<f64>> {
    let target = raw.call_method0("to_numpy").unwrap_or_else(|_| raw.clone());

    if let Ok(arr) = target.extract::<PyReadonlyArray1<f64>>() {
        return Ok(arr.as_array().to_owned().insert_axis(Axis(1)));
    }
    if let Ok(arr) = target.extract::<PyReadonlyArray2<f64>>() {
        return Ok(arr.as_array().to_owned());
    }
    if let Ok(values) = target.extract::<Vec<f64>>() {
        return Ok(Array1::from(values).insert_axis(Axis(1)));
    }

    let rows: Vec<Vec<f64>> = target.extract().map_err(|_| {
        PyTypeError::new_err("expected a 1-D or 2-D numpy.ndarray, pandas object, or sequence of float64")
    })?;
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != ncols) {
        return Err(PyValueError::new_err("rows must all have the same length"));
    }
    Array2::from_shape_vec((rows.len(), ncols), rows.into_iter().flatten().collect())
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Resolve a base statistic by name.
///
/// Accepted names: `"mgc"`, `"hhg"`, `"dcorr"` / `"biased"`,
/// `"unbiased"` / `"unbiased_dcorr"` (case-insensitive).
#[cfg(feature = "python-bindings")]
pub fn parse_base(name: &str) -> PyResult<Box<dyn BaseStatistic>> {
    match name.to_ascii_lowercase().as_str() {
        "mgc" => Ok(Box::new(Mgc::new())),
        "hhg" => Ok(Box::new(Hhg::new())),
        "dcorr" | "biased" => Ok(Box::new(Dcorr::biased())),
        "unbiased" | "unbiased_dcorr" => Ok(Box::new(Dcorr::unbiased())),
        other => Err(PyValueError::new_err(format!(
            "unknown base statistic '{other}'; expected 'mgc', 'hhg', 'dcorr' or 'unbiased'"
        ))),
    }
}

/// Resolve an aggregation policy: `"linear"` or `"quadratic"`.
#[cfg(feature = "python-bindings")]
pub fn parse_policy(name: &str) -> PyResult<AggregationPolicy> {
    match name.to_ascii_lowercase().as_str() {
        "linear" => Ok(AggregationPolicy::LinearDecay),
        "quadratic" => Ok(AggregationPolicy::QuadraticDecay),
        other => Err(PyValueError::new_err(format!(
            "unknown aggregation policy '{other}'; expected 'linear' or 'quadratic'"
        ))),
    }
}

/// Build [`PValueOptions`] from Python keyword arguments.
///
/// A non-positive `subsample_size` selects the default size.
#[cfg(feature = "python-bindings")]
pub fn build_p_value_options(
    replication_factor: usize, is_fast: bool, block_size: Option<usize>, subsample_size: i64,
    seed: Option<u64>, num_threads: Option<usize>,
) -> PyResult<PValueOptions> {
    let mode = if is_fast { ResamplingMode::FastSubsample } else { ResamplingMode::Permutation };
    let mut options = PValueOptions::new(replication_factor, mode)?;
    options.block_size = block_size;
    options.subsample_size = usize::try_from(subsample_size).ok().filter(|&s| s > 0);
    options.seed = seed;
    options.num_threads = num_threads;
    Ok(options)
}
