//! distance — pairwise distance matrices shared by every independence test.
//!
//! Purpose
//! -------
//! Turn caller-supplied samples into the `n × n` distance matrices the
//! dependence statistics operate on. A sample is either a raw `n × p`
//! observation matrix (or a length-`n` vector, read as `n × 1`) or an
//! already-computed distance matrix, which is detected and passed through.
//!
//! Key behaviors
//! -------------
//! - [`Sample`] accepts univariate and multivariate inputs and exposes both
//!   as a 2-D view without copying.
//! - [`is_distance_matrix`] decides whether an input is already a distance
//!   matrix (square with a zero diagonal).
//! - [`DistanceTransform`] wraps an injectable metric ([`DistanceFn`]) and
//!   applies it to raw observations; [`euclidean_distance`] is the default.
//!
//! Invariants & assumptions
//! ------------------------
//! - Outputs are `n × n`, symmetric, with a zero diagonal and non-negative
//!   entries for the metrics shipped here. Custom metrics are only checked
//!   for shape.
//! - Raw observations must be finite; distance-matrix inputs are trusted.
//!
//! Conventions
//! -----------
//! - Rows are samples (time points), columns are features.
//! - Detection follows "square and Σᵢ D[i,i]² ≈ 0"; a raw square matrix whose
//!   diagonal happens to be zero is therefore read as a distance matrix.

use crate::independence_tests::errors::{IndepError, IndepResult};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::fmt;
use std::sync::Arc;

/// Tolerance on Σᵢ D[i,i]² below which a square matrix is read as a
/// distance matrix.
pub const DIAGONAL_TOL: f64 = 1e-12;

/// Distance strategy: maps an `n × p` observation matrix to `n × n`.
pub type DistanceFn = Arc<dyn Fn(ArrayView2<'_, f64>) -> Array2<f64> + Send + Sync>;

/// `Sample` — one side (X or Y) of a paired test input.
///
/// `Univariate` inputs are viewed as `n × 1` column matrices.
#[derive(Debug, Clone, Copy)]
pub enum Sample<'a> {
    Univariate(ArrayView1<'a, f64>),
    Multivariate(ArrayView2<'a, f64>),
}

impl<'a> Sample<'a> {
    /// Number of samples `n` (rows).
    pub fn n_samples(&self) -> usize {
        match self {
            Sample::Univariate(v) => v.len(),
            Sample::Multivariate(m) => m.nrows(),
        }
    }

    /// Two-dimensional view of the sample; vectors become `n × 1`.
    pub fn as_matrix(&self) -> ArrayView2<'a, f64> {
        match *self {
            Sample::Univariate(v) => v.insert_axis(Axis(1)),
            Sample::Multivariate(m) => m,
        }
    }
}

impl<'a> From<ArrayView1<'a, f64>> for Sample<'a> {
    fn from(v: ArrayView1<'a, f64>) -> Self {
        Sample::Univariate(v)
    }
}

impl<'a> From<ArrayView2<'a, f64>> for Sample<'a> {
    fn from(m: ArrayView2<'a, f64>) -> Self {
        Sample::Multivariate(m)
    }
}

impl<'a> From<&'a Array1<f64>> for Sample<'a> {
    fn from(v: &'a Array1<f64>) -> Self {
        Sample::Univariate(v.view())
    }
}

impl<'a> From<&'a Array2<f64>> for Sample<'a> {
    fn from(m: &'a Array2<f64>) -> Self {
        Sample::Multivariate(m.view())
    }
}

impl<'a> From<&'a [f64]> for Sample<'a> {
    fn from(v: &'a [f64]) -> Self {
        Sample::Univariate(ArrayView1::from(v))
    }
}

impl<'a> From<&'a Vec<f64>> for Sample<'a> {
    fn from(v: &'a Vec<f64>) -> Self {
        Sample::Univariate(ArrayView1::from(v.as_slice()))
    }
}

/// Whether `matrix` is already a distance matrix.
///
/// Returns `true` when the matrix is square and the sum of squared diagonal
/// entries is at most [`DIAGONAL_TOL`].
pub fn is_distance_matrix(matrix: ArrayView2<'_, f64>) -> bool {
    matrix.nrows() == matrix.ncols()
        && matrix.diag().iter().map(|d| d * d).sum::<f64>() <= DIAGONAL_TOL
}

/// Pairwise Euclidean distances between the rows of `data`.
///
/// Parameters
/// ----------
/// - `data`: `ArrayView2<f64>`
///   `n × p` observation matrix, rows are samples.
///
/// Returns
/// -------
/// `Array2<f64>`
///   `n × n` symmetric matrix with `D[i,j] = ‖xᵢ − xⱼ‖₂` and an exactly zero
///   diagonal.
pub fn euclidean_distance(data: ArrayView2<'_, f64>) -> Array2<f64> {
    pairwise(data, |a, b| a.iter().zip(b).map(|(u, v)| (u - v).powi(2)).sum::<f64>().sqrt())
}

/// Pairwise Manhattan (L1) distances between the rows of `data`.
pub fn manhattan_distance(data: ArrayView2<'_, f64>) -> Array2<f64> {
    pairwise(data, |a, b| a.iter().zip(b).map(|(u, v)| (u - v).abs()).sum::<f64>())
}

fn pairwise<F>(data: ArrayView2<'_, f64>, metric: F) -> Array2<f64>
where
    F: Fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> f64,
{
    let n = data.nrows();
    let mut out = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d = metric(data.row(i), data.row(j));
            out[[i, j]] = d;
            out[[j, i]] = d;
        }
    }
    out
}

/// `DistanceTransform` — converts samples into distance matrices.
///
/// Purpose
/// -------
/// Hold the distance strategy chosen at construction and apply it to raw
/// observations, passing already-computed distance matrices through
/// unchanged.
///
/// Key behaviors
/// -------------
/// - [`DistanceTransform::transform`] handles one sample.
/// - [`DistanceTransform::transform_pair`] handles an (X, Y) pair and
///   enforces a shared sample count.
///
/// Notes
/// -----
/// - The metric is an `Arc`'d closure, so clones are cheap and the transform
///   can be shared across threads.
#[derive(Clone)]
pub struct DistanceTransform {
    metric: DistanceFn,
}

impl DistanceTransform {
    /// Transform using the Euclidean metric.
    pub fn euclidean() -> Self {
        DistanceTransform { metric: Arc::new(euclidean_distance) }
    }

    /// Transform using a caller-supplied metric.
    ///
    /// The metric must map an `n × p` matrix to an `n × n` matrix; the
    /// shape is checked on every call to [`DistanceTransform::transform`].
    pub fn with_metric<F>(metric: F) -> Self
    where
        F: Fn(ArrayView2<'_, f64>) -> Array2<f64> + Send + Sync + 'static,
    {
        DistanceTransform { metric: Arc::new(metric) }
    }

    /// Convert one sample into an `n × n` distance matrix.
    ///
    /// Parameters
    /// ----------
    /// - `matrix`: `ArrayView2<f64>`
    ///   Raw `n × p` observations or an `n × n` distance matrix.
    ///
    /// Returns
    /// -------
    /// `IndepResult<Array2<f64>>`
    ///   The input itself (owned copy) when it is already a distance matrix,
    ///   otherwise the metric applied to it.
    ///
    /// Errors
    /// ------
    /// - `IndepError::EmptySample` when the input has no rows or columns.
    /// - `IndepError::NonFiniteData { .. }` for NaN/±∞ raw observations.
    /// - `IndepError::InvalidDistanceOutput { .. }` when the metric does not
    ///   return an `n × n` matrix.
    pub fn transform(&self, matrix: ArrayView2<'_, f64>) -> IndepResult<Array2<f64>> {
        if matrix.nrows() == 0 || matrix.ncols() == 0 {
            return Err(IndepError::EmptySample);
        }
        if is_distance_matrix(matrix) {
            return Ok(matrix.to_owned());
        }
        for ((row, col), &value) in matrix.indexed_iter() {
            if !value.is_finite() {
                return Err(IndepError::NonFiniteData { row, col, value });
            }
        }

        let n = matrix.nrows();
        let distances = (self.metric)(matrix);
        if distances.dim() != (n, n) {
            return Err(IndepError::InvalidDistanceOutput {
                expected: n,
                rows: distances.nrows(),
                cols: distances.ncols(),
            });
        }
        Ok(distances)
    }

    /// Convert an (X, Y) pair, requiring equal sample counts.
    ///
    /// Errors
    /// ------
    /// - `IndepError::InvalidShape { .. }` when X and Y differ in `n`.
    /// - Any error from [`DistanceTransform::transform`].
    pub fn transform_pair(
        &self, x: Sample<'_>, y: Sample<'_>,
    ) -> IndepResult<(Array2<f64>, Array2<f64>)> {
        if x.n_samples() != y.n_samples() {
            return Err(IndepError::InvalidShape { x_rows: x.n_samples(), y_rows: y.n_samples() });
        }
        Ok((self.transform(x.as_matrix())?, self.transform(y.as_matrix())?))
    }
}

impl Default for DistanceTransform {
    fn default() -> Self {
        DistanceTransform::euclidean()
    }
}

impl fmt::Debug for DistanceTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistanceTransform").finish_non_exhaustive()
    }
}
