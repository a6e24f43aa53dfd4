//! independence_tests::mgc — multiscale graph correlation (MGC).
//!
//! Purpose
//! -------
//! Implement the MGC statistic of Vogelstein et al. (2019, eLife 8:e41690):
//! a family of *local* distance correlations indexed by neighbourhood sizes
//! (k, l), smoothed by restricting attention to the largest connected region
//! of significant local correlations and taking its maximum.
//!
//! Key behaviors
//! -------------
//! - [`local_correlations`] builds the `kx × ky` local correlation map from
//!   two distance matrices (kx, ky = number of distinct distances per
//!   column, i.e. `n` for continuous data).
//! - [`Mgc`] implements [`BaseStatistic`], returning the smoothed statistic
//!   and its [`OptimalScale`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are symmetric `n × n` distance matrices (index-sliced views of
//!   larger matrices are fine).
//! - Local correlations are clamped into [−1, 1]; scales whose local
//!   variance is ≤ [`VARIANCE_TOL`] get correlation 0.
//!
//! Conventions
//! -----------
//! - Ranks are dense, column-wise and 1-based; the diagonal (distance 0)
//!   always has rank 1.
//! - Distances are centred by subtracting `Σₖ D[k,j] / (n − 1)` from column
//!   j and zeroing the diagonal, so centring and ranking both refer to the
//!   neighbourhood of point j.
//! - Scales are reported 1-based; `(kx, ky)` is the global scale.
//!
//! Performance
//! -----------
//! - O(n² log n) for ranking plus O(n²) for the local covariance maps.
//!
//! Testing notes
//! -------------
//! - Unit tests check the dense ranking, the connected-region selection, the
//!   exact linear-relation case and the constant-sample fallback.

use crate::independence_tests::{
    base::{BaseStatistic, OptimalScale, StatisticOutcome},
    errors::{IndepError, IndepResult},
};
use ndarray::{Array2, ArrayView2, Axis};
use statrs::distribution::{Beta, ContinuousCDF};

/// Local variances at or below this value disable the corresponding scale.
pub const VARIANCE_TOL: f64 = 1e-14;

/// `Mgc` — multiscale graph correlation base statistic.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mgc;

impl Mgc {
    pub fn new() -> Self {
        Mgc
    }
}

impl BaseStatistic for Mgc {
    /// Compute the smoothed MGC statistic and its optimal scale.
    ///
    /// Errors
    /// ------
    /// - `IndepError::Numerical` if the Beta threshold distribution rejects
    ///   its parameters (not expected for `n ≥ 5`).
    fn statistic(
        &self, dx: ArrayView2<'_, f64>, dy: ArrayView2<'_, f64>,
    ) -> IndepResult<StatisticOutcome> {
        let n = dx.nrows();
        if n < 2 {
            return Ok(StatisticOutcome::with_scale(0.0, OptimalScale { x: n, y: n }));
        }

        let local = local_correlations(dx, dy);
        let (m, k) = local.dim();
        if m == 1 || k == 1 {
            return Ok(StatisticOutcome::with_scale(local[[m - 1, k - 1]], OptimalScale {
                x: m,
                y: k,
            }));
        }

        let region = significant_region(&local, n - 1)?;
        let (value, scale) = smooth_significant(&region, &local);
        Ok(StatisticOutcome::with_scale(value, scale))
    }

    fn name(&self) -> &str {
        "mgc"
    }
}

/// Local correlation map between two distance matrices.
///
/// Parameters
/// ----------
/// - `dx`, `dy`: `ArrayView2<f64>`
///   `n × n` distance matrices.
///
/// Returns
/// -------
/// `Array2<f64>`
///   `kx × ky` matrix whose (k, l) entry is the local distance correlation
///   using the k nearest neighbours in X and the l nearest in Y. The last
///   entry is the global (all-neighbour) correlation. An empty input gives
///   an empty map.
pub fn local_correlations(dx: ArrayView2<'_, f64>, dy: ArrayView2<'_, f64>) -> Array2<f64> {
    let (ax, ay) = (mgc_center(dx), mgc_center(dy));
    let (rx, ry) = (dense_column_ranks(dx), dense_column_ranks(dy));

    let cov_xy = local_covariance(ax.view(), ay.t(), rx.view(), ry.t());
    let cov_xx = local_covariance(ax.view(), ax.t(), rx.view(), rx.t());
    let cov_yy = local_covariance(ay.view(), ay.t(), ry.view(), ry.t());
    let var_x = cov_xx.diag();
    let var_y = cov_yy.diag();

    Array2::from_shape_fn(cov_xy.dim(), |(k, l)| {
        let (vx, vy) = (var_x[k], var_y[l]);
        if vx <= VARIANCE_TOL || vy <= VARIANCE_TOL {
            0.0
        } else {
            (cov_xy[[k, l]] / (vx * vy).sqrt()).clamp(-1.0, 1.0)
        }
    })
}

/// Column-wise dense ranks (1-based) of a distance matrix.
fn dense_column_ranks(d: ArrayView2<'_, f64>) -> Array2<usize> {
    let n = d.nrows();
    let mut ranks = Array2::<usize>::zeros(d.dim());
    let mut order: Vec<usize> = (0..n).collect();

    for (j, column) in d.axis_iter(Axis(1)).enumerate() {
        order.sort_by(|&p, &q| column[p].total_cmp(&column[q]));
        let mut rank = 0;
        let mut previous = f64::NAN;
        for &i in &order {
            if rank == 0 || column[i] != previous {
                rank += 1;
                previous = column[i];
            }
            ranks[[i, j]] = rank;
        }
    }
    ranks
}

fn mgc_center(d: ArrayView2<'_, f64>) -> Array2<f64> {
    let denom = d.nrows().saturating_sub(1).max(1) as f64;
    let col_sums = d.sum_axis(Axis(0));
    Array2::from_shape_fn(d.dim(), |(i, j)| if i == j { 0.0 } else { d[[i, j]] - col_sums[j] / denom })
}

/// Rank-indexed local covariances with 2-D cumulative sums.
fn local_covariance(
    a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>, rank_a: ArrayView2<'_, usize>,
    rank_b: ArrayView2<'_, usize>,
) -> Array2<f64> {
    let n = a.nrows();
    let kx = rank_a.iter().copied().max().unwrap_or(0);
    let ky = rank_b.iter().copied().max().unwrap_or(0);
    let mut cov = Array2::<f64>::zeros((kx, ky));
    let mut ex = vec![0.0; kx];
    let mut ey = vec![0.0; ky];

    for i in 0..n {
        for j in 0..n {
            let (k, l) = (rank_a[[i, j]] - 1, rank_b[[i, j]] - 1);
            let (av, bv) = (a[[i, j]], b[[i, j]]);
            cov[[k, l]] += av * bv;
            ex[k] += av;
            ey[l] += bv;
        }
    }

    for k in 1..kx {
        for l in 0..ky {
            let above = cov[[k - 1, l]];
            cov[[k, l]] += above;
        }
    }
    for l in 1..ky {
        for k in 0..kx {
            let left = cov[[k, l - 1]];
            cov[[k, l]] += left;
        }
    }
    for k in 1..kx {
        ex[k] += ex[k - 1];
    }
    for l in 1..ky {
        ey[l] += ey[l - 1];
    }

    let n2 = (n * n) as f64;
    for ((k, l), c) in cov.indexed_iter_mut() {
        *c -= ex[k] * ey[l] / n2;
    }
    cov
}

/// Largest 4-connected region of local correlations above the threshold.
///
/// The threshold is `2·F⁻¹_{Beta(a,a)}(1 − 0.02/s) − 1` with
/// `a = s(s−3)/4 − 1/2`, floored at the global correlation. For `a ≤ 0`
/// (tiny samples) only the global floor is used.
fn significant_region(local: &Array2<f64>, sample_size: usize) -> IndepResult<Array2<bool>> {
    let (m, k) = local.dim();
    let global = local[[m - 1, k - 1]];
    let s = sample_size as f64;
    let shape = s * (s - 3.0) / 4.0 - 0.5;

    let mut threshold = global;
    if shape > 0.0 {
        let beta = Beta::new(shape, shape)
            .map_err(|e| IndepError::Numerical { reason: format!("beta threshold: {e:?}") })?;
        let percentile = 1.0 - 0.02 / s;
        threshold = threshold.max(2.0 * beta.inverse_cdf(percentile) - 1.0);
    }

    let mask = local.mapv(|r| r > threshold);
    Ok(largest_component(&mask))
}

/// Keep the largest 4-connected component of `mask`; ties keep the one
/// found first in row-major order.
fn largest_component(mask: &Array2<bool>) -> Array2<bool> {
    let (m, k) = mask.dim();
    let mut labels = Array2::<usize>::zeros((m, k));
    let mut next = 0;
    let (mut best_label, mut best_size) = (0, 0);

    for r in 0..m {
        for c in 0..k {
            if !mask[[r, c]] || labels[[r, c]] != 0 {
                continue;
            }
            next += 1;
            labels[[r, c]] = next;
            let mut size = 0;
            let mut stack = vec![(r, c)];
            while let Some((i, j)) = stack.pop() {
                size += 1;
                let neighbours = [(i.wrapping_sub(1), j), (i + 1, j), (i, j.wrapping_sub(1)), (i, j + 1)];
                for (ni, nj) in neighbours {
                    if ni < m && nj < k && mask[[ni, nj]] && labels[[ni, nj]] == 0 {
                        labels[[ni, nj]] = next;
                        stack.push((ni, nj));
                    }
                }
            }
            if size > best_size {
                best_size = size;
                best_label = next;
            }
        }
    }
    labels.mapv(|l| best_label != 0 && l == best_label)
}

/// Smoothed statistic: the region maximum if the region is large enough and
/// beats the global correlation, otherwise the global correlation.
fn smooth_significant(region: &Array2<bool>, local: &Array2<f64>) -> (f64, OptimalScale) {
    let (m, k) = local.dim();
    let mut value = local[[m - 1, k - 1]];
    let mut scale = OptimalScale { x: m, y: k };

    let area = region.iter().filter(|&&s| s).count();
    if area == 0 || area < m.min(k) {
        return (value, scale);
    }

    let region_max = region
        .indexed_iter()
        .filter(|&(_, &s)| s)
        .map(|(idx, _)| local[idx])
        .fold(f64::NEG_INFINITY, f64::max);
    if region_max >= value {
        value = region_max;
        // Largest row-major index of the whole map attaining the maximum.
        if let Some(((r, c), _)) = local.indexed_iter().filter(|&(_, &v)| v >= region_max).last() {
            scale = OptimalScale { x: r + 1, y: c + 1 };
        }
    }
    (value, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::euclidean_distance;
    use approx::assert_relative_eq;
    use ndarray::{Array1, array};

    fn line_distances(values: &[f64]) -> Array2<f64> {
        let col = Array1::from(values.to_vec()).insert_axis(Axis(1));
        euclidean_distance(col.view())
    }

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Dense column ranking with ties.
    // - Column centring and the local correlation map against a direct
    //   evaluation of each local covariance.
    // - Largest connected component selection and the optimal-scale search.
    // - MGC on an exactly linear relation and on a constant sample.
    //
    // They intentionally DO NOT cover:
    // - Power of MGC against nonlinear alternatives (simulation territory).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify dense ranks per column, including ties.
    //
    // Given
    // -----
    // - Points 0, 1, 2, 3 → column 0 of D is [0, 1, 2, 3]; column 1 is
    //   [1, 0, 1, 2] with a tie.
    //
    // Expect
    // ------
    // - Column 0 ranks [1, 2, 3, 4]; column 1 ranks [2, 1, 2, 3].
    fn dense_column_ranks_handle_ties() {
        // Arrange
        let d = line_distances(&[0.0, 1.0, 2.0, 3.0]);

        // Act
        let ranks = dense_column_ranks(d.view());

        // Assert
        assert_eq!(ranks.column(0).to_vec(), vec![1, 2, 3, 4]);
        assert_eq!(ranks.column(1).to_vec(), vec![2, 1, 2, 3]);
    }

    /// Local correlations evaluated scale by scale from their definition:
    /// `A[i,j] = D[i,j] − Σₖ D[k,j]/(n − 1)`, and the (k, l) covariance
    /// sums `A[i,j]·B[j,i]` over pairs with `RX[i,j] ≤ k` and `RY[j,i] ≤ l`.
    fn direct_local_correlations(dx: &Array2<f64>, dy: &Array2<f64>) -> Array2<f64> {
        let n = dx.nrows();
        let centre = |d: &Array2<f64>| {
            Array2::from_shape_fn((n, n), |(i, j)| {
                if i == j {
                    0.0
                } else {
                    d[[i, j]] - (0..n).map(|k| d[[k, j]]).sum::<f64>() / (n - 1) as f64
                }
            })
        };
        let (a, b) = (centre(dx), centre(dy));
        let (rx, ry) = (dense_column_ranks(dx.view()), dense_column_ranks(dy.view()));
        let cov = |p: &Array2<f64>, q: &Array2<f64>, rp: &Array2<usize>, rq: &Array2<usize>, k: usize, l: usize| {
            let (mut pq, mut sp, mut sq) = (0.0, 0.0, 0.0);
            for i in 0..n {
                for j in 0..n {
                    let pv = if rp[[i, j]] <= k { p[[i, j]] } else { 0.0 };
                    let qv = if rq[[j, i]] <= l { q[[j, i]] } else { 0.0 };
                    pq += pv * qv;
                    sp += pv;
                    sq += qv;
                }
            }
            pq - sp * sq / (n * n) as f64
        };
        let kx = rx.iter().copied().max().unwrap_or(0);
        let ky = ry.iter().copied().max().unwrap_or(0);
        Array2::from_shape_fn((kx, ky), |(k, l)| {
            let vx = cov(&a, &a, &rx, &rx, k + 1, k + 1);
            let vy = cov(&b, &b, &ry, &ry, l + 1, l + 1);
            if vx <= VARIANCE_TOL || vy <= VARIANCE_TOL {
                0.0
            } else {
                (cov(&a, &b, &rx, &ry, k + 1, l + 1) / (vx * vy).sqrt()).clamp(-1.0, 1.0)
            }
        })
    }

    #[test]
    // Purpose
    // -------
    // Centring subtracts each column's mean over the n − 1 other points.
    //
    // Given
    // -----
    // - Points 0, 1, 3 → D = [[0, 1, 3], [1, 0, 2], [3, 2, 0]], column
    //   means (2, 1.5, 2.5).
    //
    // Expect
    // ------
    // - A[i,j] = D[i,j] − mean_j off the diagonal, zero on it.
    fn mgc_center_subtracts_column_means() {
        // Arrange
        let d = line_distances(&[0.0, 1.0, 3.0]);

        // Act
        let a = mgc_center(d.view());

        // Assert
        let expected = array![[0.0, -0.5, 0.5], [-1.0, 0.0, -0.5], [1.0, 0.5, 0.0]];
        for (got, want) in a.iter().zip(expected.iter()) {
            assert_relative_eq!(*got, *want, epsilon = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // The cumulative-sum map equals a scale-by-scale evaluation of every
    // local correlation.
    //
    // Given
    // -----
    // - 15 points, Y = X² + small perturbation (nonlinear, no ties).
    //
    // Expect
    // ------
    // - Same 15 × 15 shape and entries equal to 1e-10.
    fn local_correlations_match_direct_evaluation() {
        // Arrange
        let x: Vec<f64> = (0..15).map(|t| (t as f64 * 1.3).sin() * 2.0).collect();
        let y: Vec<f64> = x.iter().enumerate().map(|(t, v)| v * v + 0.01 * t as f64).collect();
        let (dx, dy) = (line_distances(&x), line_distances(&y));

        // Act
        let fast = local_correlations(dx.view(), dy.view());
        let direct = direct_local_correlations(&dx, &dy);

        // Assert
        assert_eq!(fast.dim(), direct.dim());
        for ((idx, got), want) in fast.indexed_iter().zip(direct.iter()) {
            assert!((got - want).abs() <= 1e-10, "local{idx:?}: {got} vs {want}");
        }
    }

    #[test]
    // Purpose
    // -------
    // An empty input yields an empty map instead of underflowing.
    //
    // Given
    // -----
    // - Two 0 × 0 distance matrices.
    //
    // Expect
    // ------
    // - A 0 × 0 map.
    fn local_correlations_of_empty_input_is_empty() {
        let empty = Array2::<f64>::zeros((0, 0));
        assert_eq!(local_correlations(empty.view(), empty.view()).dim(), (0, 0));
    }

    #[test]
    // Purpose
    // -------
    // The optimal scale is the last row-major cell of the whole map that
    // reaches the region maximum, even outside the region.
    //
    // Given
    // -----
    // - Region {(0,1), (0,2), (1,1)} with maximum 0.8; cell (2,0) = 0.95
    //   lies outside it; global entry 0.2.
    //
    // Expect
    // ------
    // - Value 0.8, scale (3, 1).
    fn optimal_scale_searches_whole_map() {
        // Arrange
        let local = array![[0.1, 0.8, 0.8], [0.1, 0.8, 0.1], [0.95, 0.1, 0.2]];
        let region = array![[false, true, true], [false, true, false], [false, false, false]];

        // Act
        let (value, scale) = smooth_significant(&region, &local);

        // Assert
        assert_eq!(value, 0.8);
        assert_eq!(scale, OptimalScale { x: 3, y: 1 });
    }

    #[test]
    // Purpose
    // -------
    // Ensure only the largest 4-connected component survives.
    //
    // Given
    // -----
    // - A mask with a 3-cell L-shaped component and an isolated cell
    //   (diagonal neighbours do not connect).
    //
    // Expect
    // ------
    // - Only the L-shaped component remains.
    fn largest_component_keeps_biggest_region() {
        // Arrange
        let mask = array![[true, false, false], [true, true, false], [false, false, true]];

        // Act
        let kept = largest_component(&mask);

        // Assert
        let expected = array![[true, false, false], [true, true, false], [false, false, false]];
        assert_eq!(kept, expected);
    }

    #[test]
    // Purpose
    // -------
    // For Y an exact linear function of X the global local correlation is
    // 1, so MGC is 1 and the reported scale lies inside the map.
    //
    // Given
    // -----
    // - X: 12 distinct points; Y = 2X + 1.
    //
    // Expect
    // ------
    // - MGC ≈ 1 and 1 ≤ scale ≤ 12 on both axes.
    fn mgc_linear_relation_is_one() {
        // Arrange
        let x: Vec<f64> = (0..12).map(|t| (t as f64 * 0.7).sin() + t as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        let (dx, dy) = (line_distances(&x), line_distances(&y));

        // Act
        let outcome = Mgc::new().statistic(dx.view(), dy.view()).expect("MGC should succeed");

        // Assert
        assert_relative_eq!(outcome.value, 1.0, epsilon = 1e-9);
        let scale = outcome.metadata.optimal_scale.expect("MGC reports a scale");
        assert!((1..=12).contains(&scale.x) && (1..=12).contains(&scale.y));
    }

    #[test]
    // Purpose
    // -------
    // A constant sample has a single distinct distance, so the map has one
    // row and MGC falls back to its (zero) last entry.
    //
    // Given
    // -----
    // - X constant (zero distance matrix), Y a 6-point series.
    //
    // Expect
    // ------
    // - MGC = 0 with scale x = 1.
    fn mgc_constant_sample_falls_back_to_zero() {
        // Arrange
        let dx = Array2::<f64>::zeros((6, 6));
        let dy = line_distances(&[0.1, 0.5, -0.3, 2.0, 1.1, -1.4]);

        // Act
        let outcome = Mgc::new().statistic(dx.view(), dy.view()).expect("MGC should succeed");

        // Assert
        assert_eq!(outcome.value, 0.0);
        assert_eq!(outcome.metadata.optimal_scale.map(|s| s.x), Some(1));
    }
}
