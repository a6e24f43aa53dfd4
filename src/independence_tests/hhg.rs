//! independence_tests::hhg — Heller–Heller–Gorfine rank-concordance statistic.
//!
//! Purpose
//! -------
//! Implement the HHG statistic of Heller, Heller & Gorfine (2013,
//! Biometrika 100, 503–510): for every ordered pair of samples (i, j) it
//! cross-tabulates which other samples lie within distance D(i, j) of i in
//! X and in Y, and sums the Pearson χ²-type concordance scores of the
//! resulting 2 × 2 tables.
//!
//! Key behaviors
//! -------------
//! - [`Hhg`] implements [`BaseStatistic`] and reports empty metadata.
//! - [`hhg_statistic`] is the free-function kernel used by [`Hhg`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are `n × n` distance matrices with non-negative entries, so the
//!   points i and j always fall in the "both closer" cell; that cell is
//!   corrected by subtracting 2.
//! - A table with a zero margin contributes exactly 0 (never NaN).
//!
//! Performance
//! -----------
//! - O(n³): n(n − 1) tables, each built by one O(n) pass over row i.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the zero-margin policy, the X = Y upper bound, and
//!   the reference series used throughout the crate's documentation.

use crate::independence_tests::{
    base::{BaseStatistic, StatisticOutcome},
    errors::IndepResult,
};
use ndarray::ArrayView2;

/// `Hhg` — rank-concordance dependence statistic.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hhg;

impl Hhg {
    pub fn new() -> Self {
        Hhg
    }
}

impl BaseStatistic for Hhg {
    fn statistic(
        &self, dx: ArrayView2<'_, f64>, dy: ArrayView2<'_, f64>,
    ) -> IndepResult<StatisticOutcome> {
        Ok(StatisticOutcome::scalar(hhg_statistic(dx, dy)))
    }

    fn name(&self) -> &str {
        "hhg"
    }
}

/// Compute the HHG statistic `Σ_{i≠j} S[i,j]`.
///
/// Parameters
/// ----------
/// - `dx`, `dy`: `ArrayView2<f64>`
///   `n × n` distance matrices for X and Y.
///
/// Returns
/// -------
/// `f64`
///   Non-negative sum of per-pair scores
///   `S[i,j] = (n−2)(t12·t21 − t11·t22)² / ((t11+t12)(t21+t22)(t11+t21)(t12+t22))`,
///   where the cells count samples k with `D_X[i,k] ≤ D_X[i,j]` and/or
///   `D_Y[i,k] ≤ D_Y[i,j]`.
///
/// Notes
/// -----
/// - Each score equals `(n−2)·φ²` for the table's φ coefficient, hence lies
///   in `[0, n−2]`.
pub fn hhg_statistic(dx: ArrayView2<'_, f64>, dy: ArrayView2<'_, f64>) -> f64 {
    let n = dx.nrows();
    let scale = n as f64 - 2.0;
    let mut total = 0.0;

    for i in 0..n {
        let row_x = dx.row(i);
        let row_y = dy.row(i);
        for j in 0..n {
            if i == j {
                continue;
            }
            let (cut_x, cut_y) = (row_x[j], row_y[j]);
            let mut table = [0.0_f64; 4];
            for (&a, &b) in row_x.iter().zip(row_y.iter()) {
                let cell = match (a <= cut_x, b <= cut_y) {
                    (true, true) => 0,
                    (true, false) => 1,
                    (false, true) => 2,
                    (false, false) => 3,
                };
                table[cell] += 1.0;
            }
            table[0] -= 2.0;
            total += concordance_score(table, scale);
        }
    }
    total
}

/// Pearson concordance score of one 2 × 2 table `[t11, t12, t21, t22]`.
#[inline]
fn concordance_score([t11, t12, t21, t22]: [f64; 4], scale: f64) -> f64 {
    let denom = (t11 + t12) * (t21 + t22) * (t11 + t21) * (t12 + t22);
    if denom > 0.0 { scale * (t12 * t21 - t11 * t22).powi(2) / denom } else { 0.0 }
}
