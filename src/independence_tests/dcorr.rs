//! independence_tests::dcorr — distance correlation (biased and unbiased).
//!
//! Purpose
//! -------
//! Provide the single-scale distance correlation of Székely, Rizzo & Bakirov
//! (2007) and its unbiased U-centred variant (Székely & Rizzo, 2014) as base
//! statistics. Wrapped by the lag aggregator they give the DCorrX family of
//! time-series tests.
//!
//! Conventions
//! -----------
//! - `Biased`: double centring `A = D − r̄ᵢ − c̄ⱼ + ḡ`, `dCov² = Σ A∘B / n²`.
//! - `Unbiased`: U-centring with `(n−2)` and `(n−1)(n−2)` denominators and a
//!   zero diagonal, `dCov² = Σ Ã∘B̃ / (n(n−3))`; requires `n > 3`.
//! - The correlation is `dCov²(X,Y) / √(dCov²(X,X)·dCov²(Y,Y))`, and 0 when
//!   that product is not positive.

use crate::independence_tests::{
    base::{BaseStatistic, StatisticOutcome},
    errors::IndepResult,
};
use ndarray::{Array2, ArrayView2, Axis};

/// Centring scheme for [`Dcorr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DcorrVariant {
    #[default]
    Biased,
    Unbiased,
}

/// `Dcorr` — distance correlation base statistic.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dcorr {
    variant: DcorrVariant,
}

impl Dcorr {
    pub fn new(variant: DcorrVariant) -> Self {
        Dcorr { variant }
    }

    pub fn biased() -> Self {
        Dcorr::new(DcorrVariant::Biased)
    }

    pub fn unbiased() -> Self {
        Dcorr::new(DcorrVariant::Unbiased)
    }

    pub fn variant(&self) -> DcorrVariant {
        self.variant
    }
}

impl BaseStatistic for Dcorr {
    fn statistic(
        &self, dx: ArrayView2<'_, f64>, dy: ArrayView2<'_, f64>,
    ) -> IndepResult<StatisticOutcome> {
        Ok(StatisticOutcome::scalar(distance_correlation(dx, dy, self.variant)))
    }

    fn name(&self) -> &str {
        match self.variant {
            DcorrVariant::Biased => "dcorr",
            DcorrVariant::Unbiased => "unbiased_dcorr",
        }
    }
}

/// Distance correlation between two `n × n` distance matrices.
///
/// Returns 0 for degenerate inputs (a constant sample, or `n ≤ 3` in the
/// unbiased variant).
pub fn distance_correlation(
    dx: ArrayView2<'_, f64>, dy: ArrayView2<'_, f64>, variant: DcorrVariant,
) -> f64 {
    let n = dx.nrows();
    let (a, b, norm) = match variant {
        DcorrVariant::Biased => {
            if n == 0 {
                return 0.0;
            }
            (double_center(dx), double_center(dy), (n * n) as f64)
        }
        DcorrVariant::Unbiased => {
            if n <= 3 {
                return 0.0;
            }
            (u_center(dx), u_center(dy), (n * (n - 3)) as f64)
        }
    };

    let cov_xy = (&a * &b).sum() / norm;
    let var_x = (&a * &a).sum() / norm;
    let var_y = (&b * &b).sum() / norm;
    let denom = var_x * var_y;
    if denom > 0.0 { cov_xy / denom.sqrt() } else { 0.0 }
}

fn double_center(d: ArrayView2<'_, f64>) -> Array2<f64> {
    let n = d.nrows() as f64;
    let row_means = d.sum_axis(Axis(1)) / n;
    let col_means = d.sum_axis(Axis(0)) / n;
    let grand_mean = d.sum() / (n * n);
    Array2::from_shape_fn(d.dim(), |(i, j)| d[[i, j]] - row_means[i] - col_means[j] + grand_mean)
}

fn u_center(d: ArrayView2<'_, f64>) -> Array2<f64> {
    let n = d.nrows() as f64;
    let row_sums = d.sum_axis(Axis(1));
    let col_sums = d.sum_axis(Axis(0));
    let total = d.sum();
    Array2::from_shape_fn(d.dim(), |(i, j)| {
        if i == j {
            0.0
        } else {
            d[[i, j]] - row_sums[i] / (n - 2.0) - col_sums[j] / (n - 2.0)
                + total / ((n - 1.0) * (n - 2.0))
        }
    })
}
