//! independence_tests::iid — permutation test for exchangeable samples.
//!
//! Purpose
//! -------
//! Wrap any [`BaseStatistic`] in a plain permutation test for paired i.i.d.
//! samples: no lags, and Y is relabelled by uniform random permutations
//! instead of circular blocks.
//!
//! Key behaviors
//! -------------
//! - [`IndependenceTest::test_statistic`] returns the base statistic with
//!   its metadata.
//! - [`IndependenceTest::p_value`] builds a null from
//!   `replication_factor` uniform relabellings, reusing the seeding and
//!   worker-pool rules of the time-series engine.
//!
//! Invariants & assumptions
//! ------------------------
//! - `options.mode`, `block_size` and `subsample_size` are ignored; the
//!   exchangeable null has no serial structure to preserve.

use crate::{
    distance::{DistanceTransform, Sample},
    independence_tests::{
        base::{BaseStatistic, StatisticOutcome},
        errors::IndepResult,
        resampling::{
            PValueOptions, PValueOutcome, counter_rng_seed, empirical_p_value, permute_symmetric,
            resolve_seed, run_replicates,
        },
        validation::{validate_replication_factor, validate_sample_counts},
    },
};
use log::debug;
use rand::{SeedableRng, seq::SliceRandom};
use rand_xoshiro::Xoshiro256PlusPlus;

/// `IndependenceTest` — permutation test around a base statistic.
#[derive(Debug, Clone)]
pub struct IndependenceTest<S> {
    base: S,
    distance: DistanceTransform,
    name: String,
}

impl<S: BaseStatistic> IndependenceTest<S> {
    pub fn new(base: S) -> Self {
        let name = base.name().to_string();
        IndependenceTest { base, distance: DistanceTransform::default(), name }
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

    /// Base statistic between X and Y.
    ///
    /// Errors
    /// ------
    /// - `InvalidShape`, `EmptySample`, `NonFiniteData`,
    ///   `InvalidDistanceOutput` from input conversion.
    pub fn test_statistic<'x, 'y>(
        &self, x: impl Into<Sample<'x>>, y: impl Into<Sample<'y>>,
    ) -> IndepResult<StatisticOutcome> {
        let (x, y) = (x.into(), y.into());
        validate_sample_counts(x.n_samples(), y.n_samples())?;
        let (dx, dy) = self.distance.transform_pair(x, y)?;
        self.base.statistic(dx.view(), dy.view())
    }

    /// Permutation p-value of the base statistic.
    ///
    /// Returns
    /// -------
    /// `IndepResult<PValueOutcome>`
    ///   `#(null > observed) / R` floored at `1/R`, and the null.
    ///
    /// Errors
    /// ------
    /// - Every error of [`IndependenceTest::test_statistic`].
    /// - `InvalidReplicationFactor(0)`, `ThreadPool`.
    pub fn p_value<'x, 'y>(
        &self, x: impl Into<Sample<'x>>, y: impl Into<Sample<'y>>, options: &PValueOptions,
    ) -> IndepResult<PValueOutcome> {
        let (x, y) = (x.into(), y.into());
        validate_sample_counts(x.n_samples(), y.n_samples())?;
        validate_replication_factor(options.replication_factor)?;
        let (dx, dy) = self.distance.transform_pair(x, y)?;
        let observed = self.base.statistic(dx.view(), dy.view())?.value;

        let n = dx.nrows();
        let seed = resolve_seed(options.seed);
        debug!("{}: n = {n}, observed = {observed}, replicates = {}", self.name, options.replication_factor);

        let null = run_replicates(options.replication_factor, options.num_threads, |i| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(seed, i as u64));
            let mut indices: Vec<usize> = (0..n).collect();
            indices.shuffle(&mut rng);
            let dy_perm = permute_symmetric(dy.view(), &indices);
            Ok(self.base.statistic(dx.view(), dy_perm.view())?.value)
        })?;

        Ok(PValueOutcome { value: empirical_p_value(observed, &null), null_distribution: null })
    }
}
