//! # Seeded random number generation and sampling routines.
//!
//! The [`GsRng`] type is built on top of a [`MasterRng`], which produces a deterministic stream
//! of seeds. Every call to [`GsRng::random`] returns a fresh [`Xoshiro256PlusPlus`] generator that
//! is seeded from the master stream, so that the full state of a random field generator is
//! reproducible from a single seed.
//!
//! The following sampling routines are provided:
//! - [`sample_sphere`](`GsRng::sample_sphere`) Uniform samples on the unit sphere in 1, 2 or 3
//!   dimensions.
//! - [`sample_dist`](`GsRng::sample_dist`) Inverse transform sampling for distributions with a
//!   known percent point function.
//! - [`sample_ln_pdf`](`GsRng::sample_ln_pdf`) Markov chain Monte Carlo sampling of an
//!   unnormalized logarithmic density using the [`EnsembleSampler`].

mod mcmc;

pub use mcmc::*;

use crate::fXX;
use derive_builder::{Builder, UninitializedFieldError};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

/// Errors associated with random number generation and sampling.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum RngError {
    #[error("invalid sphere dimension {0}, must be 1, 2 or 3")]
    InvalidDimension(usize),
    #[error("invalid sampler settings: {0}")]
    InvalidSettings(String),
    #[error("percent point function is undefined at u={0:.4}")]
    InvalidPpf(f64),
    #[error("missing sampler setting")]
    UninitializedField(#[from] UninitializedFieldError),
}

/// Settings for the Markov chain Monte Carlo sampler.
#[derive(Builder, Clone, Debug, Deserialize, PartialEq, Serialize)]
#[builder(build_fn(validate = "Self::validate", error = "RngError"))]
pub struct McmcSettings {
    /// Number of walkers of the ensemble sampler.
    #[builder(default = 50)]
    pub nwalkers: usize,

    /// Number of steps that are discarded before sampling.
    #[builder(default = 20)]
    pub burn_in: usize,

    /// Number of steps per walker and requested sample.
    #[builder(default = 10)]
    pub oversampling_factor: usize,
}

impl McmcSettings {
    /// Check the settings, this is required for settings that were not created by the builder.
    pub fn validate(&self) -> Result<(), RngError> {
        check_nwalkers(self.nwalkers)?;
        check_oversampling_factor(self.oversampling_factor)
    }
}

impl McmcSettingsBuilder {
    fn validate(&self) -> Result<(), RngError> {
        if let Some(nwalkers) = self.nwalkers {
            check_nwalkers(nwalkers)?;
        }

        if let Some(factor) = self.oversampling_factor {
            check_oversampling_factor(factor)?;
        }

        Ok(())
    }
}

fn check_nwalkers(nwalkers: usize) -> Result<(), RngError> {
    if nwalkers < 2 {
        return Err(RngError::InvalidSettings(
            "the ensemble sampler requires at least two walkers".to_string(),
        ));
    }

    Ok(())
}

fn check_oversampling_factor(factor: usize) -> Result<(), RngError> {
    if factor == 0 {
        return Err(RngError::InvalidSettings(
            "oversampling_factor must be positive".to_string(),
        ));
    }

    Ok(())
}

impl Default for McmcSettings {
    fn default() -> Self {
        Self {
            nwalkers: 50,
            burn_in: 20,
            oversampling_factor: 10,
        }
    }
}

/// A master random number generator that produces a deterministic stream of seeds.
#[derive(Clone, Debug)]
pub struct MasterRng {
    rng: Xoshiro256PlusPlus,
    seed: u64,
}

impl MasterRng {
    /// Create a new [`MasterRng`], a seed is drawn from the system entropy if `None` is given.
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);

        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            seed,
        }
    }

    /// Returns the next seed of the stream.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Returns the (resolved) seed of the master stream.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// A seeded random number generator with sampling routines for spatial random fields.
#[derive(Clone, Debug)]
pub struct GsRng {
    master: MasterRng,
}

impl GsRng {
    /// Create a new [`GsRng`], a seed is drawn from the system entropy if `None` is given.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            master: MasterRng::new(seed),
        }
    }

    /// Draw `size` standard normal samples.
    pub fn normal<T>(&mut self, size: usize) -> DVector<T>
    where
        T: fXX,
        StandardNormal: Distribution<T>,
    {
        let mut rng = self.random();

        DVector::from_iterator(size, (0..size).map(|_| rng.sample(StandardNormal)))
    }

    /// Returns a new random number generator that is seeded from the master stream.
    pub fn random(&mut self) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(self.master.next_seed())
    }

    /// Draw `size` samples from a distribution with the percent point function `ppf`.
    pub fn sample_dist<T, F>(&mut self, ppf: F, size: usize) -> Result<DVector<T>, RngError>
    where
        T: fXX,
        F: Fn(T) -> Option<T>,
    {
        let mut rng = self.random();

        let samples = (0..size)
            .map(|_| {
                // Drawn in the target precision, u < 1 must also hold for f32.
                let u = rng.random_range(T::zero()..T::one());

                match ppf(u) {
                    Some(value) if value.is_finite() => Ok(value),
                    _ => Err(RngError::InvalidPpf(u.as_f64())),
                }
            })
            .collect::<Result<Vec<T>, RngError>>()?;

        Ok(DVector::from_vec(samples))
    }

    /// Draw `size` samples from an unnormalized logarithmic density `ln_pdf` using an
    /// affine-invariant ensemble sampler.
    ///
    /// The walkers are initialized uniformly within `[0, sample_around)`.
    pub fn sample_ln_pdf<T, F>(
        &mut self,
        ln_pdf: F,
        size: usize,
        sample_around: T,
        settings: &McmcSettings,
    ) -> Result<DVector<T>, RngError>
    where
        T: fXX,
        F: Fn(T) -> T,
    {
        settings.validate()?;

        if size == 0 {
            return Ok(DVector::zeros(0));
        }

        let start = Instant::now();

        let mut rng = self.random();
        let samples_per_walker = size.div_ceil(settings.nwalkers);

        let initial = (0..settings.nwalkers)
            .map(|_| sample_around * T::constant(rng.random::<f64>()))
            .collect::<Vec<T>>();

        let mut sampler = EnsembleSampler::new(ln_pdf, initial)?;

        sampler.run(settings.burn_in, &mut rng);
        sampler.reset();
        sampler.run(settings.oversampling_factor * samples_per_walker, &mut rng);

        let acceptance = sampler.acceptance_fraction();

        if acceptance < 0.05 {
            warn!(
                "sample_ln_pdf: low acceptance fraction {:.3}, samples may be strongly correlated",
                acceptance
            );
        }

        let chain = sampler.flatchain();

        if chain.is_empty() {
            return Err(RngError::InvalidSettings(
                "the sampling phase produced no samples".to_string(),
            ));
        }

        let mut choice = self.random();

        let samples = DVector::from_iterator(
            size,
            (0..size).map(|_| chain[choice.random_range(0..chain.len())]),
        );

        debug!(
            "sample_ln_pdf: {} samples from a chain of {} (acceptance {:.2}) in {:.3} sec",
            size,
            chain.len(),
            acceptance,
            start.elapsed().as_millis() as f64 / 1e3
        );

        Ok(samples)
    }

    /// Draw `size` uniformly distributed samples on the unit sphere in `dim` dimensions.
    ///
    /// The result has `dim` rows and `size` columns.
    pub fn sample_sphere<T>(&mut self, dim: usize, size: usize) -> Result<DMatrix<T>, RngError>
    where
        T: fXX,
    {
        let mut rng = self.random();

        match dim {
            1 => Ok(DMatrix::from_iterator(
                1,
                size,
                (0..size).map(|_| {
                    if rng.random::<bool>() {
                        T::one()
                    } else {
                        -T::one()
                    }
                }),
            )),
            2 => Ok(DMatrix::from_iterator(
                2,
                size,
                (0..size).flat_map(|_| {
                    let phi = T::two_pi() * T::constant(rng.random::<f64>());

                    [phi.cos(), phi.sin()]
                }),
            )),
            3 => Ok(DMatrix::from_iterator(
                3,
                size,
                (0..size).flat_map(|_| {
                    let phi = T::two_pi() * T::constant(rng.random::<f64>());
                    let cos_theta = T::constant(2.0 * rng.random::<f64>() - 1.0);
                    let sin_theta = (T::one() - cos_theta * cos_theta).sqrt();

                    [sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta]
                }),
            )),
            _ => Err(RngError::InvalidDimension(dim)),
        }
    }

    /// Returns the (resolved) seed of the master stream.
    pub fn seed(&self) -> u64 {
        self.master.seed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_master_rng() {
        let mut rng_1 = MasterRng::new(Some(19));
        let mut rng_2 = MasterRng::new(Some(19));

        assert_eq!(rng_1.seed(), 19);
        assert_eq!(
            (0..5).map(|_| rng_1.next_seed()).collect::<Vec<u64>>(),
            (0..5).map(|_| rng_2.next_seed()).collect::<Vec<u64>>()
        );

        let rng_3 = MasterRng::new(None);
        let rng_4 = MasterRng::new(Some(rng_3.seed()));

        assert_eq!(rng_3.rng, rng_4.rng);
    }

    #[test]
    fn test_sample_sphere() {
        let mut rng = GsRng::new(Some(1));

        for dim in 1..=3 {
            let sphere = rng.sample_sphere::<f64>(dim, 1000).unwrap();

            assert_eq!(sphere.shape(), (dim, 1000));

            sphere
                .column_iter()
                .for_each(|col| assert_relative_eq!(col.norm(), 1.0, epsilon = 1e-12));

            // Uniform samples on the sphere are centered at the origin.
            sphere
                .row_iter()
                .for_each(|row| assert!(row.mean().abs() < 0.1));
        }

        assert!(matches!(
            rng.sample_sphere::<f64>(4, 10),
            Err(RngError::InvalidDimension(4))
        ));
    }

    #[test]
    fn test_sample_dist() {
        let mut rng = GsRng::new(Some(2));

        // Standard exponential distribution.
        let samples = rng
            .sample_dist(|u: f64| Some(-(1.0 - u).ln()), 20_000)
            .unwrap();

        assert!((samples.mean() - 1.0).abs() < 0.03);
        assert!(samples.iter().all(|value| *value >= 0.0));

        assert!(matches!(
            rng.sample_dist(|_: f64| None, 10),
            Err(RngError::InvalidPpf(_))
        ));

        // Uniform samples stay below one in single precision.
        let uniform = rng.sample_dist(|u: f32| Some(u), 200_000).unwrap();

        assert!(uniform.iter().all(|u| (0.0..1.0).contains(u)));
        assert!(rng.sample_dist(|u: f32| Some(-(1.0 - u).ln()), 200_000).is_ok());
    }

    #[test]
    fn test_sample_ln_pdf() {
        let settings = McmcSettings::default();

        // Half-normal distribution with mean sqrt(2/π).
        let ln_pdf = |x: f64| {
            if x > 0.0 {
                -x * x / 2.0
            } else {
                f64::NEG_INFINITY
            }
        };

        let samples = GsRng::new(Some(3))
            .sample_ln_pdf(ln_pdf, 5000, 1.0, &settings)
            .unwrap();

        assert_eq!(samples.len(), 5000);
        assert!(samples.iter().all(|value| *value > 0.0));
        assert!((samples.mean() - (2.0 / std::f64::consts::PI).sqrt()).abs() < 0.05);

        assert_eq!(
            samples,
            GsRng::new(Some(3))
                .sample_ln_pdf(ln_pdf, 5000, 1.0, &settings)
                .unwrap()
        );

        assert_eq!(
            GsRng::new(Some(3))
                .sample_ln_pdf(ln_pdf, 0, 1.0, &settings)
                .unwrap()
                .len(),
            0
        );
    }

    #[test]
    fn test_mcmc_settings() {
        let settings = McmcSettingsBuilder::default().burn_in(5).build().unwrap();

        assert_eq!(settings.nwalkers, 50);
        assert_eq!(settings.burn_in, 5);

        assert!(matches!(
            McmcSettingsBuilder::default().nwalkers(1).build(),
            Err(RngError::InvalidSettings(_))
        ));

        let settings = serde_json5::from_str::<McmcSettings>(
            "{ nwalkers: 0, burn_in: 5, oversampling_factor: 2 }",
        )
        .unwrap();

        assert!(settings.validate().is_err());
        assert!(matches!(
            GsRng::new(Some(1)).sample_ln_pdf(|x: f64| -x * x, 10, 1.0, &settings),
            Err(RngError::InvalidSettings(_))
        ));

        let settings = McmcSettings {
            oversampling_factor: 0,
            ..McmcSettings::default()
        };

        assert!(settings.validate().is_err());
        assert!(McmcSettings::default().validate().is_ok());
    }
}
