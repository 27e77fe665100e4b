use crate::{
    covmodel::CovModel,
    fXX,
    field::{FieldError, SeedPolicy},
    random::{GsRng, McmcSettings},
};
use derive_builder::Builder;
use log::debug;
use nalgebra::{DMatrix, DVector};
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, time::Instant};

/// Settings for the [`RandMeth`] generator.
#[derive(Builder, Clone, Debug, Deserialize, PartialEq, Serialize)]
#[builder(build_fn(validate = "Self::validate", error = "FieldError"))]
#[serde(default)]
pub struct RandMethSettings {
    /// Number of points (number of coordinates · number of modes) that are handled by a single
    /// chunk while generating the field.
    #[builder(default = 10_000_000)]
    pub chunk_tmp_size: usize,

    /// Settings for the sampling of the radial spectral density, only used for models without a
    /// closed form percent point function.
    #[builder(default)]
    pub mcmc: McmcSettings,

    /// Number of Fourier modes.
    #[builder(default = 1000)]
    pub mode_no: usize,

    /// Seed of the random number generator, a random seed is used if `None`.
    #[builder(default = None, setter(strip_option))]
    pub seed: Option<u64>,
}

impl RandMethSettings {
    /// Check the settings, this is required for settings that were not created by the builder.
    pub fn validate(&self) -> Result<(), FieldError> {
        check_mode_no(self.mode_no)?;
        check_chunk_tmp_size(self.chunk_tmp_size)?;
        self.mcmc.validate()?;

        Ok(())
    }
}

impl RandMethSettingsBuilder {
    fn validate(&self) -> Result<(), FieldError> {
        if let Some(mode_no) = self.mode_no {
            check_mode_no(mode_no)?;
        }

        if let Some(chunk_tmp_size) = self.chunk_tmp_size {
            check_chunk_tmp_size(chunk_tmp_size)?;
        }

        if let Some(mcmc) = self.mcmc.as_ref() {
            mcmc.validate()?;
        }

        Ok(())
    }
}

fn check_chunk_tmp_size(chunk_tmp_size: usize) -> Result<(), FieldError> {
    if chunk_tmp_size == 0 {
        return Err(FieldError::InvalidSettings(
            "chunk_tmp_size must be positive".to_string(),
        ));
    }

    Ok(())
}

fn check_mode_no(mode_no: usize) -> Result<(), FieldError> {
    if mode_no == 0 {
        return Err(FieldError::InvalidSettings(
            "mode_no must be positive".to_string(),
        ));
    }

    Ok(())
}

impl Default for RandMethSettings {
    fn default() -> Self {
        Self {
            chunk_tmp_size: 10_000_000,
            mcmc: McmcSettings::default(),
            mode_no: 1000,
            seed: None,
        }
    }
}

/// The random Fourier modes of the randomization method.
#[derive(Clone, Debug)]
struct FourierModes<T>
where
    T: fXX,
{
    /// Wave vectors, one column per mode.
    cov_sample: DMatrix<T>,

    /// Random number generator state after drawing the modes.
    rng: GsRng,

    /// Cosine amplitudes.
    z_1: DVector<T>,

    /// Sine amplitudes.
    z_2: DVector<T>,
}

/// Randomization method for calculating isotropic spatial random fields.
///
/// The field is given by
///
/// `u(x) = √(σ²/N) · Σᵢ [Z₁ᵢ · cos(⟨kᵢ, x⟩) + Z₂ᵢ · sin(⟨kᵢ, x⟩)]`
///
/// with `N` Fourier modes, standard normal samples `Z₁ᵢ, Z₂ᵢ` and wave vectors `kᵢ` that are
/// sampled from the spectral density of the covariance model. A positive nugget adds uncorrelated
/// normal noise to every point.
///
/// ```
/// # use gstools::covmodel::{CovParamsBuilder, Gaussian};
/// # use gstools::field::{RandMeth, RandMethSettingsBuilder};
/// # use nalgebra::DMatrix;
/// let model = Gaussian::new(
///     CovParamsBuilder::<f64>::default()
///         .dim(2)
///         .len_scale(10.0)
///         .build()
///         .unwrap(),
/// );
///
/// let settings = RandMethSettingsBuilder::default()
///     .mode_no(100)
///     .seed(19)
///     .build()
///     .unwrap();
///
/// let mut generator = RandMeth::new(model, &settings).unwrap();
/// let field = generator
///     .generate(&DMatrix::from_column_slice(2, 3, &[0.0, 0.0, 1.0, 0.0, 2.0, 0.0]))
///     .unwrap();
///
/// assert_eq!(field.len(), 3);
/// ```
#[derive(Clone, Debug)]
pub struct RandMeth<T, M>
where
    T: fXX,
    M: CovModel<T>,
{
    chunk_tmp_size: usize,
    mcmc: McmcSettings,
    mode_no: usize,
    model: M,
    modes: FourierModes<T>,
}

impl<T, M> RandMeth<T, M>
where
    T: fXX,
    M: CovModel<T>,
    StandardNormal: Distribution<T>,
{
    /// Returns the chunk size (number of points · number of modes).
    pub fn chunk_tmp_size(&self) -> usize {
        self.chunk_tmp_size
    }

    /// Returns the number of chunks and the chunk length used for `points` positions.
    pub fn chunking(&self, points: usize) -> (usize, usize) {
        let tmp_pnt = points as f64 * self.mode_no as f64;
        let chunk_no_exp = (tmp_pnt / self.chunk_tmp_size as f64).log2().ceil().max(0.0) as u32;

        let chunk_no = 2_usize
            .checked_pow(chunk_no_exp)
            .unwrap_or(usize::MAX)
            .min(self.mode_no);
        let chunk_len = self.mode_no.div_ceil(chunk_no);

        (chunk_no, chunk_len)
    }

    /// Returns the sampled wave vectors (one column per mode).
    pub fn cov_sample(&self) -> &DMatrix<T> {
        &self.modes.cov_sample
    }

    /// The dimension of the spatial random field.
    pub fn dim(&self) -> usize {
        self.model.dim()
    }

    /// Evaluate the random field at the given positions (one row per dimension, one column per
    /// point).
    pub fn generate(&mut self, pos: &DMatrix<T>) -> Result<DVector<T>, FieldError> {
        if pos.nrows() != self.dim() {
            return Err(FieldError::PositionShape {
                expected: self.dim(),
                found: pos.nrows(),
            });
        }

        let start = Instant::now();
        let points = pos.ncols();

        let (chunk_no, chunk_len) = self.chunking(points);

        debug!(
            "RandMeth: generating field with {} chunks (chunk length {})",
            chunk_no, chunk_len
        );

        let mut summed_modes = vec![T::zero(); points];

        for chunk in 0..chunk_no {
            let ch_start = chunk * chunk_len;
            let ch_stop = ((chunk + 1) * chunk_len).min(self.mode_no);

            if ch_start >= ch_stop {
                break;
            }

            let k = self
                .modes
                .cov_sample
                .columns(ch_start, ch_stop - ch_start);
            let z_1 = self.modes.z_1.rows(ch_start, ch_stop - ch_start);
            let z_2 = self.modes.z_2.rows(ch_start, ch_stop - ch_start);

            pos.par_column_iter()
                .zip(summed_modes.par_iter_mut())
                .for_each(|(x, value)| {
                    *value += k
                        .column_iter()
                        .zip(z_1.iter().zip(z_2.iter()))
                        .fold(T::zero(), |acc, (k_i, (z_1_i, z_2_i))| {
                            let phase = k_i.dot(&x);

                            acc + *z_1_i * phase.cos() + *z_2_i * phase.sin()
                        });
                });
        }

        let mut field = DVector::from_vec(summed_modes)
            * (self.model.var() / T::constant(self.mode_no as f64)).sqrt();

        // Normal distributed values for the nugget simulation.
        if self.model.nugget() > T::zero() {
            field += self.modes.rng.normal::<T>(points) * self.model.nugget().sqrt();
        }

        debug!(
            "RandMeth: {:2.2}M mode evaluations in {:.2} sec",
            points as f64 * self.mode_no as f64 / 1e6,
            start.elapsed().as_millis() as f64 / 1e3
        );

        Ok(field)
    }

    /// Returns a reference to the covariance model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Returns the number of Fourier modes.
    pub fn mode_no(&self) -> usize {
        self.mode_no
    }

    /// Create a new [`RandMeth`] generator and draw the random modes.
    pub fn new(model: M, settings: &RandMethSettings) -> Result<Self, FieldError> {
        settings.validate()?;

        let modes = Self::draw_modes(&model, settings.mode_no, &settings.mcmc, settings.seed)?;

        Ok(Self {
            chunk_tmp_size: settings.chunk_tmp_size,
            mcmc: settings.mcmc.clone(),
            mode_no: settings.mode_no,
            model,
            modes,
        })
    }

    /// Reset the random amplitudes and wave vectors with a new seed, a random seed is used if
    /// `None` is given.
    pub fn reset_seed(&mut self, seed: Option<u64>) -> Result<(), FieldError> {
        self.modes = Self::draw_modes(&self.model, self.mode_no, &self.mcmc, seed)?;

        Ok(())
    }

    /// Returns the seed of the random number generator.
    pub fn seed(&self) -> u64 {
        self.modes.rng.seed()
    }

    /// Set the chunk size (number of points · number of modes).
    pub fn set_chunk_tmp_size(&mut self, chunk_tmp_size: usize) -> Result<(), FieldError> {
        check_chunk_tmp_size(chunk_tmp_size)?;

        self.chunk_tmp_size = chunk_tmp_size;

        Ok(())
    }

    /// Set a new covariance model and redraw the random modes with the current seed.
    pub fn set_model(&mut self, model: M) -> Result<(), FieldError> {
        self.update(model, SeedPolicy::Keep).map(|_| ())
    }

    /// Set a new number of modes and redraw the random modes with the current seed.
    pub fn set_mode_no(&mut self, mode_no: usize) -> Result<(), FieldError> {
        check_mode_no(mode_no)?;

        self.modes = Self::draw_modes(&self.model, mode_no, &self.mcmc, Some(self.seed()))?;
        self.mode_no = mode_no;

        Ok(())
    }

    /// Set a new seed, the random modes are only redrawn if the seed differs.
    ///
    /// `None` always draws a new random seed.
    pub fn set_seed(&mut self, seed: Option<u64>) -> Result<(), FieldError> {
        if seed == Some(self.seed()) {
            return Ok(());
        }

        self.reset_seed(seed)
    }

    /// Update the covariance model and the generated modes.
    ///
    /// The modes are only redrawn if the model differs or if the seed policy asks for a
    /// different seed. Returns `true` if the modes were redrawn.
    pub fn update(&mut self, model: M, seed: SeedPolicy) -> Result<bool, FieldError> {
        let new_seed = match seed {
            SeedPolicy::Keep => Some(self.seed()),
            SeedPolicy::Random => None,
            SeedPolicy::Fixed(value) => Some(value),
        };

        if (model == self.model) && (new_seed == Some(self.seed())) {
            return Ok(false);
        }

        self.modes = Self::draw_modes(&model, self.mode_no, &self.mcmc, new_seed)?;
        self.model = model;

        Ok(true)
    }

    /// Returns the cosine amplitudes.
    pub fn z_1(&self) -> &DVector<T> {
        &self.modes.z_1
    }

    /// Returns the sine amplitudes.
    pub fn z_2(&self) -> &DVector<T> {
        &self.modes.z_2
    }

    fn draw_modes(
        model: &M,
        mode_no: usize,
        mcmc: &McmcSettings,
        seed: Option<u64>,
    ) -> Result<FourierModes<T>, FieldError> {
        let start = Instant::now();

        let mut rng = GsRng::new(seed);

        // Normal distributed samples for the amplitudes.
        let z_1 = rng.normal::<T>(mode_no);
        let z_2 = rng.normal::<T>(mode_no);

        // Uniform samples on the sphere.
        let sphere = rng.sample_sphere::<T>(model.dim(), mode_no)?;

        // Radii according to the radial spectral density of the model.
        let rad = if model.has_ppf() {
            rng.sample_dist(|u| model.spectral_rad_ppf(u), mode_no)?
        } else {
            rng.sample_ln_pdf(
                |r| model.ln_spectral_rad_pdf(r),
                mode_no,
                T::one() / model.len_scale(),
                mcmc,
            )?
        };

        let mut cov_sample = sphere;

        cov_sample
            .column_iter_mut()
            .zip(rad.iter())
            .for_each(|(mut col, r)| col *= *r);

        debug!(
            "RandMeth: drew {} modes for {} (seed={}) in {:.3} sec",
            mode_no,
            model.name(),
            rng.seed(),
            start.elapsed().as_millis() as f64 / 1e3
        );

        Ok(FourierModes {
            cov_sample,
            rng,
            z_1,
            z_2,
        })
    }
}

impl<T, M> Display for RandMeth<T, M>
where
    T: fXX,
    M: CovModel<T>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RandMeth(model={}, mode_no={}, seed={})",
            self.model,
            self.mode_no,
            self.modes.rng.seed()
        )
    }
}
