//! # Covariance models for spatial random fields.
//!
//! This module introduces the [`CovModel`] trait, which is shared by all covariance models. A
//! model is defined by its normalized [`correlation`](`CovModel::correlation`) function and the
//! matching [`spectral_density`](`CovModel::spectral_density`). The randomization method samples
//! wave numbers from the radial spectral density, either by inverse transform sampling (when the
//! model provides a closed form [`spectral_rad_ppf`](`CovModel::spectral_rad_ppf`)) or by Markov
//! chain Monte Carlo sampling of [`ln_spectral_rad_pdf`](`CovModel::ln_spectral_rad_pdf`).
//!
//! All shared parameters (dimension, variance, length scale, nugget and anisotropy) are stored in
//! [`CovParams`], which is created with the validating [`CovParamsBuilder`].
//!
//! Currently implemented models:
//! - [`Gaussian`] `ρ(h) = exp(-π/4 · h²)`
//! - [`Exponential`] `ρ(h) = exp(-h)`
//!
//! The [`CovModelKind`] ADT wraps all implemented models and is the type that should be used in
//! configuration files.

mod exponential;
mod gaussian;

pub use exponential::*;
pub use gaussian::*;

use crate::{fXX, math::rotation_matrix};
use derive_builder::{Builder, UninitializedFieldError};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use thiserror::Error;

/// Errors associated with covariance models.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum CovModelError {
    #[error("invalid model dimension {0}, must be 1, 2 or 3")]
    InvalidDimension(usize),
    #[error("invalid model parameter: {0}")]
    InvalidParameter(String),
    #[error("invalid position array shape: found {found} rows but expected {expected}")]
    PositionShape { expected: usize, found: usize },
    #[error("missing model parameter")]
    UninitializedField(#[from] UninitializedFieldError),
}

impl From<String> for CovModelError {
    fn from(msg: String) -> Self {
        CovModelError::InvalidParameter(msg)
    }
}

/// Number of rotation angles for a given dimension.
pub fn angle_count(dim: usize) -> usize {
    match dim {
        2 => 1,
        3 => 3,
        _ => 0,
    }
}

/// Parameters that are shared by all covariance models.
#[derive(Builder, Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(bound = "")]
#[builder(build_fn(validate = "Self::validate", error = "CovModelError"))]
pub struct CovParams<T>
where
    T: fXX,
{
    /// Spatial dimension of the model.
    #[builder(default = 3)]
    pub dim: usize,

    /// Variance of the model (without the nugget).
    #[builder(default = T::one())]
    pub var: T,

    /// Main length scale of the model.
    #[builder(default = T::one())]
    pub len_scale: T,

    /// Nugget of the model.
    #[builder(default = T::zero())]
    #[serde(default)]
    pub nugget: T,

    /// Anisotropy ratios of the minor axes w.r.t. the main axis (`dim - 1` values or empty).
    #[builder(default)]
    #[serde(default)]
    pub anis: Vec<T>,

    /// Rotation angles of the main axes (1 angle in 2D, 3 angles in 3D, or empty).
    #[builder(default)]
    #[serde(default)]
    pub angles: Vec<T>,
}

impl<T> CovParamsBuilder<T>
where
    T: fXX,
{
    fn validate(&self) -> Result<(), CovModelError> {
        let dim = self.dim.unwrap_or(3);

        if !(1..=3).contains(&dim) {
            return Err(CovModelError::InvalidDimension(dim));
        }

        if let Some(var) = self.var {
            if !(var > T::zero()) || !var.is_finite() {
                return Err(CovModelError::InvalidParameter(format!(
                    "var must be positive (var={})",
                    var
                )));
            }
        }

        if let Some(len_scale) = self.len_scale {
            if !(len_scale > T::zero()) || !len_scale.is_finite() {
                return Err(CovModelError::InvalidParameter(format!(
                    "len_scale must be positive (len_scale={})",
                    len_scale
                )));
            }
        }

        if let Some(nugget) = self.nugget {
            if !(nugget >= T::zero()) || !nugget.is_finite() {
                return Err(CovModelError::InvalidParameter(format!(
                    "nugget must be non-negative (nugget={})",
                    nugget
                )));
            }
        }

        if let Some(anis) = self.anis.as_ref() {
            if !anis.is_empty() && (anis.len() != dim - 1) {
                return Err(CovModelError::InvalidParameter(format!(
                    "expected {} anisotropy ratios but found {}",
                    dim - 1,
                    anis.len()
                )));
            }

            if anis.iter().any(|ratio| !(*ratio > T::zero())) {
                return Err(CovModelError::InvalidParameter(
                    "anisotropy ratios must be positive".to_string(),
                ));
            }
        }

        if let Some(angles) = self.angles.as_ref() {
            if !angles.is_empty() && (angles.len() != angle_count(dim)) {
                return Err(CovModelError::InvalidParameter(format!(
                    "expected {} rotation angles but found {}",
                    angle_count(dim),
                    angles.len()
                )));
            }
        }

        Ok(())
    }
}

impl<T> CovParams<T>
where
    T: fXX,
{
    /// Returns the anisotropy ratio of the `axis`-th minor axis (starting at 1), defaults to one.
    pub fn anis_ratio(&self, axis: usize) -> T {
        match axis {
            0 => T::one(),
            _ => self.anis.get(axis - 1).copied().unwrap_or(T::one()),
        }
    }

    /// Returns `true` if the model has no anisotropy and no rotation.
    pub fn is_isotropic(&self) -> bool {
        self.anis.iter().all(|ratio| *ratio == T::one())
            && self.angles.iter().all(|angle| *angle == T::zero())
    }
}

impl<T> Display for CovParams<T>
where
    T: fXX,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dim={}, var={}, len_scale={}, nugget={}",
            self.dim, self.var, self.len_scale, self.nugget
        )?;

        if !self.is_isotropic() {
            write!(f, ", anis={:?}, angles={:?}", self.anis, self.angles)?;
        }

        Ok(())
    }
}

/// A trait that is shared by all covariance models.
pub trait CovModel<T>: Clone + Debug + Display + PartialEq + Send + Sync
where
    T: fXX,
{
    /// Name of the covariance model.
    fn name(&self) -> &'static str;

    /// Returns a reference to the shared model parameters.
    fn params(&self) -> &CovParams<T>;

    /// Normalized correlation function for the normalized distance `h = r / len_scale`.
    fn correlation(&self, h: T) -> T;

    /// Spectral density of the covariance model for the wave number `k`.
    fn spectral_density(&self, k: T) -> T;

    /// Returns `true` if [`spectral_rad_ppf`](`CovModel::spectral_rad_ppf`) is available.
    fn has_ppf(&self) -> bool {
        false
    }

    /// Cumulative distribution function of the radial spectral density.
    fn spectral_rad_cdf(&self, _r: T) -> Option<T> {
        None
    }

    /// Percent point function (inverse cdf) of the radial spectral density.
    fn spectral_rad_ppf(&self, _u: T) -> Option<T> {
        None
    }

    /// Covariance function `C(r) = σ² · ρ(r / ℓ)`.
    fn covariance(&self, r: T) -> T {
        self.var() * self.correlation(r / self.len_scale())
    }

    /// Spatial dimension of the model.
    fn dim(&self) -> usize {
        self.params().dim
    }

    /// Transform positions into the isotropic frame of the model.
    ///
    /// The positions are rotated into the main axes of the model and each minor axis is then
    /// stretched by the reciprocal anisotropy ratio.
    fn isometrize(&self, pos: &DMatrix<T>) -> Result<DMatrix<T>, CovModelError> {
        let params = self.params();

        if pos.nrows() != params.dim {
            return Err(CovModelError::PositionShape {
                expected: params.dim,
                found: pos.nrows(),
            });
        }

        if params.is_isotropic() {
            return Ok(pos.clone());
        }

        let mut iso = rotation_matrix(params.dim, &params.angles).transpose() * pos;

        iso.row_iter_mut()
            .enumerate()
            .skip(1)
            .for_each(|(axis, mut row)| row /= params.anis_ratio(axis));

        Ok(iso)
    }

    /// Main length scale of the model.
    fn len_scale(&self) -> T {
        self.params().len_scale
    }

    /// Natural logarithm of the radial spectral density, -∞ for non-positive radii.
    fn ln_spectral_rad_pdf(&self, r: T) -> T {
        if r > T::zero() {
            let pdf = self.spectral_rad_pdf(r);

            if pdf > T::zero() {
                pdf.ln()
            } else {
                -T::one() / T::zero()
            }
        } else {
            -T::one() / T::zero()
        }
    }

    /// Nugget of the model.
    fn nugget(&self) -> T {
        self.params().nugget
    }

    /// Sill of the model `σ² + nugget`.
    fn sill(&self) -> T {
        self.var() + self.nugget()
    }

    /// Radial spectral density, i.e. the spectral density integrated over the shell of radius `r`.
    fn spectral_rad_pdf(&self, r: T) -> T {
        match self.dim() {
            1 => T::constant(2.0) * self.spectral_density(r),
            2 => T::two_pi() * r * self.spectral_density(r),
            _ => T::four_pi() * r * r * self.spectral_density(r),
        }
    }

    /// Variance of the model.
    fn var(&self) -> T {
        self.params().var
    }

    /// Semi-variogram `γ(r) = σ² - C(r) + nugget`.
    fn variogram(&self, r: T) -> T {
        self.var() - self.covariance(r) + self.nugget()
    }
}

/// An algebraic data type for all implemented covariance models.
#[allow(missing_docs)]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(bound = "")]
#[serde(tag = "type", content = "content")]
pub enum CovModelKind<T>
where
    T: fXX,
{
    Exponential(Exponential<T>),
    Gaussian(Gaussian<T>),
}

impl<T> CovModel<T> for CovModelKind<T>
where
    T: fXX,
{
    fn name(&self) -> &'static str {
        match self {
            CovModelKind::Exponential(model) => model.name(),
            CovModelKind::Gaussian(model) => model.name(),
        }
    }

    fn params(&self) -> &CovParams<T> {
        match self {
            CovModelKind::Exponential(model) => model.params(),
            CovModelKind::Gaussian(model) => model.params(),
        }
    }

    fn correlation(&self, h: T) -> T {
        match self {
            CovModelKind::Exponential(model) => model.correlation(h),
            CovModelKind::Gaussian(model) => model.correlation(h),
        }
    }

    fn spectral_density(&self, k: T) -> T {
        match self {
            CovModelKind::Exponential(model) => model.spectral_density(k),
            CovModelKind::Gaussian(model) => model.spectral_density(k),
        }
    }

    fn has_ppf(&self) -> bool {
        match self {
            CovModelKind::Exponential(model) => model.has_ppf(),
            CovModelKind::Gaussian(model) => model.has_ppf(),
        }
    }

    fn spectral_rad_cdf(&self, r: T) -> Option<T> {
        match self {
            CovModelKind::Exponential(model) => model.spectral_rad_cdf(r),
            CovModelKind::Gaussian(model) => model.spectral_rad_cdf(r),
        }
    }

    fn spectral_rad_ppf(&self, u: T) -> Option<T> {
        match self {
            CovModelKind::Exponential(model) => model.spectral_rad_ppf(u),
            CovModelKind::Gaussian(model) => model.spectral_rad_ppf(u),
        }
    }
}

impl<T> Display for CovModelKind<T>
where
    T: fXX,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CovModelKind::Exponential(model) => Display::fmt(model, f),
            CovModelKind::Gaussian(model) => Display::fmt(model, f),
        }
    }
}

impl<T> From<Exponential<T>> for CovModelKind<T>
where
    T: fXX,
{
    fn from(model: Exponential<T>) -> Self {
        CovModelKind::Exponential(model)
    }
}

impl<T> From<Gaussian<T>> for CovModelKind<T>
where
    T: fXX,
{
    fn from(model: Gaussian<T>) -> Self {
        CovModelKind::Gaussian(model)
    }
}
