#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

pub mod covmodel;
pub mod field;
mod math;
pub mod random;
pub mod variogram;

use covmodel::CovModelError;
use field::FieldError;
use nalgebra::RealField;
use rand_distr::uniform::SampleUniform;
use random::RngError;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use thiserror::Error;
use variogram::VariogramError;

/// Generic container type for errors.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum GSToolsError {
    #[error("covariance model error")]
    CovModel(#[from] CovModelError),
    #[error("field error")]
    Field(#[from] FieldError),
    #[error("random number error")]
    Rng(#[from] RngError),
    #[error("variogram error")]
    Variogram(#[from] VariogramError),
}

/// A trait that describes a generic floating point numbers within the **gstools** crate. In
/// practical terms this trait is only used for the f32/f64 types.
#[allow(non_camel_case_types)]
pub trait fXX:
    'static
    + Copy
    + Debug
    + Default
    + Display
    + RealField
    + SampleUniform
    + Send
    + Sync
    + Serialize
    + for<'x> Deserialize<'x>
{
    /// Returns 4π.
    fn four_pi() -> Self {
        Self::two_pi() + Self::two_pi()
    }

    /// Converts a `f64` constant into `Self`.
    fn constant(value: f64) -> Self {
        nalgebra::convert::<f64, Self>(value)
    }

    /// Converts `self` into a `f64`.
    fn as_f64(&self) -> f64 {
        nalgebra::try_convert::<Self, f64>(*self).unwrap_or(f64::NAN)
    }
}

impl fXX for f32 {}
impl fXX for f64 {}
