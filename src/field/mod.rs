//! # Spatial random field generation.
//!
//! The [`RandMeth`] generator implements the randomization method, which approximates a
//! Gaussian random field with a given covariance model by a finite sum of random Fourier modes:
//!
//! `u(x) = √(σ²/N) · Σᵢ [Z₁ᵢ · cos(⟨kᵢ, x⟩) + Z₂ᵢ · sin(⟨kᵢ, x⟩)]`
//!
//! where `N` is the number of Fourier modes, `Z₁ᵢ, Z₂ᵢ` are standard normal samples and the wave
//! vectors `kᵢ` are sampled from the spectral density of the covariance model.
//!
//! The [`Srf`] type wraps a generator and adds a mean value, the anisotropy and rotation of the
//! covariance model, and the evaluation on structured or unstructured meshes. Results are stored
//! in a [`Field`].

mod generator;
mod srf;

pub use generator::*;
pub use srf::*;

use crate::{covmodel::CovModelError, fXX, random::RngError};
use derive_builder::UninitializedFieldError;
use derive_more::{Deref, DerefMut};
use itertools::Itertools;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::{io::Write, path::Path};
use thiserror::Error;

/// Errors associated with field generation.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("covariance model error")]
    CovModel(#[from] CovModelError),
    #[error("field shape {shape:?} does not match {values} values")]
    FieldShape { shape: Vec<usize>, values: usize },
    #[error("failed to read or write field data")]
    Io(#[from] std::io::Error),
    #[error("invalid generator settings: {0}")]
    InvalidSettings(String),
    #[error("expected {expected} mesh axes but found {found}")]
    MeshAxes { expected: usize, found: usize },
    #[error("invalid position array shape: found {found} rows but expected {expected}")]
    PositionShape { expected: usize, found: usize },
    #[error("random number error")]
    Rng(#[from] RngError),
    #[error("failed to (de)serialize field data")]
    Serde(#[from] serde_json5::Error),
    #[error("missing generator setting")]
    UninitializedField(#[from] UninitializedFieldError),
}

/// Seed handling when the covariance model of a generator is updated.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum SeedPolicy {
    /// Keep the current seed.
    #[default]
    Keep,

    /// Draw a new seed from the system entropy.
    Random,

    /// Use a fixed seed.
    Fixed(u64),
}

/// The mesh type of a generated field.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum MeshType {
    Structured,
    Unstructured,
}

/// A generated spatial random field.
///
/// Structured fields are stored in row-major ("ij") order, i.e. the index of the last axis
/// varies the fastest.
#[derive(Clone, Debug, Deref, DerefMut, Deserialize, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct Field<T>
where
    T: fXX,
{
    mesh_type: MeshType,
    shape: Vec<usize>,
    #[deref]
    #[deref_mut]
    values: DVector<T>,
}

impl<T> Field<T>
where
    T: fXX,
{
    /// Returns the field value at a (multi-dimensional) index.
    pub fn get(&self, index: &[usize]) -> Option<T> {
        if (index.len() != self.shape.len())
            || index.iter().zip(self.shape.iter()).any(|(i, n)| i >= n)
        {
            return None;
        }

        let flat = index
            .iter()
            .zip(self.shape.iter())
            .fold(0, |acc, (i, n)| acc * n + i);

        self.values.get(flat).copied()
    }

    /// Load a field from a JSON5 file.
    pub fn load<P>(path: P) -> Result<Self, FieldError>
    where
        P: AsRef<Path>,
    {
        let content = std::fs::read_to_string(path)?;
        let field: Self = serde_json5::from_str(&content)?;

        field.check_shape()?;

        Ok(field)
    }

    /// Returns the mesh type of the field.
    pub fn mesh_type(&self) -> MeshType {
        self.mesh_type
    }

    /// Create a new structured [`Field`].
    pub fn new_structured(values: DVector<T>, shape: Vec<usize>) -> Result<Self, FieldError> {
        let field = Self {
            mesh_type: MeshType::Structured,
            shape,
            values,
        };

        field.check_shape()?;

        Ok(field)
    }

    /// Create a new unstructured [`Field`].
    pub fn new_unstructured(values: DVector<T>) -> Self {
        Self {
            mesh_type: MeshType::Unstructured,
            shape: vec![values.len()],
            values,
        }
    }

    /// Sample mean of the field values.
    pub fn sample_mean(&self) -> T {
        match self.values.len() {
            0 => T::zero(),
            _ => self.values.mean(),
        }
    }

    /// Sample variance (biased) of the field values.
    pub fn sample_variance(&self) -> T {
        match self.values.len() {
            0 => T::zero(),
            _ => self.values.variance(),
        }
    }

    /// Serialize the field to a JSON5 file.
    pub fn save<P>(&self, path: P) -> Result<(), FieldError>
    where
        P: AsRef<Path>,
    {
        let mut file = std::fs::File::create(path)?;

        file.write_all(serde_json5::to_string(&self)?.as_bytes())?;

        Ok(())
    }

    /// Returns the shape of the field.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns a reference to the field values.
    pub fn values(&self) -> &DVector<T> {
        &self.values
    }

    /// Check that the shape matches the number of values.
    pub fn check_shape(&self) -> Result<(), FieldError> {
        let invalid_dims =
            (self.mesh_type == MeshType::Unstructured) && (self.shape.len() != 1);

        if invalid_dims || (self.shape.iter().product::<usize>() != self.values.len()) {
            return Err(FieldError::FieldShape {
                shape: self.shape.clone(),
                values: self.values.len(),
            });
        }

        Ok(())
    }
}

/// Create the positions of a structured mesh from one axis vector per dimension.
///
/// The result has one row per axis and one column per mesh point, the last axis varies the
/// fastest.
pub fn mesh_positions<T>(axes: &[DVector<T>]) -> DMatrix<T>
where
    T: fXX,
{
    let count = axes.iter().map(|axis| axis.len()).product::<usize>();

    if axes.is_empty() || count == 0 {
        return DMatrix::zeros(axes.len(), 0);
    }

    DMatrix::from_iterator(
        axes.len(),
        count,
        axes.iter()
            .map(|axis| axis.as_slice().iter().copied())
            .multi_cartesian_product()
            .flatten(),
    )
}
