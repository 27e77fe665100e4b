//! # Empirical variogram estimation.
//!
//! The empirical (semi-)variogram of a field `z` is estimated with the Matheron estimator
//!
//! `γ(r) = 1 / (2 N(r)) · Σ (z(xᵢ) − z(xⱼ))²`
//!
//! where the sum runs over all `N(r)` point pairs whose distance falls into the distance bin
//! around `r`.
//!
//! Two estimators are provided:
//! - [`estimate_unstructured`] bins all point pairs of arbitrary positions by distance.
//! - [`estimate_structured`] computes the variogram along one axis of a structured [`Field`] for
//!   every lag (in index units).

use crate::{
    fXX,
    field::{Field, FieldError, MeshType},
    random::GsRng,
};
use log::debug;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

/// Errors associated with variogram estimation.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum VariogramError {
    #[error("invalid field")]
    Field(#[from] FieldError),
    #[error("invalid axis {axis} for a field with {dims} dimensions")]
    InvalidAxis { axis: usize, dims: usize },
    #[error("invalid bin edges: {0}")]
    InvalidBins(String),
    #[error("variogram estimation requires a structured field")]
    InvalidMeshType,
    #[error("found {positions} positions but {values} field values")]
    LengthMismatch { positions: usize, values: usize },
}

/// Random subsampling of the field points before the variogram is estimated.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Sampling {
    /// Number of sampled points, all points are used if this exceeds the number of points.
    pub size: usize,

    /// Seed for the point selection, a random seed is used if `None`.
    pub seed: Option<u64>,
}

/// An empirical variogram.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct EmpiricalVariogram<T>
where
    T: fXX,
{
    bin_centers: DVector<T>,
    counts: Vec<usize>,
    gamma: DVector<T>,
}

impl<T> EmpiricalVariogram<T>
where
    T: fXX,
{
    /// Returns the bin centers (or lags for structured estimates).
    pub fn bin_centers(&self) -> &DVector<T> {
        &self.bin_centers
    }

    /// Returns the number of point pairs per bin.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Returns the estimated semi-variance per bin.
    pub fn gamma(&self) -> &DVector<T> {
        &self.gamma
    }

    /// Returns the number of bins.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` if the variogram has no bins.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    fn from_sums(bin_centers: DVector<T>, sums: Vec<(T, usize)>) -> Self {
        let gamma = DVector::from_iterator(
            sums.len(),
            sums.iter().map(|(sum, count)| match count {
                0 => T::zero(),
                _ => *sum / T::constant(2.0 * *count as f64),
            }),
        );

        Self {
            bin_centers,
            counts: sums.into_iter().map(|(_, count)| count).collect(),
            gamma,
        }
    }
}

/// Estimate the empirical variogram of a field given at arbitrary positions.
///
/// The positions have one row per dimension and one column per point. A pair of points
/// contributes to bin `b` if `bin_edges[b] ≤ |xᵢ − xⱼ| < bin_edges[b + 1]`, bins without any
/// pairs have a semi-variance and count of zero.
pub fn estimate_unstructured<T>(
    pos: &DMatrix<T>,
    values: &DVector<T>,
    bin_edges: &[T],
    sampling: Option<Sampling>,
) -> Result<EmpiricalVariogram<T>, VariogramError>
where
    T: fXX,
{
    if pos.ncols() != values.len() {
        return Err(VariogramError::LengthMismatch {
            positions: pos.ncols(),
            values: values.len(),
        });
    }

    if bin_edges.len() < 2 {
        return Err(VariogramError::InvalidBins(
            "at least two bin edges are required".to_string(),
        ));
    }

    if bin_edges.windows(2).any(|edges| edges[0] >= edges[1]) {
        return Err(VariogramError::InvalidBins(
            "bin edges must be strictly increasing".to_string(),
        ));
    }

    let start = Instant::now();

    let indices = match sampling {
        Some(sampling) if sampling.size < values.len() => {
            let mut rng = GsRng::new(sampling.seed).random();

            let mut indices =
                rand::seq::index::sample(&mut rng, values.len(), sampling.size).into_vec();
            indices.sort_unstable();

            indices
        }
        _ => (0..values.len()).collect(),
    };

    let bin_count = bin_edges.len() - 1;

    let sums = (0..indices.len())
        .into_par_iter()
        .fold(
            || vec![(T::zero(), 0_usize); bin_count],
            |mut acc, i| {
                let (col_i, z_i) = (pos.column(indices[i]), values[indices[i]]);

                indices.iter().skip(i + 1).for_each(|&j| {
                    let distance = (pos.column(j) - col_i).norm();
                    let edge = bin_edges.partition_point(|edge| *edge <= distance);

                    if (1..=bin_count).contains(&edge) {
                        let diff = values[j] - z_i;

                        acc[edge - 1].0 += diff * diff;
                        acc[edge - 1].1 += 1;
                    }
                });

                acc
            },
        )
        .reduce(
            || vec![(T::zero(), 0_usize); bin_count],
            |mut acc, other| {
                acc.iter_mut()
                    .zip(other)
                    .for_each(|(bin, (sum, count))| {
                        bin.0 += sum;
                        bin.1 += count;
                    });

                acc
            },
        );

    let bin_centers = DVector::from_iterator(
        bin_count,
        bin_edges
            .windows(2)
            .map(|edges| (edges[0] + edges[1]) / T::constant(2.0)),
    );

    debug!(
        "estimate_unstructured: {} points, {} bins in {:.3} sec",
        indices.len(),
        bin_count,
        start.elapsed().as_millis() as f64 / 1e3
    );

    Ok(EmpiricalVariogram::from_sums(bin_centers, sums))
}

/// Estimate the empirical variogram along one axis of a structured field.
///
/// The result contains one bin per lag `h = 0 .. shape[axis] − 1` in index units.
pub fn estimate_structured<T>(
    field: &Field<T>,
    axis: usize,
) -> Result<EmpiricalVariogram<T>, VariogramError>
where
    T: fXX,
{
    if field.mesh_type() != MeshType::Structured {
        return Err(VariogramError::InvalidMeshType);
    }

    field.check_shape()?;

    let shape = field.shape();

    if axis >= shape.len() {
        return Err(VariogramError::InvalidAxis {
            axis,
            dims: shape.len(),
        });
    }

    let length = shape[axis];
    let stride = shape[(axis + 1)..].iter().product::<usize>();

    let sums = (0..length)
        .into_par_iter()
        .map(|lag| {
            (0..field.len())
                .filter(|idx| (idx / stride) % length + lag < length)
                .fold((T::zero(), 0_usize), |(sum, count), idx| {
                    let diff = field[idx + lag * stride] - field[idx];

                    (sum + diff * diff, count + 1)
                })
        })
        .collect::<Vec<(T, usize)>>();

    let lags = DVector::from_iterator(length, (0..length).map(|lag| T::constant(lag as f64)));

    Ok(EmpiricalVariogram::from_sums(lags, sums))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        covmodel::{CovModel, CovParamsBuilder, Gaussian},
        field::{RandMethSettingsBuilder, Srf, SrfSettingsBuilder},
    };
    use approx::assert_relative_eq;

    #[test]
    fn test_estimate_unstructured() {
        let pos = DMatrix::from_row_slice(1, 3, &[0.0, 1.0, 2.0]);
        let values = DVector::from_column_slice(&[0.0, 1.0, 3.0]);

        let vario = estimate_unstructured(&pos, &values, &[0.5, 1.5, 2.5, 3.5], None).unwrap();

        assert_eq!(vario.len(), 3);
        assert_eq!(vario.counts(), &[2, 1, 0]);
        assert_eq!(vario.bin_centers().as_slice(), &[1.0, 2.0, 3.0]);
        assert_relative_eq!(vario.gamma()[0], 1.25);
        assert_relative_eq!(vario.gamma()[1], 4.5);
        assert_eq!(vario.gamma()[2], 0.0);

        // Subsampling with more points than available uses all points.
        let sampled = estimate_unstructured(
            &pos,
            &values,
            &[0.5, 1.5, 2.5, 3.5],
            Some(Sampling {
                size: 10,
                seed: Some(1),
            }),
        )
        .unwrap();

        assert_eq!(sampled, vario);

        let sampled = estimate_unstructured(
            &pos,
            &values,
            &[0.5, 1.5, 2.5, 3.5],
            Some(Sampling {
                size: 2,
                seed: Some(1),
            }),
        )
        .unwrap();

        assert_eq!(sampled.counts().iter().sum::<usize>(), 1);

        assert!(matches!(
            estimate_unstructured(&pos, &values, &[1.0], None),
            Err(VariogramError::InvalidBins(_))
        ));
        assert!(matches!(
            estimate_unstructured(&pos, &values, &[1.0, 1.0], None),
            Err(VariogramError::InvalidBins(_))
        ));
        assert!(matches!(
            estimate_unstructured(&pos, &values.rows(0, 2).into_owned(), &[0.0, 1.0], None),
            Err(VariogramError::LengthMismatch {
                positions: 3,
                values: 2
            })
        ));
    }

    #[test]
    fn test_estimate_structured() {
        let field = Field::new_structured(
            DVector::from_iterator(6, (0..6).map(|idx| idx as f64)),
            vec![2, 3],
        )
        .unwrap();

        let vario = estimate_structured(&field, 1).unwrap();

        assert_eq!(vario.counts(), &[6, 4, 2]);
        assert_eq!(vario.gamma().as_slice(), &[0.0, 0.5, 2.0]);

        let vario = estimate_structured(&field, 0).unwrap();

        assert_eq!(vario.counts(), &[6, 3]);
        assert_eq!(vario.gamma().as_slice(), &[0.0, 4.5]);

        assert!(matches!(
            estimate_structured(&field, 2),
            Err(VariogramError::InvalidAxis { axis: 2, dims: 2 })
        ));
        assert!(matches!(
            estimate_structured(&Field::new_unstructured(DVector::<f64>::zeros(3)), 0),
            Err(VariogramError::InvalidMeshType)
        ));
    }

    #[test]
    fn test_estimate_structured_shape_mismatch() {
        let mut field =
            Field::new_structured(DVector::from_column_slice(&[1.0, 2.0, 4.0]), vec![1, 3])
                .unwrap();

        // Values and shape no longer agree after resizing through the mutable deref.
        field.resize_vertically_mut(2, 0.0);

        assert!(matches!(
            estimate_structured(&field, 1),
            Err(VariogramError::Field(FieldError::FieldShape { values: 2, .. }))
        ));
    }

    #[test]
    fn test_generated_field_variogram() {
        let model = Gaussian::new(
            CovParamsBuilder::default()
                .dim(1)
                .var(1.0)
                .len_scale(10.0)
                .build()
                .unwrap(),
        );

        let settings = SrfSettingsBuilder::default()
            .randmeth(
                RandMethSettingsBuilder::default()
                    .mode_no(1000)
                    .seed(20170519)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        let mut srf = Srf::new(model.clone(), &settings).unwrap();

        let axis = DVector::from_iterator(5000, (0..5000).map(|idx| idx as f64));
        let field = srf.structured(&[axis.clone()]).unwrap();

        let vario = estimate_structured(field, 0).unwrap();

        for lag in [2, 5, 10, 20] {
            assert!((vario.gamma()[lag] - model.variogram(lag as f64)).abs() < 0.15);
        }

        let pos = DMatrix::from_row_slice(1, 5000, axis.as_slice());
        let edges = (0..=15).map(|idx| idx as f64 * 2.0).collect::<Vec<f64>>();

        let vario = estimate_unstructured(
            &pos,
            field.values(),
            &edges,
            Some(Sampling {
                size: 1500,
                seed: Some(3),
            }),
        )
        .unwrap();

        assert!(vario.counts().iter().all(|count| *count > 0));
        assert!((vario.gamma()[4] - model.variogram(vario.bin_centers()[4])).abs() < 0.2);
        assert!(vario.gamma()[14] > vario.gamma()[0]);
    }
}
