use crate::{
    covmodel::CovModel,
    fXX,
    field::{Field, FieldError, RandMeth, RandMethSettings, mesh_positions},
};
use derive_builder::Builder;
use log::debug;
use nalgebra::{DMatrix, DVector};
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Instant};

/// Settings for a spatial random field.
#[derive(Builder, Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(bound = "")]
#[builder(build_fn(error = "FieldError"))]
#[serde(default)]
pub struct SrfSettings<T>
where
    T: fXX,
{
    /// Mean value of the field.
    #[builder(default = T::zero())]
    pub mean: T,

    /// Settings of the underlying randomization method.
    #[builder(default)]
    pub randmeth: RandMethSettings,
}

impl<T> SrfSettings<T>
where
    T: fXX,
{
    /// Load settings from a JSON5 file.
    pub fn load<P>(path: P) -> Result<Self, FieldError>
    where
        P: AsRef<Path>,
    {
        let content = std::fs::read_to_string(path)?;

        Ok(serde_json5::from_str(&content)?)
    }
}

impl<T> Default for SrfSettings<T>
where
    T: fXX,
{
    fn default() -> Self {
        Self {
            mean: T::zero(),
            randmeth: RandMethSettings::default(),
        }
    }
}

/// A Gaussian spatial random field.
///
/// The field is generated in the isotropic frame of the covariance model, i.e. positions are
/// rotated and stretched according to the anisotropy of the model before they are passed to the
/// [`RandMeth`] generator.
#[derive(Clone, Debug)]
pub struct Srf<T, M>
where
    T: fXX,
    M: CovModel<T>,
{
    field: Option<Field<T>>,
    generator: RandMeth<T, M>,
    mean: T,
}

impl<T, M> Srf<T, M>
where
    T: fXX,
    M: CovModel<T>,
    StandardNormal: Distribution<T>,
{
    /// Returns the last generated field.
    pub fn field(&self) -> Option<&Field<T>> {
        self.field.as_ref()
    }

    /// Returns a reference to the underlying generator.
    pub fn generator(&self) -> &RandMeth<T, M> {
        &self.generator
    }

    /// Returns a mutable reference to the underlying generator.
    pub fn generator_mut(&mut self) -> &mut RandMeth<T, M> {
        &mut self.generator
    }

    /// Returns the mean value of the field.
    pub fn mean(&self) -> T {
        self.mean
    }

    /// Returns a reference to the covariance model.
    pub fn model(&self) -> &M {
        self.generator.model()
    }

    /// Create a new [`Srf`].
    pub fn new(model: M, settings: &SrfSettings<T>) -> Result<Self, FieldError> {
        Ok(Self {
            field: None,
            generator: RandMeth::new(model, &settings.randmeth)?,
            mean: settings.mean,
        })
    }

    /// Redraw the random modes with a new seed, a random seed is used if `None` is given.
    pub fn reseed(&mut self, seed: Option<u64>) -> Result<(), FieldError> {
        self.generator.reset_seed(seed)
    }

    /// Set a new mean value, this does not affect an already generated field.
    pub fn set_mean(&mut self, mean: T) {
        self.mean = mean;
    }

    /// Generate the field on a structured mesh given by one axis vector per dimension.
    pub fn structured(&mut self, axes: &[DVector<T>]) -> Result<&Field<T>, FieldError> {
        if axes.len() != self.generator.dim() {
            return Err(FieldError::MeshAxes {
                expected: self.generator.dim(),
                found: axes.len(),
            });
        }

        let start = Instant::now();

        let shape = axes.iter().map(|axis| axis.len()).collect::<Vec<usize>>();
        let values = self.evaluate(&mesh_positions(axes))?;

        debug!(
            "srf_structured: {:?} mesh in {:.2} sec",
            shape,
            start.elapsed().as_millis() as f64 / 1e3
        );

        Ok(self.field.insert(Field::new_structured(values, shape)?))
    }

    /// Generate the field at the given positions (one row per dimension, one column per point).
    pub fn unstructured(&mut self, pos: &DMatrix<T>) -> Result<&Field<T>, FieldError> {
        let start = Instant::now();

        let values = self.evaluate(pos)?;

        debug!(
            "srf_unstructured: {} points in {:.2} sec",
            pos.ncols(),
            start.elapsed().as_millis() as f64 / 1e3
        );

        Ok(self.field.insert(Field::new_unstructured(values)))
    }

    fn evaluate(&mut self, pos: &DMatrix<T>) -> Result<DVector<T>, FieldError> {
        let iso = self.generator.model().isometrize(pos)?;

        let mut values = self.generator.generate(&iso)?;
        values.add_scalar_mut(self.mean);

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        covmodel::{CovModelKind, CovParamsBuilder, Exponential, Gaussian},
        field::MeshType,
        random::RngError,
    };
    use approx::assert_relative_eq;

    fn settings(mean: f64, seed: u64) -> SrfSettings<f64> {
        SrfSettingsBuilder::default()
            .mean(mean)
            .randmeth(
                crate::field::RandMethSettingsBuilder::default()
                    .mode_no(256)
                    .seed(seed)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_srf_structured() {
        let model = Gaussian::new(
            CovParamsBuilder::default()
                .dim(2)
                .var(2.0)
                .len_scale(5.0)
                .build()
                .unwrap(),
        );

        let mut srf = Srf::new(model, &settings(10.0, 19)).unwrap();

        let x = DVector::from_iterator(30, (0..30).map(|idx| idx as f64));
        let y = DVector::from_iterator(20, (0..20).map(|idx| idx as f64 * 0.5));

        let field = srf.structured(&[x.clone(), y.clone()]).unwrap().clone();

        assert_eq!(field.shape(), &[30, 20]);
        assert_eq!(field.mesh_type(), MeshType::Structured);

        // Structured and unstructured evaluation agree.
        let pos = DMatrix::from_column_slice(2, 2, &[x[3], y[7], x[29], y[0]]);
        let points = srf.unstructured(&pos).unwrap();

        assert_relative_eq!(points[0], field.get(&[3, 7]).unwrap(), epsilon = 1e-10);
        assert_relative_eq!(points[1], field.get(&[29, 0]).unwrap(), epsilon = 1e-10);

        assert!((field.sample_mean() - 10.0).abs() < 2.0);
        assert_eq!(srf.field().unwrap().mesh_type(), MeshType::Unstructured);

        assert!(matches!(
            srf.structured(&[x]),
            Err(FieldError::MeshAxes {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_srf_anisotropy() {
        let params = CovParamsBuilder::default()
            .dim(2)
            .len_scale(4.0)
            .anis(vec![0.5])
            .angles(vec![std::f64::consts::FRAC_PI_2])
            .build()
            .unwrap();

        let anisotropic = Exponential::new(params);
        let isotropic = Exponential::new(
            CovParamsBuilder::default()
                .dim(2)
                .len_scale(4.0)
                .build()
                .unwrap(),
        );

        let mut srf_aniso = Srf::new(anisotropic, &settings(0.0, 5)).unwrap();
        let mut srf_iso = Srf::new(isotropic, &settings(0.0, 5)).unwrap();

        // The main axis is rotated onto the y-axis and the x-axis is compressed by the ratio.
        let pos = DMatrix::from_column_slice(2, 1, &[1.0, 2.0]);
        let pos_iso = DMatrix::from_column_slice(2, 1, &[2.0, -2.0]);

        assert_relative_eq!(
            srf_aniso.unstructured(&pos).unwrap()[0],
            srf_iso.unstructured(&pos_iso).unwrap()[0],
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_srf_reseed() {
        let model: CovModelKind<f64> = Gaussian::new(
            CovParamsBuilder::default()
                .dim(1)
                .len_scale(2.0)
                .build()
                .unwrap(),
        )
        .into();

        let mut srf = Srf::new(model, &settings(0.0, 1)).unwrap();
        let axis = DVector::from_iterator(50, (0..50).map(|idx| idx as f64));

        let field_1 = srf.structured(&[axis.clone()]).unwrap().clone();

        srf.reseed(Some(2)).unwrap();

        let field_2 = srf.structured(&[axis.clone()]).unwrap().clone();

        srf.reseed(Some(1)).unwrap();
        srf.set_mean(1.0);

        let field_3 = srf.structured(&[axis]).unwrap().clone();

        assert_ne!(field_1, field_2);
        assert_relative_eq!(
            field_3.values(),
            &field_1.values().add_scalar(1.0),
            epsilon = 1e-12
        );
        assert_eq!(srf.generator().seed(), 1);
        assert_eq!(srf.model().name(), "Gaussian");
    }

    #[test]
    fn test_srf_settings_json5() {
        let path = std::env::temp_dir().join("gstools_test_srf_settings.json5");

        std::fs::write(
            &path,
            r#"{
                mean: 2.5,
                randmeth: { mode_no: 32, seed: 7, mcmc: { nwalkers: 20, burn_in: 10, oversampling_factor: 5 } },
            }"#,
        )
        .unwrap();

        let settings = SrfSettings::<f64>::load(&path).unwrap();

        assert_eq!(settings.mean, 2.5);
        assert_eq!(settings.randmeth.mode_no, 32);
        assert_eq!(settings.randmeth.mcmc.nwalkers, 20);

        std::fs::write(
            &path,
            "{ randmeth: { seed: 7, mcmc: { nwalkers: 0, burn_in: 10, oversampling_factor: 5 } } }",
        )
        .unwrap();

        let settings = SrfSettings::<f64>::load(&path).unwrap();
        let model = Gaussian::new(CovParamsBuilder::default().dim(3).build().unwrap());

        assert!(matches!(
            Srf::new(model, &settings),
            Err(FieldError::Rng(RngError::InvalidSettings(_)))
        ));

        std::fs::remove_file(&path).unwrap();

        assert!(SrfSettings::<f64>::load(&path).is_err());
    }
}
