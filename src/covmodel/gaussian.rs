use crate::{
    covmodel::{CovModel, CovParams},
    fXX,
    math::{erf, erfinv},
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The Gaussian covariance model.
///
/// `ρ(h) = exp(-π/4 · h²)`, where the length scale is the integral scale of the model.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct Gaussian<T>
where
    T: fXX,
{
    params: CovParams<T>,
}

impl<T> Gaussian<T>
where
    T: fXX,
{
    /// Create a new [`Gaussian`] model.
    pub fn new(params: CovParams<T>) -> Self {
        Self { params }
    }
}

impl<T> CovModel<T> for Gaussian<T>
where
    T: fXX,
{
    fn name(&self) -> &'static str {
        "Gaussian"
    }

    fn params(&self) -> &CovParams<T> {
        &self.params
    }

    fn correlation(&self, h: T) -> T {
        (-T::frac_pi_4() * h * h).exp()
    }

    fn spectral_density(&self, k: T) -> T {
        let len_scale = self.len_scale();

        (len_scale / T::pi()).powi(self.dim() as i32) * (-(k * len_scale).powi(2) / T::pi()).exp()
    }

    fn has_ppf(&self) -> bool {
        self.dim() < 3
    }

    fn spectral_rad_cdf(&self, r: T) -> Option<T> {
        let x = r * self.len_scale();

        match self.dim() {
            1 => Some(erf(x / T::pi().sqrt())),
            2 => Some(T::one() - (-x * x / T::pi()).exp()),
            _ => Some(
                erf(x / T::pi().sqrt())
                    - T::constant(2.0) * x / T::pi() * (-x * x / T::pi()).exp(),
            ),
        }
    }

    fn spectral_rad_ppf(&self, u: T) -> Option<T> {
        let factor = T::pi().sqrt() / self.len_scale();

        match self.dim() {
            1 => Some(factor * erfinv(u)),
            2 => Some(factor * (-(T::one() - u).ln()).sqrt()),
            _ => None,
        }
    }
}

impl<T> Display for Gaussian<T>
where
    T: fXX,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covmodel::CovParamsBuilder;
    use approx::assert_relative_eq;

    fn gaussian(dim: usize) -> Gaussian<f64> {
        Gaussian::new(
            CovParamsBuilder::default()
                .dim(dim)
                .var(2.0)
                .len_scale(3.0)
                .nugget(0.25)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_gaussian_functions() {
        let model = gaussian(2);

        assert_relative_eq!(model.correlation(0.0), 1.0);
        assert_relative_eq!(model.covariance(0.0), 2.0);
        assert_relative_eq!(model.variogram(0.0), 0.25);
        assert_relative_eq!(model.variogram(1e3), 2.25);
        assert_relative_eq!(
            model.covariance(3.0),
            2.0 * (-std::f64::consts::FRAC_PI_4).exp()
        );
        assert!(model.covariance(1.0) > model.covariance(2.0));
        assert_eq!(format!("{}", model), "Gaussian(dim=2, var=2, len_scale=3, nugget=0.25)");
    }

    #[test]
    fn test_gaussian_spectral() {
        for dim in 1..=3 {
            let model = gaussian(dim);

            // Trapezoidal integration of the radial density must match the cdf.
            let steps = 20_000;
            let upper = 2.0;
            let dr = upper / steps as f64;

            let integral = (0..steps).fold(0.0, |acc, idx| {
                let r_0 = idx as f64 * dr;

                acc + 0.5 * dr * (model.spectral_rad_pdf(r_0) + model.spectral_rad_pdf(r_0 + dr))
            });

            assert_relative_eq!(
                integral,
                model.spectral_rad_cdf(upper).unwrap(),
                epsilon = 1e-6
            );
            assert_relative_eq!(model.spectral_rad_cdf(1e3).unwrap(), 1.0, epsilon = 1e-12);
            assert_eq!(model.has_ppf(), dim < 3);
        }

        for dim in 1..=2 {
            let model = gaussian(dim);

            for u in [0.01, 0.3, 0.5, 0.9, 0.999] {
                let r = model.spectral_rad_ppf(u).unwrap();

                assert_relative_eq!(model.spectral_rad_cdf(r).unwrap(), u, epsilon = 1e-10);
            }
        }

        assert!(gaussian(3).spectral_rad_ppf(0.5).is_none());
        assert!(gaussian(3).ln_spectral_rad_pdf(0.0).is_infinite());
        assert!(gaussian(3).ln_spectral_rad_pdf(0.1).is_finite());
    }
}
