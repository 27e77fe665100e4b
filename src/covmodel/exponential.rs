use crate::{
    covmodel::{CovModel, CovParams},
    fXX,
    math::gamma,
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The exponential covariance model.
///
/// `ρ(h) = exp(-h)`
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct Exponential<T>
where
    T: fXX,
{
    params: CovParams<T>,
}

impl<T> Exponential<T>
where
    T: fXX,
{
    /// Create a new [`Exponential`] model.
    pub fn new(params: CovParams<T>) -> Self {
        Self { params }
    }
}

impl<T> CovModel<T> for Exponential<T>
where
    T: fXX,
{
    fn name(&self) -> &'static str {
        "Exponential"
    }

    fn params(&self) -> &CovParams<T> {
        &self.params
    }

    fn correlation(&self, h: T) -> T {
        (-h).exp()
    }

    fn spectral_density(&self, k: T) -> T {
        let len_scale = self.len_scale();
        let exponent = T::constant((self.dim() + 1) as f64 / 2.0);

        gamma(exponent) / T::pi().powf(exponent) * len_scale.powi(self.dim() as i32)
            / (T::one() + (k * len_scale).powi(2)).powf(exponent)
    }

    fn has_ppf(&self) -> bool {
        self.dim() < 3
    }

    fn spectral_rad_cdf(&self, r: T) -> Option<T> {
        let x = r * self.len_scale();

        match self.dim() {
            1 => Some(x.atan() / T::frac_pi_2()),
            2 => Some(T::one() - T::one() / (T::one() + x * x).sqrt()),
            _ => Some((x.atan() - x / (T::one() + x * x)) / T::frac_pi_2()),
        }
    }

    fn spectral_rad_ppf(&self, u: T) -> Option<T> {
        let len_scale = self.len_scale();

        match self.dim() {
            1 => Some((T::frac_pi_2() * u).tan() / len_scale),
            2 => Some((T::one() / (T::one() - u).powi(2) - T::one()).sqrt() / len_scale),
            _ => None,
        }
    }
}

impl<T> Display for Exponential<T>
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

    fn exponential(dim: usize) -> Exponential<f64> {
        Exponential::new(
            CovParamsBuilder::default()
                .dim(dim)
                .len_scale(0.5)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_exponential_functions() {
        let model = exponential(3);

        assert_relative_eq!(model.correlation(0.0), 1.0);
        assert_relative_eq!(model.covariance(0.5), (-1.0f64).exp());
        assert_relative_eq!(model.variogram(0.0), 0.0);
        assert_relative_eq!(model.sill(), 1.0);
    }

    #[test]
    fn test_exponential_spectral() {
        for dim in 1..=3 {
            let model = exponential(dim);

            // Integrate up to a finite radius, the tails are heavy.
            let steps = 50_000;
            let upper = 10.0;
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
        }

        for dim in 1..=2 {
            let model = exponential(dim);

            for u in [0.05, 0.5, 0.95] {
                let r = model.spectral_rad_ppf(u).unwrap();

                assert_relative_eq!(model.spectral_rad_cdf(r).unwrap(), u, epsilon = 1e-12);
            }
        }

        assert!(!exponential(3).has_ppf());
        assert!(exponential(3).spectral_rad_ppf(0.5).is_none());
    }
}
