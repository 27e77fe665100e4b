use crate::{fXX, random::RngError};
use rand::Rng;

/// An affine-invariant ensemble sampler for univariate densities (Goodman & Weare, 2010).
///
/// The walkers are split into two halves which are updated in turns using the "stretch move",
/// each walker is moved along the line through itself and a randomly chosen walker of the
/// complementary half.
pub struct EnsembleSampler<T, F> {
    /// Number of accepted proposals.
    accepted: usize,

    /// Recorded walker positions, one entry per walker and step.
    chain: Vec<T>,

    /// Logarithmic density function.
    ln_pdf: F,

    /// Logarithmic density at the current walker positions.
    ln_probs: Vec<T>,

    /// Current walker positions.
    positions: Vec<T>,

    /// Number of proposals.
    proposed: usize,

    /// Scale parameter `a` of the stretch move distribution.
    stretch_scale: T,
}

impl<T, F> EnsembleSampler<T, F>
where
    T: fXX,
    F: Fn(T) -> T,
{
    /// Create a new [`EnsembleSampler`] with the initial walker positions.
    pub fn new(ln_pdf: F, initial: Vec<T>) -> Result<Self, RngError> {
        if initial.len() < 2 {
            return Err(RngError::InvalidSettings(
                "the ensemble sampler requires at least two walkers".to_string(),
            ));
        }

        let ln_probs = initial.iter().map(|x| sanitize(ln_pdf(*x))).collect();

        Ok(Self {
            accepted: 0,
            chain: Vec::new(),
            ln_pdf,
            ln_probs,
            positions: initial,
            proposed: 0,
            stretch_scale: T::constant(2.0),
        })
    }

    /// Fraction of accepted proposals since the last reset.
    pub fn acceptance_fraction(&self) -> f64 {
        match self.proposed {
            0 => 0.0,
            _ => self.accepted as f64 / self.proposed as f64,
        }
    }

    /// Returns all recorded walker positions since the last reset.
    pub fn flatchain(&self) -> &[T] {
        &self.chain
    }

    /// Returns the current walker positions.
    pub fn positions(&self) -> &[T] {
        &self.positions
    }

    /// Clear the recorded chain and the acceptance statistics, the walker positions are kept.
    pub fn reset(&mut self) {
        self.accepted = 0;
        self.chain.clear();
        self.proposed = 0;
    }

    /// Advance all walkers by `steps` steps and record their positions.
    pub fn run(&mut self, steps: usize, rng: &mut impl Rng) {
        self.chain.reserve(steps * self.positions.len());

        for _ in 0..steps {
            self.step(rng);
            self.chain.extend_from_slice(&self.positions);
        }
    }

    fn step(&mut self, rng: &mut impl Rng) {
        let nwalkers = self.positions.len();
        let a = self.stretch_scale;

        for half in 0..2 {
            let complement = (0..nwalkers)
                .filter(|idx| idx % 2 != half)
                .collect::<Vec<usize>>();

            for k in (0..nwalkers).filter(|idx| idx % 2 == half) {
                let j = complement[rng.random_range(0..complement.len())];

                // z ~ g(z) ∝ 1/√z on [1/a, a].
                let z = ((a - T::one()) * T::constant(rng.random::<f64>()) + T::one()).powi(2) / a;

                let proposal = self.positions[j] + z * (self.positions[k] - self.positions[j]);
                let ln_prob = sanitize((self.ln_pdf)(proposal));

                let accept = if !ln_prob.is_finite() {
                    false
                } else if !self.ln_probs[k].is_finite() {
                    true
                } else {
                    // The (ndim - 1) · ln(z) term vanishes in one dimension.
                    T::constant(rng.random::<f64>()).ln() < ln_prob - self.ln_probs[k]
                };

                self.proposed += 1;

                if accept {
                    self.positions[k] = proposal;
                    self.ln_probs[k] = ln_prob;
                    self.accepted += 1;
                }
            }
        }
    }
}

/// Maps NaN to -∞.
fn sanitize<T>(value: T) -> T
where
    T: fXX,
{
    match value.partial_cmp(&T::zero()) {
        Some(_) => value,
        None => -T::one() / T::zero(),
    }
}
