use crate::fXX;

/// Lanczos approximation coefficients (g = 7, n = 9).
const LANCZOS_G: f64 = 7.0;

#[allow(clippy::excessive_precision)]
const LANCZOS_COEFFICIENTS: [f64; 9] = [
    0.99999999999980993,
    676.5203681218851,
    -1259.1392167224028,
    771.32342877765313,
    -176.61502916214059,
    12.507343278686905,
    -0.13857109526572012,
    9.9843695780195716e-6,
    1.5056327351493116e-7,
];

/// Error function.
///
/// Uses the Maclaurin series for small arguments and the Laplace continued fraction of the
/// complementary error function otherwise.
pub fn erf<T>(x: T) -> T
where
    T: fXX,
{
    if x.partial_cmp(&T::zero()).is_none() {
        return x;
    }

    if x < T::zero() {
        return -erf(-x);
    }

    if x < T::constant(2.5) {
        erf_series(x)
    } else {
        T::one() - erfc_fraction(x)
    }
}

/// Inverse error function.
///
/// Returns ±∞ for ±1 and NaN outside of [-1, 1].
pub fn erfinv<T>(y: T) -> T
where
    T: fXX,
{
    if y.partial_cmp(&T::zero()).is_none() || (y.abs() > T::one()) {
        return (-T::one()).sqrt();
    }

    if y.abs() == T::one() {
        return y / T::zero();
    }

    // Initial guess (Giles, 2010), refined with Newton iterations.
    let w = -((T::one() - y) * (T::one() + y)).ln();

    let p = if w < T::constant(5.0) {
        let w = w - T::constant(2.5);

        [
            3.43273939e-07,
            -3.5233877e-06,
            -4.39150654e-06,
            0.00021858087,
            -0.00125372503,
            -0.00417768164,
            0.246640727,
            1.50140941,
        ]
        .iter()
        .fold(T::constant(2.81022636e-08), |p, c| T::constant(*c) + p * w)
    } else {
        let w = w.sqrt() - T::constant(3.0);

        [
            0.000100950558,
            0.00134934322,
            -0.00367342844,
            0.00573950773,
            -0.0076224613,
            0.00943887047,
            1.00167406,
            2.83297682,
        ]
        .iter()
        .fold(T::constant(-0.000200214257), |p, c| T::constant(*c) + p * w)
    };

    let two_over_sqrt_pi = T::constant(2.0) / T::pi().sqrt();

    (0..3).fold(p * y, |x, _| {
        let slope = two_over_sqrt_pi * (-x * x).exp();

        if slope > T::zero() {
            x - (erf(x) - y) / slope
        } else {
            x
        }
    })
}

/// Gamma function using the Lanczos approximation.
pub fn gamma<T>(x: T) -> T
where
    T: fXX,
{
    if x < T::constant(0.5) {
        // Reflection formula.
        T::pi() / ((T::pi() * x).sin() * gamma(T::one() - x))
    } else {
        let x = x - T::one();
        let t = x + T::constant(LANCZOS_G + 0.5);

        let a = LANCZOS_COEFFICIENTS
            .iter()
            .enumerate()
            .skip(1)
            .fold(T::constant(LANCZOS_COEFFICIENTS[0]), |acc, (idx, c)| {
                acc + T::constant(*c) / (x + T::constant(idx as f64))
            });

        T::two_pi().sqrt() * t.powf(x + T::constant(0.5)) * (-t).exp() * a
    }
}

fn erf_series<T>(x: T) -> T
where
    T: fXX,
{
    let x2 = x * x;

    let mut term = x;
    let mut sum = x;

    for n in 1..128 {
        term *= -x2 / T::constant(n as f64);

        let next = term / T::constant((2 * n + 1) as f64);
        sum += next;

        if next.abs() <= T::constant(f64::EPSILON) * sum.abs() {
            break;
        }
    }

    T::constant(2.0) / T::pi().sqrt() * sum
}

fn erfc_fraction<T>(x: T) -> T
where
    T: fXX,
{
    let t = (1..=64)
        .rev()
        .fold(x, |t, n| x + T::constant(n as f64 / 2.0) / t);

    (-x * x).exp() / (T::pi().sqrt() * t)
}
