use crate::fXX;
use nalgebra::{DMatrix, Rotation3};

/// Returns the rotation matrix for a set of rotation angles.
///
/// - 1D: identity.
/// - 2D: counter-clockwise rotation by `angles[0]`.
/// - 3D: intrinsic rotation `Rz(angles[0]) · Ry(angles[1]) · Rx(angles[2])`.
///
/// Missing angles are treated as zero.
pub fn rotation_matrix<T>(dim: usize, angles: &[T]) -> DMatrix<T>
where
    T: fXX,
{
    let angle = |idx: usize| angles.get(idx).copied().unwrap_or(T::zero());

    match dim {
        2 => {
            let (sin, cos) = (angle(0).sin(), angle(0).cos());

            DMatrix::from_row_slice(2, 2, &[cos, -sin, sin, cos])
        }
        3 => {
            let rotation = Rotation3::from_euler_angles(angle(2), angle(1), angle(0));

            DMatrix::from_iterator(3, 3, rotation.matrix().iter().copied())
        }
        _ => DMatrix::identity(dim, dim),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_rotation_matrix() {
        let rot = rotation_matrix(2, &[FRAC_PI_2]);
        let vec = &rot * DVector::from_column_slice(&[1.0, 0.0]);

        assert_relative_eq!(vec, DVector::from_column_slice(&[0.0, 1.0]), epsilon = 1e-12);

        let rot = rotation_matrix(3, &[FRAC_PI_2, 0.0, 0.0]);
        let vec = &rot * DVector::from_column_slice(&[1.0, 0.0, 0.0]);

        assert_relative_eq!(
            vec,
            DVector::from_column_slice(&[0.0, 1.0, 0.0]),
            epsilon = 1e-12
        );

        let rot = rotation_matrix(3, &[0.3, -0.7, 1.1]);

        assert_relative_eq!(
            rot.transpose() * &rot,
            DMatrix::<f64>::identity(3, 3),
            epsilon = 1e-12
        );
        assert_relative_eq!(rotation_matrix::<f64>(1, &[]), DMatrix::identity(1, 1));
    }
}
