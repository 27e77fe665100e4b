//! Special functions and geometric helpers used by the covariance models.

mod rotation;
mod special;

pub use rotation::rotation_matrix;
pub use special::{erf, erfinv, gamma};
