//! Small fixed-size linear algebra used by propagation and the Kalman
//! update: 3- and 6-vectors, 3x3/6x6 symmetric covariance blocks, and the
//! 3x6/6x3 projections between them.
//!
//! The reference crate (`godview_core::godview_tracking`,
//! `godview_core::godview_time`) already reaches for `nalgebra`'s statically
//! sized aliases for exactly this purpose (`Matrix6<f64>`, `Vector6<f64>`,
//! `Matrix3<f64>`); this module just names the aliases this crate uses so
//! call sites read in terms of the domain (`Mat6`, `StateVec`) rather than
//! `nalgebra`'s generic names.

pub use nalgebra::{Matrix3, Matrix3x6, Matrix6, Matrix6x3, Vector3, Vector6};

/// Position vector / 3D measurement space.
pub type Vec3 = Vector3<f64>;
/// Full track state: `(x, y, z, px, py, pz)`.
pub type Vec6 = Vector6<f64>;
/// 3x3 position covariance (hit measurement noise).
pub type Mat3 = Matrix3<f64>;
/// 6x6 state covariance.
pub type Mat6 = Matrix6<f64>;
/// Projection from 6D state to 3D position space.
pub type Mat3x6 = Matrix3x6<f64>;
/// Transpose of [`Mat3x6`].
pub type Mat6x3 = Matrix6x3<f64>;

/// The fixed observation matrix projecting `(x, y, z, px, py, pz)` onto
/// `(x, y, z)`.
pub fn projection_matrix() -> Mat3x6 {
    let mut h = Mat3x6::zeros();
    h[(0, 0)] = 1.0;
    h[(1, 1)] = 1.0;
    h[(2, 2)] = 1.0;
    h
}

/// Symmetrizes a matrix in place: `m := (m + m^T) / 2`.
///
/// Used after the Kalman update, whose posterior covariance is symmetric
/// analytically but can drift slightly under floating point error.
pub fn symmetrize(m: &mut Mat6) {
    *m = (*m + m.transpose()) * 0.5;
}
