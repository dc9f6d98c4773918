//! Chi-squared gating and Kalman update (spec §4.3 / §4.4).
//!
//! Follows the reference crate's `AugmentedStateFilter` update step
//! (`godview_core::godview_time`) in spirit: compute the innovation
//! covariance, invert it once, derive the gain from that inverse, and
//! symmetrize the posterior covariance explicitly rather than trusting
//! floating point to keep it that way. The reference additionally guards the
//! inversion with a Cholesky decomposition and self-heals on failure instead
//! of panicking; this module takes the same stance but surfaces the failure
//! as `f64::INFINITY` / an unchanged state rather than a silent repair,
//! since here a singular innovation covariance means "this hit is
//! incompatible", not "recover and continue".

use crate::linalg::{projection_matrix, symmetrize, Mat3, Vec3};
use crate::types::{Hit, TrackState};

/// Computes the chi-squared of `hit` against the predicted `state`, without
/// mutating either. Returns `f64::INFINITY` if the innovation covariance is
/// singular (never compatible, regardless of `chi2_cut`).
pub fn compute_chi2(state: &TrackState, hit: &Hit) -> f64 {
    if !state.valid {
        return f64::INFINITY;
    }
    let h = projection_matrix();
    let predicted = h * state.params;
    let residual: Vec3 = hit.measurement() - predicted;
    let s: Mat3 = h * state.cov * h.transpose() + hit.cov;

    match s.try_inverse() {
        Some(s_inv) => (residual.transpose() * s_inv * residual)[(0, 0)],
        None => f64::INFINITY,
    }
}

/// Produces the posterior state after incorporating `hit` into `state`.
/// Callers are expected to have already gated via [`compute_chi2`]; this
/// function performs the update unconditionally and returns an invalid
/// state only if the innovation covariance turns out to be singular (the
/// same condition [`compute_chi2`] reports as `f64::INFINITY`).
pub fn update_parameters(state: &TrackState, hit: &Hit) -> TrackState {
    if !state.valid {
        return TrackState::invalid();
    }
    let h = projection_matrix();
    let predicted = h * state.params;
    let residual: Vec3 = hit.measurement() - predicted;
    let s: Mat3 = h * state.cov * h.transpose() + hit.cov;

    let s_inv = match s.try_inverse() {
        Some(inv) => inv,
        None => return TrackState::invalid(),
    };

    let k = state.cov * h.transpose() * s_inv;
    let new_params = state.params + k * residual;

    let identity = crate::linalg::Mat6::identity();
    let ikh = identity - k * h;
    // Joseph form: numerically stable and guaranteed symmetric up to
    // floating point error even if K is not exactly the optimal gain.
    let mut new_cov = ikh * state.cov * ikh.transpose() + k * hit.cov * k.transpose();
    symmetrize(&mut new_cov);

    TrackState::new(new_params, new_cov, state.charge)
}
