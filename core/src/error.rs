//! Error types for the track-building core.
//!
//! Follows the same small-enum-per-subsystem shape as the reference
//! `TrackingError`/`AuthError` types: configuration problems are fatal at
//! construction time, invariant violations are fatal with a diagnostic, and
//! everything else (propagation failure, beam exhaustion) is a normal
//! operating mode handled inline by the builder, never surfaced as an error.

use thiserror::Error;

/// Errors detected while validating a [`crate::config::Config`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("chi2_cut must be strictly positive, got {0}")]
    NonPositiveChi2Cut(f64),

    #[error("max_cand must be nonzero")]
    ZeroMaxCand,

    #[error("n_phi_part must be nonzero")]
    ZeroPhiPartitions,

    #[error("n_eta_part must be nonzero")]
    ZeroEtaPartitions,

    #[error("eta_det must be strictly positive, got {0}")]
    NonPositiveEtaDet(f64),

    #[error("n_sigma must be strictly positive, got {0}")]
    NonPositiveNSigma(f64),

    #[error("min_dphi must be non-negative, got {0}")]
    NegativeMinDphi(f64),

    #[error("nlayers_per_seed ({nlayers_per_seed}) must be less than n_layers ({n_layers})")]
    SeedLayersExceedDetector {
        nlayers_per_seed: usize,
        n_layers: usize,
    },

    #[error("linear_interp is not thread-safe and cannot be combined with a parallel driver")]
    LinearInterpRequiresSerial,
}

/// Errors detected while constructing a [`crate::geometry::CylinderGeometry`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeometryError {
    #[error("geometry must have at least one layer")]
    Empty,

    #[error(
        "layer radii must be strictly increasing (layer {inner_layer} radius {inner_radius} \
         >= layer {outer_layer} radius {outer_radius})"
    )]
    RadiiNotIncreasing {
        inner_layer: usize,
        inner_radius: f64,
        outer_layer: usize,
        outer_radius: f64,
    },
}

/// Errors that can abort an event build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// A structural invariant was violated (out-of-range layer index, a
    /// segment map whose cell counts don't partition the layer's hits,
    /// etc). Never raised for ordinary build outcomes like propagation
    /// failure or beam exhaustion — those are handled inline.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
