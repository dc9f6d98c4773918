//! Combinatorial Kalman track building for a cylindrical layered silicon
//! tracker.
//!
//! Given a detector geometry, per-layer hits, and a set of seed
//! trajectories, this crate extends each seed outward layer by layer:
//! propagate the current state to the next layer, gather candidate hits in
//! an eta-phi window, gate each by chi-squared, and keep the best-scoring
//! branches. Three execution strategies are available — fully serial, one
//! thread per seed, or one thread per seed but synchronized layer by layer
//! — selected at build time via [`driver::DriverKind`].

pub mod builder;
pub mod config;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod kalman;
pub mod linalg;
pub mod propagate;
pub mod segment_index;
pub mod synthetic;
pub mod types;
pub mod validation;

pub use builder::{better, extend_candidate, process_layer, LayerData, LayerOutcome};
pub use config::Config;
pub use driver::{Builder, DriverKind};
pub use error::{BuildError, ConfigError, GeometryError};
pub use geometry::CylinderGeometry;
pub use kalman::{compute_chi2, update_parameters};
pub use propagate::{propagate_helix_to_layer, propagate_helix_to_r, propagate_with_b_field};
pub use types::{Candidate, Hit, Track, TrackHit, TrackState};
pub use validation::{BranchRecord, NullSink, ValidationReport, ValidationSession, ValidationSink};
