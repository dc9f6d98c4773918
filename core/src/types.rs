//! The hit / track-state / track data model (spec §3).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::linalg::{Mat3, Mat6, Vec3, Vec6};

/// An immutable hit measurement on a single layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// 3x3 position covariance of the measurement.
    pub cov: Mat3,
    /// Index of this hit within its layer's *original* (unsorted) hit list.
    /// Kept for provenance; the segment index operates on positions within
    /// the sorted permutation, not this field.
    pub index_in_layer: usize,
    /// Id of the originating simulated track, for validation only — never
    /// read by the build algorithm itself.
    pub sim_track_id: Option<Uuid>,
}

impl Hit {
    pub fn new(x: f64, y: f64, z: f64, cov: Mat3, index_in_layer: usize) -> Self {
        Self {
            x,
            y,
            z,
            cov,
            index_in_layer,
            sim_track_id: None,
        }
    }

    pub fn with_sim_track(mut self, id: Uuid) -> Self {
        self.sim_track_id = Some(id);
        self
    }

    pub fn measurement(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn r(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn phi(&self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Pseudorapidity `-ln(tan(theta/2))` with `theta = atan2(r, z)`.
    pub fn eta(&self) -> f64 {
        let theta = self.r().atan2(self.z);
        -((theta * 0.5).tan().ln())
    }
}

/// A 6D track state: position + momentum, covariance, and a validity flag.
///
/// Invalid states are inert: propagation that fails to intersect the target
/// cylinder produces one, and the builder never attempts an update or spawns
/// a downstream candidate from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackState {
    /// `(x, y, z, px, py, pz)`.
    pub params: Vec6,
    pub cov: Mat6,
    pub valid: bool,
    /// Signed charge, needed by the helical propagator. Not part of the
    /// spec's 6D parameter vector, but every state needs one to know which
    /// way its trajectory curves.
    pub charge: f64,
}

impl TrackState {
    pub fn new(params: Vec6, cov: Mat6, charge: f64) -> Self {
        Self {
            params,
            cov,
            valid: true,
            charge,
        }
    }

    pub fn invalid() -> Self {
        Self {
            params: Vec6::zeros(),
            cov: Mat6::zeros(),
            valid: false,
            charge: 0.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.params[0], self.params[1], self.params[2])
    }

    pub fn momentum(&self) -> Vec3 {
        Vec3::new(self.params[3], self.params[4], self.params[5])
    }

    pub fn pt(&self) -> f64 {
        (self.params[3] * self.params[3] + self.params[4] * self.params[4]).sqrt()
    }
}

/// One accepted (or missed) hit on a committed or in-progress track.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrackHit {
    pub layer: usize,
    pub hit_index: usize,
    pub chi2: f64,
}

/// An ordered sequence of hits plus bookkeeping identity.
///
/// Invariants: `hits` is strictly increasing in `layer`; `hits.len() <=
/// n_layers`; `chi2` is the sum of per-hit chi-squared and is monotone
/// non-decreasing as hits are appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub seed_id: u64,
    pub sim_id: Option<Uuid>,
    pub hits: Vec<TrackHit>,
    pub chi2: f64,
}

impl Track {
    pub fn new_seed(seed_id: u64, sim_id: Option<Uuid>, seed_hits: Vec<TrackHit>) -> Self {
        let chi2 = seed_hits.iter().map(|h| h.chi2).sum();
        Self {
            seed_id,
            sim_id,
            hits: seed_hits,
            chi2,
        }
    }

    pub fn n_hits(&self) -> usize {
        self.hits.len()
    }

    /// Appends a hit. Debug-asserts the strictly-increasing-layer invariant;
    /// production builds trust the caller (the builder only ever calls this
    /// with the current build layer, which is itself monotone).
    pub fn add_hit(&mut self, layer: usize, hit_index: usize, chi2: f64) {
        debug_assert!(
            self.hits.last().map_or(true, |h| h.layer < layer),
            "hit layers must be strictly increasing"
        );
        self.hits.push(TrackHit {
            layer,
            hit_index,
            chi2,
        });
        self.chi2 += chi2;
    }
}

/// A `(Track, TrackState)` pair currently being extended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub track: Track,
    pub state: TrackState,
}

impl Candidate {
    pub fn new(track: Track, state: TrackState) -> Self {
        Self { track, state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_derived_quantities_match_straight_radial_hit() {
        let hit = Hit::new(3.0, 4.0, 0.0, Mat3::identity(), 0);
        assert!((hit.r() - 5.0).abs() < 1e-12);
        assert!((hit.phi() - 4f64.atan2(3.0)).abs() < 1e-12);
    }

    #[test]
    fn track_chi2_accumulates() {
        let mut t = Track::new_seed(0, None, vec![]);
        t.add_hit(3, 0, 1.0);
        t.add_hit(4, 1, 2.5);
        assert_eq!(t.n_hits(), 2);
        assert!((t.chi2 - 3.5).abs() < 1e-12);
    }
}
