//! Deterministic synthetic event generation for tests and the `sim`
//! harness (spec §4.6 item 12 / SPEC_FULL §2.12).
//!
//! Not part of the reference crate's tracking module itself, but grounded
//! on its sibling binary's generator (`godview_sim`'s scenario oracle):
//! a `rand_chacha::ChaCha8Rng` seeded from a single `u64` so a test can
//! reproduce an exact event byte-for-byte across runs. Needed here because
//! exercising the combinatorial builder end to end (scenarios S1-S6)
//! requires actual hits on actual layers, not just unit-level state
//! vectors.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::Config;
use crate::geometry::CylinderGeometry;
use crate::linalg::{Mat3, Mat6, Vec6};
use crate::propagate::propagate_with_b_field;
use crate::types::{Candidate, Hit, Track, TrackState};

/// The 10-layer, evenly spaced geometry used throughout the scenario
/// tests: first layer at r = 4, spacing 4, so layer `i` sits at `r = 4(i +
/// 1)`.
pub fn geometry_10_layers() -> CylinderGeometry {
    CylinderGeometry::evenly_spaced(10, 4.0, 4.0).expect("static geometry is always valid")
}

/// A [`Config`] tuned for the synthetic geometry above: seeds consume the
/// first three layers, `chi2_cut` loose enough to tolerate the measurement
/// noise this module injects.
pub fn default_config() -> Config {
    Config {
        n_layers: 10,
        nlayers_per_seed: 3,
        n_eta_part: 10,
        n_phi_part: 63,
        eta_det: 2.5,
        n_sigma: 3.0,
        min_dphi: 0.01,
        chi2_cut: 15.0,
        max_cand: 10,
        eta_seg: true,
        linear_interp: false,
        b_field: 0.0,
    }
}

const MEASUREMENT_SIGMA: f64 = 0.01;

/// A fully self-contained synthetic event: geometry, config, and the hits
/// on each layer (one `Vec<Hit>` per layer, truth hits interleaved with
/// noise and already in arbitrary order — exactly what a segment index is
/// for).
pub struct SyntheticEvent {
    pub geom: CylinderGeometry,
    pub config: Config,
    /// `hits[layer]` is that layer's hit list.
    pub hits: Vec<Vec<Hit>>,
    /// One seed candidate per generated truth track, already advanced
    /// through the first `nlayers_per_seed` layers.
    pub seeds: Vec<Candidate>,
}

/// Builds a state at `r = 0` with transverse momentum `pt`, azimuth `phi0`
/// and pseudorapidity `eta0`, then propagates it outward with `b_field = 0`
/// to seed a straight-line truth trajectory.
pub fn straight_track_state(pt: f64, phi0: f64, eta0: f64, charge: f64) -> TrackState {
    let theta = 2.0 * (-eta0).exp().atan();
    let pz = pt / theta.tan();
    let px = pt * phi0.cos();
    let py = pt * phi0.sin();
    TrackState::new(
        Vec6::new(0.0, 0.0, 0.0, px, py, pz),
        Mat6::identity() * 1e-8,
        charge,
    )
}

/// Generates `n_tracks` straight-line (b_field = 0) truth trajectories
/// through `geom`, each depositing one noisy hit per layer, plus
/// `n_noise_per_layer` extra random hits on every layer. Deterministic for
/// a given `seed`.
pub fn build_straight_line_event(
    seed: u64,
    n_tracks: usize,
    n_noise_per_layer: usize,
    config: &Config,
    geom: &CylinderGeometry,
) -> SyntheticEvent {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut hits: Vec<Vec<Hit>> = vec![Vec::new(); geom.n_layers()];
    let mut seeds = Vec::with_capacity(n_tracks);

    for track_idx in 0..n_tracks {
        let pt = rng.gen_range(0.8_f64..5.0);
        let phi0 = rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI);
        let eta0 = rng.gen_range(-1.5_f64..1.5);
        let charge = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };

        let truth = straight_track_state(pt, phi0, eta0, charge);
        let mut last_state = None;

        for layer in 0..geom.n_layers() {
            let r = geom.radius(layer).expect("layer within range");
            let propagated = propagate_with_b_field(&truth, r, config.b_field);
            if !propagated.valid {
                break;
            }
            let pos = propagated.position();
            let noisy = Hit::new(
                pos.x + rng.gen_range(-MEASUREMENT_SIGMA..MEASUREMENT_SIGMA),
                pos.y + rng.gen_range(-MEASUREMENT_SIGMA..MEASUREMENT_SIGMA),
                pos.z + rng.gen_range(-MEASUREMENT_SIGMA..MEASUREMENT_SIGMA),
                Mat3::identity() * MEASUREMENT_SIGMA * MEASUREMENT_SIGMA,
                hits[layer].len(),
            )
            .with_sim_track(uuid::Uuid::from_u128(track_idx as u128 + 1));
            hits[layer].push(noisy);

            if layer == config.nlayers_per_seed - 1 {
                last_state = Some(propagated.clone());
            }
        }

        if let Some(state) = last_state {
            let seed_hits = (0..config.nlayers_per_seed)
                .map(|layer| crate::types::TrackHit {
                    layer,
                    hit_index: hits[layer].len() - 1,
                    chi2: 0.0,
                })
                .collect();
            seeds.push(Candidate::new(
                Track::new_seed(track_idx as u64, Some(uuid::Uuid::from_u128(track_idx as u128 + 1)), seed_hits),
                state,
            ));
        }
    }

    for layer in 0..geom.n_layers() {
        let r = geom.radius(layer).expect("layer within range");
        for _ in 0..n_noise_per_layer {
            let phi = rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI);
            let z = rng.gen_range(-50.0_f64..50.0);
            let idx = hits[layer].len();
            hits[layer].push(Hit::new(
                r * phi.cos(),
                r * phi.sin(),
                z,
                Mat3::identity() * MEASUREMENT_SIGMA * MEASUREMENT_SIGMA,
                idx,
            ));
        }
    }

    SyntheticEvent {
        geom: geom.clone(),
        config: config.clone(),
        hits,
        seeds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_event_has_seeds_and_hits_on_every_layer() {
        let geom = geometry_10_layers();
        let config = default_config();
        let event = build_straight_line_event(42, 5, 3, &config, &geom);

        assert!(!event.seeds.is_empty());
        for layer_hits in &event.hits {
            assert!(!layer_hits.is_empty());
        }
    }

    #[test]
    fn same_seed_produces_identical_events() {
        let geom = geometry_10_layers();
        let config = default_config();
        let a = build_straight_line_event(7, 3, 2, &config, &geom);
        let b = build_straight_line_event(7, 3, 2, &config, &geom);

        assert_eq!(a.hits.len(), b.hits.len());
        for (la, lb) in a.hits.iter().zip(b.hits.iter()) {
            assert_eq!(la.len(), lb.len());
            for (ha, hb) in la.iter().zip(lb.iter()) {
                assert!((ha.x - hb.x).abs() < 1e-12);
                assert!((ha.y - hb.y).abs() < 1e-12);
            }
        }
    }
}
