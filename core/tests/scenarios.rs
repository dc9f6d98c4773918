//! End-to-end scenario tests over synthetic events, covering the
//! straight-line, curved-field, missed-layer, noise-robustness,
//! propagation-failure and candidate-pruning behaviors the builder commits
//! to.

use std::sync::Arc;

use trackbuild_core::builder::LayerData;
use trackbuild_core::config::Config;
use trackbuild_core::driver::{Builder, DriverKind};
use trackbuild_core::geometry::CylinderGeometry;
use trackbuild_core::propagate::propagate_with_b_field;
use trackbuild_core::segment_index::build_layer_index;
use trackbuild_core::synthetic::{build_straight_line_event, default_config, geometry_10_layers, straight_track_state};
use trackbuild_core::validation::ValidationSession;

fn layered(event_hits: &[Vec<trackbuild_core::Hit>], config: &Config) -> (Vec<trackbuild_core::segment_index::LayerHits>, ) {
    let indices = event_hits
        .iter()
        .map(|layer_hits| {
            let keys: Vec<(f64, f64)> = layer_hits.iter().map(|h| (h.eta(), h.phi())).collect();
            build_layer_index(&keys, config.effective_n_eta_part(), config.n_phi_part, config.eta_det)
        })
        .collect();
    (indices,)
}

fn layer_data<'a>(hits: &'a [Vec<trackbuild_core::Hit>], indices: &'a [trackbuild_core::segment_index::LayerHits]) -> Vec<LayerData<'a>> {
    hits.iter()
        .zip(indices.iter())
        .map(|(h, i)| LayerData { hits: h, index: i })
        .collect()
}

/// S1: a clean, noise-free set of straight-line tracks should each be
/// reconstructed with a hit on every layer and near-zero chi2.
#[test]
fn s1_straight_line_tracks_reconstruct_cleanly() {
    let geom = geometry_10_layers();
    let config = default_config();
    let event = build_straight_line_event(1, 10, 0, &config, &geom);
    let (indices,) = layered(&event.hits, &config);
    let layers = layer_data(&event.hits, &indices);

    let sink = Arc::new(ValidationSession::new());
    let builder = Builder::with_sink(&geom, &config, sink.clone());
    let tracks = builder
        .build_event(event.seeds, &layers, DriverKind::Serial)
        .expect("serial build always succeeds for a consistent config");

    assert!(!tracks.is_empty());
    for track in &tracks {
        assert_eq!(track.n_hits(), config.n_layers);
        assert!(track.chi2 < config.chi2_cut * config.n_layers as f64);
    }

    let report = sink.generate_report();
    assert!(report.passes_criteria(1.0, config.chi2_cut));
}

/// S2: with a nonzero field, a curved track should still reach every layer
/// and accumulate a bounded chi2, exercising the curved propagation path
/// instead of the straight-line one.
#[test]
fn s2_curved_track_under_nonzero_field_reconstructs() {
    let geom = geometry_10_layers();
    let mut config = default_config();
    config.b_field = 1.5;
    let event = build_straight_line_event(2, 6, 0, &config, &geom);
    let (indices,) = layered(&event.hits, &config);
    let layers = layer_data(&event.hits, &indices);

    let builder = Builder::new(&geom, &config);
    let tracks = builder
        .build_event(event.seeds, &layers, DriverKind::Serial)
        .expect("serial build always succeeds for a consistent config");

    assert!(!tracks.is_empty());
    for track in &tracks {
        assert!(track.n_hits() >= config.nlayers_per_seed);
    }
}

/// S3: deleting all hits on one layer for every track should still let
/// every candidate survive (as a missed-layer branch) and pick back up on
/// the following layer.
#[test]
fn s3_missing_layer_hits_are_bridged() {
    let geom = geometry_10_layers();
    let config = default_config();
    let mut event = build_straight_line_event(3, 5, 0, &config, &geom);
    let missing_layer = 5;
    event.hits[missing_layer].clear();
    let (indices,) = layered(&event.hits, &config);
    let layers = layer_data(&event.hits, &indices);

    let builder = Builder::new(&geom, &config);
    let tracks = builder
        .build_event(event.seeds, &layers, DriverKind::Serial)
        .expect("serial build always succeeds for a consistent config");

    for track in &tracks {
        assert!(track.n_hits() >= config.n_layers - 1);
        assert!(track.hits.iter().all(|h| h.layer != missing_layer));
    }
}

/// S4: heavy noise on every layer should not prevent reconstruction of the
/// truth tracks, though candidate counts may grow — this is exactly what
/// `max_cand` pruning exists to bound.
#[test]
fn s4_noisy_layers_still_yield_low_chi2_tracks() {
    let geom = geometry_10_layers();
    let config = default_config();
    let event = build_straight_line_event(4, 8, 40, &config, &geom);
    let (indices,) = layered(&event.hits, &config);
    let layers = layer_data(&event.hits, &indices);

    let builder = Builder::new(&geom, &config);
    let tracks = builder
        .build_event(event.seeds, &layers, DriverKind::Serial)
        .expect("serial build always succeeds for a consistent config");

    let best_chi2_per_hit: Vec<f64> = tracks
        .iter()
        .filter(|t| t.n_hits() > 0)
        .map(|t| t.chi2 / t.n_hits() as f64)
        .collect();
    assert!(!best_chi2_per_hit.is_empty());
    assert!(best_chi2_per_hit.iter().any(|&c| c < config.chi2_cut));
}

/// S5: a track whose transverse momentum collapses to zero never reaches a
/// larger radius; propagation must report this as an invalid state rather
/// than panicking or producing nonsense geometry.
#[test]
fn s5_vanishing_pt_propagation_is_reported_invalid() {
    let state = straight_track_state(1e-12, 0.0, 0.0, 1.0);
    let result = propagate_with_b_field(&state, 40.0, 0.0);
    assert!(!result.valid);
}

/// S6: shrinking `max_cand` to 1 should still deterministically keep the
/// single best-scoring candidate at every layer rather than dropping the
/// seed outright.
#[test]
fn s6_tight_max_cand_keeps_best_candidate_only() {
    let geom = geometry_10_layers();
    let mut config = default_config();
    config.max_cand = 1;
    let event = build_straight_line_event(6, 4, 10, &config, &geom);
    let (indices,) = layered(&event.hits, &config);
    let layers = layer_data(&event.hits, &indices);

    let builder = Builder::new(&geom, &config);
    let tracks = builder
        .build_event(event.seeds, &layers, DriverKind::Serial)
        .expect("serial build always succeeds for a consistent config");

    assert_eq!(tracks.len(), event_seed_count(&geom, &config, 6, 4, 10));
}

fn event_seed_count(
    geom: &CylinderGeometry,
    config: &Config,
    seed: u64,
    n_tracks: usize,
    n_noise: usize,
) -> usize {
    build_straight_line_event(seed, n_tracks, n_noise, config, geom)
        .seeds
        .len()
}

/// The two parallel drivers should produce the same set of seed ids (and
/// the same best-track hit counts) as the serial driver, since each seed's
/// candidate pool is independent of every other seed's.
#[test]
#[cfg(feature = "parallel")]
fn parallel_drivers_agree_with_serial_on_hit_counts() {
    let geom = geometry_10_layers();
    let config = default_config();
    let event = build_straight_line_event(9, 12, 5, &config, &geom);
    let (indices,) = layered(&event.hits, &config);
    let layers = layer_data(&event.hits, &indices);

    let builder = Builder::new(&geom, &config);
    let serial = builder
        .build_event(event.seeds.clone(), &layers, DriverKind::Serial)
        .unwrap();

    let seed_parallel = builder
        .build_event(event.seeds.clone(), &layers, DriverKind::SeedParallel)
        .unwrap();
    let layer_then_seed = builder
        .build_event(event.seeds, &layers, DriverKind::LayerThenSeed)
        .unwrap();

    let serial_counts: Vec<usize> = serial.iter().map(|t| t.n_hits()).collect();
    let seed_parallel_counts: Vec<usize> = seed_parallel.iter().map(|t| t.n_hits()).collect();
    let layer_then_seed_counts: Vec<usize> = layer_then_seed.iter().map(|t| t.n_hits()).collect();

    assert_eq!(serial_counts, seed_parallel_counts);
    assert_eq!(serial_counts, layer_then_seed_counts);
}
