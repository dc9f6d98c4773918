//! Execution strategies for building every seed's candidates to completion
//! (spec §4.6 / §5).
//!
//! Two parallel strategies, mirroring the reference builder's
//! `buildTracksBySeeds` (seed-parallel: each seed runs its whole layer loop
//! independently) and `buildTracksByLayers` (layer-then-seed: the layer loop
//! is the outer loop, and only the per-seed work within one layer runs
//! concurrently). Both are built on `rayon`'s global thread pool rather than
//! the reference's TBB `parallel_for`, following the pack's
//! (`prospectorengine-prospector-btc`) convention for CPU-bound fan-out
//! the teacher crate itself does not need.
//!
//! `linear_interp` in [`Config`] is incompatible with either parallel
//! strategy (spec §4.2): the interpolating propagator mutates shared
//! min/max bracket state across the candidate set, which concurrent access
//! from `run_seed_parallel`/`run_layer_then_seed` would race. This is
//! enforced once, in [`Builder::build_event`], via
//! `Config::validate_for_driver`, rather than re-checked on every
//! propagation call.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::builder::{process_layer, LayerData, LayerOutcome};
use crate::config::Config;
use crate::error::BuildError;
use crate::geometry::CylinderGeometry;
use crate::types::{Candidate, Track};
use crate::validation::{NullSink, ValidationSink};

/// Selects which of the three execution strategies `build_event` uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// One thread, one seed at a time, one layer at a time. The only
    /// strategy compatible with `linear_interp`.
    Serial,
    /// Each seed's full layer loop runs independently; requires the
    /// `parallel` feature.
    SeedParallel,
    /// The layer loop is outermost; within each layer, all live seeds'
    /// candidates extend concurrently. Requires the `parallel` feature.
    LayerThenSeed,
}

impl DriverKind {
    fn is_parallel(self) -> bool {
        !matches!(self, DriverKind::Serial)
    }
}

/// Owns the geometry, config and validation sink for one build run.
pub struct Builder<'a> {
    geom: &'a CylinderGeometry,
    config: &'a Config,
    sink: Arc<dyn ValidationSink>,
}

impl<'a> Builder<'a> {
    pub fn new(geom: &'a CylinderGeometry, config: &'a Config) -> Self {
        Self {
            geom,
            config,
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_sink(geom: &'a CylinderGeometry, config: &'a Config, sink: Arc<dyn ValidationSink>) -> Self {
        Self { geom, config, sink }
    }

    /// Builds every seed's track to completion, using `driver` as the
    /// execution strategy. `layers` has one entry per detector layer
    /// (indices `0..config.n_layers`); layers below `nlayers_per_seed` are
    /// never consulted since seeding already consumed them.
    pub fn build_event(
        &self,
        seeds: Vec<Candidate>,
        layers: &[LayerData],
        driver: DriverKind,
    ) -> Result<Vec<Track>, BuildError> {
        self.config.validate_for_driver(driver.is_parallel())?;
        if layers.len() != self.config.n_layers {
            return Err(BuildError::InvariantViolation(format!(
                "expected {} layers, got {}",
                self.config.n_layers,
                layers.len()
            )));
        }

        debug!(n_seeds = seeds.len(), driver = ?driver, "starting event build");

        let mut tracks = match driver {
            DriverKind::Serial => self.run_serial(seeds, layers),
            #[cfg(feature = "parallel")]
            DriverKind::SeedParallel => self.run_seed_parallel(seeds, layers),
            #[cfg(feature = "parallel")]
            DriverKind::LayerThenSeed => self.run_layer_then_seed(seeds, layers),
            #[cfg(not(feature = "parallel"))]
            DriverKind::SeedParallel | DriverKind::LayerThenSeed => {
                return Err(BuildError::InvariantViolation(
                    "parallel driver requested but the `parallel` feature is not enabled".into(),
                ));
            }
        };

        tracks.sort_unstable_by_key(|t| t.seed_id);
        debug!(n_tracks = tracks.len(), "event build complete");
        Ok(tracks)
    }

    fn run_serial(&self, seeds: Vec<Candidate>, layers: &[LayerData]) -> Vec<Track> {
        seeds
            .into_iter()
            .map(|seed| self.build_seed(seed, layers))
            .collect()
    }

    /// Extends one seed's candidate set through every remaining layer and
    /// returns the best-scoring surviving track. Retires (commits
    /// immediately and stops walking layers) the moment a layer exhausts
    /// the whole beam, per spec §4.5/§7 — a retired seed never re-enters
    /// `process_layer` for a later layer.
    fn build_seed(&self, seed: Candidate, layers: &[LayerData]) -> Track {
        let seed_id = seed.track.seed_id;
        let mut candidates = vec![seed];
        let mut retired: Option<Candidate> = None;

        for layer in self.config.nlayers_per_seed..self.config.n_layers {
            trace!(seed_id, layer, n_live = candidates.len(), "extending layer");
            match process_layer(candidates, layer, self.geom, &layers[layer], self.config, self.sink.as_ref()) {
                LayerOutcome::Active(next) => candidates = next,
                LayerOutcome::Retired(best) => {
                    debug!(seed_id, layer, "seed retired on beam exhaustion");
                    retired = Some(best);
                    break;
                }
            }
        }

        let best = match retired {
            Some(best) => best,
            None => candidates
                .into_iter()
                .min_by(crate::builder::better)
                .expect("process_layer never empties an actively-building seed's beam"),
        };
        trace!(seed_id, n_hits = best.track.n_hits(), chi2 = best.track.chi2, "seed build complete");
        self.sink
            .record_seed_complete(seed_id, 1, Some(best.track.chi2));
        best.track
    }
}

#[cfg(feature = "parallel")]
impl<'a> Builder<'a> {
    fn run_seed_parallel(&self, seeds: Vec<Candidate>, layers: &[LayerData]) -> Vec<Track> {
        use rayon::prelude::*;
        seeds
            .into_par_iter()
            .map(|seed| self.build_seed(seed, layers))
            .collect()
    }

    /// Layer-then-seed: the outer loop walks layers serially (each layer
    /// depends on the previous one's surviving candidates), and within a
    /// layer every still-active seed's candidate set extends concurrently.
    /// A seed that retires mid-run (beam exhaustion) is committed and
    /// skipped in every subsequent layer's parallel pass, same as the
    /// serial driver.
    fn run_layer_then_seed(&self, seeds: Vec<Candidate>, layers: &[LayerData]) -> Vec<Track> {
        use rayon::prelude::*;

        let mut pools: Vec<(u64, Pool)> = seeds
            .into_iter()
            .map(|s| (s.track.seed_id, Pool::Active(vec![s])))
            .collect();

        for layer in self.config.nlayers_per_seed..self.config.n_layers {
            pools = pools
                .into_par_iter()
                .map(|(seed_id, pool)| {
                    let pool = match pool {
                        Pool::Done(track) => Pool::Done(track),
                        Pool::Active(candidates) => {
                            match process_layer(candidates, layer, self.geom, &layers[layer], self.config, self.sink.as_ref()) {
                                LayerOutcome::Active(next) => Pool::Active(next),
                                LayerOutcome::Retired(best) => Pool::Done(best.track),
                            }
                        }
                    };
                    (seed_id, pool)
                })
                .collect();
        }

        pools
            .into_iter()
            .map(|(seed_id, pool)| {
                let track = match pool {
                    Pool::Done(track) => track,
                    Pool::Active(candidates) => {
                        candidates
                            .into_iter()
                            .min_by(crate::builder::better)
                            .expect("process_layer never empties an actively-building seed's beam")
                            .track
                    }
                };
                self.sink.record_seed_complete(seed_id, 1, Some(track.chi2));
                track
            })
            .collect()
    }
}

/// Per-seed state carried across the layer-then-seed driver's layer loop.
#[cfg(feature = "parallel")]
enum Pool {
    Active(Vec<Candidate>),
    Done(Track),
}
