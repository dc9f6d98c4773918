//! Build introspection — a sink the builder reports branching decisions to
//! as it runs, and a session that turns those reports into aggregate
//! histograms (spec §4.6, "Validation Sink").
//!
//! Modeled directly on the reference crate's `ValidationSession` /
//! `ValidationReport` pair (`godview_core::validation`): a `record_*` family
//! of methods fed incrementally during a run, a `generate_report()` that
//! freezes the accumulated counters, and a `print()` that renders them as a
//! fixed-width box-drawing table. The reference collects ground-truth vs.
//! detection error; this module collects the combinatorial build's own
//! per-layer branching behavior instead — counterpart to the C++
//! reference's `fillBuildHists` calls in `processCandidates`.

use std::collections::HashMap;
use std::sync::Mutex;

/// One layer's worth of branching outcome for one candidate, reported once
/// per `(seed, layer)` visited during a build.
#[derive(Debug, Clone, Copy)]
pub struct BranchRecord {
    pub seed_id: u64,
    pub layer: usize,
    /// Hits found inside the eta-phi search window before the chi2 cut.
    pub hits_in_window: usize,
    /// Of those, how many passed the chi2 cut and spawned a new candidate.
    pub hits_accepted: usize,
    /// Whether a missed-layer (no-hit) candidate was also kept.
    pub missed_layer_kept: bool,
    /// Chi-squared values of accepted hits, for the chi2 distribution.
    pub accepted_chi2: Vec<f64>,
}

/// Receives build introspection events. The builder holds one
/// `Arc<dyn ValidationSink>` for the whole run and calls it from every
/// candidate extension, so implementations must be `Send + Sync`.
pub trait ValidationSink: Send + Sync {
    fn record_branch(&self, record: BranchRecord);
    /// Called once a seed's candidates are finalized, with the number kept
    /// after the last layer's prune.
    fn record_seed_complete(&self, seed_id: u64, n_surviving: usize, best_chi2: Option<f64>);
}

/// A sink that discards everything. Used by callers that don't want
/// introspection overhead (the reference crate's equivalent is simply not
/// constructing a `ValidationSession`).
#[derive(Debug, Default)]
pub struct NullSink;

impl ValidationSink for NullSink {
    fn record_branch(&self, _record: BranchRecord) {}
    fn record_seed_complete(&self, _seed_id: u64, _n_surviving: usize, _best_chi2: Option<f64>) {}
}

/// Per-layer aggregate counters.
#[derive(Debug, Clone, Default)]
pub struct LayerHistogram {
    pub branches_visited: usize,
    pub hits_in_window_sum: usize,
    pub hits_accepted_sum: usize,
    pub missed_layer_count: usize,
    pub chi2_samples: Vec<f64>,
}

impl LayerHistogram {
    pub fn mean_hits_in_window(&self) -> f64 {
        if self.branches_visited > 0 {
            self.hits_in_window_sum as f64 / self.branches_visited as f64
        } else {
            0.0
        }
    }

    pub fn mean_chi2(&self) -> f64 {
        if self.chi2_samples.is_empty() {
            0.0
        } else {
            self.chi2_samples.iter().sum::<f64>() / self.chi2_samples.len() as f64
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Accumulator {
    per_layer: HashMap<usize, LayerHistogram>,
    seeds_completed: usize,
    total_surviving: usize,
    best_chi2_samples: Vec<f64>,
}

/// Collects [`BranchRecord`]s across a build run and turns them into a
/// [`ValidationReport`]. Interior mutability (a single `Mutex`) lets it be
/// shared behind an `Arc` across a parallel driver the same way the
/// builder's other shared state is.
#[derive(Debug, Default)]
pub struct ValidationSession {
    acc: Mutex<Accumulator>,
}

impl ValidationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_report(&self) -> ValidationReport {
        let acc = self.acc.lock().expect("validation session mutex poisoned");
        ValidationReport {
            per_layer: acc.per_layer.clone(),
            seeds_completed: acc.seeds_completed,
            total_surviving: acc.total_surviving,
            best_chi2_samples: acc.best_chi2_samples.clone(),
        }
    }
}

impl ValidationSink for ValidationSession {
    fn record_branch(&self, record: BranchRecord) {
        let mut acc = self.acc.lock().expect("validation session mutex poisoned");
        let hist = acc.per_layer.entry(record.layer).or_default();
        hist.branches_visited += 1;
        hist.hits_in_window_sum += record.hits_in_window;
        hist.hits_accepted_sum += record.hits_accepted;
        if record.missed_layer_kept {
            hist.missed_layer_count += 1;
        }
        hist.chi2_samples.extend(record.accepted_chi2);
    }

    fn record_seed_complete(&self, _seed_id: u64, n_surviving: usize, best_chi2: Option<f64>) {
        let mut acc = self.acc.lock().expect("validation session mutex poisoned");
        acc.seeds_completed += 1;
        acc.total_surviving += n_surviving;
        if let Some(chi2) = best_chi2 {
            acc.best_chi2_samples.push(chi2);
        }
    }
}

/// A frozen snapshot of a [`ValidationSession`]'s counters.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub per_layer: HashMap<usize, LayerHistogram>,
    pub seeds_completed: usize,
    pub total_surviving: usize,
    pub best_chi2_samples: Vec<f64>,
}

impl ValidationReport {
    pub fn mean_surviving_per_seed(&self) -> f64 {
        if self.seeds_completed > 0 {
            self.total_surviving as f64 / self.seeds_completed as f64
        } else {
            0.0
        }
    }

    pub fn mean_best_chi2(&self) -> f64 {
        if self.best_chi2_samples.is_empty() {
            0.0
        } else {
            self.best_chi2_samples.iter().sum::<f64>() / self.best_chi2_samples.len() as f64
        }
    }

    /// Renders the report as a fixed-width box-drawing table, in the same
    /// style as the reference crate's `ValidationReport::print`.
    pub fn print(&self) {
        println!();
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║                  TRACK BUILD VALIDATION REPORT                 ║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!(
            "║ Seeds Completed:       {:>10}                           ║",
            self.seeds_completed
        );
        println!(
            "║ Mean Surviving/Seed:   {:>10.2}                           ║",
            self.mean_surviving_per_seed()
        );
        println!(
            "║ Mean Best Chi2:        {:>10.3}                           ║",
            self.mean_best_chi2()
        );
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ PER-LAYER BRANCHING                                          ║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("  Layer   Branches   Mean Hits/Win   Accepted   Missed   MeanChi2");
        let mut layers: Vec<_> = self.per_layer.keys().copied().collect();
        layers.sort_unstable();
        for layer in layers {
            let h = &self.per_layer[&layer];
            println!(
                "  {:>5}   {:>8}   {:>13.2}   {:>8}   {:>6}   {:>8.3}",
                layer,
                h.branches_visited,
                h.mean_hits_in_window(),
                h.hits_accepted_sum,
                h.missed_layer_count,
                h.mean_chi2()
            );
        }
        println!("╚══════════════════════════════════════════════════════════════╝");
    }

    /// Whether the build behaved within acceptable bounds: every completed
    /// seed kept at least one candidate, on average, and candidates were
    /// not systematically failing the chi2 cut.
    pub fn passes_criteria(&self, min_mean_surviving: f64, max_mean_best_chi2: f64) -> bool {
        self.mean_surviving_per_seed() >= min_mean_surviving
            && (self.best_chi2_samples.is_empty() || self.mean_best_chi2() <= max_mean_best_chi2)
    }
}
