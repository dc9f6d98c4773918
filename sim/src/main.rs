//! Scenario harness CLI for `trackbuild_core`.
//!
//! Generates a synthetic event, runs the combinatorial builder against it
//! under a chosen driver, and prints a validation report. Follows the
//! reference crate's simulator CLI conventions: `clap::Parser` for
//! arguments, `tracing`/`tracing_subscriber` for structured logging rather
//! than ad hoc `println!` diagnostics.

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use trackbuild_core::builder::LayerData;
use trackbuild_core::driver::{Builder, DriverKind};
use trackbuild_core::synthetic::{build_straight_line_event, default_config, geometry_10_layers};
use trackbuild_core::validation::ValidationSession;
use trackbuild_core::segment_index::build_layer_index;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DriverArg {
    Serial,
    SeedParallel,
    LayerThenSeed,
}

impl From<DriverArg> for DriverKind {
    fn from(value: DriverArg) -> Self {
        match value {
            DriverArg::Serial => DriverKind::Serial,
            DriverArg::SeedParallel => DriverKind::SeedParallel,
            DriverArg::LayerThenSeed => DriverKind::LayerThenSeed,
        }
    }
}

/// Build synthetic tracking events and run the combinatorial builder
/// against them.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Random seed for the synthetic event generator.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Number of truth tracks to generate.
    #[arg(long, default_value_t = 20)]
    n_tracks: usize,

    /// Extra random noise hits per layer.
    #[arg(long, default_value_t = 30)]
    n_noise_per_layer: usize,

    /// Execution strategy.
    #[arg(long, value_enum, default_value_t = DriverArg::Serial)]
    driver: DriverArg,

    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to install tracing subscriber");

    info!(seed = args.seed, n_tracks = args.n_tracks, "generating synthetic event");

    let geom = geometry_10_layers();
    let config = default_config();
    let event = build_straight_line_event(args.seed, args.n_tracks, args.n_noise_per_layer, &config, &geom);

    let indices: Vec<_> = event
        .hits
        .iter()
        .map(|layer_hits| {
            let keys: Vec<(f64, f64)> = layer_hits.iter().map(|h| (h.eta(), h.phi())).collect();
            build_layer_index(&keys, config.effective_n_eta_part(), config.n_phi_part, config.eta_det)
        })
        .collect();

    let layers: Vec<LayerData> = event
        .hits
        .iter()
        .zip(indices.iter())
        .map(|(hits, index)| LayerData { hits, index })
        .collect();

    debug!(n_seeds = event.seeds.len(), "seeds ready, starting build");

    let sink = Arc::new(ValidationSession::new());
    let builder = Builder::with_sink(&geom, &config, sink.clone());
    let driver: DriverKind = args.driver.into();

    match builder.build_event(event.seeds, &layers, driver) {
        Ok(tracks) => {
            info!(n_tracks = tracks.len(), "build complete");
            sink.generate_report().print();
        }
        Err(err) => {
            tracing::error!(%err, "build failed");
            std::process::exit(1);
        }
    }
}
