//! Build-time configuration for the combinatorial track builder.
//!
//! Mirrors the reference crate's habit of a plain `Default`-able config
//! struct (see `TrackingConfig` in the reference `godview_tracking` module)
//! validated once up front rather than checked piecemeal on every call.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for one event's combinatorial build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Number of detector layers.
    pub n_layers: usize,
    /// Layers already consumed by the seed; building starts here.
    pub nlayers_per_seed: usize,
    /// Number of eta bins per layer in the segment index.
    pub n_eta_part: usize,
    /// Number of phi bins per layer in the segment index.
    pub n_phi_part: usize,
    /// |eta| detector extent; bins cover `[-eta_det, +eta_det]` uniformly.
    pub eta_det: f64,
    /// Multiplier on propagated angular uncertainties defining the search window.
    pub n_sigma: f64,
    /// Lower bound clamp on the phi half-window.
    pub min_dphi: f64,
    /// Maximum per-hit chi-squared to accept a hit.
    pub chi2_cut: f64,
    /// Maximum surviving candidates per seed after each layer.
    pub max_cand: usize,
    /// If false, the eta dimension collapses to a single bin and all eta
    /// math is skipped.
    pub eta_seg: bool,
    /// Selects the interpolating propagator. Mutually exclusive with a
    /// parallel driver (see [`Config::validate_for_driver`]).
    pub linear_interp: bool,
    /// Axial magnetic field in Tesla. Zero selects the straight-line
    /// propagation path; nonzero selects the curved-helix path.
    pub b_field: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            n_layers: 10,
            nlayers_per_seed: 3,
            n_eta_part: 10,
            n_phi_part: 63,
            eta_det: 2.0,
            n_sigma: 3.0,
            min_dphi: 0.01,
            chi2_cut: 15.0,
            max_cand: 10,
            eta_seg: true,
            linear_interp: false,
            b_field: 0.0,
        }
    }
}

impl Config {
    /// Checks internal consistency. Does not know about the driver that
    /// will be used; call [`Config::validate_for_driver`] for that.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.chi2_cut > 0.0) {
            return Err(ConfigError::NonPositiveChi2Cut(self.chi2_cut));
        }
        if self.max_cand == 0 {
            return Err(ConfigError::ZeroMaxCand);
        }
        if self.n_phi_part == 0 {
            return Err(ConfigError::ZeroPhiPartitions);
        }
        if self.n_eta_part == 0 {
            return Err(ConfigError::ZeroEtaPartitions);
        }
        if !(self.eta_det > 0.0) {
            return Err(ConfigError::NonPositiveEtaDet(self.eta_det));
        }
        if !(self.n_sigma > 0.0) {
            return Err(ConfigError::NonPositiveNSigma(self.n_sigma));
        }
        if self.min_dphi < 0.0 {
            return Err(ConfigError::NegativeMinDphi(self.min_dphi));
        }
        if self.nlayers_per_seed >= self.n_layers {
            return Err(ConfigError::SeedLayersExceedDetector {
                nlayers_per_seed: self.nlayers_per_seed,
                n_layers: self.n_layers,
            });
        }
        Ok(())
    }

    /// Checks the combination of this config with the intended driver.
    /// `parallel` is true for either parallel strategy.
    pub fn validate_for_driver(&self, parallel: bool) -> Result<(), ConfigError> {
        self.validate()?;
        if self.linear_interp && parallel {
            return Err(ConfigError::LinearInterpRequiresSerial);
        }
        Ok(())
    }

    /// Effective number of eta bins: 1 when eta segmentation is disabled.
    pub fn effective_n_eta_part(&self) -> usize {
        if self.eta_seg {
            self.n_eta_part
        } else {
            1
        }
    }
}
