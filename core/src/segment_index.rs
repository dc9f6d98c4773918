//! Eta-phi segment index used to restrict candidate-hit gathering to a
//! window around the propagated state, instead of scanning every hit on a
//! layer (spec §4.5).
//!
//! Grounded directly on the reference C++ builder's `lay_eta_phi_hit_idx_`
//! (`Event.h`: `vector<vector<vector<BinInfo>>>`, `[layer][etaBin][phiBin]`
//! of `(firstIndex, count)` into a per-layer hit array sorted by `(eta,
//! phi)`) and its phi-window gather in `buildtest.cc`, which walks the phi
//! bins from `phiBinMinus` to `phiBinPlus` wrapping around `n_phi_part`.
//!
//! One deliberate deviation from the reference: `buildtest.cc`'s
//! `normalizedPhi` uses `fmod(phi, Config::PI)`, which folds phi into
//! `(-pi/2, pi/2)` rather than the full range — almost certainly a bug
//! inherited from an earlier single-quadrant prototype. This module instead
//! normalizes with `rem_euclid` into the mathematically standard `[-pi,
//! pi)`, per the decision recorded in DESIGN.md.

/// Normalizes `phi` into `[-pi, pi)`.
pub fn normalized_phi(phi: f64) -> f64 {
    use std::f64::consts::PI;
    let wrapped = (phi + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI {
        -PI
    } else {
        wrapped
    }
}

/// Maps `phi` (already normalized) to a bin in `[0, n_phi_part)`.
pub fn phi_bin(phi: f64, n_phi_part: usize) -> usize {
    use std::f64::consts::PI;
    let norm = normalized_phi(phi);
    let frac = (norm + PI) / (2.0 * PI);
    let bin = (frac * n_phi_part as f64).floor() as i64;
    bin.clamp(0, n_phi_part as i64 - 1) as usize
}

/// Maps `eta` to a bin in `[0, n_eta_part)`, clamped at the detector edges
/// rather than rejected — hits or predictions beyond `eta_det` land in the
/// boundary bin.
pub fn eta_bin(eta: f64, n_eta_part: usize, eta_det: f64) -> usize {
    let span = 2.0 * eta_det;
    let frac = (eta + eta_det) / span;
    let bin = (frac * n_eta_part as f64).floor() as i64;
    bin.clamp(0, n_eta_part as i64 - 1) as usize
}

/// Half-open range `[start, end)` of positions into a layer's sorted hit
/// array sharing one (eta, phi) bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start: usize,
    pub end: usize,
}

impl CellRange {
    fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// A single layer's hits, sorted by `(eta_bin, phi_bin)`, plus the `[eta
/// bin][phi bin] -> CellRange` lookup table.
#[derive(Debug, Clone)]
pub struct LayerHits {
    /// Positions into the original (unsorted) per-layer hit list, permuted
    /// into `(eta_bin, phi_bin)` order.
    pub sorted_positions: Vec<usize>,
    cells: Vec<Vec<CellRange>>,
    n_eta_part: usize,
    n_phi_part: usize,
}

impl LayerHits {
    fn cell(&self, eta_bin: usize, phi_bin: usize) -> CellRange {
        self.cells[eta_bin][phi_bin]
    }
}

/// Builds the eta-phi index for a single layer.
///
/// `keys` gives `(eta, phi)` for each hit, in the layer's original index
/// order; the returned [`LayerHits`] records how to walk those hits
/// restricted to a bin window without rescanning the whole layer.
pub fn build_layer_index(
    keys: &[(f64, f64)],
    n_eta_part: usize,
    n_phi_part: usize,
    eta_det: f64,
) -> LayerHits {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    let binned: Vec<(usize, usize)> = keys
        .iter()
        .map(|(eta, phi)| (eta_bin(*eta, n_eta_part, eta_det), phi_bin(*phi, n_phi_part)))
        .collect();

    order.sort_by_key(|&i| (binned[i].0, binned[i].1));

    let mut cells = vec![vec![CellRange { start: 0, end: 0 }; n_phi_part]; n_eta_part];
    let mut pos = 0;
    while pos < order.len() {
        let (eb, pb) = binned[order[pos]];
        let start = pos;
        while pos < order.len() && binned[order[pos]] == (eb, pb) {
            pos += 1;
        }
        cells[eb][pb] = CellRange { start, end: pos };
    }

    LayerHits {
        sorted_positions: order,
        cells,
        n_eta_part,
        n_phi_part,
    }
}

/// Gathers the original-layer hit indices whose `(eta, phi)` falls within
/// `eta_bin_range` (inclusive, already clamped by the caller) and the phi
/// window `[phi_lo, phi_hi]` (radians, not yet bin-mapped) — wrapping around
/// the phi axis when the window crosses the `-pi`/`pi` seam, mirroring the
/// two-span walk in the reference builder's gather loop.
pub fn gather(
    layer: &LayerHits,
    eta_bin_lo: usize,
    eta_bin_hi: usize,
    phi_lo: f64,
    phi_hi: f64,
) -> Vec<usize> {
    let eta_bin_hi = eta_bin_hi.min(layer.n_eta_part.saturating_sub(1));
    if eta_bin_lo > eta_bin_hi {
        return Vec::new();
    }

    let phi_bin_lo = phi_bin(phi_lo, layer.n_phi_part);
    let phi_bin_hi = phi_bin(phi_hi, layer.n_phi_part);

    let mut out = Vec::new();
    for eb in eta_bin_lo..=eta_bin_hi {
        if phi_bin_lo <= phi_bin_hi {
            for pb in phi_bin_lo..=phi_bin_hi {
                append_cell(layer, eb, pb, &mut out);
            }
        } else {
            // window wraps across the -pi/pi seam: walk [lo, n_phi_part)
            // then [0, hi], exactly the two-span pattern the reference
            // builder uses for the same case.
            for pb in phi_bin_lo..layer.n_phi_part {
                append_cell(layer, eb, pb, &mut out);
            }
            for pb in 0..=phi_bin_hi {
                append_cell(layer, eb, pb, &mut out);
            }
        }
    }
    out
}

fn append_cell(layer: &LayerHits, eb: usize, pb: usize, out: &mut Vec<usize>) {
    let range = layer.cell(eb, pb);
    if range.is_empty() {
        return;
    }
    out.extend_from_slice(&layer.sorted_positions[range.start..range.end]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn normalized_phi_stays_in_range() {
        assert!((normalized_phi(0.0)).abs() < 1e-12);
        assert!((normalized_phi(2.0 * PI) - 0.0).abs() < 1e-9);
        assert!((normalized_phi(-2.0 * PI) - 0.0).abs() < 1e-9);
        assert!((normalized_phi(3.5 * PI) - (-0.5 * PI)).abs() < 1e-9);
    }

    #[test]
    fn phi_bin_wraps_consistently_at_seam() {
        let n = 8;
        let near_seam_pos = phi_bin(PI - 1e-6, n);
        let near_seam_neg = phi_bin(-PI + 1e-6, n);
        assert_eq!(near_seam_pos, n - 1);
        assert_eq!(near_seam_neg, 0);
    }

    #[test]
    fn eta_bin_clamps_at_edges() {
        assert_eq!(eta_bin(-10.0, 10, 2.0), 0);
        assert_eq!(eta_bin(10.0, 10, 2.0), 9);
        assert_eq!(eta_bin(0.0, 10, 2.0), 5);
    }

    #[test]
    fn gather_finds_hit_in_its_own_cell() {
        let keys = vec![(0.1, 0.2), (1.5, -2.9), (-1.8, 3.0)];
        let layer = build_layer_index(&keys, 10, 16, 2.0);
        let eb = eta_bin(0.1, 10, 2.0);
        let pb = phi_bin(0.2, 16);
        let found = gather(&layer, eb, eb, 0.15, 0.25);
        assert!(found.contains(&0), "expected hit 0 in bin ({eb},{pb}), got {found:?}");
    }

    #[test]
    fn gather_handles_phi_wraparound() {
        let keys = vec![(0.0, PI - 0.01), (0.0, -PI + 0.01), (0.0, 0.0)];
        let layer = build_layer_index(&keys, 1, 16, 2.0);
        let found = gather(&layer, 0, 0, PI - 0.05, -PI + 0.05);
        assert!(found.contains(&0));
        assert!(found.contains(&1));
        assert!(!found.contains(&2));
    }
}
