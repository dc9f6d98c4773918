//! Cylinder-stack detector geometry.
//!
//! Intentionally thin: the core only ever needs the radius of a layer and
//! the layer count (per spec §4.1, everything else about the detector model
//! is an external collaborator's concern).

use crate::error::GeometryError;

/// A stack of concentric cylindrical layers, radii strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct CylinderGeometry {
    radii: Vec<f64>,
}

impl CylinderGeometry {
    /// Builds a geometry from strictly increasing layer radii.
    pub fn new(radii: Vec<f64>) -> Result<Self, GeometryError> {
        if radii.is_empty() {
            return Err(GeometryError::Empty);
        }
        for (i, w) in radii.windows(2).enumerate() {
            if w[1] <= w[0] {
                return Err(GeometryError::RadiiNotIncreasing {
                    inner_layer: i,
                    inner_radius: w[0],
                    outer_layer: i + 1,
                    outer_radius: w[1],
                });
            }
        }
        Ok(Self { radii })
    }

    /// Builds `n_layers` concentric cylinders with radii evenly spaced from
    /// `first_radius` in steps of `spacing`.
    pub fn evenly_spaced(
        n_layers: usize,
        first_radius: f64,
        spacing: f64,
    ) -> Result<Self, GeometryError> {
        let radii = (0..n_layers)
            .map(|i| first_radius + spacing * i as f64)
            .collect();
        Self::new(radii)
    }

    /// Radius of the given layer, or `None` if out of range.
    pub fn radius(&self, layer: usize) -> Option<f64> {
        self.radii.get(layer).copied()
    }

    pub fn n_layers(&self) -> usize {
        self.radii.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_increasing_radii() {
        assert!(CylinderGeometry::new(vec![4.0, 8.0, 8.0]).is_err());
        assert!(CylinderGeometry::new(vec![4.0, 3.0]).is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(CylinderGeometry::new(vec![]).is_err());
    }

    #[test]
    fn evenly_spaced_matches_scenario_geometry() {
        let geom = CylinderGeometry::evenly_spaced(10, 4.0, 4.0).unwrap();
        assert_eq!(geom.n_layers(), 10);
        assert_eq!(geom.radius(0), Some(4.0));
        assert_eq!(geom.radius(9), Some(40.0));
        assert_eq!(geom.radius(10), None);
    }
}
