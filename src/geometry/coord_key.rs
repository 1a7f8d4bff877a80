//! Coordinate signatures for matching geometric points across ranks.
//!
//! Points are matched by snapping every coordinate to an integer lattice of
//! spacing `tolerance` and comparing the lattice cells exactly. Keys are the
//! full lattice triple, not a folded hash of it: two points merge only when
//! they share a cell.
//!
//! # Caveat
//! Snapping is not a metric test. Two points closer than `tolerance` that
//! straddle a cell boundary get different keys (a false split), and two
//! distinct points inside one cell get the same key (a false merge). Pick the
//! tolerance well below the smallest edge length and well above the
//! floating-point noise of the coordinates; [`CoordinateQuantizer::is_ambiguous`]
//! flags coordinates that sit close to a cell boundary.

use crate::geometry::elements::Nodes;
use crate::mesh_error::MeshDofsError;
use serde::{Deserialize, Serialize};

/// Highest spatial dimension a key can carry.
pub const MAX_DIM: usize = 3;

/// Tolerance used when no mesh-specific value is configured.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Coordinates beyond `2^62` lattice cells are rejected.
const LATTICE_LIMIT: f64 = 4_611_686_018_427_387_904.0;

/// Explicit geometric matching tolerance (a length).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct GeometricTolerance(f64);

impl GeometricTolerance {
    /// Absolute tolerance in mesh length units.
    pub fn absolute(len: f64) -> Result<Self, MeshDofsError> {
        if len.is_finite() && len > 0.0 {
            Ok(Self(len))
        } else {
            Err(MeshDofsError::InvalidTolerance(len))
        }
    }

    /// `factor` times the diagonal of the bounding box of `nodes`.
    ///
    /// Degenerate boxes (a single node, or no nodes) fall back to `factor`.
    pub fn relative_to_extent(factor: f64, nodes: &Nodes) -> Result<Self, MeshDofsError> {
        let diag = nodes
            .bounding_box()
            .map(|(lo, hi)| {
                lo.iter()
                    .zip(&hi)
                    .map(|(a, b)| (b - a) * (b - a))
                    .sum::<f64>()
                    .sqrt()
            })
            .filter(|d| *d > 0.0)
            .unwrap_or(1.0);
        Self::absolute(factor * diag)
    }

    /// The tolerance as a length.
    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for GeometricTolerance {
    fn default() -> Self {
        Self(DEFAULT_TOLERANCE)
    }
}

impl TryFrom<f64> for GeometricTolerance {
    type Error = MeshDofsError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::absolute(value)
    }
}

impl From<GeometricTolerance> for f64 {
    fn from(t: GeometricTolerance) -> f64 {
        t.0
    }
}

/// Lattice cell of a point; missing dimensions are zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordKey(pub [i64; MAX_DIM]);

/// Snaps coordinates onto the tolerance lattice.
#[derive(Copy, Clone, Debug)]
pub struct CoordinateQuantizer {
    tolerance: f64,
}

impl CoordinateQuantizer {
    /// Quantizer for `tolerance`.
    pub fn new(tolerance: GeometricTolerance) -> Self {
        Self {
            tolerance: tolerance.get(),
        }
    }

    /// Lattice key of `coords`.
    pub fn key(&self, coords: &[f64]) -> Result<CoordKey, MeshDofsError> {
        if coords.len() > MAX_DIM {
            return Err(MeshDofsError::InvalidStructure(format!(
                "{}-dimensional coordinates exceed the supported {MAX_DIM}",
                coords.len()
            )));
        }
        let mut key = [0i64; MAX_DIM];
        for (slot, &x) in key.iter_mut().zip(coords) {
            let q = (x / self.tolerance).round();
            if !q.is_finite() || q.abs() >= LATTICE_LIMIT {
                return Err(MeshDofsError::CoordinateOverflow {
                    value: x,
                    tolerance: self.tolerance,
                });
            }
            *slot = q as i64;
        }
        Ok(CoordKey(key))
    }

    /// Whether any coordinate lies within 1% of a lattice cell boundary,
    /// i.e. where floating-point noise could flip the key.
    pub fn is_ambiguous(&self, coords: &[f64]) -> bool {
        coords.iter().any(|&x| {
            let scaled = x / self.tolerance;
            (scaled - scaled.floor() - 0.5).abs() < 0.01
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_below_tolerance_maps_to_same_key() {
        let q = CoordinateQuantizer::new(GeometricTolerance::absolute(1e-6).unwrap());
        let a = q.key(&[1.0, 2.0]).unwrap();
        let b = q.key(&[1.0 + 1e-12, 2.0 - 3e-11]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.0[2], 0);
        let c = q.key(&[1.0 + 1e-5, 2.0]).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn rejects_bad_tolerance_and_overflow() {
        assert!(GeometricTolerance::absolute(0.0).is_err());
        assert!(GeometricTolerance::absolute(f64::NAN).is_err());
        let q = CoordinateQuantizer::new(GeometricTolerance::absolute(1e-12).unwrap());
        assert!(matches!(
            q.key(&[1e9]),
            Err(MeshDofsError::CoordinateOverflow { .. })
        ));
        assert!(q.key(&[0.0; 4]).is_err());
    }

    #[test]
    fn boundary_detection() {
        let q = CoordinateQuantizer::new(GeometricTolerance::absolute(1.0).unwrap());
        assert!(q.is_ambiguous(&[0.5]));
        assert!(!q.is_ambiguous(&[0.1, 3.0]));
    }

    #[test]
    fn tolerance_serde_validates() {
        let t: GeometricTolerance = serde_json::from_str("0.001").unwrap();
        assert_eq!(t.get(), 0.001);
        assert!(serde_json::from_str::<GeometricTolerance>("-1.0").is_err());
    }
}
