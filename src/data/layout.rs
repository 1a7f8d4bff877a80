//! State layouts: where the discretization points of an element sit.
//!
//! A [`StateLayout`] stores, for every state of an element, the interpolation
//! weights of that state over the element's geometric nodes (the geometry
//! shape function evaluated at the state's reference coordinates). Evaluating
//! the shape functions themselves is the caller's business.

use crate::mesh_error::MeshDofsError;
use serde::{Deserialize, Serialize};

/// Per-element placement of discretization states.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateLayout {
    name: String,
    nb_nodes: usize,
    /// Row-major `nb_states × nb_nodes`.
    weights: Vec<f64>,
}

impl StateLayout {
    /// One state on every geometric node (isoparametric P1).
    pub fn nodal(nb_nodes: usize) -> Self {
        let mut weights = vec![0.0; nb_nodes * nb_nodes];
        for n in 0..nb_nodes {
            weights[n * nb_nodes + n] = 1.0;
        }
        Self {
            name: format!("nodal{nb_nodes}"),
            nb_nodes,
            weights,
        }
    }

    /// A single state at the node average (P0).
    pub fn centroid(nb_nodes: usize) -> Self {
        let w = if nb_nodes == 0 { 0.0 } else { 1.0 / nb_nodes as f64 };
        Self {
            name: format!("centroid{nb_nodes}"),
            nb_nodes,
            weights: vec![w; nb_nodes],
        }
    }

    /// Arbitrary layout; every row holds one state's weights.
    pub fn from_weights(
        name: impl Into<String>,
        nb_nodes: usize,
        rows: &[Vec<f64>],
    ) -> Result<Self, MeshDofsError> {
        if let Some((s, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != nb_nodes) {
            return Err(MeshDofsError::InvalidStructure(format!(
                "state {s} has {} weights for {nb_nodes} nodes",
                row.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            nb_nodes,
            weights: rows.concat(),
        })
    }

    /// Layout name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Geometric nodes per element this layout expects.
    pub fn nb_nodes(&self) -> usize {
        self.nb_nodes
    }

    /// States per element.
    pub fn nb_states(&self) -> usize {
        if self.nb_nodes == 0 {
            0
        } else {
            self.weights.len() / self.nb_nodes
        }
    }

    /// Interpolation weights of `state`.
    ///
    /// # Panics
    /// If `state >= nb_states()`.
    pub fn weights(&self, state: usize) -> &[f64] {
        &self.weights[state * self.nb_nodes..(state + 1) * self.nb_nodes]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodal_layout_is_identity() {
        let l = StateLayout::nodal(3);
        assert_eq!(l.nb_states(), 3);
        assert_eq!(l.weights(1), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn centroid_layout_averages() {
        let l = StateLayout::centroid(4);
        assert_eq!(l.nb_states(), 1);
        assert_eq!(l.weights(0), &[0.25; 4]);
    }

    #[test]
    fn from_weights_checks_row_length() {
        let ok = StateLayout::from_weights("p2-edge", 2, &[vec![1.0, 0.0], vec![0.5, 0.5]]);
        assert_eq!(ok.unwrap().nb_states(), 2);
        assert!(StateLayout::from_weights("bad", 2, &[vec![1.0]]).is_err());
    }
}
