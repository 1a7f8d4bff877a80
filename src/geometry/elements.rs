//! Geometric support: node coordinates and element regions.
//!
//! The binder only needs the [`GeometricSupport`] view of a region. [`Nodes`]
//! and [`Elements`] are the in-memory containers mesh readers fill; any other
//! container can take their place by implementing the trait.

use crate::data::table::FixedWidthTable;
use crate::data::unified::DataProvider;
use crate::mesh_error::MeshDofsError;
use std::sync::Arc;

/// What the binder reads from a collection of elements.
pub trait GeometricSupport: DataProvider {
    /// Name of the region, used in logs and errors.
    fn support_name(&self) -> &str;

    /// Number of local elements.
    fn element_count(&self) -> usize;

    /// Spatial dimension of the node coordinates.
    fn dimension(&self) -> usize;

    /// Geometric node indices of element `e`.
    fn element_nodes(&self, e: usize) -> Result<&[usize], MeshDofsError>;

    /// Coordinates of geometric node `node`.
    fn node_coordinates(&self, node: usize) -> Result<&[f64], MeshDofsError>;

    /// Rank owning element `e`, as assigned by the partitioner.
    fn element_rank(&self, e: usize) -> Result<usize, MeshDofsError>;

    /// Physical coordinates of the point with interpolation `weights` over
    /// the nodes of element `e`, written to `out`.
    fn evaluate(&self, e: usize, weights: &[f64], out: &mut [f64]) -> Result<(), MeshDofsError> {
        let nodes = self.element_nodes(e)?;
        if nodes.len() != weights.len() {
            return Err(MeshDofsError::InvalidStructure(format!(
                "element {e} of `{}` has {} nodes but {} interpolation weights were given",
                self.support_name(),
                nodes.len(),
                weights.len()
            )));
        }
        out.fill(0.0);
        for (&node, &w) in nodes.iter().zip(weights) {
            for (o, x) in out.iter_mut().zip(self.node_coordinates(node)?) {
                *o += w * x;
            }
        }
        Ok(())
    }
}

/// Node coordinates of one mesh partition.
#[derive(Clone, Debug, PartialEq)]
pub struct Nodes {
    coordinates: FixedWidthTable<f64>,
}

impl Nodes {
    /// Empty node set of spatial dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self {
            coordinates: FixedWidthTable::with_row_size(dim),
        }
    }

    /// Build from a flat, row-major coordinate array.
    pub fn from_flat(dim: usize, coords: &[f64]) -> Result<Self, MeshDofsError> {
        if dim == 0 || coords.len() % dim != 0 {
            return Err(MeshDofsError::InvalidStructure(format!(
                "{} coordinate values do not split into points of dimension {dim}",
                coords.len()
            )));
        }
        let mut nodes = Self::new(dim);
        for point in coords.chunks_exact(dim) {
            nodes.add_node(point)?;
        }
        Ok(nodes)
    }

    /// Append a node and return its index.
    pub fn add_node(&mut self, coords: &[f64]) -> Result<usize, MeshDofsError> {
        self.coordinates.push_row(coords)
    }

    /// Spatial dimension.
    pub fn dimension(&self) -> usize {
        self.coordinates.row_size().unwrap_or(0)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    /// Whether there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Coordinates of node `i`.
    pub fn coordinates(&self, i: usize) -> Result<&[f64], MeshDofsError> {
        self.coordinates.row(i)
    }

    /// Component-wise `(min, max)` over all nodes, `None` when empty.
    pub fn bounding_box(&self) -> Option<(Vec<f64>, Vec<f64>)> {
        let mut rows = self.coordinates.rows();
        let first = rows.next()?;
        let (mut lo, mut hi) = (first.to_vec(), first.to_vec());
        for row in rows {
            for (k, &x) in row.iter().enumerate() {
                lo[k] = lo[k].min(x);
                hi[k] = hi[k].max(x);
            }
        }
        Some((lo, hi))
    }
}

impl DataProvider for Nodes {
    fn size(&self) -> usize {
        self.len()
    }

    fn provider_name(&self) -> &str {
        "nodes"
    }
}

/// A named region of same-type elements over shared [`Nodes`].
#[derive(Clone, Debug)]
pub struct Elements {
    name: String,
    nodes: Arc<Nodes>,
    connectivity: FixedWidthTable<usize>,
    rank: Vec<usize>,
}

impl Elements {
    /// Empty region whose elements have `nodes_per_element` geometric nodes.
    pub fn new(name: impl Into<String>, nodes: Arc<Nodes>, nodes_per_element: usize) -> Self {
        Self {
            name: name.into(),
            nodes,
            connectivity: FixedWidthTable::with_row_size(nodes_per_element),
            rank: Vec::new(),
        }
    }

    /// Append an element owned by `rank`; returns its local index.
    pub fn add_element(&mut self, nodes: &[usize], rank: usize) -> Result<usize, MeshDofsError> {
        if let Some(&bad) = nodes.iter().find(|&&n| n >= self.nodes.len()) {
            return Err(MeshDofsError::IndexOutOfRange {
                index: bad,
                len: self.nodes.len(),
            });
        }
        let idx = self.connectivity.push_row(nodes)?;
        self.rank.push(rank);
        Ok(idx)
    }

    /// Shared node container.
    pub fn nodes(&self) -> &Arc<Nodes> {
        &self.nodes
    }

    /// Element → node table.
    pub fn connectivity(&self) -> &FixedWidthTable<usize> {
        &self.connectivity
    }

    /// Owning rank of every element.
    pub fn ranks(&self) -> &[usize] {
        &self.rank
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.connectivity.len()
    }

    /// Whether the region has no elements.
    pub fn is_empty(&self) -> bool {
        self.connectivity.is_empty()
    }

    /// Geometric nodes per element.
    pub fn nodes_per_element(&self) -> usize {
        self.connectivity.row_size().unwrap_or(0)
    }
}

impl DataProvider for Elements {
    fn size(&self) -> usize {
        self.len()
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}

impl GeometricSupport for Elements {
    fn support_name(&self) -> &str {
        &self.name
    }

    fn element_count(&self) -> usize {
        self.len()
    }

    fn dimension(&self) -> usize {
        self.nodes.dimension()
    }

    fn element_nodes(&self, e: usize) -> Result<&[usize], MeshDofsError> {
        self.connectivity.row(e)
    }

    fn node_coordinates(&self, node: usize) -> Result<&[f64], MeshDofsError> {
        self.nodes.coordinates(node)
    }

    fn element_rank(&self, e: usize) -> Result<usize, MeshDofsError> {
        self.rank
            .get(e)
            .copied()
            .ok_or(MeshDofsError::IndexOutOfRange {
                index: e,
                len: self.rank.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> Elements {
        let nodes = Arc::new(Nodes::from_flat(2, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]).unwrap());
        let mut tris = Elements::new("tris", nodes, 3);
        tris.add_element(&[0, 1, 2], 0).unwrap();
        tris
    }

    #[test]
    fn evaluate_interpolates_node_coordinates() {
        let tris = unit_triangle();
        let third = 1.0 / 3.0;
        let mut out = [0.0; 2];
        tris.evaluate(0, &[third, third, third], &mut out).unwrap();
        assert!((out[0] - third).abs() < 1e-15);
        assert!((out[1] - third).abs() < 1e-15);
        assert!(tris.evaluate(0, &[1.0], &mut out).is_err());
    }

    #[test]
    fn element_nodes_are_validated() {
        let mut tris = unit_triangle();
        assert_eq!(
            tris.add_element(&[0, 1, 7], 0),
            Err(MeshDofsError::IndexOutOfRange { index: 7, len: 3 })
        );
        assert!(tris.element_rank(3).is_err());
        assert_eq!(tris.element_rank(0).unwrap(), 0);
    }

    #[test]
    fn bounding_box_spans_nodes() {
        let nodes = Nodes::from_flat(2, &[0.0, -1.0, 2.0, 3.0]).unwrap();
        let (lo, hi) = nodes.bounding_box().unwrap();
        assert_eq!(lo, vec![0.0, -1.0]);
        assert_eq!(hi, vec![2.0, 3.0]);
        assert!(Nodes::from_flat(2, &[1.0]).is_err());
        assert!(Nodes::new(3).bounding_box().is_none());
    }
}
