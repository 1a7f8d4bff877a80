//! Distributed DOF binding.
//!
//! [`DofBinder::bind`] turns a set of element regions, each paired with a
//! [`StateLayout`], into a [`Dictionary`]: local DOF indices per element,
//! DOF coordinates, an owner rank and a global id for every DOF.
//!
//! Two layouts are supported (see [`DofLayout`]):
//! - point-based: states at coincident physical points share one DOF, locally
//!   and across ranks. The owner of a DOF is the lowest rank among all
//!   elements touching it.
//! - element-based: every element carries its own DOFs, owned by the element's
//!   rank. Connectivity is computed, not stored.
//!
//! Points and element centroids are matched by [`CoordKey`]s computed with
//! the configured [`GeometricTolerance`].
//!
//! Owned DOFs are numbered rank by rank: rank `r` owns the global ids
//! `[sum of owned counts of ranks < r, + own count)`, in local index order.
//!
//! All ranks run the same sequence of collectives. Every step ends with a
//! status vote ([`Exchange::agree`]), so a failure on one rank fails the bind
//! on all ranks instead of leaving the others blocked.
//!
//! [`CoordKey`]: crate::geometry::coord_key::CoordKey

mod element_based;
mod numbering;
mod point_based;

use crate::algs::communicator::Communicator;
use crate::algs::exchange::Exchange;
use crate::data::dictionary::{Dictionary, DofLayout};
use crate::data::entity_space::EntitySpace;
use crate::data::layout::StateLayout;
use crate::data::table::FixedWidthTable;
use crate::geometry::coord_key::{CoordinateQuantizer, GeometricTolerance, MAX_DIM};
use crate::geometry::elements::GeometricSupport;
use crate::mesh_error::MeshDofsError;
use crate::topology::ownership::DofOwnership;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default dictionary name.
pub const DEFAULT_DICTIONARY_NAME: &str = "dofs";

/// Binder settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    /// Sharing rule between elements.
    pub layout: DofLayout,
    /// Length under which two points are the same point.
    pub tolerance: GeometricTolerance,
    /// Name of the produced dictionary.
    pub name: String,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            layout: DofLayout::PointBased,
            tolerance: GeometricTolerance::default(),
            name: DEFAULT_DICTIONARY_NAME.to_string(),
        }
    }
}

impl BindConfig {
    /// Shared DOFs at coincident points.
    pub fn point_based() -> Self {
        Self::default()
    }

    /// One private block of DOFs per element.
    pub fn element_based() -> Self {
        Self {
            layout: DofLayout::ElementBased,
            ..Self::default()
        }
    }

    /// Replace the coordinate matching tolerance.
    pub fn with_tolerance(mut self, tolerance: GeometricTolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Name the resulting dictionary.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Output of a binding strategy, before it is wrapped into a dictionary.
struct Bound<S: GeometricSupport> {
    spaces: Vec<EntitySpace<S>>,
    coordinates: FixedWidthTable<f64>,
    ownership: DofOwnership,
    global_size: usize,
}

/// Builds dictionaries from element regions.
#[derive(Clone, Debug, Default)]
pub struct DofBinder {
    config: BindConfig,
}

impl DofBinder {
    /// Binder using `config` for every call to [`bind`](Self::bind).
    pub fn new(config: BindConfig) -> Self {
        Self { config }
    }

    /// The configuration this binder was built with.
    pub fn config(&self) -> &BindConfig {
        &self.config
    }

    /// Bind `regions` on every rank of `comm`.
    ///
    /// Collective: every rank must call it, with its own local regions, in
    /// the same order relative to other collectives on `comm`. Regions may be
    /// empty on some ranks.
    pub fn bind<S, C>(
        &self,
        comm: &C,
        regions: &[(Arc<S>, StateLayout)],
    ) -> Result<Dictionary<S>, MeshDofsError>
    where
        S: GeometricSupport,
        C: Communicator + ?Sized,
    {
        let ex = Exchange::new(comm);
        log::debug!(
            "[bind] `{}`: rank {}/{} binding {} region(s) ({:?}, tolerance {:e})",
            self.config.name,
            ex.rank(),
            ex.size(),
            regions.len(),
            self.config.layout,
            self.config.tolerance.get()
        );
        let spaces = ex.agree(make_spaces(regions))?;
        let dim = ex.agree(common_dimension(&spaces))?;
        let quantizer = CoordinateQuantizer::new(self.config.tolerance);

        let bound = match self.config.layout {
            DofLayout::PointBased => point_based::bind(&ex, spaces, dim, quantizer)?,
            DofLayout::ElementBased => element_based::bind(&ex, spaces, dim, quantizer)?,
        };
        let dict = ex.agree(Dictionary::assemble(
            self.config.name.clone(),
            self.config.layout,
            bound.spaces,
            bound.coordinates,
            bound.ownership,
            bound.global_size,
        ))?;
        log::info!(
            "[bind] `{}`: rank {} holds {} DOFs ({} owned, {} ghost) of {}",
            dict.name(),
            dict.rank(),
            dict.size(),
            dict.owned_count(),
            dict.size() - dict.owned_count(),
            dict.global_size()
        );
        Ok(dict)
    }
}

fn make_spaces<S: GeometricSupport>(
    regions: &[(Arc<S>, StateLayout)],
) -> Result<Vec<EntitySpace<S>>, MeshDofsError> {
    for (i, (a, _)) in regions.iter().enumerate() {
        if regions[..i].iter().any(|(b, _)| Arc::ptr_eq(a, b)) {
            return Err(MeshDofsError::setup(format!(
                "region `{}` is listed twice",
                a.support_name()
            )));
        }
    }
    regions
        .iter()
        .map(|(support, layout)| {
            if support.element_count() == 0 {
                log::warn!("[bind] region `{}` has no elements", support.support_name());
            }
            let mut space = EntitySpace::new(support.support_name(), layout.clone());
            space.bind(Arc::clone(support))?;
            Ok(space)
        })
        .collect()
}

/// Spatial dimension shared by all non-empty regions (0 when there are none).
fn common_dimension<S: GeometricSupport>(spaces: &[EntitySpace<S>]) -> Result<usize, MeshDofsError> {
    let mut dim = None;
    for space in spaces {
        let support = space.support()?;
        if support.element_count() == 0 {
            continue;
        }
        let d = support.dimension();
        if d > MAX_DIM {
            return Err(MeshDofsError::InvalidStructure(format!(
                "region `{}` is {d}-dimensional; at most {MAX_DIM} is supported",
                support.support_name()
            )));
        }
        match dim {
            None => dim = Some(d),
            Some(prev) if prev != d => {
                return Err(MeshDofsError::InvalidStructure(format!(
                    "region `{}` is {d}-dimensional, earlier regions are {prev}-dimensional",
                    support.support_name()
                )));
            }
            Some(_) => {}
        }
    }
    Ok(dim.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::geometry::elements::{Elements, Nodes};

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: BindConfig =
            serde_json::from_str(r#"{ "layout": "ElementBased", "tolerance": 1e-6 }"#).unwrap();
        assert_eq!(cfg.layout, DofLayout::ElementBased);
        assert_eq!(cfg.tolerance.get(), 1e-6);
        assert_eq!(cfg.name, DEFAULT_DICTIONARY_NAME);
        assert!(serde_json::from_str::<BindConfig>(r#"{ "tolerance": 0.0 }"#).is_err());
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let flat = Arc::new(Nodes::from_flat(2, &[0., 0., 1., 0.]).unwrap());
        let solid = Arc::new(Nodes::from_flat(3, &[0., 0., 0., 1., 0., 0.]).unwrap());
        let mut a = Elements::new("a", flat, 2);
        a.add_element(&[0, 1], 0).unwrap();
        let mut b = Elements::new("b", solid, 2);
        b.add_element(&[0, 1], 0).unwrap();
        let regions = [
            (Arc::new(a), StateLayout::nodal(2)),
            (Arc::new(b), StateLayout::nodal(2)),
        ];
        let err = DofBinder::default().bind(&NoComm, &regions).unwrap_err();
        assert!(matches!(err, MeshDofsError::InvalidStructure(_)));
    }

    #[test]
    fn layout_mismatch_is_reported() {
        let nodes = Arc::new(Nodes::from_flat(1, &[0., 1.]).unwrap());
        let mut seg = Elements::new("seg", nodes, 2);
        seg.add_element(&[0, 1], 0).unwrap();
        let regions = [(Arc::new(seg), StateLayout::nodal(3))];
        assert!(DofBinder::default().bind(&NoComm, &regions).is_err());
    }
}
