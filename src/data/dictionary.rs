//! Dictionary: the bound DOF set of a group of element regions.
//!
//! A dictionary is what the binder produces. It owns
//! - one [`EntitySpace`] per element region (the element → DOF tables),
//! - a [`UnifiedIndexSpace`] over the regions, so elements can also be
//!   addressed by one continuous index,
//! - per-DOF coordinates and [`DofOwnership`] (owner rank, global id),
//! - the named [`Field`]s stored on the DOFs.
//!
//! [`Dictionary::check_sanity`] runs after every structural rebuild and
//! rejects any field whose row count disagrees with [`Dictionary::size`].

use crate::data::entity_space::EntitySpace;
use crate::data::table::FixedWidthTable;
use crate::data::unified::{Location, UnifiedIndexSpace};
use crate::geometry::elements::{Elements, GeometricSupport};
use crate::mesh_error::MeshDofsError;
use crate::topology::ownership::DofOwnership;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How DOFs relate to elements.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DofLayout {
    /// DOFs at coincident points are shared between elements (and ranks).
    #[default]
    PointBased,
    /// Every element has its own DOFs; nothing is shared.
    ElementBased,
}

/// Values stored per DOF.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    values: FixedWidthTable<f64>,
}

impl Field {
    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of DOF rows.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the field has no rows.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values per DOF.
    pub fn row_size(&self) -> usize {
        self.values.row_size().unwrap_or(0)
    }

    /// Values of `dof`.
    pub fn row(&self, dof: usize) -> Result<&[f64], MeshDofsError> {
        self.values.row(dof)
    }

    /// Mutable values of `dof`.
    pub fn row_mut(&mut self, dof: usize) -> Result<&mut [f64], MeshDofsError> {
        self.values.row_mut(dof)
    }

    /// Grow or shrink to `rows` DOFs; new rows are zero.
    pub fn resize(&mut self, rows: usize) -> Result<(), MeshDofsError> {
        self.values.resize(rows)
    }
}

/// Bound DOFs of a set of element regions on one rank.
#[derive(Debug)]
pub struct Dictionary<S: GeometricSupport = Elements> {
    name: String,
    layout: DofLayout,
    spaces: Vec<EntitySpace<S>>,
    elements: UnifiedIndexSpace<S>,
    coordinates: FixedWidthTable<f64>,
    ownership: DofOwnership,
    global_size: usize,
    fields: BTreeMap<String, Field>,
}

impl<S: GeometricSupport> Dictionary<S> {
    /// Assemble a dictionary from binder output and check it.
    ///
    /// Every space is handed to the dictionary as its consumer, and every
    /// stored connectivity table is linked to the unified element space.
    pub(crate) fn assemble(
        name: impl Into<String>,
        layout: DofLayout,
        mut spaces: Vec<EntitySpace<S>>,
        coordinates: FixedWidthTable<f64>,
        ownership: DofOwnership,
        global_size: usize,
    ) -> Result<Self, MeshDofsError> {
        let name = name.into();
        let mut elements = UnifiedIndexSpace::new();
        for space in &spaces {
            elements.add(Arc::clone(space.support()?));
        }
        let link = elements.link();
        for space in &mut spaces {
            space.bind_consumer(name.clone())?;
            if !space.is_proxy() {
                space.connectivity_mut()?.set_lookup(link);
            }
        }
        let dict = Self {
            name,
            layout,
            spaces,
            elements,
            coordinates,
            ownership,
            global_size,
            fields: BTreeMap::new(),
        };
        dict.check_sanity()?;
        Ok(dict)
    }

    /// Dictionary name (also the consumer name of its spaces).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// DOF layout the dictionary was bound with.
    pub fn layout(&self) -> DofLayout {
        self.layout
    }

    /// Rank the dictionary lives on.
    pub fn rank(&self) -> usize {
        self.ownership.my_rank()
    }

    /// Number of local DOFs (owned and ghost).
    pub fn size(&self) -> usize {
        self.ownership.len()
    }

    /// Number of DOFs across all ranks.
    pub fn global_size(&self) -> usize {
        self.global_size
    }

    /// Number of DOFs owned by this rank.
    pub fn owned_count(&self) -> usize {
        self.ownership.owned_count()
    }

    /// Whether `dof` is owned by another rank.
    pub fn is_ghost(&self, dof: usize) -> Result<bool, MeshDofsError> {
        self.ownership.is_ghost(dof)
    }

    /// Global id of `dof`.
    pub fn global_id(&self, dof: usize) -> Result<usize, MeshDofsError> {
        self.ownership.global_id(dof)
    }

    /// Owning rank of `dof`.
    pub fn owner_rank(&self, dof: usize) -> Result<usize, MeshDofsError> {
        self.ownership.owner(dof)
    }

    /// Ghost DOFs in index order.
    pub fn ghosts(&self) -> impl Iterator<Item = usize> + '_ {
        self.ownership.ghosts()
    }

    /// Full ownership record.
    pub fn ownership(&self) -> &DofOwnership {
        &self.ownership
    }

    /// Physical coordinates of `dof`.
    pub fn coordinates(&self, dof: usize) -> Result<&[f64], MeshDofsError> {
        self.coordinates.row(dof)
    }

    /// Spaces in region order.
    pub fn spaces(&self) -> &[EntitySpace<S>] {
        &self.spaces
    }

    /// The space bound to `support`.
    pub fn space_for(&self, support: &Arc<S>) -> Result<&EntitySpace<S>, MeshDofsError> {
        let pos = self.elements.provider_index(support)?;
        Ok(&self.spaces[pos])
    }

    /// The space named `name`.
    pub fn space(&self, name: &str) -> Result<&EntitySpace<S>, MeshDofsError> {
        self.spaces
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| MeshDofsError::ValueNotFound(format!("space `{name}`")))
    }

    /// Unified index over all elements of all regions.
    pub fn elements(&self) -> &UnifiedIndexSpace<S> {
        &self.elements
    }

    /// Region and local index of unified element `idx`.
    pub fn locate_element(&self, idx: usize) -> Result<Location<'_, S>, MeshDofsError> {
        self.elements.location(idx)
    }

    /// DOFs of local element `e` of `support`.
    pub fn dofs_for_element(
        &self,
        support: &Arc<S>,
        e: usize,
    ) -> Result<Cow<'_, [usize]>, MeshDofsError> {
        self.space_for(support)?.dofs_for_element(e)
    }

    /// DOFs of unified element `idx`.
    pub fn dofs_for_unified_element(&self, idx: usize) -> Result<Cow<'_, [usize]>, MeshDofsError> {
        let loc = self.elements.location(idx)?;
        self.spaces[loc.provider_index].dofs_for_element(loc.local)
    }

    /// Create a zeroed field with `row_size` values per DOF.
    pub fn create_field(
        &mut self,
        name: impl Into<String>,
        row_size: usize,
    ) -> Result<&mut Field, MeshDofsError> {
        let name = name.into();
        if self.fields.contains_key(&name) {
            return Err(MeshDofsError::setup(format!(
                "field `{name}` already exists in `{}`",
                self.name
            )));
        }
        let mut values = FixedWidthTable::with_row_size(row_size);
        values.resize(self.size())?;
        self.fields.insert(
            name.clone(),
            Field {
                name: name.clone(),
                values,
            },
        );
        self.check_sanity()?;
        self.field_mut(&name)
    }

    /// Field named `name`.
    pub fn field(&self, name: &str) -> Result<&Field, MeshDofsError> {
        self.fields
            .get(name)
            .ok_or_else(|| MeshDofsError::ValueNotFound(format!("field `{name}`")))
    }

    /// Mutable field named `name`.
    pub fn field_mut(&mut self, name: &str) -> Result<&mut Field, MeshDofsError> {
        self.fields
            .get_mut(name)
            .ok_or_else(|| MeshDofsError::ValueNotFound(format!("field `{name}`")))
    }

    /// Names of all fields, sorted.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Verify that every per-DOF container matches [`size`](Self::size) and
    /// that every connectivity entry addresses an existing DOF.
    pub fn check_sanity(&self) -> Result<(), MeshDofsError> {
        let n = self.size();
        if self.coordinates.len() != n {
            return Err(MeshDofsError::InvalidStructure(format!(
                "`{}`: {} coordinate rows for {n} DOFs",
                self.name,
                self.coordinates.len()
            )));
        }
        for field in self.fields.values() {
            if field.len() != n {
                return Err(MeshDofsError::InvalidStructure(format!(
                    "field `{}` has {} rows but `{}` has {n} DOFs",
                    field.name,
                    field.len(),
                    self.name
                )));
            }
        }
        for space in &self.spaces {
            let n_elem = space.nb_elements()?;
            let top = match (space.proxy_base(), space.connectivity()) {
                (Some(base), _) => {
                    if n_elem == 0 {
                        None
                    } else {
                        Some(base + n_elem * space.nb_states() - 1)
                    }
                }
                (None, Some(table)) => table.as_slice().iter().copied().max(),
                (None, None) => None,
            };
            if let Some(top) = top.filter(|&t| t >= n) {
                return Err(MeshDofsError::InvalidStructure(format!(
                    "space `{}` refers to DOF {top} but `{}` has {n} DOFs",
                    space.name(),
                    self.name
                )));
            }
        }
        Ok(())
    }
}
