//! EntitySpace: DOF indices of the states of one element region.
//!
//! A space couples a [`StateLayout`] to a geometric support and answers
//! "which DOFs belong to element `e`". It either stores an explicit
//! [`FixedWidthTable`] of indices, or, for element-based layouts where DOFs
//! are never shared, computes them as `base + e * nb_states + s` without any
//! storage (proxy mode).
//!
//! A space feeds at most one consumer (a dictionary or field group) at a
//! time.

use crate::data::layout::StateLayout;
use crate::data::table::FixedWidthTable;
use crate::geometry::elements::{Elements, GeometricSupport};
use crate::mesh_error::MeshDofsError;
use std::borrow::Cow;
use std::sync::Arc;

#[derive(Clone, Debug)]
enum Connectivity {
    Table(FixedWidthTable<usize>),
    Proxy { base: usize },
}

/// DOF connectivity of one element region.
#[derive(Clone, Debug)]
pub struct EntitySpace<S: GeometricSupport = Elements> {
    name: String,
    layout: StateLayout,
    support: Option<Arc<S>>,
    dofs: Connectivity,
    consumer: Option<String>,
}

impl<S: GeometricSupport> EntitySpace<S> {
    /// Unbound space using `layout`.
    pub fn new(name: impl Into<String>, layout: StateLayout) -> Self {
        let width = layout.nb_states();
        Self {
            name: name.into(),
            layout,
            support: None,
            dofs: Connectivity::Table(FixedWidthTable::with_row_size(width)),
            consumer: None,
        }
    }

    /// Space name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// State layout.
    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    /// States per element.
    pub fn nb_states(&self) -> usize {
        self.layout.nb_states()
    }

    /// Attach the geometric support.
    ///
    /// Every element must have as many geometric nodes as the layout expects.
    /// Binding the same support again is a no-op; binding a different one is a
    /// setup error.
    pub fn bind(&mut self, support: Arc<S>) -> Result<(), MeshDofsError> {
        if let Some(current) = &self.support {
            if Arc::ptr_eq(current, &support) {
                return Ok(());
            }
            return Err(MeshDofsError::setup(format!(
                "space `{}` is already bound to support `{}`",
                self.name,
                current.support_name()
            )));
        }
        for e in 0..support.element_count() {
            let n = support.element_nodes(e)?.len();
            if n != self.layout.nb_nodes() {
                return Err(MeshDofsError::InvalidStructure(format!(
                    "element {e} of `{}` has {n} nodes, layout `{}` expects {}",
                    support.support_name(),
                    self.layout.name(),
                    self.layout.nb_nodes()
                )));
            }
        }
        if let Connectivity::Table(table) = &mut self.dofs {
            table.resize(support.element_count())?;
        }
        self.support = Some(support);
        Ok(())
    }

    /// The bound support.
    pub fn support(&self) -> Result<&Arc<S>, MeshDofsError> {
        self.support.as_ref().ok_or_else(|| {
            MeshDofsError::setup(format!("space `{}` has no geometric support", self.name))
        })
    }

    /// Number of elements of the bound support.
    pub fn nb_elements(&self) -> Result<usize, MeshDofsError> {
        Ok(self.support()?.element_count())
    }

    /// Switch to computed indices starting at `base`. Drops any stored table.
    pub fn make_proxy(&mut self, base: usize) -> Result<(), MeshDofsError> {
        self.support()?;
        self.dofs = Connectivity::Proxy { base };
        Ok(())
    }

    /// Whether indices are computed rather than stored.
    pub fn is_proxy(&self) -> bool {
        matches!(self.dofs, Connectivity::Proxy { .. })
    }

    /// First DOF index in proxy mode.
    pub fn proxy_base(&self) -> Option<usize> {
        match self.dofs {
            Connectivity::Proxy { base } => Some(base),
            Connectivity::Table(_) => None,
        }
    }

    /// The stored index table, `None` in proxy mode.
    pub fn connectivity(&self) -> Option<&FixedWidthTable<usize>> {
        match &self.dofs {
            Connectivity::Table(table) => Some(table),
            Connectivity::Proxy { .. } => None,
        }
    }

    /// Mutable stored index table; a setup error in proxy mode.
    pub fn connectivity_mut(&mut self) -> Result<&mut FixedWidthTable<usize>, MeshDofsError> {
        self.support()?;
        match &mut self.dofs {
            Connectivity::Table(table) => Ok(table),
            Connectivity::Proxy { .. } => Err(MeshDofsError::setup(format!(
                "space `{}` computes its indices; it has no table to modify",
                self.name
            ))),
        }
    }

    /// Store the DOF indices of element `e`.
    pub fn set_dofs(&mut self, e: usize, dofs: &[usize]) -> Result<(), MeshDofsError> {
        self.connectivity_mut()?.set_row(e, dofs)
    }

    /// DOF indices of local element `e`.
    pub fn dofs_for_element(&self, e: usize) -> Result<Cow<'_, [usize]>, MeshDofsError> {
        let n_elem = self.nb_elements()?;
        if e >= n_elem {
            return Err(MeshDofsError::IndexOutOfRange {
                index: e,
                len: n_elem,
            });
        }
        match &self.dofs {
            Connectivity::Table(table) => table.row(e).map(Cow::Borrowed),
            Connectivity::Proxy { base } => {
                let n = self.nb_states();
                let first = base + e * n;
                Ok(Cow::Owned((first..first + n).collect()))
            }
        }
    }

    /// Whether a consumer holds this space.
    pub fn is_bound_to_consumer(&self) -> bool {
        self.consumer.is_some()
    }

    /// Name of the consumer holding this space.
    pub fn consumer(&self) -> Option<&str> {
        self.consumer.as_deref()
    }

    /// Hand the space to `consumer`.
    pub fn bind_consumer(&mut self, consumer: impl Into<String>) -> Result<(), MeshDofsError> {
        if let Some(existing) = &self.consumer {
            return Err(MeshDofsError::AlreadyBound {
                space: self.name.clone(),
                consumer: existing.clone(),
            });
        }
        self.consumer = Some(consumer.into());
        Ok(())
    }

    /// Release the consumer binding.
    pub fn unbind_consumer(&mut self) -> Option<String> {
        self.consumer.take()
    }
}
