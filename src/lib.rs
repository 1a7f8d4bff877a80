#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-dofs
//!
//! mesh-dofs builds the degree-of-freedom (DOF) indexing of a partitioned
//! mesh: which DOFs every element touches, which rank owns every DOF and
//! which global id it carries. It also provides the index containers this is
//! built from.
//!
//! ## Features
//! - [`DynamicSparseTable`](data::dyn_table::DynamicSparseTable): variable-length
//!   rows with buffered insertion/removal and compaction on flush
//! - [`FixedWidthTable`](data::table::FixedWidthTable): rectangular rows with an
//!   optional lookup link into a unified index space
//! - [`UnifiedIndexSpace`](data::unified::UnifiedIndexSpace): one continuous
//!   index over several containers
//! - [`EntitySpace`](data::entity_space::EntitySpace): element → DOF tables,
//!   stored or computed
//! - [`DofBinder`](algs::binder::DofBinder): point-based and element-based
//!   binding across ranks, over any [`Communicator`](algs::communicator::Communicator)
//!   (serial, in-process threads, or MPI)
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! mesh-dofs = "0.3"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```
//!
//! ```
//! use mesh_dofs::prelude::*;
//! use std::sync::Arc;
//!
//! let nodes = Arc::new(Nodes::from_flat(2, &[0., 0., 1., 0., 1., 1., 0., 1.])?);
//! let mut tris = Elements::new("tris", nodes, 3);
//! tris.add_element(&[0, 1, 2], 0)?;
//! tris.add_element(&[0, 2, 3], 0)?;
//!
//! let regions = [(Arc::new(tris), StateLayout::nodal(3))];
//! let dict = DofBinder::new(BindConfig::point_based()).bind(&NoComm, &regions)?;
//! assert_eq!(dict.size(), 4);
//! assert_eq!(dict.global_size(), 4);
//! # Ok::<(), MeshDofsError>(())
//! ```
//!
//! ## Determinism
//!
//! Binding the same regions on the same number of ranks yields the same local
//! indices and global ids on every run: DOFs are created in element order and
//! owned DOFs are numbered in local index order.

pub mod algs;
pub mod data;
pub mod debug_invariants;
pub mod geometry;
pub mod mesh_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use mesh_error::MeshDofsError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::binder::{BindConfig, DofBinder};
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::data::dictionary::{Dictionary, DofLayout, Field};
    pub use crate::data::dyn_table::{DynamicSparseTable, Relocations, RowBuffer};
    pub use crate::data::entity_space::EntitySpace;
    pub use crate::data::layout::StateLayout;
    pub use crate::data::table::FixedWidthTable;
    pub use crate::data::unified::{DataProvider, UnifiedIndexSpace};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::geometry::{Elements, GeometricSupport, GeometricTolerance, Nodes};
    pub use crate::mesh_error::MeshDofsError;
    pub use crate::topology::ownership::DofOwnership;
}
