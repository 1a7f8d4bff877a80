//! Data module: index tables, unified index spaces and DOF dictionaries
#![warn(missing_docs)]

pub mod dictionary;
pub mod dyn_table;
pub mod entity_space;
pub mod layout;
pub mod table;
pub mod unified;

pub use dictionary::{Dictionary, DofLayout, Field};
pub use dyn_table::{DynamicSparseTable, Relocations, RowBuffer};
pub use entity_space::EntitySpace;
pub use layout::StateLayout;
pub use table::FixedWidthTable;
pub use unified::{DataProvider, LookupLink, UnifiedIndexSpace};
