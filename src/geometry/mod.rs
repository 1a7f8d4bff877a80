//! Geometric support for DOF binding: node/element containers and the
//! coordinate signatures used to match points across ranks.

pub mod coord_key;
pub mod elements;

pub use coord_key::{CoordKey, CoordinateQuantizer, GeometricTolerance};
pub use elements::{Elements, GeometricSupport, Nodes};
