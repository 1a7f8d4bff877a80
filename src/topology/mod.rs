//! Parallel topology metadata: who owns which DOF.

pub mod ownership;

pub use ownership::{DofOwnership, OwnershipEntry};
