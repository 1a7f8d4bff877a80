//! Re-export public algorithms.

pub mod binder;
pub mod communicator;
pub mod exchange;
pub mod wire;

pub use binder::{BindConfig, DofBinder};
pub use communicator::{Communicator, LocalComm, NoComm};
