//! MeshDofsError: Unified error type for mesh-dofs public APIs
//!
//! Every fallible operation in the crate returns this type. None of the
//! variants are retried internally; a failed bind leaves the dictionary in a
//! state that has to be rebuilt from scratch.

use thiserror::Error;

/// Unified error type for mesh-dofs operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshDofsError {
    /// An operation ran before its preconditions were configured.
    #[error("Setup error: {what}")]
    Setup {
        /// Which precondition is missing.
        what: String,
    },
    /// A discretization space can only feed one consumer at a time.
    #[error("Setup error: space `{space}` is already bound to `{consumer}`")]
    AlreadyBound {
        /// Name of the space being bound a second time.
        space: String,
        /// Name of the consumer currently holding the space.
        consumer: String,
    },
    /// A post-build sanity check failed.
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
    /// A provider, field or other named object does not exist.
    #[error("Value not found: {0}")]
    ValueNotFound(String),
    /// An index is past the end of its container.
    #[error("Index {index} out of range (len = {len})")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Container length at the time of the request.
        len: usize,
    },
    /// Two distinct local entities quantize to the same coordinate signature.
    #[error("Duplicate coordinate signature: entities {first} and {second} collide")]
    DuplicateSignature {
        /// First local entity carrying the signature.
        first: usize,
        /// Second local entity carrying the same signature.
        second: usize,
    },
    /// Geometric tolerance is not a positive finite length.
    #[error("Invalid geometric tolerance {0}")]
    InvalidTolerance(f64),
    /// A coordinate does not fit the integer lattice at this tolerance.
    #[error("Coordinate {value} cannot be quantized with tolerance {tolerance}")]
    CoordinateOverflow {
        /// Offending coordinate component.
        value: f64,
        /// Tolerance in use.
        tolerance: f64,
    },
    /// Communication with a peer failed.
    #[error("Communication error with rank {neighbor}: {reason}")]
    CommError {
        /// Peer rank.
        neighbor: usize,
        /// Underlying message.
        reason: String,
    },
    /// A received buffer does not decode into whole wire records.
    #[error("Buffer size mismatch from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        /// Peer rank.
        neighbor: usize,
        /// Expected byte count (or record size when decoding).
        expected: usize,
        /// Actual byte count.
        got: usize,
    },
    /// At least one rank failed its local phase; all ranks bail out together.
    #[error("Distributed phase aborted: ranks {ranks:?} reported failure")]
    PeerFailure {
        /// Ranks that reported a local failure.
        ranks: Vec<usize>,
    },
}

impl MeshDofsError {
    /// Convenience constructor for [`MeshDofsError::Setup`].
    pub fn setup(what: impl Into<String>) -> Self {
        MeshDofsError::Setup { what: what.into() }
    }
}
