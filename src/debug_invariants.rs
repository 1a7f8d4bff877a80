//! Structural self-checks for the index containers.

use crate::mesh_error::MeshDofsError;

/// Trait for validating data structure invariants.
///
/// Containers call [`debug_assert_invariants`](Self::debug_assert_invariants)
/// after every structural rebuild; the check compiles away in release builds
/// unless the `check-invariants` feature is on.
pub trait DebugInvariants {
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), MeshDofsError>;

    /// Panic with the first violated invariant when checking is enabled.
    fn debug_assert_invariants(&self) {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if let Err(e) = self.validate_invariants() {
            panic!("[invariants] {}: {e}", std::any::type_name::<Self>());
        }
    }
}
