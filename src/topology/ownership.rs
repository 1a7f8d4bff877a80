//! Ownership metadata for degrees of freedom.
//!
//! [`DofOwnership`] records, per local DOF, the owning rank and the global
//! id. Both start unresolved and are filled by the binder: owners by a
//! minimum-reduction over every element (on any rank) touching the DOF,
//! global ids by prefix-sum numbering of owned DOFs plus ghost resolution.

use crate::mesh_error::MeshDofsError;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct OwnershipEntry {
    pub owner: Option<usize>,
    pub global_id: Option<usize>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DofOwnership {
    my_rank: usize,
    entries: Vec<OwnershipEntry>,
}

impl DofOwnership {
    /// Empty ownership map for the calling rank.
    pub fn new(my_rank: usize) -> Self {
        Self {
            my_rank,
            entries: Vec::new(),
        }
    }

    /// Rank these entries were computed on.
    pub fn my_rank(&self) -> usize {
        self.my_rank
    }

    /// Number of DOFs tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no DOFs are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a DOF with an optional initial owner; returns its index.
    pub fn push(&mut self, owner: Option<usize>) -> usize {
        self.entries.push(OwnershipEntry {
            owner,
            global_id: None,
        });
        self.entries.len() - 1
    }

    fn entry_mut(&mut self, dof: usize) -> Result<&mut OwnershipEntry, MeshDofsError> {
        let len = self.entries.len();
        self.entries
            .get_mut(dof)
            .ok_or(MeshDofsError::IndexOutOfRange { index: dof, len })
    }

    /// Retrieve the entry of a DOF.
    pub fn entry(&self, dof: usize) -> Result<OwnershipEntry, MeshDofsError> {
        self.entries
            .get(dof)
            .copied()
            .ok_or(MeshDofsError::IndexOutOfRange {
                index: dof,
                len: self.entries.len(),
            })
    }

    /// Lower the owner of `dof` to `owner` if that is smaller (or unset).
    pub fn set_owner_min(&mut self, dof: usize, owner: usize) -> Result<(), MeshDofsError> {
        let entry = self.entry_mut(dof)?;
        entry.owner = Some(entry.owner.map_or(owner, |o| o.min(owner)));
        Ok(())
    }

    /// Record the global id of `dof`.
    pub fn set_global_id(&mut self, dof: usize, id: usize) -> Result<(), MeshDofsError> {
        self.entry_mut(dof)?.global_id = Some(id);
        Ok(())
    }

    /// Owning rank, an error while unresolved.
    pub fn owner(&self, dof: usize) -> Result<usize, MeshDofsError> {
        self.entry(dof)?.owner.ok_or_else(|| {
            MeshDofsError::InvalidStructure(format!("owner of DOF {dof} is unresolved"))
        })
    }

    /// Global id, an error while unresolved.
    pub fn global_id(&self, dof: usize) -> Result<usize, MeshDofsError> {
        self.entry(dof)?.global_id.ok_or_else(|| {
            MeshDofsError::InvalidStructure(format!("global id of DOF {dof} is unresolved"))
        })
    }

    /// Whether `dof` is owned by another rank.
    pub fn is_ghost(&self, dof: usize) -> Result<bool, MeshDofsError> {
        Ok(self.owner(dof)? != self.my_rank)
    }

    /// Whether `dof` is owned by `rank`.
    pub fn is_owned_by(&self, dof: usize, rank: usize) -> bool {
        self.entries
            .get(dof)
            .and_then(|e| e.owner)
            .is_some_and(|o| o == rank)
    }

    /// Locally owned DOFs in index order.
    pub fn owned(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.entries.len()).filter(move |&d| self.is_owned_by(d, self.my_rank))
    }

    /// DOFs owned elsewhere, in index order.
    pub fn ghosts(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.owner.is_some_and(|o| o != self.my_rank))
            .map(|(d, _)| d)
    }

    /// Number of locally owned DOFs.
    pub fn owned_count(&self) -> usize {
        self.owned().count()
    }

    /// DOFs whose owner or global id is still unset.
    pub fn unresolved(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.owner.is_none() || e.global_id.is_none())
            .map(|(d, _)| d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_min_and_ghost_flags() {
        let mut own = DofOwnership::new(1);
        let a = own.push(None);
        let b = own.push(Some(1));
        own.set_owner_min(a, 2).unwrap();
        own.set_owner_min(a, 3).unwrap();
        own.set_owner_min(b, 0).unwrap();
        assert_eq!(own.owner(a).unwrap(), 2);
        assert_eq!(own.owner(b).unwrap(), 0);
        assert!(own.is_ghost(a).unwrap());
        assert_eq!(own.ghosts().collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(own.owned_count(), 0);
    }

    #[test]
    fn unresolved_entries_error() {
        let mut own = DofOwnership::new(0);
        let d = own.push(None);
        assert!(own.owner(d).is_err());
        assert!(own.global_id(d).is_err());
        assert_eq!(own.unresolved().count(), 1);
        own.set_owner_min(d, 0).unwrap();
        own.set_global_id(d, 7).unwrap();
        assert_eq!(own.global_id(d).unwrap(), 7);
        assert_eq!(own.unresolved().count(), 0);
        assert!(own.entry(5).is_err());
    }
}
