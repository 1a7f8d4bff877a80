//! FixedWidthTable: rectangular row storage with an optional lookup link.
//!
//! Rows are stored back-to-back in one flat `Vec`. The row width is set once;
//! after the first row exists it can no longer change.
//!
//! A table may carry a [`LookupLink`] to the [`UnifiedIndexSpace`] that
//! spans it together with other containers. The link is a non-owning back
//! reference: resolving a position requires the caller to hand the space in,
//! and a link issued before the space's last reset is rejected.

use crate::data::unified::{DataProvider, Location, LookupLink, UnifiedIndexSpace};
use crate::mesh_error::MeshDofsError;
use serde::{Deserialize, Serialize};

/// Rows of a fixed width `W`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixedWidthTable<T> {
    data: Vec<T>,
    row_size: Option<usize>,
    nb_rows: usize,
    #[serde(skip)]
    lookup: Option<LookupLink>,
}

impl<T> Default for FixedWidthTable<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            row_size: None,
            nb_rows: 0,
            lookup: None,
        }
    }
}

impl<T> FixedWidthTable<T> {
    /// Create a table without a row width.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table of width `row_size`.
    pub fn with_row_size(row_size: usize) -> Self {
        Self {
            row_size: Some(row_size),
            ..Self::default()
        }
    }

    /// Set the row width. Allowed until the first row exists.
    pub fn set_row_size(&mut self, row_size: usize) -> Result<(), MeshDofsError> {
        match self.row_size {
            Some(current) if current != row_size && self.nb_rows > 0 => {
                Err(MeshDofsError::setup(format!(
                    "row size is already {current}; cannot change it to {row_size} on a populated table"
                )))
            }
            _ => {
                self.row_size = Some(row_size);
                Ok(())
            }
        }
    }

    /// Row width, or a setup error if it was never set.
    pub fn row_size(&self) -> Result<usize, MeshDofsError> {
        self.row_size
            .ok_or_else(|| MeshDofsError::setup("table row size has not been set"))
    }

    /// Number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.nb_rows
    }

    /// Whether the table has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nb_rows == 0
    }

    fn bounds(&self, idx: usize) -> Result<std::ops::Range<usize>, MeshDofsError> {
        let w = self.row_size()?;
        if idx >= self.nb_rows {
            return Err(MeshDofsError::IndexOutOfRange {
                index: idx,
                len: self.nb_rows,
            });
        }
        Ok(idx * w..(idx + 1) * w)
    }

    /// Read-only row `idx`.
    pub fn row(&self, idx: usize) -> Result<&[T], MeshDofsError> {
        let r = self.bounds(idx)?;
        Ok(&self.data[r])
    }

    /// Mutable row `idx`.
    pub fn row_mut(&mut self, idx: usize) -> Result<&mut [T], MeshDofsError> {
        let r = self.bounds(idx)?;
        Ok(&mut self.data[r])
    }

    /// Iterate over rows in index order.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        let w = self.row_size.unwrap_or(0);
        (0..self.nb_rows).map(move |i| &self.data[i * w..(i + 1) * w])
    }

    /// The flat row-major storage.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Attach (or replace) the back reference to a unified index space.
    pub fn set_lookup(&mut self, link: LookupLink) {
        self.lookup = Some(link);
    }

    /// Detach the back reference.
    pub fn clear_lookup(&mut self) {
        self.lookup = None;
    }

    /// Current back reference, if any.
    pub fn lookup(&self) -> Option<LookupLink> {
        self.lookup
    }

    /// Resolve unified position `global` through the linked `space`.
    pub fn locate<'s, P>(
        &self,
        global: usize,
        space: &'s UnifiedIndexSpace<P>,
    ) -> Result<Location<'s, P>, MeshDofsError>
    where
        P: ?Sized + DataProvider,
    {
        let link = self
            .lookup
            .ok_or_else(|| MeshDofsError::setup("table has no lookup link"))?;
        space.check_link(link)?;
        space.location(global)
    }
}

impl<T: Clone> FixedWidthTable<T> {
    /// Append a row; its length must equal the row width.
    pub fn push_row(&mut self, row: &[T]) -> Result<usize, MeshDofsError> {
        let w = self.row_size()?;
        if row.len() != w {
            return Err(MeshDofsError::InvalidStructure(format!(
                "row of length {} pushed into table of width {w}",
                row.len()
            )));
        }
        self.data.extend_from_slice(row);
        self.nb_rows += 1;
        Ok(self.nb_rows - 1)
    }

    /// Overwrite row `idx`.
    pub fn set_row(&mut self, idx: usize, row: &[T]) -> Result<(), MeshDofsError> {
        let dst = self.row_mut(idx)?;
        if dst.len() != row.len() {
            return Err(MeshDofsError::InvalidStructure(format!(
                "row of length {} written into table of width {}",
                row.len(),
                dst.len()
            )));
        }
        dst.clone_from_slice(row);
        Ok(())
    }
}

impl<T: Clone + Default> FixedWidthTable<T> {
    /// Grow or shrink to `nb_rows` rows, filling new rows with `T::default()`.
    pub fn resize(&mut self, nb_rows: usize) -> Result<(), MeshDofsError> {
        let w = self.row_size()?;
        self.data.resize(nb_rows * w, T::default());
        self.nb_rows = nb_rows;
        Ok(())
    }
}

impl<T> DataProvider for FixedWidthTable<T> {
    fn size(&self) -> usize {
        self.nb_rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn push_and_read_rows() {
        let mut t = FixedWidthTable::<usize>::with_row_size(3);
        t.push_row(&[1, 2, 3]).unwrap();
        t.push_row(&[4, 5, 6]).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.row(1).unwrap(), &[4, 5, 6]);
        assert!(matches!(
            t.push_row(&[1]),
            Err(MeshDofsError::InvalidStructure(_))
        ));
        assert_eq!(
            t.row(2).unwrap_err(),
            MeshDofsError::IndexOutOfRange { index: 2, len: 2 }
        );
        let flat: Vec<usize> = t.rows().flatten().copied().collect();
        assert_eq!(flat, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn row_size_is_set_once() {
        let mut t = FixedWidthTable::<f64>::new();
        assert!(t.resize(2).is_err());
        t.set_row_size(2).unwrap();
        t.set_row_size(3).unwrap();
        t.resize(2).unwrap();
        assert_eq!(t.row(1).unwrap(), &[0.0; 3]);
        assert!(t.set_row_size(4).is_err());
        assert!(t.set_row_size(3).is_ok());
    }

    #[test]
    fn zero_width_rows() {
        let mut t = FixedWidthTable::<u8>::with_row_size(0);
        t.resize(4).unwrap();
        assert_eq!(t.rows().count(), 4);
        assert!(t.row(3).unwrap().is_empty());
    }

    #[test]
    fn lookup_resolves_through_space() {
        let mut a = FixedWidthTable::<u32>::with_row_size(1);
        a.resize(2).unwrap();
        let mut b = FixedWidthTable::<u32>::with_row_size(1);
        b.resize(3).unwrap();

        let mut space = UnifiedIndexSpace::<FixedWidthTable<u32>>::new();
        let link = space.link();
        a.set_lookup(link);
        let a = Arc::new(a);
        let b = Arc::new(b);
        space.add(a.clone());
        space.add(b.clone());

        let loc = a.locate(3, &space).unwrap();
        assert!(loc.is(&b, 1));

        space.reset();
        assert!(matches!(
            a.locate(0, &space),
            Err(MeshDofsError::Setup { .. })
        ));
        assert!(b.locate(0, &space).is_err());
    }
}
