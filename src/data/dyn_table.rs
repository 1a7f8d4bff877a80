//! DynamicSparseTable: variable-length rows with buffered, amortized mutation.
//!
//! The persistent rows of a [`DynamicSparseTable`] only change through a
//! [`RowBuffer`]. The buffer queues new rows in fixed-size chunks, records
//! removals on two free lists (rows living in persistent storage vs rows that
//! are still buffered) and applies everything in one [`RowBuffer::flush`].
//!
//! Because the buffer holds the table's `&mut` borrow, iterating the
//! persistent rows while mutations are pending does not compile; a flush is a
//! checked state transition rather than a convention.
//!
//! # Compaction
//! When more rows were removed than added, flushing shrinks the storage by
//! swapping trailing occupied rows into the freed slots below the new end and
//! truncating. The cost is proportional to the number of removed rows, not to
//! the table length. Rows that move are reported through [`Relocations`].

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshDofsError;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

/// Number of rows per buffer chunk unless configured otherwise.
pub const DEFAULT_BUFFER_CHUNK: usize = 1024;

/// Ordered sequence of variable-length rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DynamicSparseTable<T> {
    rows: Vec<Vec<T>>,
    buffer_chunk: usize,
}

impl<T> Default for DynamicSparseTable<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            buffer_chunk: DEFAULT_BUFFER_CHUNK,
        }
    }
}

impl<T> From<Vec<Vec<T>>> for DynamicSparseTable<T> {
    fn from(rows: Vec<Vec<T>>) -> Self {
        Self {
            rows,
            buffer_chunk: DEFAULT_BUFFER_CHUNK,
        }
    }
}

impl<T> DynamicSparseTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table whose buffers allocate `chunk` rows at a time.
    ///
    /// A zero chunk size is bumped to one.
    pub fn with_buffer_chunk(chunk: usize) -> Self {
        Self {
            rows: Vec::new(),
            buffer_chunk: chunk.max(1),
        }
    }

    /// Rows per buffer chunk.
    #[inline]
    pub fn buffer_chunk(&self) -> usize {
        self.buffer_chunk
    }

    /// Number of persistent rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Read-only view of row `idx`.
    pub fn row(&self, idx: usize) -> Result<&[T], MeshDofsError> {
        self.rows
            .get(idx)
            .map(Vec::as_slice)
            .ok_or(MeshDofsError::IndexOutOfRange {
                index: idx,
                len: self.rows.len(),
            })
    }

    /// Mutable view of row `idx`. The row length cannot change through it.
    pub fn row_mut(&mut self, idx: usize) -> Result<&mut [T], MeshDofsError> {
        let len = self.rows.len();
        self.rows
            .get_mut(idx)
            .map(Vec::as_mut_slice)
            .ok_or(MeshDofsError::IndexOutOfRange { index: idx, len })
    }

    /// Length of row `idx`.
    pub fn row_len(&self, idx: usize) -> Result<usize, MeshDofsError> {
        self.row(idx).map(<[T]>::len)
    }

    /// Iterate over all persistent rows in index order.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Drop every row.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Open a mutation buffer. Pending changes land on [`flush`](RowBuffer::flush)
    /// or when the buffer is dropped.
    pub fn create_buffer(&mut self) -> RowBuffer<'_, T> {
        RowBuffer {
            table: self,
            chunks: Vec::new(),
            buffered: 0,
            empty_storage: Vec::new(),
            empty_buffer: Vec::new(),
            removed: HashSet::new(),
        }
    }

    /// Consume the table and return its rows.
    pub fn into_rows(self) -> Vec<Vec<T>> {
        self.rows
    }
}

impl<T> DebugInvariants for DynamicSparseTable<T> {
    fn validate_invariants(&self) -> Result<(), MeshDofsError> {
        if self.buffer_chunk == 0 {
            return Err(MeshDofsError::InvalidStructure(
                "buffer chunk size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Old → new logical index of every row a flush moved.
///
/// Rows that kept their index are absent; [`resolve`](Self::resolve) maps them
/// to themselves.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Relocations {
    moves: HashMap<usize, usize>,
}

impl Relocations {
    /// Index a row had before the flush → index after the flush.
    pub fn resolve(&self, old: usize) -> usize {
        self.moves.get(&old).copied().unwrap_or(old)
    }

    /// Number of moved rows.
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Whether nothing moved.
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Iterate `(old, new)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.moves.iter().map(|(&from, &to)| (from, to))
    }

    fn record(&mut self, from: usize, to: usize) {
        if from != to {
            self.moves.insert(from, to);
        }
    }
}

/// Pending mutations of a [`DynamicSparseTable`].
///
/// Logical indices cover the persistent rows first and the buffered rows
/// after them: `0..table.len()` then `table.len()..table.len() + buffered`.
pub struct RowBuffer<'a, T> {
    table: &'a mut DynamicSparseTable<T>,
    chunks: Vec<Vec<Vec<T>>>,
    buffered: usize,
    /// Removed rows that live in persistent storage (logical == storage index).
    empty_storage: Vec<usize>,
    /// Removed rows that live in the buffer (buffer positions).
    empty_buffer: Vec<usize>,
    removed: HashSet<usize>,
}

impl<T> RowBuffer<'_, T> {
    #[inline]
    fn base(&self) -> usize {
        self.table.rows.len()
    }

    /// One past the highest addressable logical index.
    #[inline]
    pub fn capacity_end(&self) -> usize {
        self.base() + self.buffered
    }

    /// Logical row count: persistent + buffered − removed.
    pub fn len(&self) -> usize {
        self.capacity_end() - self.removed.len()
    }

    /// Whether no logical rows remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a flush would change the table.
    pub fn is_dirty(&self) -> bool {
        self.buffered > 0 || !self.removed.is_empty()
    }

    fn slot(&self, pos: usize) -> &Vec<T> {
        let chunk = self.table.buffer_chunk;
        &self.chunks[pos / chunk][pos % chunk]
    }

    fn slot_mut(&mut self, pos: usize) -> &mut Vec<T> {
        let chunk = self.table.buffer_chunk;
        &mut self.chunks[pos / chunk][pos % chunk]
    }

    /// Queue `row` and return its logical index.
    ///
    /// A buffered slot freed by [`rm_row`](Self::rm_row) is reused before the
    /// buffer grows. Persistent storage is never touched.
    pub fn add_row(&mut self, row: impl Into<Vec<T>>) -> usize {
        let row = row.into();
        if let Some(pos) = self.empty_buffer.pop() {
            let idx = self.base() + pos;
            self.removed.remove(&idx);
            *self.slot_mut(pos) = row;
            return idx;
        }
        let chunk = self.table.buffer_chunk;
        if self.chunks.last().is_none_or(|c| c.len() == chunk) {
            self.chunks.push(Vec::with_capacity(chunk));
        }
        if let Some(last) = self.chunks.last_mut() {
            last.push(row);
        }
        self.buffered += 1;
        self.base() + self.buffered - 1
    }

    /// Mark the row at logical index `idx` empty.
    pub fn rm_row(&mut self, idx: usize) -> Result<(), MeshDofsError> {
        let end = self.capacity_end();
        if idx >= end {
            return Err(MeshDofsError::IndexOutOfRange {
                index: idx,
                len: end,
            });
        }
        if !self.removed.insert(idx) {
            return Err(MeshDofsError::ValueNotFound(format!(
                "row {idx} was already removed"
            )));
        }
        let base = self.base();
        if idx < base {
            self.empty_storage.push(idx);
        } else {
            let pos = idx - base;
            self.slot_mut(pos).clear();
            self.empty_buffer.push(pos);
        }
        Ok(())
    }

    /// Contents of logical row `idx`; removed rows read as empty.
    pub fn row(&self, idx: usize) -> Result<&[T], MeshDofsError> {
        let end = self.capacity_end();
        if idx >= end {
            return Err(MeshDofsError::IndexOutOfRange {
                index: idx,
                len: end,
            });
        }
        if self.removed.contains(&idx) {
            return Ok(&[]);
        }
        let base = self.base();
        if idx < base {
            Ok(&self.table.rows[idx])
        } else {
            Ok(self.slot(idx - base))
        }
    }

    /// Whether logical row `idx` has been removed since the last flush.
    pub fn is_removed(&self, idx: usize) -> bool {
        self.removed.contains(&idx)
    }

    /// Apply all pending additions and removals to persistent storage.
    ///
    /// Buffered rows fill removed persistent slots (lowest first) before the
    /// storage grows. If the table shrinks, remaining holes below the new end
    /// are filled by swapping in occupied rows from above it, then the storage
    /// is truncated. All free lists are empty afterwards.
    pub fn flush(&mut self) -> Relocations {
        self.debug_assert_invariants();
        let mut relocations = Relocations::default();
        if !self.is_dirty() {
            return relocations;
        }

        let storage_len = self.base();
        let new_size = self.len();

        let mut holes = std::mem::take(&mut self.empty_storage);
        // popped from the back: lowest slot first
        holes.sort_unstable_by(|a, b| b.cmp(a));
        let dead_buffered: HashSet<usize> = self.empty_buffer.drain(..).collect();
        let chunks = std::mem::take(&mut self.chunks);

        for (pos, row) in chunks.into_iter().flatten().enumerate() {
            if dead_buffered.contains(&pos) {
                continue;
            }
            let from = storage_len + pos;
            let to = match holes.pop() {
                Some(slot) => {
                    self.table.rows[slot] = row;
                    slot
                }
                None => {
                    self.table.rows.push(row);
                    self.table.rows.len() - 1
                }
            };
            relocations.record(from, to);
        }

        if !holes.is_empty() {
            debug_assert!(new_size <= storage_len);
            let hole_set: HashSet<usize> = holes.iter().copied().collect();
            let mut donors = (new_size..storage_len)
                .rev()
                .filter(|i| !hole_set.contains(i));
            holes.sort_unstable();
            for &hole in holes.iter().take_while(|&&h| h < new_size) {
                match donors.next() {
                    Some(donor) => {
                        self.table.rows.swap(hole, donor);
                        relocations.record(donor, hole);
                    }
                    None => debug_assert!(false, "free list out of sync with storage"),
                }
            }
            self.table.rows.truncate(new_size);
        }

        self.buffered = 0;
        self.removed.clear();
        log::trace!(
            "flushed dynamic table: {storage_len} -> {} rows, {} relocated",
            self.table.rows.len(),
            relocations.len()
        );
        relocations
    }
}

impl<T> DebugInvariants for RowBuffer<'_, T> {
    fn validate_invariants(&self) -> Result<(), MeshDofsError> {
        let listed = self.empty_storage.len() + self.empty_buffer.len();
        if listed != self.removed.len() {
            return Err(MeshDofsError::InvalidStructure(format!(
                "free lists hold {listed} rows but {} are marked removed",
                self.removed.len()
            )));
        }
        let base = self.base();
        if let Some(&bad) = self.empty_storage.iter().find(|&&i| i >= base) {
            return Err(MeshDofsError::IndexOutOfRange {
                index: bad,
                len: base,
            });
        }
        if let Some(&bad) = self.empty_buffer.iter().find(|&&p| p >= self.buffered) {
            return Err(MeshDofsError::IndexOutOfRange {
                index: base + bad,
                len: self.capacity_end(),
            });
        }
        Ok(())
    }
}

impl<T> Drop for RowBuffer<'_, T> {
    fn drop(&mut self) {
        if self.is_dirty() {
            self.flush();
        }
    }
}
