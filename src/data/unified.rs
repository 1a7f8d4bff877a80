//! UnifiedIndexSpace: one continuous index range over many containers.
//!
//! Each registered provider owns the contiguous slice
//! `start[k]..start[k + 1]` of the unified range. Lookups in both directions
//! are cheap: [`UnifiedIndexSpace::location`] binary-searches the start
//! offsets (O(log P)), [`UnifiedIndexSpace::unified_idx`] is a hash lookup
//! plus an addition.
//!
//! Providers are compared by identity (the address behind their `Arc`), never
//! by value, so two equal-looking containers are still two providers.
//!
//! # Validity
//! [`Location`]s and [`LookupLink`]s obtained from a space are valid until its
//! next [`reset`](UnifiedIndexSpace::reset) or
//! [`refresh`](UnifiedIndexSpace::refresh). Links carry the generation they
//! were issued in and are rejected afterwards.

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshDofsError;
use hashbrown::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Anything that occupies a number of slots in a unified range.
pub trait DataProvider {
    /// Number of entries this provider contributes.
    fn size(&self) -> usize;

    /// Human-readable name used in error messages.
    fn provider_name(&self) -> &str {
        "<anonymous>"
    }
}

impl<T> DataProvider for Vec<T> {
    fn size(&self) -> usize {
        self.len()
    }
}

static NEXT_SPACE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`UnifiedIndexSpace`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpaceId(u64);

/// Non-owning back reference from a table to the space that indexes it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LookupLink {
    space: SpaceId,
    generation: u64,
}

impl LookupLink {
    /// Identity of the linked space.
    pub fn space(&self) -> SpaceId {
        self.space
    }

    /// Generation of the linked space when the link was issued.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of resolving a unified index.
pub struct Location<'a, P: ?Sized> {
    /// The provider owning the index.
    pub provider: &'a Arc<P>,
    /// Position of the provider in registration order.
    pub provider_index: usize,
    /// Index local to the provider.
    pub local: usize,
}

impl<P: ?Sized> Location<'_, P> {
    /// Whether this location points into `provider` at `local`.
    pub fn is(&self, provider: &Arc<P>, local: usize) -> bool {
        Arc::ptr_eq(self.provider, provider) && self.local == local
    }
}

impl<P: ?Sized> fmt::Debug for Location<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Location")
            .field("provider_index", &self.provider_index)
            .field("local", &self.local)
            .finish()
    }
}

#[inline]
fn identity<P: ?Sized>(provider: &Arc<P>) -> usize {
    Arc::as_ptr(provider) as *const () as usize
}

/// Continuous `0..size()` index over an ordered list of providers.
pub struct UnifiedIndexSpace<P: ?Sized + DataProvider> {
    id: SpaceId,
    generation: u64,
    providers: Vec<Arc<P>>,
    /// `providers.len() + 1` entries, the last one being `size()`.
    start: Vec<usize>,
    position: HashMap<usize, usize>,
}

impl<P: ?Sized + DataProvider> Default for UnifiedIndexSpace<P> {
    fn default() -> Self {
        Self {
            id: SpaceId(NEXT_SPACE_ID.fetch_add(1, Ordering::Relaxed)),
            generation: 0,
            providers: Vec::new(),
            start: vec![0],
            position: HashMap::new(),
        }
    }
}

impl<P: ?Sized + DataProvider> fmt::Debug for UnifiedIndexSpace<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnifiedIndexSpace")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("start", &self.start)
            .finish()
    }
}

impl<P: ?Sized + DataProvider> UnifiedIndexSpace<P> {
    /// Create an empty space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` and return its position.
    ///
    /// Adding a provider that is already registered is a no-op returning its
    /// existing position.
    pub fn add(&mut self, provider: Arc<P>) -> usize {
        let key = identity(&provider);
        if let Some(&pos) = self.position.get(&key) {
            return pos;
        }
        let pos = self.providers.len();
        let end = self.size() + provider.size();
        self.start.push(end);
        self.position.insert(key, pos);
        self.providers.push(provider);
        self.debug_assert_invariants();
        pos
    }

    /// Total number of unified indices.
    #[inline]
    pub fn size(&self) -> usize {
        self.start.last().copied().unwrap_or(0)
    }

    /// Number of registered providers.
    #[inline]
    pub fn nb_providers(&self) -> usize {
        self.providers.len()
    }

    /// Providers in registration order.
    pub fn providers(&self) -> &[Arc<P>] {
        &self.providers
    }

    /// Start offsets, including the trailing sentinel.
    pub fn start_indices(&self) -> &[usize] {
        &self.start
    }

    /// Whether `provider` is registered (by identity).
    pub fn contains(&self, provider: &Arc<P>) -> bool {
        self.position.contains_key(&identity(provider))
    }

    /// Position of `provider` in registration order.
    pub fn provider_index(&self, provider: &Arc<P>) -> Result<usize, MeshDofsError> {
        self.position
            .get(&identity(provider))
            .copied()
            .ok_or_else(|| {
                MeshDofsError::ValueNotFound(format!(
                    "provider `{}` is not part of this index space",
                    provider.provider_name()
                ))
            })
    }

    /// Resolve unified index `idx` to `(provider, local index)`.
    pub fn location(&self, idx: usize) -> Result<Location<'_, P>, MeshDofsError> {
        let len = self.size();
        if idx >= len {
            return Err(MeshDofsError::IndexOutOfRange { index: idx, len });
        }
        // upper_bound(start, idx) - 1; empty providers share a start with
        // their successor and are skipped.
        let provider_index = self.start.partition_point(|&s| s <= idx) - 1;
        Ok(Location {
            provider: &self.providers[provider_index],
            provider_index,
            local: idx - self.start[provider_index],
        })
    }

    /// Unified index of `local` inside `provider`.
    pub fn unified_idx(&self, provider: &Arc<P>, local: usize) -> Result<usize, MeshDofsError> {
        let pos = self.provider_index(provider)?;
        self.unified_idx_at(pos, local)
    }

    /// Unified index of `local` inside the provider at position `pos`.
    pub fn unified_idx_at(&self, pos: usize, local: usize) -> Result<usize, MeshDofsError> {
        if pos >= self.providers.len() {
            return Err(MeshDofsError::IndexOutOfRange {
                index: pos,
                len: self.providers.len(),
            });
        }
        let (begin, end) = (self.start[pos], self.start[pos + 1]);
        if local >= end - begin {
            return Err(MeshDofsError::IndexOutOfRange {
                index: local,
                len: end - begin,
            });
        }
        Ok(begin + local)
    }

    /// Recompute start offsets from the providers' current sizes.
    ///
    /// Invalidates previously issued links.
    pub fn refresh(&mut self) {
        let mut acc = 0;
        self.start.clear();
        self.start.push(0);
        for p in &self.providers {
            acc += p.size();
            self.start.push(acc);
        }
        self.generation += 1;
        self.debug_assert_invariants();
    }

    /// Drop every provider. Invalidates previously issued links.
    pub fn reset(&mut self) {
        self.providers.clear();
        self.position.clear();
        self.start.clear();
        self.start.push(0);
        self.generation += 1;
    }

    /// Identity of this space.
    pub fn id(&self) -> SpaceId {
        self.id
    }

    /// Bumped by every [`reset`](Self::reset) and [`refresh`](Self::refresh).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Issue a back reference for tables indexed by this space.
    pub fn link(&self) -> LookupLink {
        LookupLink {
            space: self.id,
            generation: self.generation,
        }
    }

    /// Check that `link` was issued by this space and is still current.
    pub fn check_link(&self, link: LookupLink) -> Result<(), MeshDofsError> {
        if link.space != self.id {
            return Err(MeshDofsError::setup(
                "lookup link refers to a different index space",
            ));
        }
        if link.generation != self.generation {
            return Err(MeshDofsError::setup(format!(
                "lookup link is stale (generation {} vs {})",
                link.generation, self.generation
            )));
        }
        Ok(())
    }
}

impl<P: ?Sized + DataProvider> DebugInvariants for UnifiedIndexSpace<P> {
    fn validate_invariants(&self) -> Result<(), MeshDofsError> {
        if self.start.len() != self.providers.len() + 1 || self.start.first() != Some(&0) {
            return Err(MeshDofsError::InvalidStructure(format!(
                "{} start offsets for {} providers",
                self.start.len(),
                self.providers.len()
            )));
        }
        for (k, (w, p)) in self.start.windows(2).zip(&self.providers).enumerate() {
            if w[1] < w[0] || w[1] - w[0] != p.size() {
                return Err(MeshDofsError::InvalidStructure(format!(
                    "provider {k} (`{}`) spans {}..{} but has size {}; offsets are stale",
                    p.provider_name(),
                    w[0],
                    w[1],
                    p.size()
                )));
            }
        }
        if self.position.len() != self.providers.len() {
            return Err(MeshDofsError::InvalidStructure(
                "provider identity map out of sync".into(),
            ));
        }
        Ok(())
    }
}
