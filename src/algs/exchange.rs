//! Typed collectives on top of a [`Communicator`].
//!
//! [`Exchange`] encodes wire records, short-circuits single-rank groups
//! without touching the backend, and provides [`Exchange::agree`], the
//! status vote every distributed phase runs before its next collective.

use crate::algs::communicator::Communicator;
use crate::algs::wire::{WireCount, decode, encode};
use crate::mesh_error::MeshDofsError;
use bytemuck::Pod;

/// Collective helper bound to one communicator.
pub struct Exchange<'c, C: ?Sized> {
    comm: &'c C,
    rank: usize,
    size: usize,
}

impl<'c, C> Exchange<'c, C>
where
    C: Communicator + ?Sized,
{
    pub fn new(comm: &'c C) -> Self {
        let size = comm.size().max(1);
        let rank = if size == 1 { 0 } else { comm.rank() };
        Self { comm, rank, size }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_serial(&self) -> bool {
        self.size == 1
    }

    /// Every rank's `local` records, indexed by source rank.
    pub fn all_gather<T: Pod>(&self, local: &[T]) -> Result<Vec<Vec<T>>, MeshDofsError> {
        if self.is_serial() {
            return Ok(vec![local.to_vec()]);
        }
        let gathered = self.comm.all_gather(&encode(local))?;
        if gathered.len() != self.size {
            return Err(MeshDofsError::CommError {
                neighbor: self.rank,
                reason: format!("all-gather returned {} buffers", gathered.len()),
            });
        }
        gathered
            .iter()
            .enumerate()
            .map(|(src, bytes)| decode(bytes, src))
            .collect()
    }

    /// Send `outgoing[dst]` to each `dst`; returns what each source sent here.
    pub fn all_to_all<T: Pod>(&self, outgoing: Vec<Vec<T>>) -> Result<Vec<Vec<T>>, MeshDofsError> {
        if outgoing.len() != self.size {
            return Err(MeshDofsError::CommError {
                neighbor: self.rank,
                reason: format!(
                    "{} outgoing lists for a group of {}",
                    outgoing.len(),
                    self.size
                ),
            });
        }
        if self.is_serial() {
            return Ok(outgoing);
        }
        let bytes = outgoing.iter().map(|recs| encode(recs)).collect();
        let incoming = self.comm.all_to_all(bytes)?;
        incoming
            .iter()
            .enumerate()
            .map(|(src, bytes)| decode(bytes, src))
            .collect()
    }

    /// Every rank's `n`, indexed by rank.
    pub fn all_gather_count(&self, n: usize) -> Result<Vec<usize>, MeshDofsError> {
        let gathered = self.all_gather(&[WireCount::new(n)])?;
        gathered
            .into_iter()
            .enumerate()
            .map(|(src, recs)| match recs.as_slice() {
                [c] => Ok(c.get()),
                _ => Err(MeshDofsError::BufferSizeMismatch {
                    neighbor: src,
                    expected: 1,
                    got: recs.len(),
                }),
            })
            .collect()
    }

    /// Vote on the outcome of a local step.
    ///
    /// Every rank calls this unconditionally. If any rank failed, all ranks
    /// return an error: the failing ones their own, the others
    /// [`MeshDofsError::PeerFailure`]. This keeps ranks from diverging on the
    /// sequence of collectives that follows.
    pub fn agree<T>(&self, local: Result<T, MeshDofsError>) -> Result<T, MeshDofsError> {
        if self.is_serial() {
            return local;
        }
        let flag = [u8::from(local.is_err())];
        let flags = self.comm.all_gather(&flag)?;
        let failed: Vec<usize> = flags
            .iter()
            .enumerate()
            .filter(|(_, f)| f.first().copied().unwrap_or(1) != 0)
            .map(|(r, _)| r)
            .collect();
        match local {
            Err(e) => Err(e),
            Ok(v) if failed.is_empty() => Ok(v),
            Ok(_) => {
                log::warn!("rank {}: aborting, ranks {failed:?} failed", self.rank);
                Err(MeshDofsError::PeerFailure { ranks: failed })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalComm, NoComm};
    use crate::algs::wire::WireReply;

    #[test]
    fn serial_exchange_is_local() {
        let ex = Exchange::new(&NoComm);
        let gathered = ex.all_gather(&[WireReply::new(1, 2)]).unwrap();
        assert_eq!(gathered, vec![vec![WireReply::new(1, 2)]]);
        assert_eq!(ex.all_gather_count(7).unwrap(), vec![7]);
        assert!(ex.all_to_all::<WireReply>(vec![vec![], vec![]]).is_err());
        let bad: Result<(), _> = Err(MeshDofsError::setup("x"));
        assert!(matches!(ex.agree(bad), Err(MeshDofsError::Setup { .. })));
    }

    #[test]
    fn one_failure_fails_everyone() {
        let comms = LocalComm::group(2);
        let outcomes: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let ex = Exchange::new(comm);
                        let local = if ex.rank() == 1 {
                            Err(MeshDofsError::ValueNotFound("x".into()))
                        } else {
                            Ok(())
                        };
                        ex.agree(local)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(
            outcomes[0],
            Err(MeshDofsError::PeerFailure { ranks: vec![1] })
        );
        assert!(matches!(outcomes[1], Err(MeshDofsError::ValueNotFound(_))));
    }
}
