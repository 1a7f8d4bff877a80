//! Thin façade over the two collective shapes the binder needs.
//!
//! Messages are *contiguous byte slices*. Both collectives are blocking: no
//! rank returns from one until every rank of the group has entered it, so a
//! rank that skips a collective deadlocks the others. Callers keep every rank
//! on the same sequence of calls (see `Exchange::agree`).
//!
//! Backends:
//! - [`NoComm`]: a single rank, everything is a local copy.
//! - [`LocalComm`]: a group of ranks living on threads of one process.
//! - `MpiComm` (feature `mpi-support`): `MPI_COMM_WORLD`.

use crate::mesh_error::MeshDofsError;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};

/// Collective communication interface (minimal by design).
pub trait Communicator {
    /// Rank of the calling process.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// Every rank contributes `send`; every rank receives all contributions,
    /// indexed by source rank.
    fn all_gather(&self, send: &[u8]) -> Result<Vec<Vec<u8>>, MeshDofsError>;

    /// `send[dst]` goes to rank `dst`; the result holds what each source rank
    /// addressed to the caller.
    fn all_to_all(&self, send: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, MeshDofsError>;
}

/// Single-rank communicator.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather(&self, send: &[u8]) -> Result<Vec<Vec<u8>>, MeshDofsError> {
        Ok(vec![send.to_vec()])
    }

    fn all_to_all(&self, mut send: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, MeshDofsError> {
        if send.len() != 1 {
            return Err(MeshDofsError::CommError {
                neighbor: 0,
                reason: format!("{} outgoing buffers for a group of 1", send.len()),
            });
        }
        Ok(vec![send.swap_remove(0)])
    }
}

// --- LocalComm: ranks on threads of one process ---

struct LocalGroup {
    size: usize,
    barrier: Barrier,
    /// `mailbox[src][dst]` for the collective in flight.
    mailbox: Mutex<Vec<Vec<Bytes>>>,
}

/// One rank of an in-process group; move each handle onto its own thread.
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    group: Arc<LocalGroup>,
}

impl LocalComm {
    /// Create the handles of a `size`-rank group, indexed by rank.
    pub fn group(size: usize) -> Vec<LocalComm> {
        let size = size.max(1);
        let group = Arc::new(LocalGroup {
            size,
            barrier: Barrier::new(size),
            mailbox: Mutex::new(vec![Vec::new(); size]),
        });
        (0..size)
            .map(|rank| LocalComm {
                rank,
                group: Arc::clone(&group),
            })
            .collect()
    }

    fn exchange(&self, outgoing: Vec<Bytes>) -> Vec<Vec<u8>> {
        self.group.mailbox.lock()[self.rank] = outgoing;
        self.group.barrier.wait();
        let incoming = {
            let mailbox = self.group.mailbox.lock();
            mailbox
                .iter()
                .map(|row| row.get(self.rank).map(|b| b.to_vec()).unwrap_or_default())
                .collect()
        };
        // nobody may post the next collective before everyone has read this one
        self.group.barrier.wait();
        incoming
    }
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.group.size)
            .finish()
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.group.size
    }

    fn all_gather(&self, send: &[u8]) -> Result<Vec<Vec<u8>>, MeshDofsError> {
        let payload = Bytes::copy_from_slice(send);
        Ok(self.exchange(vec![payload; self.group.size]))
    }

    fn all_to_all(&self, send: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, MeshDofsError> {
        let n = send.len();
        let mut outgoing: Vec<Bytes> = send.into_iter().map(Bytes::from).collect();
        outgoing.resize(self.group.size, Bytes::new());
        // still take part in the collective so the peers are not left waiting
        let incoming = self.exchange(outgoing);
        if n != self.group.size {
            return Err(MeshDofsError::CommError {
                neighbor: self.rank,
                reason: format!("{n} outgoing buffers for a group of {}", self.group.size),
            });
        }
        Ok(incoming)
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::Communicator;
    use crate::mesh_error::MeshDofsError;
    use mpi::Count;
    use mpi::datatype::{Partition, PartitionMut};
    use mpi::environment::Universe;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{Communicator as MpiCommunicator, CommunicatorCollectives};

    /// `MPI_COMM_WORLD` of an initialized MPI environment.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
        // finalizes MPI on drop; declared last so `world` goes first
        _universe: Universe,
    }

    impl MpiComm {
        /// Initialize MPI. Fails if it was initialized before.
        pub fn new() -> Result<Self, MeshDofsError> {
            let universe = mpi::initialize().ok_or_else(|| MeshDofsError::CommError {
                neighbor: 0,
                reason: "MPI is already initialized".into(),
            })?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }

        fn count(len: usize) -> Result<Count, MeshDofsError> {
            Count::try_from(len).map_err(|_| MeshDofsError::CommError {
                neighbor: 0,
                reason: format!("message of {len} bytes exceeds the MPI count range"),
            })
        }
    }

    fn displacements(counts: &[Count]) -> Vec<Count> {
        counts
            .iter()
            .scan(0, |acc, &c| {
                let d = *acc;
                *acc += c;
                Some(d)
            })
            .collect()
    }

    fn split(buf: Vec<u8>, counts: &[Count]) -> Vec<Vec<u8>> {
        let mut out = Vec::with_capacity(counts.len());
        let mut rest = &buf[..];
        for &c in counts {
            let (head, tail) = rest.split_at(c as usize);
            out.push(head.to_vec());
            rest = tail;
        }
        out
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn all_gather(&self, send: &[u8]) -> Result<Vec<Vec<u8>>, MeshDofsError> {
            let count = Self::count(send.len())?;
            let mut counts = vec![0 as Count; self.size];
            self.world.all_gather_into(&count, &mut counts[..]);
            let displs = displacements(&counts);
            let total: usize = counts.iter().map(|&c| c as usize).sum();
            let mut buf = vec![0u8; total];
            {
                let mut partition = PartitionMut::new(&mut buf[..], &counts[..], &displs[..]);
                self.world.all_gather_varcount_into(send, &mut partition);
            }
            Ok(split(buf, &counts))
        }

        fn all_to_all(&self, send: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, MeshDofsError> {
            if send.len() != self.size {
                return Err(MeshDofsError::CommError {
                    neighbor: self.rank,
                    reason: format!("{} outgoing buffers for a group of {}", send.len(), self.size),
                });
            }
            let send_counts = send
                .iter()
                .map(|b| Self::count(b.len()))
                .collect::<Result<Vec<_>, _>>()?;
            let mut recv_counts = vec![0 as Count; self.size];
            self.world
                .all_to_all_into(&send_counts[..], &mut recv_counts[..]);

            let flat: Vec<u8> = send.concat();
            let send_displs = displacements(&send_counts);
            let recv_displs = displacements(&recv_counts);
            let total: usize = recv_counts.iter().map(|&c| c as usize).sum();
            let mut buf = vec![0u8; total];
            {
                let outgoing = Partition::new(&flat[..], &send_counts[..], &send_displs[..]);
                let mut incoming =
                    PartitionMut::new(&mut buf[..], &recv_counts[..], &recv_displs[..]);
                self.world.all_to_all_varcount_into(&outgoing, &mut incoming);
            }
            Ok(split(buf, &recv_counts))
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
