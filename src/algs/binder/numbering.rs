//! Steps shared by both binding strategies: rank-ordered numbering of owned
//! DOFs and the request/answer round trip that resolves ghosts at their
//! owners.

use crate::algs::communicator::Communicator;
use crate::algs::exchange::Exchange;
use crate::mesh_error::MeshDofsError;
use crate::topology::ownership::DofOwnership;
use bytemuck::Pod;

/// Give every owned DOF its global id; returns the global DOF count.
///
/// Owned DOFs take consecutive ids in local index order, starting after all
/// DOFs owned by lower ranks.
pub(super) fn number_owned<C>(
    ex: &Exchange<'_, C>,
    ownership: &mut DofOwnership,
) -> Result<usize, MeshDofsError>
where
    C: Communicator + ?Sized,
{
    let owned: Vec<usize> = ownership.owned().collect();
    let counts = ex.agree(ex.all_gather_count(owned.len()))?;
    let offset: usize = counts[..ex.rank()].iter().sum();
    let total: usize = counts.iter().sum();
    for (i, &dof) in owned.iter().enumerate() {
        ownership.set_global_id(dof, offset + i)?;
    }
    log::debug!(
        "[bind] rank {}: {} owned DOFs numbered from {offset}, {total} in total",
        ex.rank(),
        owned.len()
    );
    Ok(total)
}

/// Send `requests[dst]` to each rank and collect the answers.
///
/// `answer(src, request)` runs on the receiving side. The answers addressed
/// back to a rank come in the order of its requests. A failing answer on any
/// rank fails the round trip on every rank.
pub(super) fn round_trip<C, Q, A, F>(
    ex: &Exchange<'_, C>,
    requests: Vec<Vec<Q>>,
    mut answer: F,
) -> Result<Vec<Vec<A>>, MeshDofsError>
where
    C: Communicator + ?Sized,
    Q: Pod,
    A: Pod,
    F: FnMut(usize, &Q) -> Result<A, MeshDofsError>,
{
    let sent: Vec<usize> = requests.iter().map(Vec::len).collect();
    let incoming = ex.agree(ex.all_to_all(requests))?;
    let replies = ex.agree(
        incoming
            .iter()
            .enumerate()
            .map(|(src, reqs)| reqs.iter().map(|q| answer(src, q)).collect())
            .collect::<Result<Vec<Vec<A>>, _>>(),
    )?;
    let answers = ex.all_to_all(replies).and_then(|answers| {
        for (dst, (got, &expected)) in answers.iter().zip(&sent).enumerate() {
            if got.len() != expected {
                return Err(MeshDofsError::BufferSizeMismatch {
                    neighbor: dst,
                    expected,
                    got: got.len(),
                });
            }
        }
        Ok(answers)
    });
    ex.agree(answers)
}
