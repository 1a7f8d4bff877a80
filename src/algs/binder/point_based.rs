//! Point-based binding: one DOF per distinct physical point.

use super::Bound;
use super::numbering::{number_owned, round_trip};
use crate::algs::communicator::Communicator;
use crate::algs::exchange::Exchange;
use crate::algs::wire::{WireKey, WireReply};
use crate::data::entity_space::EntitySpace;
use crate::data::table::FixedWidthTable;
use crate::geometry::coord_key::{CoordKey, CoordinateQuantizer};
use crate::geometry::elements::GeometricSupport;
use crate::mesh_error::MeshDofsError;
use crate::topology::ownership::DofOwnership;
use hashbrown::HashMap;
use itertools::Itertools;

/// DOFs found on this rank before any exchange.
struct LocalPoints {
    keys: Vec<CoordKey>,
    index: HashMap<CoordKey, usize>,
    coordinates: FixedWidthTable<f64>,
    ownership: DofOwnership,
}

pub(super) fn bind<S, C>(
    ex: &Exchange<'_, C>,
    mut spaces: Vec<EntitySpace<S>>,
    dim: usize,
    quantizer: CoordinateQuantizer,
) -> Result<Bound<S>, MeshDofsError>
where
    S: GeometricSupport,
    C: Communicator + ?Sized,
{
    let mut local = ex.agree(collect(&mut spaces, dim, quantizer, ex.rank()))?;
    log::debug!(
        "[bind] rank {}: {} distinct points in {} region(s)",
        ex.rank(),
        local.keys.len(),
        spaces.len()
    );
    resolve_owners(ex, &mut local)?;
    let global_size = number_owned(ex, &mut local.ownership)?;
    resolve_ghosts(ex, &mut local)?;
    Ok(Bound {
        spaces,
        coordinates: local.coordinates,
        ownership: local.ownership,
        global_size,
    })
}

/// Evaluate every state, merge coincident points and fill the tables.
///
/// A new DOF starts owned by the rank of the first element touching it and
/// is lowered to the smallest rank among the local elements touching it.
fn collect<S: GeometricSupport>(
    spaces: &mut [EntitySpace<S>],
    dim: usize,
    quantizer: CoordinateQuantizer,
    my_rank: usize,
) -> Result<LocalPoints, MeshDofsError> {
    let mut local = LocalPoints {
        keys: Vec::new(),
        index: HashMap::new(),
        coordinates: FixedWidthTable::with_row_size(dim),
        ownership: DofOwnership::new(my_rank),
    };
    let mut ambiguous = 0usize;
    let mut point = vec![0.0; dim];
    for space in spaces.iter_mut() {
        let support = std::sync::Arc::clone(space.support()?);
        let layout = space.layout().clone();
        let mut row = vec![0usize; layout.nb_states()];
        for e in 0..support.element_count() {
            let rank = support.element_rank(e)?;
            for (s, slot) in row.iter_mut().enumerate() {
                support.evaluate(e, layout.weights(s), &mut point)?;
                if quantizer.is_ambiguous(&point) {
                    ambiguous += 1;
                }
                let key = quantizer.key(&point)?;
                *slot = match local.index.get(&key) {
                    Some(&dof) => {
                        local.ownership.set_owner_min(dof, rank)?;
                        dof
                    }
                    None => {
                        let dof = local.ownership.push(Some(rank));
                        local.coordinates.push_row(&point)?;
                        local.keys.push(key);
                        local.index.insert(key, dof);
                        dof
                    }
                };
            }
            space.set_dofs(e, &row)?;
        }
    }
    if ambiguous > 0 {
        log::warn!(
            "[bind] rank {my_rank}: {ambiguous} point(s) lie within 1% of a tolerance cell \
             boundary; coincident points may fail to merge"
        );
    }
    Ok(local)
}

/// Lower every owner to the smallest rank touching the point anywhere.
///
/// Each rank publishes the keys of DOFs it does not already give to rank 0;
/// every other rank holding the same key answers with its local owner.
fn resolve_owners<C>(ex: &Exchange<'_, C>, local: &mut LocalPoints) -> Result<(), MeshDofsError>
where
    C: Communicator + ?Sized,
{
    if ex.is_serial() {
        return Ok(());
    }
    let asked: Vec<usize> = (0..local.keys.len())
        .filter(|&d| !local.ownership.is_owned_by(d, 0))
        .collect();
    let mine: Vec<WireKey> = asked.iter().map(|&d| WireKey::new(local.keys[d])).collect();
    let published = ex.agree(ex.all_gather(&mine))?;

    let replies = ex.agree(
        published
            .iter()
            .enumerate()
            .map(|(src, keys)| {
                if src == ex.rank() {
                    return Ok(Vec::new());
                }
                keys.iter()
                    .enumerate()
                    .filter_map(|(i, k)| local.index.get(&k.key()).map(|&d| (i, d)))
                    .map(|(i, d)| local.ownership.owner(d).map(|o| WireReply::new(i, o)))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<Vec<WireReply>>, MeshDofsError>>(),
    )?;

    let received = ex.agree(ex.all_to_all(replies))?;
    let applied = received
        .iter()
        .enumerate()
        .flat_map(|(src, rs)| rs.iter().map(move |r| (src, r)))
        .try_for_each(|(src, r)| {
            let dof = *asked.get(r.index()).ok_or_else(|| {
                MeshDofsError::InvalidStructure(format!(
                    "rank {src} answered for point {} of {} published",
                    r.index(),
                    asked.len()
                ))
            })?;
            local.ownership.set_owner_min(dof, r.value())
        });
    ex.agree(applied)
}

/// Fetch the global id of every ghost from its owner.
fn resolve_ghosts<C>(ex: &Exchange<'_, C>, local: &mut LocalPoints) -> Result<(), MeshDofsError>
where
    C: Communicator + ?Sized,
{
    let mut requests: Vec<Vec<WireKey>> = vec![Vec::new(); ex.size()];
    let mut requested: Vec<Vec<usize>> = vec![Vec::new(); ex.size()];
    let routed = local.ownership.ghosts().try_for_each(|dof| {
        let owner = local.ownership.owner(dof)?;
        let slot = requests.get_mut(owner).ok_or_else(|| {
            MeshDofsError::InvalidStructure(format!(
                "DOF {dof} is owned by rank {owner}, outside a group of {}",
                ex.size()
            ))
        })?;
        slot.push(WireKey::new(local.keys[dof]));
        requested[owner].push(dof);
        Ok::<(), MeshDofsError>(())
    });
    ex.agree(routed)?;
    log::debug!(
        "[bind] rank {}: ghost points per owner {:?}",
        ex.rank(),
        requested
            .iter()
            .positions(|r| !r.is_empty())
            .map(|owner| (owner, requested[owner].len()))
            .collect_vec()
    );

    let me = ex.rank();
    let ownership = &local.ownership;
    let index = &local.index;
    let answers = round_trip(ex, requests, |src, k: &WireKey| {
        let key = k.key();
        let dof = *index.get(&key).ok_or_else(|| {
            MeshDofsError::ValueNotFound(format!(
                "rank {src} asked rank {me} for point {key:?}, which it does not hold"
            ))
        })?;
        if !ownership.is_owned_by(dof, me) {
            return Err(MeshDofsError::InvalidStructure(format!(
                "rank {src} asked rank {me} for point {key:?}, owned by rank {:?}",
                ownership.entry(dof)?.owner
            )));
        }
        Ok(WireReply::new(dof, ownership.global_id(dof)?))
    })?;

    let assigned = requested
        .iter()
        .zip(&answers)
        .flat_map(|(dofs, replies)| dofs.iter().zip(replies))
        .try_for_each(|(&dof, reply)| local.ownership.set_global_id(dof, reply.value()))
        .and_then(|()| match local.ownership.unresolved().next() {
            Some(dof) => Err(MeshDofsError::InvalidStructure(format!(
                "DOF {dof} on rank {me} has no global id after ghost resolution"
            ))),
            None => Ok(()),
        });
    ex.agree(assigned)
}
