//! Element-based binding: every element owns a contiguous block of DOFs.
//!
//! Ghost elements are matched to their owner's copy by centroid key, so two
//! elements of one rank must never share a centroid.

use super::Bound;
use super::numbering::{number_owned, round_trip};
use crate::algs::communicator::Communicator;
use crate::algs::exchange::Exchange;
use crate::algs::wire::{WireElementKey, WireRun};
use crate::data::entity_space::EntitySpace;
use crate::data::table::FixedWidthTable;
use crate::geometry::coord_key::{CoordKey, CoordinateQuantizer};
use crate::geometry::elements::GeometricSupport;
use crate::mesh_error::MeshDofsError;
use crate::topology::ownership::DofOwnership;
use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use std::sync::Arc;

/// One element, addressed by its unified index across regions.
#[derive(Copy, Clone, Debug)]
struct ElementBlock {
    key: CoordKey,
    rank: usize,
    first_dof: usize,
    states: usize,
}

struct LocalElements {
    blocks: Vec<ElementBlock>,
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
        "[bind] rank {}: {} elements carry {} DOFs",
        ex.rank(),
        local.blocks.len(),
        local.ownership.len()
    );
    let global_size = number_owned(ex, &mut local.ownership)?;
    resolve_ghosts(ex, &mut local)?;
    Ok(Bound {
        spaces,
        coordinates: local.coordinates,
        ownership: local.ownership,
        global_size,
    })
}

fn collect<S: GeometricSupport>(
    spaces: &mut [EntitySpace<S>],
    dim: usize,
    quantizer: CoordinateQuantizer,
    my_rank: usize,
) -> Result<LocalElements, MeshDofsError> {
    let mut local = LocalElements {
        blocks: Vec::new(),
        index: HashMap::new(),
        coordinates: FixedWidthTable::with_row_size(dim),
        ownership: DofOwnership::new(my_rank),
    };
    let mut point = vec![0.0; dim];
    for space in spaces.iter_mut() {
        let support = Arc::clone(space.support()?);
        let layout = space.layout().clone();
        let states = layout.nb_states();
        space.make_proxy(local.ownership.len())?;

        let centroid = vec![1.0 / layout.nb_nodes().max(1) as f64; layout.nb_nodes()];
        for e in 0..support.element_count() {
            let rank = support.element_rank(e)?;
            support.evaluate(e, &centroid, &mut point)?;
            let key = quantizer.key(&point)?;
            let unified = local.blocks.len();
            match local.index.entry(key) {
                Entry::Occupied(first) => {
                    return Err(MeshDofsError::DuplicateSignature {
                        first: *first.get(),
                        second: unified,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(unified);
                }
            }
            local.blocks.push(ElementBlock {
                key,
                rank,
                first_dof: local.ownership.len(),
                states,
            });
            for s in 0..states {
                support.evaluate(e, layout.weights(s), &mut point)?;
                local.coordinates.push_row(&point)?;
                local.ownership.push(Some(rank));
            }
        }
    }
    Ok(local)
}

/// Fetch the global ids of every ghost element's block from its owner.
fn resolve_ghosts<C>(ex: &Exchange<'_, C>, local: &mut LocalElements) -> Result<(), MeshDofsError>
where
    C: Communicator + ?Sized,
{
    let me = ex.rank();
    let mut requests: Vec<Vec<WireElementKey>> = vec![Vec::new(); ex.size()];
    let mut requested: Vec<Vec<usize>> = vec![Vec::new(); ex.size()];
    let routed = local
        .blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.rank != me)
        .try_for_each(|(u, b)| {
            let slot = requests.get_mut(b.rank).ok_or_else(|| {
                MeshDofsError::InvalidStructure(format!(
                    "element {u} is owned by rank {}, outside a group of {}",
                    b.rank,
                    ex.size()
                ))
            })?;
            slot.push(WireElementKey::new(b.key, b.states));
            requested[b.rank].push(u);
            Ok::<(), MeshDofsError>(())
        });
    ex.agree(routed)?;

    let blocks = &local.blocks;
    let index = &local.index;
    let ownership = &local.ownership;
    let answers = round_trip(ex, requests, |src, req: &WireElementKey| {
        let key = req.key.key();
        let u = *index.get(&key).ok_or_else(|| {
            MeshDofsError::ValueNotFound(format!(
                "rank {src} asked rank {me} for the element at {key:?}, which it does not hold"
            ))
        })?;
        let block = blocks[u];
        if block.rank != me {
            return Err(MeshDofsError::InvalidStructure(format!(
                "rank {src} asked rank {me} for element {u}, owned by rank {}",
                block.rank
            )));
        }
        let start = if block.states == 0 {
            0
        } else {
            ownership.global_id(block.first_dof)?
        };
        Ok(WireRun::new(u, start, block.states))
    })?;

    let assigned = requested
        .iter()
        .zip(&answers)
        .enumerate()
        .flat_map(|(owner, (elems, runs))| elems.iter().zip(runs).map(move |(&u, r)| (owner, u, r)))
        .try_for_each(|(owner, u, run)| {
            let block = local.blocks[u];
            if run.len() != block.states {
                return Err(MeshDofsError::InvalidStructure(format!(
                    "element {u} has {} states on rank {me} but {} on its owner, rank {owner}",
                    block.states,
                    run.len()
                )));
            }
            (0..block.states)
                .try_for_each(|s| local.ownership.set_global_id(block.first_dof + s, run.start() + s))
        })
        .and_then(|()| match local.ownership.unresolved().next() {
            Some(dof) => Err(MeshDofsError::InvalidStructure(format!(
                "DOF {dof} on rank {me} has no global id after ghost resolution"
            ))),
            None => Ok(()),
        });
    ex.agree(assigned)
}
