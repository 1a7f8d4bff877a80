//! Element-based binding: per-element DOF blocks, computed connectivity and
//! ghost elements resolved by centroid.
use mesh_dofs::prelude::*;
use std::sync::Arc;

fn on_ranks<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&LocalComm) -> T + Sync,
{
    let comms = LocalComm::group(n);
    std::thread::scope(|s| {
        let handles: Vec<_> = comms.iter().map(|c| s.spawn(|| f(c))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Segments `[x, x + 1]` for every `(x, rank)`.
fn segments(name: &str, cells: &[(usize, usize)]) -> Arc<Elements> {
    let mut nodes = Nodes::new(1);
    let mut segs_nodes = Vec::new();
    for &(x, _) in cells {
        let a = nodes.add_node(&[x as f64]).unwrap();
        let b = nodes.add_node(&[x as f64 + 1.0]).unwrap();
        segs_nodes.push([a, b]);
    }
    let mut segs = Elements::new(name, Arc::new(nodes), 2);
    for (n, &(_, rank)) in segs_nodes.iter().zip(cells) {
        segs.add_element(n, rank).unwrap();
    }
    Arc::new(segs)
}

#[test]
fn serial_blocks_are_numbered_consecutively() {
    let regions = [
        (segments("left", &[(0, 0), (1, 0)]), StateLayout::nodal(2)),
        (segments("right", &[(2, 0)]), StateLayout::centroid(2)),
    ];
    let dict = DofBinder::new(BindConfig::element_based())
        .bind(&NoComm, &regions)
        .unwrap();
    assert_eq!(dict.layout(), DofLayout::ElementBased);
    assert_eq!(dict.size(), 5);
    assert_eq!(dict.global_size(), 5);
    assert!(dict.spaces().iter().all(|s| s.is_proxy()));
    assert_eq!(dict.dofs_for_unified_element(1).unwrap().as_ref(), &[2, 3]);
    assert_eq!(dict.dofs_for_element(&regions[1].0, 0).unwrap().as_ref(), &[4]);
    assert_eq!(dict.coordinates(4).unwrap(), &[2.5]);
    for d in 0..5 {
        assert_eq!(dict.global_id(d).unwrap(), d);
    }
}

#[test]
fn two_ranks_number_blocks_by_rank() {
    let results = on_ranks(2, |comm| {
        let regions = if comm.rank() == 0 {
            // own segments plus a ghost copy of rank 1's first segment
            vec![(
                segments("segs", &[(0, 0), (1, 0), (2, 1)]),
                StateLayout::nodal(2),
            )]
        } else {
            vec![(
                segments("segs", &[(2, 1), (3, 1), (4, 1)]),
                StateLayout::nodal(2),
            )]
        };
        let dict = DofBinder::new(BindConfig::element_based())
            .bind(comm, &regions)
            .unwrap();
        let ids: Vec<usize> = (0..dict.size()).map(|d| dict.global_id(d).unwrap()).collect();
        let ghosts: Vec<usize> = dict.ghosts().collect();
        (dict.global_size(), dict.owned_count(), ids, ghosts)
    });

    let (total0, owned0, ids0, ghosts0) = &results[0];
    let (total1, owned1, ids1, ghosts1) = &results[1];
    assert_eq!((*total0, *total1), (10, 10));
    assert_eq!((*owned0, *owned1), (4, 6));
    assert_eq!(ids0, &vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(ids1, &vec![4, 5, 6, 7, 8, 9]);
    assert_eq!(ghosts0, &vec![4, 5]);
    assert!(ghosts1.is_empty());
}

#[test]
fn state_count_mismatch_is_detected() {
    let results = on_ranks(2, |comm| {
        let regions = if comm.rank() == 0 {
            vec![
                (segments("own", &[(0, 0)]), StateLayout::nodal(2)),
                // rank 1 binds this segment with two states
                (segments("ghost", &[(1, 1)]), StateLayout::centroid(2)),
            ]
        } else {
            vec![(segments("own", &[(1, 1)]), StateLayout::nodal(2))]
        };
        DofBinder::new(BindConfig::element_based())
            .bind(comm, &regions)
            .err()
    });
    assert!(matches!(results[0], Some(MeshDofsError::InvalidStructure(_))));
    assert_eq!(
        results[1],
        Some(MeshDofsError::PeerFailure { ranks: vec![0] })
    );
}

#[test]
fn duplicate_centroids_name_both_elements() {
    let regions = [
        (segments("a", &[(0, 0), (1, 0)]), StateLayout::centroid(2)),
        (segments("b", &[(5, 0), (1, 0)]), StateLayout::centroid(2)),
    ];
    let err = DofBinder::new(BindConfig::element_based())
        .bind(&NoComm, &regions)
        .unwrap_err();
    assert_eq!(err, MeshDofsError::DuplicateSignature { first: 1, second: 3 });
}

#[test]
fn missing_owner_copy_fails_everywhere() {
    let results = on_ranks(2, |comm| {
        let regions = if comm.rank() == 0 {
            // claims an element of rank 1 that rank 1 does not have
            vec![(segments("segs", &[(0, 0), (7, 1)]), StateLayout::nodal(2))]
        } else {
            vec![(segments("segs", &[(1, 1)]), StateLayout::nodal(2))]
        };
        DofBinder::new(BindConfig::element_based())
            .bind(comm, &regions)
            .err()
    });
    assert_eq!(
        results[0],
        Some(MeshDofsError::PeerFailure { ranks: vec![1] })
    );
    assert!(matches!(results[1], Some(MeshDofsError::ValueNotFound(_))));
}
