//! Run with `mpirun -n 2 cargo test --features mpi-support --test mpi_binding`.
#![cfg(feature = "mpi-support")]

use mesh_dofs::prelude::*;
use std::sync::Arc;

#[test]
fn two_rank_point_binding() {
    let comm = MpiComm::new().unwrap();
    if comm.size() != 2 {
        eprintln!("This test requires 2 MPI ranks");
        return;
    }
    let me = comm.rank();
    let x0 = me as f64;
    let nodes = Nodes::from_flat(
        2,
        &[x0, 0.0, x0 + 1.0, 0.0, x0, 1.0, x0 + 1.0, 1.0],
    )
    .unwrap();
    let mut tris = Elements::new("tris", Arc::new(nodes), 3);
    tris.add_element(&[0, 1, 3], me).unwrap();
    tris.add_element(&[0, 3, 2], me).unwrap();

    let regions = [(Arc::new(tris), StateLayout::nodal(3))];
    let dict = DofBinder::default().bind(&comm, &regions).unwrap();
    assert_eq!(dict.global_size(), 6);
    assert_eq!(dict.owned_count(), if me == 0 { 4 } else { 2 });
    for g in dict.ghosts() {
        assert_eq!(dict.owner_rank(g).unwrap(), 0);
        assert_eq!(dict.coordinates(g).unwrap()[0], 1.0);
        assert!(dict.global_id(g).unwrap() < 4);
    }
}
