//! Property tests for `UnifiedIndexSpace` addressing.
use mesh_dofs::data::unified::UnifiedIndexSpace;
use proptest::prelude::*;
use std::sync::Arc;

proptest! {
    #[test]
    fn location_inverts_unified_idx(sizes in prop::collection::vec(0usize..6, 1..8)) {
        let providers: Vec<Arc<Vec<u8>>> = sizes.iter().map(|&n| Arc::new(vec![0; n])).collect();
        let mut space = UnifiedIndexSpace::new();
        for p in &providers {
            space.add(Arc::clone(p));
        }
        prop_assert_eq!(space.size(), sizes.iter().sum::<usize>());
        prop_assert_eq!(space.nb_providers(), providers.len());

        let mut expected = 0;
        for (k, p) in providers.iter().enumerate() {
            for local in 0..p.len() {
                let idx = space.unified_idx(p, local).unwrap();
                prop_assert_eq!(idx, expected);
                let loc = space.location(idx).unwrap();
                prop_assert!(loc.is(p, local));
                prop_assert_eq!(loc.provider_index, k);
                expected += 1;
            }
        }
        prop_assert!(space.location(expected).is_err());
    }

    #[test]
    fn re_adding_providers_changes_nothing(sizes in prop::collection::vec(1usize..4, 1..5)) {
        let providers: Vec<Arc<Vec<u8>>> = sizes.iter().map(|&n| Arc::new(vec![0; n])).collect();
        let mut space = UnifiedIndexSpace::new();
        for p in &providers {
            space.add(Arc::clone(p));
        }
        let starts = space.start_indices().to_vec();
        for (k, p) in providers.iter().enumerate().rev() {
            prop_assert_eq!(space.add(Arc::clone(p)), k);
        }
        prop_assert_eq!(space.start_indices(), starts.as_slice());
    }
}

#[test]
fn refresh_picks_up_resized_providers() {
    use mesh_dofs::data::table::FixedWidthTable;

    let mut space = UnifiedIndexSpace::<FixedWidthTable<u32>>::new();
    let mut table = FixedWidthTable::with_row_size(1);
    table.resize(2).unwrap();
    let link = space.link();
    table.set_lookup(link);
    let table = Arc::new(table);
    space.add(Arc::clone(&table));
    assert!(table.locate(1, &space).is_ok());

    space.refresh();
    assert_eq!(space.size(), 2);
    // links issued before the refresh are stale
    assert!(table.locate(1, &space).is_err());
    assert!(space.check_link(space.link()).is_ok());
}
