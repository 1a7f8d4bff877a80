//! Property tests for buffered mutation of `DynamicSparseTable`.
use mesh_dofs::data::dyn_table::DynamicSparseTable;
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
enum Op {
    Add(Vec<u16>),
    Remove(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::collection::vec(any::<u16>(), 0..4).prop_map(Op::Add),
        any::<usize>().prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn flush_keeps_every_live_row(
        initial in prop::collection::vec(prop::collection::vec(any::<u16>(), 0..4), 0..12),
        ops in prop::collection::vec(op(), 0..40),
        chunk in 1usize..5,
    ) {
        let mut table = DynamicSparseTable::<u16>::with_buffer_chunk(chunk);
        {
            let mut buf = table.create_buffer();
            for row in &initial {
                buf.add_row(row.clone());
            }
        }
        prop_assert_eq!(table.len(), initial.len());

        // logical index -> expected contents, as seen through the buffer
        let mut live: BTreeMap<usize, Vec<u16>> =
            initial.iter().cloned().enumerate().collect();
        let relocations = {
            let mut buf = table.create_buffer();
            for op in &ops {
                match op {
                    Op::Add(row) => {
                        let idx = buf.add_row(row.clone());
                        prop_assert!(!live.contains_key(&idx));
                        live.insert(idx, row.clone());
                    }
                    Op::Remove(pick) => {
                        if live.is_empty() {
                            continue;
                        }
                        let idx = *live.keys().nth(pick % live.len()).unwrap();
                        buf.rm_row(idx).unwrap();
                        prop_assert!(buf.rm_row(idx).is_err());
                        live.remove(&idx);
                    }
                }
                prop_assert_eq!(buf.len(), live.len());
            }
            for (&idx, row) in &live {
                prop_assert_eq!(buf.row(idx).unwrap(), row.as_slice());
            }
            buf.flush()
        };

        prop_assert_eq!(table.len(), live.len());
        for (&old, row) in &live {
            let new = relocations.resolve(old);
            prop_assert!(new < table.len());
            prop_assert_eq!(table.row(new).unwrap(), row.as_slice());
        }
    }

    #[test]
    fn second_flush_is_a_no_op(
        rows in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..3), 1..10),
        drop_every in 1usize..4,
    ) {
        let mut table = DynamicSparseTable::from(rows.clone());
        let mut buf = table.create_buffer();
        for i in (0..rows.len()).step_by(drop_every) {
            buf.rm_row(i).unwrap();
        }
        buf.flush();
        prop_assert!(!buf.is_dirty());
        prop_assert!(buf.flush().is_empty());
        drop(buf);
        let expected = rows.len() - rows.len().div_ceil(drop_every);
        prop_assert_eq!(table.len(), expected);
    }
}
