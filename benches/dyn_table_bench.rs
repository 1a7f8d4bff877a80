use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use mesh_dofs::data::dyn_table::DynamicSparseTable;

fn filled(rows: usize) -> DynamicSparseTable<u32> {
    let mut table = DynamicSparseTable::new();
    {
        let mut buf = table.create_buffer();
        for i in 0..rows as u32 {
            buf.add_row(vec![i; (i % 4) as usize + 1]);
        }
    }
    table
}

fn bench_dyn_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("dyn_table");

    for &rows in &[10_000usize, 100_000] {
        group.bench_with_input(BenchmarkId::new("append", rows), &rows, |b, &rows| {
            b.iter(|| black_box(filled(rows)));
        });

        group.bench_with_input(
            BenchmarkId::new("remove_every_tenth", rows),
            &rows,
            |b, &rows| {
                b.iter_batched(
                    || filled(rows),
                    |mut table| {
                        let relocations = {
                            let mut buf = table.create_buffer();
                            for i in (0..rows).step_by(10) {
                                let _ = buf.rm_row(i);
                            }
                            buf.flush()
                        };
                        black_box((table.len(), relocations.len()));
                    },
                    criterion::BatchSize::LargeInput,
                );
            },
        );

        group.bench_with_input(BenchmarkId::new("churn", rows), &rows, |b, &rows| {
            b.iter_batched(
                || filled(rows),
                |mut table| {
                    let mut buf = table.create_buffer();
                    for i in (0..rows).step_by(7) {
                        let _ = buf.rm_row(i);
                        buf.add_row(vec![1, 2, 3]);
                    }
                    black_box(buf.flush().len());
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dyn_table);
criterion_main!(benches);
