use core_history::{
    HistoryCursor, HistoryStore, Metadata, NullTarget, Rewind, StyleFlags, TextAttributes,
    Validation,
};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn filled_store(max: usize) -> HistoryStore {
    let mut store = HistoryStore::new(0, max, max / 4, TextAttributes::default());
    for i in 0..2000usize {
        if i % 5 == 0 {
            store
                .store_metadata(Metadata::Colour {
                    foreground: (i % 16) as i16,
                    background: -1,
                })
                .unwrap();
        }
        store
            .store_text("the quick brown fox jumps over the lazy dog\n")
            .unwrap();
    }
    store
}

fn history_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("history_operations");

    group.bench_function("store_wrapping_writes", |b| {
        b.iter_batched(
            || HistoryStore::new(0, 16 * 1024, 4 * 1024, TextAttributes::default()),
            |mut store| {
                for i in 0..1000usize {
                    if i % 7 == 0 {
                        store
                            .store_metadata(Metadata::Style(StyleFlags::from_bits_truncate(
                                (i % 16) as u8,
                            )))
                            .unwrap();
                    }
                    store.store_text("a line of output that will wrap\n").unwrap();
                }
                store
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.bench_function("rewind_all_paragraphs", |b| {
        let store = filled_store(32 * 1024);
        b.iter(|| {
            let mut cursor = HistoryCursor::from_front(&store, Validation::Enforced);
            let mut count = 0usize;
            while let Rewind::Paragraph { .. } = cursor.rewind_paragraph(&store).unwrap() {
                count += 1;
            }
            black_box(count)
        })
    });

    group.bench_function("replay_from_back", |b| {
        let store = filled_store(32 * 1024);
        b.iter(|| {
            let mut cursor = HistoryCursor::from_back(&store, Validation::Enforced);
            let mut target = NullTarget;
            black_box(
                cursor
                    .repeat_paragraphs(&store, &mut target, usize::MAX, true, true)
                    .unwrap(),
            )
        })
    });

    group.finish();
}

criterion_group!(benches, history_operations);
criterion_main!(benches);
