use criterion::{criterion_group, criterion_main, Criterion};
use bopline_access::keys::decode_component;
use bopline_access::{Advancer, DistinctTermAdvancer, MemoryRelation, ScanFlags, SortedIndex};

/// 100 subjects with 200 triples each.
fn make_relation() -> MemoryRelation {
    let mut rel = MemoryRelation::triples("bench");
    for s in 0..100u64 {
        for o in 0..200u64 {
            rel.insert(&[s, 1, 10_000 + o]).unwrap();
        }
    }
    rel
}

fn bench_distinct_subjects(c: &mut Criterion) {
    let rel = make_relation();
    let spo = rel.memory_index("SPO").unwrap();

    c.bench_function("distinct_subjects_skip_scan", |b| {
        b.iter(|| {
            let advancer: Box<dyn Advancer> = Box::new(DistinctTermAdvancer::new(1));
            let n = spo
                .range_iter(None, None, 0, ScanFlags::KEYS | ScanFlags::CURSOR, Some(advancer), None)
                .count();
            assert_eq!(n, 100);
        })
    });

    c.bench_function("distinct_subjects_full_scan", |b| {
        b.iter(|| {
            let mut last = None;
            let mut n = 0;
            for t in spo.range_iter(None, None, 0, ScanFlags::KEYS, None, None) {
                let s = decode_component(&t.key, 0).unwrap();
                if last != Some(s) {
                    last = Some(s);
                    n += 1;
                }
            }
            assert_eq!(n, 100);
        })
    });
}

criterion_group!(scans, bench_distinct_subjects);
criterion_main!(scans);
