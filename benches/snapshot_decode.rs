use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tcpeek_exporter::{MetricRegistry, Namespace, StatsSnapshot};

const BODY: &[u8] = br#"[{"RX":{"success":{"total":123456,"dupsyn":12,"dupsynack":3},"failure":{"total":789,"timeout":700,"reject":80,"unreach":9}}},{"TX":{"success":{"total":654321,"dupsyn":21,"dupsynack":30},"failure":{"total":987,"timeout":900,"reject":80,"unreach":7}}},{"http-out":{"success":{"total":42,"dupsyn":0,"dupsynack":0},"failure":{"total":1,"timeout":1,"reject":0,"unreach":0}}}]"#;

fn bench_decode(c: &mut Criterion) {
    c.bench_function("snapshot_decode", |b| {
        b.iter(|| StatsSnapshot::decode(black_box(BODY)).unwrap())
    });
}

fn bench_apply_and_encode(c: &mut Criterion) {
    let registry = MetricRegistry::new(&Namespace::default()).unwrap();
    let snapshot = StatsSnapshot::decode(BODY).unwrap();

    c.bench_function("apply_and_encode", |b| {
        b.iter(|| {
            registry.apply_snapshot(black_box(&snapshot));
            registry.encode().unwrap()
        })
    });
}

criterion_group!(benches, bench_decode, bench_apply_and_encode);
criterion_main!(benches);
