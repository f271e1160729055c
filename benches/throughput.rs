use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use dlt_example_user::{
    emitter::{diagnostic_burst, main_entry},
    injection::{MIXED_TEXT_CAPACITY, print_mixed},
    record::{Frame, FrameEnvelope, LogRecord, WirePayload},
    types::{AppId, ContextId, EncodingMode},
};

fn bench_encode_payloads(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_payload");
    for (name, non_verbose) in [("verbose", false), ("non_verbose", true)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &non_verbose, |b, &nv| {
            b.iter(|| {
                for seq in 0..10_000u64 {
                    let entry = main_entry(seq, "benchmark message", EncodingMode::NonVerbose)
                        .expect("entry");
                    let _ = WirePayload::encode(&entry, nv);
                }
            });
        });
    }
    group.finish();
}

fn bench_frame_serialization(c: &mut Criterion) {
    let app_id = AppId::new("LOG").expect("id");
    let context_id = ContextId::new("TEST").expect("id");
    let records: Vec<_> = diagnostic_burst()
        .into_iter()
        .enumerate()
        .map(|(i, entry)| LogRecord {
            app_id: app_id.clone(),
            context_id: context_id.clone(),
            counter: i as u64,
            ts_ms: i as u64,
            level: entry.level,
            payload: WirePayload::encode(&entry, false),
        })
        .collect();

    c.bench_function("serialize_burst_frames", |b| {
        b.iter(|| {
            for record in &records {
                let env = FrameEnvelope::new(Frame::Log {
                    record: record.clone(),
                });
                let _ = serde_json::to_vec(&env).expect("encode");
            }
        });
    });
}

fn bench_print_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("print_mixed");
    let printable = vec![b'a'; 4096];
    let binary: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();

    group.bench_function("printable", |b| {
        b.iter(|| print_mixed(&printable, MIXED_TEXT_CAPACITY));
    });
    group.bench_function("binary", |b| {
        b.iter(|| print_mixed(&binary, MIXED_TEXT_CAPACITY));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_encode_payloads,
    bench_frame_serialization,
    bench_print_mixed
);
criterion_main!(benches);
