use std::fs;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use voiceid::stub::StubFactory;
use voiceid::{
    AudioSample, DirAssets, EngineRegistry, MemoryTemplateStore, TemplateMode, TemplateStore,
    VerificationRunner, LIVENESS_INIT_DATA, SPEECH_SUMMARY_INIT_DATA, VERIFY_INIT_DATA_16K,
};

fn make_sine(freq_hz: f64, n_samples: usize, sample_rate: u32) -> AudioSample {
    let samples = (0..n_samples)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (16000.0 * (freq_hz * 2.0 * std::f64::consts::PI * t).sin()) as i16
        })
        .collect();
    AudioSample::new(samples, sample_rate)
}

fn stub_setup() -> (Arc<EngineRegistry>, Arc<MemoryTemplateStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    for sub in [
        VERIFY_INIT_DATA_16K,
        LIVENESS_INIT_DATA,
        SPEECH_SUMMARY_INIT_DATA,
    ] {
        fs::create_dir_all(dir.path().join(sub)).unwrap();
    }
    let registry = Arc::new(EngineRegistry::new(Box::new(StubFactory)));
    registry
        .init(&DirAssets(dir.path().to_path_buf()))
        .unwrap();
    (registry, Arc::new(MemoryTemplateStore::new()), dir)
}

fn bench_create_template(c: &mut Criterion) {
    let (registry, _store, _dir) = stub_setup();
    let engine = registry
        .get_verify_engine(TemplateMode::TextDependent)
        .unwrap();
    let sample = make_sine(220.0, 16000, 16000); // 1s

    c.bench_function("stub_create_template_1s", |b| {
        b.iter(|| {
            let _ = black_box(engine.create_template(black_box(&sample)));
        });
    });
}

fn bench_full_attempt(c: &mut Criterion) {
    let (registry, store, _dir) = stub_setup();
    let sample = Arc::new(make_sine(220.0, 16000, 16000));

    let engine = registry
        .get_verify_engine(TemplateMode::TextIndependent)
        .unwrap();
    let template = engine.create_template(&sample).unwrap();
    store
        .save(TemplateMode::TextIndependent, template.as_bytes())
        .unwrap();

    let runner = VerificationRunner::new(Arc::clone(&registry), store, true);

    c.bench_function("pooled_attempt_with_liveness_1s", |b| {
        b.iter(|| {
            let handle = runner.execute(Arc::clone(&sample), TemplateMode::TextIndependent);
            let _ = black_box(handle.wait_blocking());
        });
    });
}

criterion_group!(benches, bench_create_template, bench_full_attempt);
criterion_main!(benches);
