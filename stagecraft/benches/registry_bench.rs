//! Registry scan and slice benchmarks.

use criterion::{criterion_group, criterion_main, Criterion};
use stagecraft::registry::{StageRange, StageRegistry};
use std::fs;
use tempfile::TempDir;

fn make_pipeline(stages: usize) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    for i in 0..stages {
        fs::create_dir_all(dir.path().join(format!("{:02}_stage_{i}", i + 2))).expect("mkdir");
    }
    dir
}

fn bench_scan(c: &mut Criterion) {
    let dir = make_pipeline(32);
    c.bench_function("registry_scan_32_stages", |b| {
        b.iter(|| StageRegistry::scan(dir.path()).expect("scan"));
    });
}

fn bench_slice(c: &mut Criterion) {
    let dir = make_pipeline(32);
    let registry = StageRegistry::scan(dir.path()).expect("scan");
    let range = StageRange::bounded(
        Some("05_stage_3".to_string()),
        Some("30_stage_28".to_string()),
    );
    c.bench_function("registry_slice_window", |b| {
        b.iter(|| registry.slice(&range).expect("slice").len());
    });
}

criterion_group!(benches, bench_scan, bench_slice);
criterion_main!(benches);
