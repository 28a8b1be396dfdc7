//! Micro-benchmarks for store hot paths: blob writes, manifest hashing,
//! and three-way plan construction.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tempfile::TempDir;

use fst::merge::MergePlan;
use fst::model::manifest::{FileEntry, Manifest};
use fst::model::types::{ContentHash, SnapshotId};
use fst::store::BlobStore;

fn manifest_with(n: usize, salt: &str) -> Manifest {
    let mut m = Manifest::new();
    for i in 0..n {
        let content = format!("{salt}-{i}");
        m.files.push(FileEntry::file(
            format!("dir{}/file{i}.txt", i % 16),
            ContentHash::of_bytes(content.as_bytes()),
            content.len() as u64,
            0o644,
        ));
    }
    m
}

fn snap(byte: u8) -> SnapshotId {
    SnapshotId::from_hash(ContentHash::of_bytes(&[byte]))
}

fn bench_blob_store(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = BlobStore::open(dir.path().join("blobs"));
    let payload = vec![7u8; 64 * 1024];
    let hash = store.write_bytes(&payload).unwrap();

    c.bench_function("blob_write_64k_idempotent", |b| {
        b.iter(|| store.write(black_box(&hash), black_box(&payload)).unwrap());
    });
    c.bench_function("blob_read_64k", |b| {
        b.iter(|| store.read(black_box(&hash)).unwrap());
    });
}

fn bench_manifest_hash(c: &mut Criterion) {
    let manifest = manifest_with(512, "content");
    c.bench_function("manifest_canonical_hash_512_files", |b| {
        b.iter(|| black_box(&manifest).content_hash().unwrap());
    });
}

fn bench_merge_plan(c: &mut Criterion) {
    let base = manifest_with(512, "base");
    let current = manifest_with(512, "current");
    let source = manifest_with(512, "source");
    c.bench_function("merge_plan_512_files_all_conflicting", |b| {
        b.iter(|| {
            MergePlan::build(
                snap(0),
                snap(1),
                snap(2),
                black_box(&base),
                black_box(&current),
                black_box(&source),
            )
        });
    });
}

criterion_group!(benches, bench_blob_store, bench_manifest_hash, bench_merge_plan);
criterion_main!(benches);
