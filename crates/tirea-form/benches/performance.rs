//! Performance benchmarks for tirea-form operations.
//!
//! Run with: cargo bench --package tirea-form

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::rc::Rc;
use tirea_form::{
    group, number, repeat, string, CowMap, FieldTree, FormConfig, FormController, FormData, Path,
};

// ============================================================================
// Helper functions to generate test data
// ============================================================================

/// A flat form with N text fields.
fn generate_flat_tree(num_fields: usize) -> FieldTree {
    FieldTree::map((0..num_fields).map(|i| (format!("field_{}", i), string())))
}

/// Form data filling every field of `generate_flat_tree`.
fn generate_flat_data(num_fields: usize) -> FormData {
    (0..num_fields)
        .map(|i| (format!("field_{}", i), format!("value {}", i)))
        .collect()
}

/// An order form with N line items.
fn generate_order(num_lines: usize) -> (FieldTree, FormData) {
    let tree = FieldTree::map([(
        "lines",
        repeat(group([("sku", string()), ("qty", number())]), 0),
    )]);
    let mut data = FormData::new();
    for i in 0..num_lines {
        data.append(format!("lines[{}].sku", i), format!("sku-{}", i));
        data.append(format!("lines[{}].qty", i), i.to_string());
    }
    (tree, data)
}

// ============================================================================
// Benchmark: path serialize / parse
// ============================================================================

fn bench_path_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_roundtrip");

    for depth in [1, 5, 20] {
        let mut path = Path::root();
        for i in 0..depth {
            path = path.key(format!("level_{}", i)).index(i);
        }
        let serialized = path.serialize();

        group.bench_with_input(BenchmarkId::new("serialize", depth), &path, |b, path| {
            b.iter(|| black_box(path.serialize()));
        });
        group.bench_with_input(BenchmarkId::new("parse", depth), &serialized, |b, s| {
            b.iter(|| black_box(Path::parse(black_box(s))));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: copy-on-write map
// ============================================================================

fn bench_cow_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("cow_map");

    for size in [10, 100, 1000] {
        let map: CowMap<usize, usize> = CowMap::from_entries((0..size).map(|i| (i, i)));
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("noop_set", size), &map, |b, map| {
            b.iter(|| black_box(map.set(0, 0)));
        });
        group.bench_with_input(BenchmarkId::new("draft_10pct", size), &map, |b, map| {
            b.iter(|| {
                let mut draft = map.draft();
                for i in (0..size).step_by(10) {
                    draft.set(i, i + 1);
                }
                black_box(draft.commit())
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: transitions
// ============================================================================

fn bench_mount_and_change(c: &mut Criterion) {
    let mut group = c.benchmark_group("mount_and_change");

    for num_fields in [10, 100, 1000] {
        group.throughput(Throughput::Elements(num_fields as u64));
        let data: Rc<FormData> = Rc::new(generate_flat_data(num_fields));

        group.bench_with_input(
            BenchmarkId::new("mount", num_fields),
            &num_fields,
            |b, &n| {
                b.iter(|| {
                    let form = FormController::new(generate_flat_tree(n), FormConfig::default())
                        .unwrap();
                    black_box(form.mount(data.clone()))
                });
            },
        );

        let form = FormController::new(generate_flat_tree(num_fields), FormConfig::default())
            .unwrap();
        form.mount(data.clone());
        group.bench_with_input(
            BenchmarkId::new("unchanged_change", num_fields),
            &num_fields,
            |b, _| {
                b.iter(|| black_box(form.handle_change(["field_0"])));
            },
        );
    }

    group.finish();
}

fn bench_server_submit(c: &mut Criterion) {
    let mut group = c.benchmark_group("server_submit");

    for num_lines in [1, 10, 100] {
        group.throughput(Throughput::Elements(num_lines as u64));
        let (tree, data) = generate_order(num_lines);

        group.bench_with_input(
            BenchmarkId::from_parameter(num_lines),
            &num_lines,
            |b, _| {
                b.iter(|| {
                    let form = FormController::new(tree.clone(), FormConfig::default()).unwrap();
                    black_box(form.submit(black_box(&data)))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_path_roundtrip,
    bench_cow_map,
    bench_mount_and_change,
    bench_server_submit,
);
criterion_main!(benches);
