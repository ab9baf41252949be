//! Spatial index benchmarks using criterion.
//!
//! Point lookups run on every movement tick, so their cost should grow with
//! the tree height, not with the number of plots.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use plot_grid::{Generation, GridBox, GridCoord, PlotId, WorldName};
use plot_index::SpatialIndex;

fn square_world(side: i32) -> SpatialIndex {
    let world = WorldName::new("bench");
    let mut index = SpatialIndex::new();
    for x in 0..side {
        for z in 0..side {
            let home = GridCoord::new(x, z);
            index
                .insert(GridBox::cell(home), PlotId::new(world.clone(), home, Generation::new()))
                .unwrap();
        }
    }
    index
}

fn insert_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for side in [10, 32, 100] {
        group.throughput(Throughput::Elements((side * side) as u64));
        group.bench_with_input(BenchmarkId::new("cells", side * side), &side, |b, &side| {
            b.iter(|| black_box(square_world(side)));
        });
    }

    group.finish();
}

fn query_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_point");

    for side in [10, 100, 300] {
        let index = square_world(side);
        group.bench_with_input(BenchmarkId::new("hit", side * side), &side, |b, &side| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 7919) % (side * side);
                black_box(index.query_point(GridCoord::new(i % side, i / side)))
            });
        });
        group.bench_with_input(BenchmarkId::new("miss", side * side), &side, |b, &side| {
            b.iter(|| black_box(index.query_point(GridCoord::new(side + 5, -5))));
        });
    }

    group.finish();

    let mut group = c.benchmark_group("query_range");
    let index = square_world(300);
    for radius in [1, 4, 16] {
        group.bench_with_input(BenchmarkId::new("radius", radius), &radius, |b, &radius| {
            let center = GridBox::cell(GridCoord::new(150, 150));
            b.iter(|| black_box(index.query_range(&center.inflate(radius))));
        });
    }
    group.finish();
}

criterion_group!(benches, insert_benchmarks, query_benchmarks);
criterion_main!(benches);
