//! Solve time of grid networks under different weighting methods
//!
//! Each grid point observes distances to its right and upper neighbours and
//! the corner points are fixed. Setup (dataset and matrix construction) is
//! excluded from the measured time.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use surveynet::data::{ControlPoint, DatasetBuilder, ObservationKind};
use surveynet::{Adjustment, AdjustmentOptions, Dataset};

fn grid_network(size: usize) -> Dataset {
    let spacing = 50.0;
    let id = |i: usize, j: usize| format!("G{i}_{j}");
    let is_corner = |i: usize, j: usize| (i == 0 || i == size - 1) && (j == 0 || j == size - 1);

    let mut builder = DatasetBuilder::new();
    for i in 0..size {
        for j in 0..size {
            let (x, y) = (i as f64 * spacing, j as f64 * spacing);
            let point = if is_corner(i, j) {
                ControlPoint::planar(id(i, j), x, y).fixed()
            } else {
                // Deterministic offsets of a few centimeters
                let dx = ((i * 31 + j * 17) % 7) as f64 * 0.01 - 0.03;
                let dy = ((i * 13 + j * 29) % 5) as f64 * 0.01 - 0.02;
                ControlPoint::planar(id(i, j), x + dx, y + dy)
            };
            builder = builder.control(point).station(format!("S{}", id(i, j)), id(i, j));
        }
    }
    for i in 0..size {
        for j in 0..size {
            let station = format!("S{}", id(i, j));
            if i + 1 < size {
                builder = builder.observe(
                    station.as_str(),
                    id(i + 1, j),
                    ObservationKind::Hd,
                    spacing,
                    Some(0.003),
                );
            }
            if j + 1 < size {
                builder = builder.observe(
                    station.as_str(),
                    id(i, j + 1),
                    ObservationKind::Hd,
                    spacing,
                    Some(0.003),
                );
            }
            if i + 1 < size && j + 1 < size {
                builder = builder.observe(
                    station.as_str(),
                    id(i + 1, j + 1),
                    ObservationKind::Hd,
                    spacing * std::f64::consts::SQRT_2,
                    Some(0.003),
                );
            }
        }
    }
    builder.build().unwrap_or_else(|err| panic!("grid network: {err}"))
}

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");
    group.sample_size(20);
    for size in [4, 8, 12] {
        let dataset = grid_network(size);
        for method in ["weighted", "huber", "tukey"] {
            group.bench_with_input(
                BenchmarkId::new(method, size * size),
                &dataset,
                |b, dataset| {
                    b.iter_batched(
                        || {
                            Adjustment::new(dataset.clone(), AdjustmentOptions::new(method))
                                .unwrap_or_else(|err| panic!("{method}: {err}"))
                        },
                        |mut adjustment| black_box(adjustment.adjust()),
                        criterion::BatchSize::SmallInput,
                    );
                },
            );
        }
    }
    group.finish();
}

fn bench_results(c: &mut Criterion) {
    let dataset = grid_network(8);
    c.bench_function("results_bundle_64_points", |b| {
        b.iter_batched(
            || {
                let mut adjustment =
                    Adjustment::new(dataset.clone(), AdjustmentOptions::default())
                        .unwrap_or_else(|err| panic!("weighted: {err}"));
                let _ = adjustment.adjust();
                adjustment
            },
            |mut adjustment| black_box(adjustment.results().summary.residual_sigma),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_solve, bench_results);
criterion_main!(benches);
