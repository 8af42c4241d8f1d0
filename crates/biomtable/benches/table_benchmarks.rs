//! Table operation benchmarks.
//!
//! Measures rarefaction, collapse and decoding across table sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use biomtable::{AxisKind, CsrMatrix, DecodedTable, Table};

/// Generate a synthetic decoded table with roughly 30% non-zero cells and a
/// `phylum` taxonomy level cycling through ten values.
fn generate_table(observations: usize, samples: usize) -> DecodedTable {
    let mut rng = fastrand::Rng::with_seed(2024);
    let rows: Vec<Vec<f64>> = (0..observations)
        .map(|_| {
            (0..samples)
                .map(|_| if rng.f64() < 0.3 { rng.u32(1..200) as f64 } else { 0.0 })
                .collect()
        })
        .collect();

    DecodedTable {
        observation_ids: (0..observations).map(|i| format!("OTU_{:06}", i)).collect(),
        sample_ids: (0..samples).map(|j| format!("Sample_{:04}", j)).collect(),
        matrix: CsrMatrix::from_dense(&rows),
        taxonomy: Some(
            (0..observations)
                .map(|i| vec!["k__Bacteria".to_string(), format!("p__Phylum{}", i % 10)])
                .collect(),
        ),
        ..Default::default()
    }
}

/// Benchmark building a table from decoder output.
fn bench_from_decoded(c: &mut Criterion) {
    let mut group = c.benchmark_group("from_decoded");

    for observations in [100, 1_000, 5_000].iter() {
        let decoded = generate_table(*observations, 50);
        group.throughput(Throughput::Elements(decoded.matrix.data.len() as u64));
        group.bench_with_input(BenchmarkId::new("observations", observations), &decoded, |b, decoded| {
            b.iter(|| black_box(Table::from_decoded(decoded.clone()).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark rarefying samples to a fixed depth.
fn bench_rarefy(c: &mut Criterion) {
    let mut group = c.benchmark_group("rarefy_samples");

    for observations in [100, 1_000, 5_000].iter() {
        let table = Table::from_decoded(generate_table(*observations, 50)).unwrap();
        let depth = table
            .sums(AxisKind::Sample)
            .values()
            .fold(f64::INFINITY, |a, &b| a.min(b)) as u64;

        group.throughput(Throughput::Elements(depth * 50));
        group.bench_with_input(BenchmarkId::new("observations", observations), &table, |b, table| {
            b.iter_with_setup(
                || (table.clone(), fastrand::Rng::with_seed(7)),
                |(mut table, mut rng)| {
                    table.rarefy_samples(depth, &mut rng).unwrap();
                    black_box(table)
                },
            )
        });
    }

    group.finish();
}

/// Benchmark collapsing observations by phylum.
fn bench_collapse(c: &mut Criterion) {
    let mut group = c.benchmark_group("collapse_phylum");

    for observations in [100, 1_000, 5_000].iter() {
        let table = Table::from_decoded(generate_table(*observations, 50)).unwrap();
        group.bench_with_input(BenchmarkId::new("observations", observations), &table, |b, table| {
            b.iter(|| black_box(table.collapsed("phylum", AxisKind::Observation)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_from_decoded, bench_rarefy, bench_collapse);
criterion_main!(benches);
