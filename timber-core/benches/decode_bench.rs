//! Criterion benchmarks for sample decoding.
//!
//! Benchmarks:
//! 1. Scalar series (the common case for beam instrumentation variables)
//! 2. Vector series (bunch-by-bunch data)
//! 3. Matrix series

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use timber_core::{decode_dataset, ArchiveStamp, Dataset, RawSample, VariableKind};

// ── Helpers ──────────────────────────────────────────────────────────

fn stamp(i: usize) -> ArchiveStamp {
    ArchiveStamp::new(1_500_000_000 + i as i64, 0)
}

fn scalar_dataset(n: usize) -> Dataset {
    Dataset {
        variable: "LHC.BCTDC.A6R4.B1:BEAM_INTENSITY".into(),
        kind: VariableKind::Numeric,
        samples: (0..n)
            .map(|i| RawSample::new(stamp(i), json!(1e14 + (i as f64 * 0.1).sin() * 1e12)))
            .collect(),
    }
}

fn vector_dataset(n: usize, width: usize) -> Dataset {
    Dataset {
        variable: "LHC.BQM.B1:BUNCH_LENGTHS".into(),
        kind: VariableKind::VectorNumeric,
        samples: (0..n)
            .map(|i| {
                let row: Vec<f64> = (0..width).map(|j| 1.1e-9 + (i + j) as f64 * 1e-12).collect();
                RawSample::new(stamp(i), json!(row))
            })
            .collect(),
    }
}

fn matrix_dataset(n: usize, rows: usize, cols: usize) -> Dataset {
    Dataset {
        variable: "LHC.BSRT.5R4.B1:IMAGE".into(),
        kind: VariableKind::MatrixNumeric,
        samples: (0..n)
            .map(|i| {
                let grid: Vec<Vec<f64>> = (0..rows)
                    .map(|r| (0..cols).map(|c| (i * r + c) as f64).collect())
                    .collect();
                RawSample::new(stamp(i), json!(grid))
            })
            .collect(),
    }
}

// ── Benches ──────────────────────────────────────────────────────────

fn bench_scalar(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_scalar");
    for n in [1_000, 10_000, 100_000] {
        let ds = scalar_dataset(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &ds, |b, ds| {
            b.iter(|| decode_dataset(black_box(ds), true))
        });
    }
    group.finish();
}

fn bench_vector(c: &mut Criterion) {
    let ds = vector_dataset(1_000, 2_808);
    c.bench_function("decode_vector_1000x2808", |b| {
        b.iter(|| decode_dataset(black_box(&ds), false))
    });
}

fn bench_matrix(c: &mut Criterion) {
    let ds = matrix_dataset(100, 64, 64);
    c.bench_function("decode_matrix_100x64x64", |b| {
        b.iter(|| decode_dataset(black_box(&ds), false))
    });
}

criterion_group!(benches, bench_scalar, bench_vector, bench_matrix);
criterion_main!(benches);
