//! Criterion benchmarks for pricer_core numerics.
//!
//! Covers linear interpolation lookups and Cholesky factorisation of
//! correlation matrices at the sizes the path engine uses.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pricer_core::math::interpolators::{Interpolator, LinearInterpolator};
use pricer_core::math::CorrelationMatrix;

fn generate_1d_data(n: usize) -> (Vec<f64>, Vec<f64>) {
    let xs: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
    let ys: Vec<f64> = xs.iter().map(|&x| x.sin() + 0.5 * x * x).collect();
    (xs, ys)
}

/// Equicorrelated matrix, positive definite for `rho` in (0, 1).
fn equicorrelated(dim: usize, rho: f64) -> Vec<f64> {
    (0..dim * dim)
        .map(|k| if k / dim == k % dim { 1.0 } else { rho })
        .collect()
}

fn bench_linear_interpolation(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_interpolation");
    for &n in &[10usize, 100, 1000] {
        let (xs, ys) = generate_1d_data(n);
        let interp = LinearInterpolator::new(&xs, &ys).unwrap();
        group.bench_with_input(BenchmarkId::new("lookup", n), &n, |b, _| {
            b.iter(|| interp.interpolate(black_box(0.37)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("flat_extrapolation", n), &n, |b, _| {
            b.iter(|| interp.interpolate_flat(black_box(1.5)))
        });
    }
    group.finish();
}

fn bench_cholesky(c: &mut Criterion) {
    let mut group = c.benchmark_group("cholesky");
    for &dim in &[2usize, 8, 32] {
        let matrix = CorrelationMatrix::new(&equicorrelated(dim, 0.5), dim).unwrap();
        group.bench_with_input(BenchmarkId::new("factorise", dim), &dim, |b, _| {
            b.iter(|| black_box(&matrix).cholesky().unwrap())
        });
        let factor = matrix.cholesky().unwrap();
        group.bench_with_input(BenchmarkId::new("transform", dim), &dim, |b, &dim| {
            b.iter(|| {
                let mut z = vec![0.1; dim];
                factor.transform_inplace(black_box(&mut z));
                z
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_linear_interpolation, bench_cholesky);
criterion_main!(benches);
