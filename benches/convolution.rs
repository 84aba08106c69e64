//! Convolution method benchmarks
//!
//! Compares the direct, separable and Fourier routes (and the automatic
//! choice) for a Gaussian kernel of growing size. The crossover points are
//! what the `CostModel` coefficients try to predict.
//!
//! Run with: cargo bench --bench convolution

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pixframe::{convolution, BoundaryCondition, ConvolutionMethod, Image};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::time::Duration;

fn gaussian_kernel(size: usize) -> Image {
    let sigma = size as f64 / 6.0;
    let half = (size / 2) as f64;
    Image::from_fn(&[size, size], |c| {
        let (x, y) = (c[0] as f64 - half, c[1] as f64 - half);
        (-(x * x + y * y) / (2.0 * sigma * sigma)).exp()
    })
}

fn bench_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("convolution_methods");
    group.sample_size(10);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    let size = 512;
    let mut rng = StdRng::seed_from_u64(42);
    let img = Image::from_fn(&[size, size], |_| rng.sample::<f32, _>(StandardNormal));
    group.throughput(Throughput::Elements((size * size) as u64));
    let bc = [BoundaryCondition::SymmetricMirror];

    for k in [3, 7, 15, 31] {
        let kernel = gaussian_kernel(k);
        for (name, method) in [
            ("direct", ConvolutionMethod::Direct),
            ("separable", ConvolutionMethod::Separable),
            ("fourier", ConvolutionMethod::Fourier),
            ("best", ConvolutionMethod::Best),
        ] {
            if method == ConvolutionMethod::Direct && k > 15 {
                continue;
            }
            group.bench_with_input(BenchmarkId::new(name, k), &k, |bench, _| {
                bench.iter(|| {
                    let mut out = Image::default();
                    convolution(&img, &kernel, &mut out, method, &bc).unwrap();
                    out
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_methods);
criterion_main!(benches);
