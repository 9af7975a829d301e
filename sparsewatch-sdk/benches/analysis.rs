use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{ArrayD, IxDyn};
use sparsewatch_sdk::{near_zero_count, spatial_mask, Analyzer, DataFormat};

/// Half-sparse activation tensor, every other element zero.
fn activations(shape: &[usize]) -> ArrayD<f32> {
    let len: usize = shape.iter().product();
    let data = (0..len).map(|i| if i % 2 == 0 { 0.0 } else { 1.0 }).collect();
    ArrayD::from_shape_vec(IxDyn(shape), data).expect("shape matches data")
}

/// Benchmark near-zero counting (the per-tensor hot path)
fn bench_near_zero_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("near_zero_count");

    for size in [8usize, 32, 56, 112].iter() {
        let tensor = activations(&[32, *size, *size, 64]);
        group.bench_with_input(BenchmarkId::from_parameter(size), &tensor, |b, tensor| {
            b.iter(|| near_zero_count(black_box(&tensor.view()), 0.0));
        });
    }
    group.finish();
}

/// Benchmark spatial mask reduction for both layouts
fn bench_spatial_mask(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_mask");
    let nhwc = activations(&[32, 56, 56, 64]);
    let nchw = activations(&[32, 64, 56, 56]);

    group.bench_function("nhwc", |b| {
        b.iter(|| spatial_mask(black_box(&nhwc.view()), DataFormat::Nhwc, 0.0));
    });
    group.bench_function("nchw", |b| {
        b.iter(|| spatial_mask(black_box(&nchw.view()), DataFormat::Nchw, 0.0));
    });
    group.finish();
}

/// Benchmark a full analysis with and without mask tracking
fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");
    let tensor = activations(&[32, 28, 28, 128]);

    for track_spatial in [false, true].iter() {
        let analyzer = Analyzer {
            data_format: DataFormat::Nhwc,
            zero_threshold: 0.0,
            track_spatial: *track_spatial,
        };
        group.bench_with_input(
            BenchmarkId::new("track_spatial", track_spatial),
            &analyzer,
            |b, analyzer| {
                b.iter(|| analyzer.analyze("conv", black_box(&tensor.view()), 0));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_near_zero_count, bench_spatial_mask, bench_analyze);
criterion_main!(benches);
