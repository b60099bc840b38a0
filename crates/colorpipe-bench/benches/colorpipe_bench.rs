//! Benchmarks for processor builds, optimization, evaluation and shaders.
//!
//! Run with: `cargo bench -p colorpipe-bench`

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use colorpipe::op::Op;
use colorpipe::optimizer::optimize;
use colorpipe::{
    BitDepth, GpuLanguage, GpuShaderDesc, OptimizationFlags, PackedImage, PixelData, Processor,
};
use colorpipe_bench::{aces_config, ramp};
use colorpipe_lut::{Interpolation, Lut3D};

/// Processor construction with and without the cache.
fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    let config = aces_config();

    group.bench_function("cached", |b| {
        b.iter(|| config.processor(black_box("ACEScct"), black_box("sRGB - Output")).unwrap())
    });

    group.bench_function("uncached", |b| {
        b.iter(|| {
            config.clear_processor_cache();
            config.processor(black_box("ACEScct"), black_box("sRGB - Output")).unwrap()
        })
    });

    group.finish();
}

/// Optimizer passes over a raw chain.
fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize");
    let config = aces_config();
    let processor = config.processor("ACEScct", "sRGB - Output").unwrap();
    let raw: Vec<Op> = processor.raw_ops().to_vec();

    for (name, flags) in [
        ("lossless", OptimizationFlags::LOSSLESS),
        ("very_good", OptimizationFlags::VERY_GOOD),
        ("draft", OptimizationFlags::DRAFT),
    ] {
        group.bench_with_input(BenchmarkId::new("aces_to_srgb", name), &flags, |b, flags| {
            b.iter(|| optimize(black_box(&raw), *flags))
        });
    }

    group.finish();
}

/// CPU evaluation over packed buffers.
fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");
    let config = aces_config();
    let processor = config.processor("ACEScct", "sRGB - Output").unwrap();
    let lossless = processor.optimized(OptimizationFlags::LOSSLESS);

    for &count in &[256 * 256, 1024 * 1024] {
        let pixels = ramp(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("f32_fast", count), &pixels, |b, pixels| {
            let mut buf = pixels.clone();
            b.iter(|| processor.apply_rgb(black_box(&mut buf)).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("f32_lossless", count), &pixels, |b, pixels| {
            let mut buf = pixels.clone();
            b.iter(|| lossless.apply_rgb(black_box(&mut buf)).unwrap())
        });

        let bytes: Vec<u8> = pixels.iter().map(|v| (v * 255.0) as u8).collect();
        group.bench_with_input(BenchmarkId::new("u8", count), &bytes, |b, bytes| {
            let mut buf = bytes.clone();
            b.iter(|| {
                let mut image =
                    PackedImage::new(PixelData::U8(&mut buf), count, 1, 3, BitDepth::UInt8)
                        .unwrap();
                processor.apply(black_box(&mut image));
            })
        });
    }

    group.finish();
}

/// 3D LUT interpolation inside a processor.
fn bench_lut3d(c: &mut Criterion) {
    let mut group = c.benchmark_group("lut3d");
    let pixels = ramp(10_000);
    group.throughput(Throughput::Elements(10_000));

    let modes = [
        ("trilinear", Interpolation::Linear),
        ("tetrahedral", Interpolation::Tetrahedral),
    ];
    for (name, interp) in modes {
        let lut = Arc::new(Lut3D::identity(33).with_interpolation(interp));
        let ops = vec![Op::Lut3D { lut, forward: true }];
        let processor = Processor::from_ops(ops, OptimizationFlags::NONE);
        group.bench_with_input(BenchmarkId::new(name, 33), &pixels, |b, pixels| {
            let mut buf = pixels.clone();
            b.iter(|| processor.apply_rgb(black_box(&mut buf)).unwrap())
        });
    }

    group.finish();
}

/// Shader text generation.
fn bench_shader(c: &mut Criterion) {
    let mut group = c.benchmark_group("shader");
    let config = aces_config();
    let processor = config.processor("ACEScct", "sRGB - Output").unwrap();

    for lang in [GpuLanguage::Glsl330, GpuLanguage::Hlsl50] {
        let desc = GpuShaderDesc::new().with_language(lang);
        let id = BenchmarkId::new("aces_to_srgb", format!("{:?}", lang));
        group.bench_with_input(id, &desc, |b, desc| {
            b.iter(|| processor.gpu_shader(black_box(desc)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_optimize,
    bench_apply,
    bench_lut3d,
    bench_shader
);

criterion_main!(benches);
