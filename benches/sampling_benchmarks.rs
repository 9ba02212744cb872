//! Benchmarks for sampling, thumbnail encoding, and FFmpeg sampling.
//!
//! Run with: cargo bench
//!
//! The FFmpeg benchmark requires fixture files from
//! `tests/fixtures/generate_fixtures.sh`.

use std::hint::black_box;
#[cfg(feature = "ffmpeg")]
use std::path::Path;

use criterion::Criterion;
use frametrim::{encode_thumbnail, sample_timestamps};
use image::{DynamicImage, RgbImage};

#[cfg(feature = "ffmpeg")]
use frametrim::{
    FfmpegEngine, FfmpegLogLevel, FfmpegOptions, FrameSampler, MediaEngine, MediaProbe,
    SamplerOptions, SourceMedia,
};

#[cfg(feature = "ffmpeg")]
const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn benchmark_sample_timestamps(criterion: &mut Criterion) {
    criterion.bench_function("sample timestamps (10 over 90 minutes)", |bencher| {
        bencher.iter(|| sample_timestamps(black_box(5_400.0), black_box(10)).unwrap());
    });

    criterion.bench_function("sample timestamps (1000 over 1 second)", |bencher| {
        bencher.iter(|| sample_timestamps(black_box(1.0), black_box(1_000)).unwrap());
    });
}

fn benchmark_thumbnail_encoding(criterion: &mut Criterion) {
    let frame = DynamicImage::ImageRgb8(RgbImage::from_fn(1920, 1080, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }));

    criterion.bench_function("encode thumbnail (1080p -> 320px)", |bencher| {
        bencher.iter(|| encode_thumbnail(black_box(&frame), 320, 80).unwrap());
    });

    criterion.bench_function("encode thumbnail (1080p, full size)", |bencher| {
        bencher.iter(|| encode_thumbnail(black_box(&frame), 1920, 80).unwrap());
    });
}

#[cfg(feature = "ffmpeg")]
fn benchmark_ffmpeg_sampling(criterion: &mut Criterion) {
    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let engine =
        FfmpegEngine::with_options(FfmpegOptions::new().with_log_level(FfmpegLogLevel::Error));
    engine.initialize().unwrap();
    let source = SourceMedia::from_path(SAMPLE_VIDEO).unwrap();

    criterion.bench_function("sample 10 frames (ffmpeg)", |bencher| {
        bencher.iter(|| {
            let mut probe = MediaProbe::open(&engine, &source).unwrap();
            let _frames = FrameSampler::sample_all(&mut probe, &SamplerOptions::new()).unwrap();
        });
    });

    criterion.bench_function("copy transcode 3s (ffmpeg)", |bencher| {
        bencher.iter(|| engine.copy_transcode(&source, 2.0, 5.0).unwrap());
    });
}

#[cfg(not(feature = "ffmpeg"))]
fn benchmark_ffmpeg_sampling(_criterion: &mut Criterion) {}

criterion::criterion_group!(
    benches,
    benchmark_sample_timestamps,
    benchmark_thumbnail_encoding,
    benchmark_ffmpeg_sampling,
);

criterion::criterion_main!(benches);
