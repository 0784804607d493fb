use std::f64::consts::PI;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pbmark::{
    extract_features_with, find_roi, AnalysisMode, AnalyzerConfig, Fft2d, Field,
    FingerprintConfig, FrameAnalyzer, LocalizerConfig,
};

/// Two-layer grid texture with mild sensor noise.
fn make_marker_fixture(size: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = size as f64;
    GrayImage::from_fn(size, size, |x, y| {
        let (x, y) = (x as f64, y as f64);
        let near = (2.0 * PI * 16.0 * x / n).cos() + (2.0 * PI * 16.0 * y / n).cos();
        let far = (2.0 * PI * 33.0 * (x + 0.6) / n).cos() + (2.0 * PI * 33.0 * y / n).cos();
        let noise = rng.gen_range(-6.0..6.0);
        Luma([(128.0 + 30.0 * near + 18.0 * far + noise).clamp(0.0, 255.0) as u8])
    })
}

/// Full camera frame with the marker pasted off-center on a bright desk.
fn make_frame_fixture(width: u32, height: u32, seed: u64) -> GrayImage {
    let marker = make_marker_fixture(256, seed);
    let (ox, oy) = ((width - 256) / 2 + 17, (height - 256) / 2 - 9);
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
    GrayImage::from_fn(width, height, |x, y| {
        if x >= ox && y >= oy && x < ox + 256 && y < oy + 256 {
            *marker.get_pixel(x - ox, y - oy)
        } else if x + 10 >= ox && y + 10 >= oy && x < ox + 266 && y < oy + 266 {
            Luma([12])
        } else {
            Luma([210u8.saturating_add(rng.gen_range(0..8))])
        }
    })
}

fn bench_fft(c: &mut Criterion) {
    let img = make_marker_fixture(256, 3);
    let field = Field::from_gray(&img);
    let fft = Fft2d::new(256, 256);
    c.bench_function("fft2d_forward_256", |b| {
        b.iter(|| black_box(fft.forward(black_box(&field))))
    });
}

fn bench_analyze(c: &mut Criterion) {
    let img = make_marker_fixture(256, 5);
    let banded = FrameAnalyzer::new(256, 256, AnalyzerConfig::default());
    let layered = FrameAnalyzer::new(
        256,
        256,
        AnalyzerConfig {
            mode: AnalysisMode::LayerSeparation,
            ..AnalyzerConfig::default()
        },
    );

    c.bench_function("analyze_band_differential_256", |b| {
        b.iter(|| black_box(banded.analyze(black_box(&img))))
    });
    c.bench_function("analyze_layer_separation_256", |b| {
        b.iter(|| black_box(layered.analyze(black_box(&img))))
    });
}

fn bench_fingerprint(c: &mut Criterion) {
    let img = make_marker_fixture(256, 7);
    let fft = Fft2d::new(256, 256);
    let cfg = FingerprintConfig::default();
    c.bench_function("fingerprint_256", |b| {
        b.iter(|| black_box(extract_features_with(black_box(&img), &fft, &cfg)))
    });
}

fn bench_localize(c: &mut Criterion) {
    let frame = make_frame_fixture(640, 480, 11);
    let cfg = LocalizerConfig::default();
    c.bench_function("find_roi_640x480", |b| {
        b.iter(|| black_box(find_roi(black_box(&frame), &cfg)))
    });
}

criterion_group!(
    hotpaths,
    bench_fft,
    bench_analyze,
    bench_fingerprint,
    bench_localize
);
criterion_main!(hotpaths);
