use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::RgbImage;
use nalgebra::Matrix3;
use thermalign_core::{FeatureConfig, RegistrationConfig};
use thermalign_register::{
    Correspondence, HammingMatcher, OrbExtractor, RansacParams, Registrar, estimate_homography, warp_perspective,
};

/// Blocky pseudo-random texture resembling a rooftop survey frame
fn create_benchmark_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let id = (x / 8) * 131 + (y / 8) * 71;
        let v = ((id * 37) % 256) as u8;
        image::Rgb([v, v / 2, 255 - v])
    })
}

fn bench_extract_and_match(c: &mut Criterion) {
    let img = create_benchmark_image(640, 512);
    let gray = image::imageops::grayscale(&img);
    let extractor = OrbExtractor::new(FeatureConfig::default());
    let features = extractor.detect_and_describe_gray(&gray).unwrap();
    let matcher = HammingMatcher::default();

    let mut group = c.benchmark_group("extract_and_match");
    group.sample_size(10);
    group.bench_function("extract_640x512", |b| {
        b.iter(|| black_box(extractor.detect_and_describe_gray(black_box(&gray)).unwrap()))
    });
    group.bench_function("cross_check_match", |b| {
        b.iter(|| black_box(matcher.match_descriptors(&features.descriptors, &features.descriptors)))
    });
    group.finish();
}

fn bench_ransac(c: &mut Criterion) {
    let truth = Matrix3::new(0.99, -0.05, 10.0, 0.05, 0.99, -5.0, 0.0, 0.0, 1.0);
    let mut corr: Vec<Correspondence> = (0..300)
        .map(|i| {
            let (x, y) = ((i % 20) as f64 * 30.0, (i / 20) as f64 * 30.0);
            let p = truth * nalgebra::Vector3::new(x, y, 1.0);
            Correspondence::new((x, y), (p.x / p.z, p.y / p.z))
        })
        .collect();
    for i in 0..100 {
        let f = i as f64;
        corr.push(Correspondence::new((f * 5.0, 600.0 - f * 3.0), (f * 2.0 + 50.0, f * 7.0 % 400.0)));
    }
    let cfg = RegistrationConfig::default();
    let params = RansacParams {
        threshold: cfg.ransac_threshold,
        max_iterations: cfg.ransac_max_iterations,
        confidence: cfg.ransac_confidence,
        seed: cfg.seed,
    };

    c.bench_function("ransac_400_correspondences", |b| {
        b.iter(|| black_box(estimate_homography(black_box(&corr), &params)))
    });
}

fn bench_pair(c: &mut Criterion) {
    let visible = create_benchmark_image(640, 512);
    let thermal = warp_perspective(
        &visible,
        &Matrix3::new(1.0, 0.0, 4.0, 0.0, 1.0, -3.0, 0.0, 0.0, 1.0),
        640,
        512,
    )
    .unwrap();
    let registrar = Registrar::new(FeatureConfig::default(), RegistrationConfig::default()).unwrap();

    let mut group = c.benchmark_group("pair");
    group.sample_size(10);
    group.bench_function("align_640x512", |b| b.iter(|| black_box(registrar.align(&visible, &thermal))));
    group.finish();
}

criterion_group!(benches, bench_extract_and_match, bench_ransac, bench_pair);
criterion_main!(benches);
