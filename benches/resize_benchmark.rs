use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, Rgb, RgbImage};
use imgbatch::processing::{Codec, FilterType, ImageCodec};
use imgbatch::{compute_output_size, Dimensions, ImageFormat, ResizeRequest};

fn synthetic_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
    }))
}

fn benchmark_geometry(c: &mut Criterion) {
    let requests = [
        ("scale", ResizeRequest::scale(0.37)),
        ("fit", ResizeRequest::fit(1920, 1080)),
        ("width", ResizeRequest::width(800)),
        ("height", ResizeRequest::height(600)),
        ("identity", ResizeRequest::none()),
    ];

    let mut group = c.benchmark_group("compute_output_size");
    for (name, request) in &requests {
        group.bench_function(*name, |b| {
            b.iter(|| compute_output_size(black_box(4032), black_box(3024), black_box(request)))
        });
    }
    group.finish();
}

fn benchmark_resample(c: &mut Criterion) {
    let source = synthetic_image(1024, 768);
    let target = Dimensions::new(512, 384);

    let mut group = c.benchmark_group("resample_1024x768_to_half");
    group.sample_size(20);
    for filter in [FilterType::Nearest, FilterType::Triangle, FilterType::CatmullRom, FilterType::Lanczos3] {
        let codec = ImageCodec::with_filter(filter);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{:?}", filter)), &codec, |b, codec| {
            b.iter(|| codec.resample(source.clone(), target))
        });
    }
    group.finish();
}

fn benchmark_encode(c: &mut Criterion) {
    let image = synthetic_image(512, 384);
    let codec = ImageCodec::new();

    let mut group = c.benchmark_group("encode_512x384");
    group.sample_size(20);
    for format in ImageFormat::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(format), &format, |b, &format| {
            b.iter(|| codec.encode(&image, format, 85))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_geometry, benchmark_resample, benchmark_encode);
criterion_main!(benches);
