use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use retrocam_core::shake::SeededRandom;
use retrocam_core::{FilterConfig, ImageBuf, ShakeEffect, apply_color, apply_filters, apply_shake};

fn test_frame(w: u32, h: u32) -> ImageBuf {
    let data = (0..w * h)
        .flat_map(|i| {
            let t = (i % 251) as f32 / 251.0;
            [t, 0.5 * t, 1.0 - t]
        })
        .collect();
    ImageBuf::from_data(w, h, data).unwrap()
}

fn bench_color(c: &mut Criterion) {
    let mut group = c.benchmark_group("color");
    let config = FilterConfig::iphone4();
    for (w, h) in [(640, 480), (1920, 1080)] {
        let frame = test_frame(w, h);
        group.bench_with_input(
            BenchmarkId::new("apply_color", format!("{w}x{h}")),
            &frame,
            |b, frame| b.iter(|| black_box(apply_color(black_box(frame), &config).unwrap())),
        );
    }
    group.finish();
}

fn bench_still(c: &mut Criterion) {
    let config = FilterConfig::builder().base_size(1296, 968).build().unwrap();
    let frame = test_frame(2592, 1936);
    c.bench_function("apply_filters_2592x1936", |b| {
        b.iter(|| black_box(apply_filters(black_box(&frame), &config).unwrap()))
    });
}

fn bench_shake(c: &mut Criterion) {
    let config = FilterConfig::iphone4();
    let frame = test_frame(1024, 768);
    let effect = ShakeEffect::generate(None, &config, &mut SeededRandom::new(3));
    c.bench_function("apply_shake_1024x768", |b| {
        b.iter(|| black_box(apply_shake(black_box(&frame), &effect).unwrap()))
    });
}

criterion_group!(benches, bench_color, bench_still, bench_shake);
criterion_main!(benches);
