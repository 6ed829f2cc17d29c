use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;

use duocam_image::Image;
use duocam_imgproc::{color::to_gray_u8, interpolation::remap_u8, threshold::count_above_threshold};

fn bench_remap(c: &mut Criterion) {
    let mut group = c.benchmark_group("RemapU8");

    for (width, height) in [(320, 240), (640, 480), (1280, 720)].iter() {
        group.throughput(criterion::Throughput::Elements((*width * *height) as u64));

        let parameter_string = format!("{}x{}", width, height);

        let image_size = [*width, *height].into();
        let mut rng = rand::rng();
        let image = Image::<u8, 3>::from_fn(image_size, |_, _, _| rng.random::<u8>());

        // a mild barrel warp so the interpolation path is exercised
        let (cx, cy) = (*width as f32 / 2.0, *height as f32 / 2.0);
        let map_x = Image::<f32, 1>::from_fn(image_size, |x, y, _| {
            let (dx, dy) = ((x as f32 - cx) / cx, (y as f32 - cy) / cy);
            cx + (x as f32 - cx) * (1.0 + 0.05 * (dx * dx + dy * dy))
        });
        let map_y = Image::<f32, 1>::from_fn(image_size, |x, y, _| {
            let (dx, dy) = ((x as f32 - cx) / cx, (y as f32 - cy) / cy);
            cy + (y as f32 - cy) * (1.0 + 0.05 * (dx * dx + dy * dy))
        });
        let output = Image::<u8, 3>::from_size_val(image_size, 0).unwrap();

        group.bench_with_input(
            BenchmarkId::new("remap_u8", &parameter_string),
            &(&image, &output),
            |b, i| {
                let (src, mut dst) = (i.0.clone(), i.1.clone());
                b.iter(|| {
                    remap_u8(
                        black_box(&src),
                        black_box(&mut dst),
                        black_box(&map_x),
                        black_box(&map_y),
                    )
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("flash_count", &parameter_string),
            &image,
            |b, src| {
                b.iter(|| {
                    let gray = to_gray_u8(black_box(src)).unwrap();
                    count_above_threshold(&gray, 220)
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_remap);
criterion_main!(benches);
