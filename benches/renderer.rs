use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use geo::{Rect, coord};
use geo_layers_renderer::canvas::{Canvas, OutputFormat};
use geo_layers_renderer::config::TransformConfig;
use geo_layers_renderer::crop::crop;
use geo_layers_renderer::parser::{CsvOptions, parse_csv_bytes, parse_geojson_str};
use geo_layers_renderer::shape::Layer;
use geo_layers_renderer::style::{Styler, UniformStyle};
use std::hint::black_box;

const SIZE: u32 = 512;

// A `side` x `side` grid of square cells over lon 0..10 / lat 0..10, every fourth one with a hole.
fn grid_feature_collection(side: usize) -> String {
    let step = 10.0 / side as f64;
    let mut features = Vec::with_capacity(side * side);
    for row in 0..side {
        for col in 0..side {
            let (x, y) = (col as f64 * step, row as f64 * step);
            let ring = |inset: f64| {
                let (x0, y0, x1, y1) = (x + inset, y + inset, x + step - inset, y + step - inset);
                format!("[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]")
            };
            let rings = if (row + col) % 4 == 0 {
                format!("{},{}", ring(0.0), ring(step / 4.0))
            } else {
                ring(0.0)
            };
            features.push(format!(
                r#"{{"type":"Feature","properties":{{"ROW":{row},"COL":{col},"NAME":"cell {row}/{col}"}},"geometry":{{"type":"Polygon","coordinates":[{rings}]}}}}"#
            ));
        }
    }
    format!(
        r#"{{"type":"FeatureCollection","features":[{}]}}"#,
        features.join(",")
    )
}

fn point_rows(count: usize) -> String {
    let mut out = String::from("NAME,LONGITUDE,LATITUDE,VALUE\n");
    for i in 0..count {
        let lon = (i * 7 % 1000) as f64 / 100.0;
        let lat = (i * 13 % 1000) as f64 / 100.0;
        out.push_str(&format!("site {i},{lon},{lat},{}\n", i * 3));
    }
    out
}

fn styled_grid(side: usize) -> Vec<Layer> {
    let group = parse_geojson_str(&grid_feature_collection(side), "grid").expect("parse failed");
    let transform = TransformConfig {
        scale_x: SIZE as f64 / 8.0,
        scale_y: -(SIZE as f64) / 8.0,
        translate_x: -(SIZE as f64) / 8.0,
        translate_y: SIZE as f64 * 9.0 / 8.0,
    }
    .to_affine();
    let layer = Layer::with_groups("grid", vec![group]).transformed(&transform);
    let style = UniformStyle {
        label_attribute: Some("NAME".to_string()),
        ..UniformStyle::default()
    };
    style.style_layer(&layer, 1.0)
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for side in [8usize, 32, 64] {
        let input = grid_feature_collection(side);
        group.bench_with_input(BenchmarkId::new("geojson", side * side), &input, |b, data| {
            b.iter(|| {
                let parsed = parse_geojson_str(black_box(data), "grid").expect("parse failed");
                black_box(parsed.shape_count());
            });
        });
    }
    let options = CsvOptions::default();
    for count in [100usize, 10_000] {
        let input = point_rows(count);
        group.bench_with_input(BenchmarkId::new("csv", count), &input, |b, data| {
            b.iter(|| {
                let parsed =
                    parse_csv_bytes(black_box(data.as_bytes()), "sites", &options).expect("parse failed");
                black_box(parsed.shape_count());
            });
        });
    }
    group.finish();
}

fn bench_crop(c: &mut Criterion) {
    let mut group = c.benchmark_group("crop");
    let area = Rect::new(coord! { x: 2.5, y: 2.5 }, coord! { x: 7.5, y: 7.5 });
    for side in [8usize, 32] {
        let parsed = parse_geojson_str(&grid_feature_collection(side), "grid").expect("parse failed");
        group.bench_with_input(BenchmarkId::from_parameter(side * side), &parsed, |b, grid| {
            b.iter(|| {
                let kept = grid
                    .iter_shapes()
                    .filter_map(|shape| crop(black_box(shape.geometry()), &area))
                    .count();
                black_box(kept);
            });
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    group.sample_size(20);
    for side in [8usize, 32] {
        let layers = styled_grid(side);
        for format in [OutputFormat::Svg, OutputFormat::Png] {
            group.bench_with_input(
                BenchmarkId::new(format.extension(), side * side),
                &layers,
                |b, layers| {
                    b.iter(|| {
                        let mut canvas = Canvas::new(SIZE, SIZE, 0.0).expect("canvas failed");
                        match format {
                            OutputFormat::Svg => canvas.disable_raster(),
                            _ => canvas.disable_vector(),
                        }
                        canvas.draw_layers(black_box(layers));
                        let mut out = Vec::new();
                        canvas.render_to_writer(format, &mut out).expect("render failed");
                        black_box(out.len());
                    });
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_crop, bench_render);
criterion_main!(benches);
