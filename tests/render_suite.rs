use std::path::{Path, PathBuf};
use std::sync::Arc;

use geo::AffineTransform;
use geo_layers_renderer::canvas::{Backend, Canvas, OutputFormat};
use geo_layers_renderer::config::TransformConfig;
use geo_layers_renderer::paint::{BasicStroke, Color, Stroke};
use geo_layers_renderer::parser::{CsvOptions, parse_csv, parse_geojson_file};
use geo_layers_renderer::shape::{AttributeValue, Layer, Shape, ShapeStyle};
use geo_layers_renderer::style::{Styler, UniformStyle};
use geo_layers_renderer::{Geometry, RenderError};
use regex::Regex;

const SIZE: u32 = 300;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

// Longitudes 144.5..146 and latitudes -14.5..-16 onto a 300px square.
fn lon_lat_to_canvas() -> AffineTransform {
    TransformConfig {
        scale_x: 200.0,
        scale_y: -200.0,
        translate_x: -28900.0,
        translate_y: -2900.0,
    }
    .to_affine()
}

fn styled_layers() -> Vec<Layer> {
    let transform = lon_lat_to_canvas();
    let reefs = parse_geojson_file(&fixture("reefs.geojson"), "reefs").expect("reefs parse failed");
    let cities = parse_csv(&fixture("cities.csv"), "cities", &CsvOptions::default())
        .expect("cities parse failed");

    let reef_style = UniformStyle {
        fill: Some(Color::rgb(0xc8, 0xdc, 0xdc)),
        stroke: Some(Color::rgb(0x60, 0x80, 0x80)),
        ..UniformStyle::default()
    };
    let city_style = UniformStyle {
        label_attribute: Some("NAME".to_string()),
        label_color: Some(Color::BLACK),
        ..UniformStyle::default()
    };

    let mut layers = reef_style.style_layer(&Layer::with_groups("reefs", vec![reefs]).transformed(&transform), 1.0);
    layers.extend(city_style.style_layer(&Layer::with_groups("cities", vec![cities]).transformed(&transform), 1.0));
    layers
}

fn assert_valid_svg(svg: &str) {
    assert!(svg.contains("<svg"), "missing <svg tag");
    assert!(svg.contains("</svg>"), "missing </svg tag");
    assert_eq!(svg.matches("<g").count(), svg.matches("</g>").count(), "unbalanced groups");
}

#[test]
fn geojson_fixture_expands_multipolygons() {
    let group = parse_geojson_file(&fixture("reefs.geojson"), "reefs").unwrap();
    assert_eq!(group.shapes().len(), 4);

    let (first, second) = (&group.shapes()[0], &group.shapes()[1]);
    assert!(Arc::ptr_eq(first.shared_attributes(), second.shared_attributes()));
    assert_eq!(
        first.attribute("NAME"),
        Some(&AttributeValue::Text("Lizard Island Reefs".to_string()))
    );
    match second.geometry() {
        Geometry::Polygon(rings) => assert_eq!(rings.len(), 2),
        other => panic!("expected polygon with a hole, got {other:?}"),
    }
    assert!(matches!(group.shapes()[2].geometry(), Geometry::Line(_)));
}

#[test]
fn csv_fixture_skips_comments_and_empty_coordinates() {
    let group = parse_csv(&fixture("cities.csv"), "cities", &CsvOptions::default()).unwrap();
    let names: Vec<String> = group
        .shapes()
        .iter()
        .filter_map(|shape| shape.attribute("NAME").map(ToString::to_string))
        .collect();
    assert_eq!(names, ["Cooktown", "Hope Vale", "Lizard Island", "Cape Melville"]);
    assert_eq!(
        group.shapes()[1].attribute("POPULATION"),
        Some(&AttributeValue::Number(1005.0))
    );
    assert_eq!(
        group.shapes()[0].attribute("STATE"),
        Some(&AttributeValue::Text("QLD".to_string()))
    );
}

#[test]
fn svg_map_keeps_shapes_inside_the_drawing_area() {
    let mut canvas = Canvas::new(SIZE, SIZE, 0.0).unwrap();
    canvas.disable_raster();
    canvas.draw_layers(&styled_layers());
    let svg = canvas.svg_document().unwrap();
    assert_valid_svg(&svg);

    assert!(svg.contains("inkscape:label=\"reefs\""));
    assert!(svg.contains("inkscape:label=\"cities\""));
    assert!(svg.contains("<g id=\"cities_text\">"));
    assert!(svg.contains(">Cooktown</text>"));
    assert!(svg.contains(">Lizard Island</text>"));
    // Cape Melville maps to x = -40, west of the drawing area.
    assert!(!svg.contains(">Cape Melville</text>"));
    assert_eq!(svg.matches("<text").count(), 3);

    let path_re = Regex::new(r#" d="([^"]+)""#).unwrap();
    let number_re = Regex::new(r"-?\d+(\.\d+)?").unwrap();
    let mut paths = 0;
    for caps in path_re.captures_iter(&svg) {
        paths += 1;
        for number in number_re.find_iter(&caps[1]) {
            let value: f64 = number.as_str().parse().unwrap();
            assert!((0.0..=SIZE as f64).contains(&value), "coordinate {value} escapes the canvas");
        }
    }
    // Two reef parts and the river; the far north polygon is cropped away.
    assert_eq!(paths, 3);
}

#[test]
fn filled_and_stroked_rect_renders_identically() {
    let mut canvas = Canvas::new(100, 100, 0.0).unwrap();
    let shape = Shape::new(Geometry::rect(20.0, 20.0, 60.0, 60.0), Arc::default()).with_style(
        ShapeStyle {
            fill: Some(Color::rgb(0, 0, 255)),
            stroke_paint: Some(Color::BLACK),
            stroke: Some(Stroke::Basic(BasicStroke::new(4.0))),
            ..ShapeStyle::default()
        },
    );
    canvas.draw_shape(&shape);

    let svg = canvas.svg_document().unwrap();
    assert_eq!(svg.matches("<rect").count(), 1);
    assert!(!svg.contains("<path"));
    let rect = svg.lines().find(|line| line.starts_with("<rect")).unwrap();
    assert!(rect.contains("fill:#0000ff") && rect.contains("stroke:#000000"));

    let pixmap = canvas.pixmap().unwrap();
    let inside = pixmap.pixel(50, 50).unwrap().demultiply();
    assert_eq!((inside.red(), inside.green(), inside.blue()), (0, 0, 255));
    let border = pixmap.pixel(19, 50).unwrap().demultiply();
    assert_eq!((border.red(), border.green(), border.blue(), border.alpha()), (0, 0, 0, 255));
    assert_eq!(pixmap.pixel(5, 5).unwrap().alpha(), 0);
}

#[test]
fn disabled_raster_fails_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let mut canvas = Canvas::new(SIZE, SIZE, 0.0).unwrap();
    canvas.disable_raster();
    canvas.draw_layers(&styled_layers());

    for format in [OutputFormat::Png, OutputFormat::Gif, OutputFormat::Jpg] {
        let path = dir.path().join(format!("map.{}", format.extension()));
        let err = canvas.render(format, &path).unwrap_err();
        assert!(matches!(err, RenderError::BackendDisabled(Backend::Raster)));
        assert!(!path.exists());
    }
}

#[test]
fn raster_formats_are_encoded() {
    let dir = tempfile::tempdir().unwrap();
    let mut canvas = Canvas::new(SIZE, SIZE, -20.0).unwrap();
    canvas.disable_vector();
    canvas.draw_layers(&styled_layers());

    let signatures: [(OutputFormat, &[u8]); 3] = [
        (OutputFormat::Png, b"\x89PNG"),
        (OutputFormat::Gif, b"GIF8"),
        (OutputFormat::Jpg, b"\xff\xd8\xff"),
    ];
    for (format, magic) in signatures {
        let path = dir.path().join(format!("map.{}", format.extension()));
        canvas.render(format, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(magic), "{format} has a wrong signature");
    }
    assert!(canvas.render(OutputFormat::Svg, &dir.path().join("map.svg")).is_err());
}

#[cfg(feature = "cli")]
#[test]
fn config_pipeline_renders_every_layer() {
    use geo_layers_renderer::config::{Config, LayerConfig};

    let mut config = Config::default();
    config.render.width = SIZE;
    config.render.height = SIZE;
    config.render.background = Some(Color::WHITE);
    config.transform = TransformConfig {
        scale_x: 200.0,
        scale_y: -200.0,
        translate_x: -28900.0,
        translate_y: -2900.0,
    };
    config.layers.push(LayerConfig::from_source(fixture("reefs.geojson")));
    let mut cities = LayerConfig::from_source(fixture("cities.csv"));
    cities.style.label_attribute = Some("NAME".to_string());
    config.layers.push(cities);

    let mut canvas = geo_layers_renderer::cli::render_layers(&config, OutputFormat::Svg).unwrap();
    assert!(!canvas.is_raster_enabled());
    let svg = canvas.svg_document().unwrap();
    assert_valid_svg(&svg);
    let background = svg.find("inkscape:label=\"Background\"").unwrap();
    let reefs = svg.find("inkscape:label=\"reefs\"").unwrap();
    let cities = svg.find("inkscape:label=\"cities\"").unwrap();
    assert!(background < reefs && reefs < cities);
    assert!(svg.contains(">Cooktown</text>"));
    assert!(svg.contains(">Hope Vale</text>"));
    assert!(!svg.contains(">Cape Melville</text>"));
}
