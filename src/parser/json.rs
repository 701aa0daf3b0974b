use std::path::Path;
use std::sync::Arc;

use geo::{Coord, coord};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::ParseError;
use crate::geometry::Geometry;
use crate::shape::{AttributeValue, Attributes, ShapeGroup, ShapeGroupBuilder};

/// Geometry kinds the renderer understands. Multi-part kinds are already split into parts.
enum FeatureGeometry {
    Point(Coord),
    Lines(Vec<Vec<Coord>>),
    Polygons(Vec<Vec<Vec<Coord>>>),
}

pub fn parse_geojson_file(path: &Path, name: &str) -> Result<ShapeGroup, ParseError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_geojson_str(&contents, name)
}

/// Fails only when `input` is not JSON at all; every GeoJSON-level problem is logged and the
/// offending feature skipped.
pub fn parse_geojson_str(input: &str, name: &str) -> Result<ShapeGroup, ParseError> {
    let document: Value = serde_json::from_str(input)?;
    Ok(parse_geojson_value(&document, name))
}

pub fn parse_geojson_value(document: &Value, name: &str) -> ShapeGroup {
    let mut group = ShapeGroupBuilder::new(name);
    match document.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => match document.get("features").and_then(Value::as_array) {
            Some(features) => {
                for (idx, feature) in features.iter().enumerate() {
                    parse_feature(idx, feature, &mut group);
                }
            }
            None => error!(source = name, "GeoJSON contains no feature"),
        },
        Some(other) => error!(source = name, kind = other, "unsupported GeoJSON type"),
        None => error!(source = name, "GeoJSON has no type defined"),
    }
    debug!(source = name, shapes = group.len(), "parsed GeoJSON");
    group.build()
}

fn parse_feature(idx: usize, feature: &Value, group: &mut ShapeGroupBuilder) {
    match feature.get("type").and_then(Value::as_str) {
        Some("Feature") => {}
        Some(other) => {
            warn!(feature = idx, kind = other, "unsupported feature type, skipped");
            return;
        }
        None => {
            warn!(feature = idx, "feature has no type defined, skipped");
            return;
        }
    }

    let geometry = match feature.get("geometry") {
        Some(value) if !value.is_null() => value,
        _ => {
            warn!(feature = idx, "feature has no geometry, skipped");
            return;
        }
    };
    let geometry = match classify(geometry) {
        Ok(geometry) => geometry,
        Err(reason) => {
            warn!(feature = idx, %reason, "feature geometry skipped");
            return;
        }
    };

    let attributes = Arc::new(parse_properties(feature.get("properties")));
    match geometry {
        FeatureGeometry::Point(point) => {
            group.add(Geometry::Point(point), attributes);
        }
        FeatureGeometry::Lines(lines) => {
            for line in lines {
                if line.is_empty() {
                    warn!(feature = idx, "empty LineString coordinates, part skipped");
                    continue;
                }
                group.add(Geometry::Line(vec![line]), Arc::clone(&attributes));
            }
        }
        FeatureGeometry::Polygons(polygons) => {
            for rings in polygons {
                if rings.first().is_none_or(|exterior| exterior.len() < 2) {
                    warn!(feature = idx, "degenerate Polygon exterior ring, part skipped");
                    continue;
                }
                let rings: Vec<Vec<Coord>> = rings.into_iter().filter(|ring| ring.len() > 1).collect();
                group.add(Geometry::Polygon(rings), Arc::clone(&attributes));
            }
        }
    }
}

fn classify(value: &Value) -> Result<FeatureGeometry, String> {
    let geometry = geojson::Geometry::from_json_value(value.clone()).map_err(|err| err.to_string())?;
    match geometry.value {
        geojson::Value::Point(position) => position_to_coord(&position)
            .map(FeatureGeometry::Point)
            .ok_or_else(|| "Point has fewer than two ordinates".to_string()),
        geojson::Value::LineString(line) => Ok(FeatureGeometry::Lines(vec![positions(&line)])),
        geojson::Value::MultiLineString(lines) => Ok(FeatureGeometry::Lines(
            lines.iter().map(|line| positions(line)).collect(),
        )),
        geojson::Value::Polygon(rings) => Ok(FeatureGeometry::Polygons(vec![
            rings.iter().map(|ring| positions(ring)).collect(),
        ])),
        geojson::Value::MultiPolygon(polygons) => Ok(FeatureGeometry::Polygons(
            polygons
                .iter()
                .map(|rings| rings.iter().map(|ring| positions(ring)).collect())
                .collect(),
        )),
        geojson::Value::MultiPoint(_) => Err("unsupported geometry type 'MultiPoint'".to_string()),
        geojson::Value::GeometryCollection(_) => {
            Err("unsupported geometry type 'GeometryCollection'".to_string())
        }
    }
}

// Coordinates are [longitude, latitude, ...]; extra ordinates (altitude) are ignored.
fn position_to_coord(position: &[f64]) -> Option<Coord> {
    match position {
        [x, y, ..] => Some(coord! { x: *x, y: *y }),
        _ => None,
    }
}

fn positions(line: &[Vec<f64>]) -> Vec<Coord> {
    line.iter().filter_map(|position| position_to_coord(position)).collect()
}

fn parse_properties(properties: Option<&Value>) -> Attributes {
    let Some(Value::Object(map)) = properties else {
        return Attributes::new();
    };
    map.iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::Number(number) => AttributeValue::Number(number.as_f64()?),
                Value::String(text) => AttributeValue::Text(text.clone()),
                Value::Bool(flag) => AttributeValue::Text(flag.to_string()),
                nested => AttributeValue::Text(nested.to_string()),
            };
            Some((key.clone(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipolygon_expands_into_shapes_sharing_attributes() {
        let input = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "NAME": "Reef", "AREA": 12.5 },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[0, 0], [1, 0], [1, 1], [0, 0]]],
                        [[[2, 2], [3, 2], [3, 3], [2, 2]], [[2.2, 2.1], [2.8, 2.1], [2.8, 2.6], [2.2, 2.1]]],
                        [[[5, 5], [6, 5], [6, 6], [5, 5]]]
                    ]
                }
            }]
        }"#;
        let group = parse_geojson_str(input, "Reefs").unwrap();
        assert_eq!(group.name(), "Reefs");
        assert_eq!(group.shapes().len(), 3);
        assert!(group.groups().is_empty());
        for shape in group.shapes() {
            assert_eq!(shape.attribute("NAME"), Some(&AttributeValue::Text("Reef".into())));
            assert_eq!(shape.attribute("AREA"), Some(&AttributeValue::Number(12.5)));
        }
        match group.shapes()[1].geometry() {
            Geometry::Polygon(rings) => assert_eq!(rings.len(), 2),
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn coordinates_are_longitude_then_latitude() {
        let input = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [145.25, -15.46]}}
        ]}"#;
        let group = parse_geojson_str(input, "Cities").unwrap();
        assert_eq!(
            group.shapes()[0].geometry().anchor(),
            Some(coord! { x: 145.25, y: -15.46 })
        );
    }

    #[test]
    fn bad_features_are_skipped() {
        let input = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"id": 1}, "geometry": null},
            {"type": "Feature", "properties": {"id": 2}, "geometry": {"type": "MultiPoint", "coordinates": [[0, 0]]}},
            {"type": "Banana", "geometry": {"type": "Point", "coordinates": [0, 0]}},
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}},
            {"type": "Feature", "properties": {"id": 5}, "geometry": {"type": "MultiLineString", "coordinates": [[[0, 0], [1, 1]], [[2, 2], [3, 3]]]}}
        ]}"#;
        let group = parse_geojson_str(input, "Mixed").unwrap();
        assert_eq!(group.shapes().len(), 3);
        assert!(group.shapes()[0].attributes().is_empty());
        assert_eq!(group.shapes()[1].attribute("id"), Some(&AttributeValue::Number(5.0)));
    }

    #[test]
    fn degenerate_exterior_drops_the_polygon_part() {
        let input = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {}, "geometry": {"type": "MultiPolygon", "coordinates": [
                [[[5, 5]], [[1, 1], [2, 1], [2, 2], [1, 1]]],
                [[[0, 0], [4, 0], [4, 4], [0, 0]], [[1, 1], [2, 1], [2, 2], [1, 1]]]
            ]}}
        ]}"#;
        let group = parse_geojson_str(input, "Holes").unwrap();
        assert_eq!(group.shapes().len(), 1);
        match group.shapes()[0].geometry() {
            Geometry::Polygon(rings) => {
                assert_eq!(rings.len(), 2);
                assert_eq!(rings[0][1], coord! { x: 4.0, y: 0.0 });
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn non_collection_documents_produce_empty_group() {
        let input = r#"{"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [0, 0]}}"#;
        let group = parse_geojson_str(input, "Single").unwrap();
        assert!(group.is_empty());
        assert!(parse_geojson_str("{not json", "Broken").is_err());
    }
}
