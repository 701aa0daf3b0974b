use std::borrow::Cow;

use geo::{BooleanOps, Coord, LineString, MultiLineString, MultiPolygon, Polygon, Rect, coord};
use tracing::trace;

use crate::geometry::{Geometry, rect_contains_rect, rects_intersect};

/// Cuts `geometry` down to `area`.
///
/// Geometries entirely outside the area yield `None`; geometries entirely inside are returned
/// borrowed and unchanged. Closed geometries are intersected as areas (even-odd), so one polygon
/// may come back as several pieces. Polylines are clipped segment by segment: a run that leaves
/// and re-enters the area becomes two separate open parts.
pub fn crop<'g>(geometry: &'g Geometry, area: &Rect) -> Option<Cow<'g, Geometry>> {
    let bounds = geometry.bounds()?;
    if !rects_intersect(&bounds, area) {
        trace!("geometry outside the drawing area, discarded");
        return None;
    }
    if rect_contains_rect(area, &bounds) {
        return Some(Cow::Borrowed(geometry));
    }

    let cropped = match geometry {
        // A point's bounds are either inside the area or disjoint from it.
        Geometry::Point(_) => return Some(Cow::Borrowed(geometry)),
        Geometry::Rect(rect) => crop_rect(rect, area).map(Geometry::Rect),
        Geometry::Line(parts) => crop_lines(parts, area),
        Geometry::Polygon(_) | Geometry::Ellipse(_) => crop_area(&geometry.rings(), area),
    };
    cropped.map(Cow::Owned)
}

fn crop_rect(rect: &Rect, area: &Rect) -> Option<Rect> {
    let min = coord! {
        x: rect.min().x.max(area.min().x),
        y: rect.min().y.max(area.min().y),
    };
    let max = coord! {
        x: rect.max().x.min(area.max().x),
        y: rect.max().y.min(area.max().y),
    };
    if min.x >= max.x || min.y >= max.y {
        return None;
    }
    Some(Rect::new(min, max))
}

fn crop_lines(parts: &[Vec<Coord>], area: &Rect) -> Option<Geometry> {
    let lines = MultiLineString::new(
        parts
            .iter()
            .filter(|part| part.len() >= 2)
            .map(|part| LineString::new(part.clone()))
            .collect(),
    );
    let clipped = area.to_polygon().clip(&lines, false);
    let kept: Vec<Vec<Coord>> = clipped
        .into_iter()
        .map(|line| line.0.into_iter().map(|c| clamp(c, area)).collect::<Vec<_>>())
        .filter(|line| line.len() >= 2)
        .collect();
    if kept.is_empty() {
        return None;
    }
    Some(Geometry::Line(kept))
}

fn crop_area(rings: &[Vec<Coord>], area: &Rect) -> Option<Geometry> {
    let shape = even_odd_area(rings)?;
    let clipped = shape.intersection(&MultiPolygon::new(vec![area.to_polygon()]));
    let mut out = Vec::new();
    for polygon in clipped {
        let (exterior, interiors) = polygon.into_inner();
        for ring in std::iter::once(exterior).chain(interiors) {
            let ring: Vec<Coord> = ring.0.into_iter().map(|c| clamp(c, area)).collect();
            if ring.len() >= 3 {
                out.push(ring);
            }
        }
    }
    if out.is_empty() {
        return None;
    }
    Some(Geometry::Polygon(out))
}

/// Folds the rings together with XOR, which is exactly the even-odd fill rule.
fn even_odd_area(rings: &[Vec<Coord>]) -> Option<MultiPolygon> {
    let mut rings = rings
        .iter()
        .filter(|ring| ring.len() >= 3)
        .map(|ring| MultiPolygon::new(vec![Polygon::new(LineString::new(ring.clone()), Vec::new())]));
    let first = rings.next()?;
    Some(rings.fold(first, |acc, ring| acc.xor(&ring)))
}

// Boolean ops snap to an internal grid; keep results inside the area so re-cropping is a no-op.
fn clamp(c: Coord, area: &Rect) -> Coord {
    coord! {
        x: c.x.clamp(area.min().x, area.max().x),
        y: c.y.clamp(area.min().y, area.max().y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::bounds_of;

    fn area() -> Rect {
        Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 100.0, y: 100.0 })
    }

    fn square(min: f64, max: f64) -> Vec<(f64, f64)> {
        vec![(min, min), (max, min), (max, max), (min, max)]
    }

    #[test]
    fn disjoint_geometry_is_dropped() {
        let outside = Geometry::polygon(vec![square(200.0, 300.0)]);
        assert!(crop(&outside, &area()).is_none());
        assert!(crop(&Geometry::point(-5.0, 50.0), &area()).is_none());
    }

    #[test]
    fn contained_geometry_is_borrowed() {
        let inside = Geometry::polygon(vec![square(10.0, 20.0)]);
        assert!(matches!(crop(&inside, &area()), Some(Cow::Borrowed(_))));
    }

    #[test]
    fn rect_stays_rect() {
        let rect = Geometry::rect(50.0, 50.0, 100.0, 100.0);
        let cropped = crop(&rect, &area()).unwrap().into_owned();
        assert_eq!(cropped, Geometry::rect(50.0, 50.0, 50.0, 50.0));
    }

    #[test]
    fn polygon_is_cut_to_the_area() {
        let polygon = Geometry::polygon(vec![square(50.0, 150.0)]);
        let cropped = crop(&polygon, &area()).unwrap().into_owned();
        let bounds = cropped.bounds().unwrap();
        assert!(rect_contains_rect(&area(), &bounds));
        assert!(cropped.contains(coord! { x: 75.0, y: 75.0 }));
        assert!(!cropped.contains(coord! { x: 25.0, y: 25.0 }));
    }

    #[test]
    fn holes_survive_cropping() {
        let polygon = Geometry::polygon(vec![square(-50.0, 90.0), square(20.0, 40.0)]);
        let cropped = crop(&polygon, &area()).unwrap().into_owned();
        assert!(cropped.contains(coord! { x: 10.0, y: 10.0 }));
        assert!(!cropped.contains(coord! { x: 30.0, y: 30.0 }));
        assert!(!cropped.contains(coord! { x: 95.0, y: 95.0 }));
    }

    #[test]
    fn u_shape_splits_into_pieces() {
        // A "U" whose bottom bar lies below the area leaves two separate arms.
        let u = Geometry::polygon(vec![vec![
            (10.0, 50.0),
            (30.0, 50.0),
            (30.0, 150.0),
            (70.0, 150.0),
            (70.0, 50.0),
            (90.0, 50.0),
            (90.0, 200.0),
            (10.0, 200.0),
        ]]);
        let low_area = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 100.0, y: 120.0 });
        let cropped = crop(&u, &low_area).unwrap().into_owned();
        match &cropped {
            Geometry::Polygon(rings) => assert_eq!(rings.len(), 2),
            other => panic!("expected polygon, got {other:?}"),
        }
        assert!(cropped.contains(coord! { x: 20.0, y: 100.0 }));
        assert!(cropped.contains(coord! { x: 80.0, y: 100.0 }));
        assert!(!cropped.contains(coord! { x: 50.0, y: 100.0 }));
    }

    #[test]
    fn cropping_is_idempotent() {
        let shapes = [
            Geometry::polygon(vec![square(-50.0, 150.0), square(40.0, 60.0)]),
            Geometry::rect(-10.0, 20.0, 300.0, 30.0),
            Geometry::ellipse(100.0, 100.0, 40.0, 20.0),
            Geometry::polyline(vec![(-10.0, 10.0), (50.0, 50.0), (150.0, 50.0)]),
        ];
        for shape in &shapes {
            let once = crop(shape, &area()).unwrap().into_owned();
            let twice = crop(&once, &area()).unwrap().into_owned();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn polyline_is_split_not_reconnected() {
        // Leaves the area through the top and comes back: two parts, no bridging segment.
        let line = Geometry::polyline(vec![(10.0, 50.0), (50.0, 150.0), (90.0, 50.0)]);
        let cropped = crop(&line, &area()).unwrap().into_owned();
        let Geometry::Line(parts) = &cropped else {
            panic!("expected polyline, got {cropped:?}");
        };
        assert_eq!(parts.len(), 2);
        let bounds = bounds_of(parts.iter().flatten()).unwrap();
        assert!(bounds.min().x >= 10.0 - 1e-9 && bounds.max().x <= 90.0 + 1e-9);
        assert!(!cropped.is_closed());
    }
}
