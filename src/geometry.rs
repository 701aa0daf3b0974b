use geo::{AffineTransform, Coord, Rect, coord};

const ELLIPSE_SEGMENTS: usize = 64;

/// Drawable geometry. Polygon rings are combined with even-odd semantics, so the first ring is
/// the filled boundary and every nested ring toggles the fill.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    /// One or more open polylines.
    Line(Vec<Vec<Coord>>),
    Polygon(Vec<Vec<Coord>>),
    Rect(Rect),
    Ellipse(Ellipse),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub center: Coord,
    pub rx: f64,
    pub ry: f64,
}

impl Ellipse {
    pub fn new(center: Coord, rx: f64, ry: f64) -> Self {
        Self {
            center,
            rx: rx.abs(),
            ry: ry.abs(),
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            coord! { x: self.center.x - self.rx, y: self.center.y - self.ry },
            coord! { x: self.center.x + self.rx, y: self.center.y + self.ry },
        )
    }

    pub fn to_ring(&self) -> Vec<Coord> {
        (0..ELLIPSE_SEGMENTS)
            .map(|step| {
                let angle = step as f64 / ELLIPSE_SEGMENTS as f64 * std::f64::consts::TAU;
                coord! {
                    x: self.center.x + self.rx * angle.cos(),
                    y: self.center.y + self.ry * angle.sin(),
                }
            })
            .collect()
    }
}

impl Geometry {
    pub fn point(x: f64, y: f64) -> Self {
        Self::Point(coord! { x: x, y: y })
    }

    pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::Rect(Rect::new(
            coord! { x: x, y: y },
            coord! { x: x + width, y: y + height },
        ))
    }

    pub fn ellipse(cx: f64, cy: f64, rx: f64, ry: f64) -> Self {
        Self::Ellipse(Ellipse::new(coord! { x: cx, y: cy }, rx, ry))
    }

    pub fn polyline(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self::Line(vec![points.into_iter().map(Coord::from).collect()])
    }

    pub fn polygon(rings: Vec<Vec<(f64, f64)>>) -> Self {
        Self::Polygon(
            rings
                .into_iter()
                .map(|ring| ring.into_iter().map(Coord::from).collect())
                .collect(),
        )
    }

    /// Closed geometries have an area; points and polylines don't.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Polygon(_) | Self::Rect(_) | Self::Ellipse(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Point(_) => false,
            Self::Line(parts) | Self::Polygon(parts) => parts.iter().all(|part| part.is_empty()),
            Self::Rect(_) | Self::Ellipse(_) => false,
        }
    }

    /// Anchor used to place a label. Only points have one.
    pub fn anchor(&self) -> Option<Coord> {
        match self {
            Self::Point(point) => Some(*point),
            _ => None,
        }
    }

    pub fn bounds(&self) -> Option<Rect> {
        match self {
            Self::Point(point) => Some(Rect::new(*point, *point)),
            Self::Line(parts) | Self::Polygon(parts) => bounds_of(parts.iter().flatten()),
            Self::Rect(rect) => Some(*rect),
            Self::Ellipse(ellipse) => Some(ellipse.bounds()),
        }
    }

    /// Rings of a closed geometry; empty for points and polylines.
    pub fn rings(&self) -> Vec<Vec<Coord>> {
        match self {
            Self::Polygon(rings) => rings.clone(),
            Self::Rect(rect) => vec![rect_ring(rect)],
            Self::Ellipse(ellipse) => vec![ellipse.to_ring()],
            Self::Point(_) | Self::Line(_) => Vec::new(),
        }
    }

    /// The same outline without closing segments.
    pub fn to_open(&self) -> Geometry {
        match self {
            Self::Point(_) | Self::Line(_) => self.clone(),
            closed => Self::Line(closed.rings()),
        }
    }

    /// Even-odd containment test. Always false for points and polylines.
    pub fn contains(&self, point: Coord) -> bool {
        match self {
            Self::Rect(rect) => rect_contains_point(rect, point),
            Self::Ellipse(ellipse) => {
                if ellipse.rx == 0.0 || ellipse.ry == 0.0 {
                    return false;
                }
                let dx = (point.x - ellipse.center.x) / ellipse.rx;
                let dy = (point.y - ellipse.center.y) / ellipse.ry;
                dx * dx + dy * dy <= 1.0
            }
            Self::Polygon(rings) => {
                rings.iter().filter(|ring| ring_contains(ring, point)).count() % 2 == 1
            }
            Self::Point(_) | Self::Line(_) => false,
        }
    }

    /// Returns a new geometry; `self` is left untouched. Rectangles and ellipses keep their
    /// variant under scale/translate and degrade to polygons under rotation or shear.
    pub fn transformed(&self, transform: &AffineTransform) -> Geometry {
        let apply = |c: &Coord| transform.apply(*c);
        match self {
            Self::Point(point) => Self::Point(transform.apply(*point)),
            Self::Line(parts) => {
                Self::Line(parts.iter().map(|part| part.iter().map(apply).collect()).collect())
            }
            Self::Polygon(rings) => {
                Self::Polygon(rings.iter().map(|ring| ring.iter().map(apply).collect()).collect())
            }
            Self::Rect(rect) if is_axis_aligned(transform) => {
                Self::Rect(Rect::new(transform.apply(rect.min()), transform.apply(rect.max())))
            }
            Self::Rect(rect) => Self::Polygon(vec![rect_ring(rect).iter().map(apply).collect()]),
            Self::Ellipse(ellipse) if is_axis_aligned(transform) => Self::Ellipse(Ellipse::new(
                transform.apply(ellipse.center),
                ellipse.rx * transform.a(),
                ellipse.ry * transform.e(),
            )),
            Self::Ellipse(ellipse) => {
                Self::Polygon(vec![ellipse.to_ring().iter().map(apply).collect()])
            }
        }
    }
}

pub fn is_axis_aligned(transform: &AffineTransform) -> bool {
    transform.b() == 0.0 && transform.d() == 0.0
}

pub fn rect_ring(rect: &Rect) -> Vec<Coord> {
    let (min, max) = (rect.min(), rect.max());
    vec![
        min,
        coord! { x: max.x, y: min.y },
        max,
        coord! { x: min.x, y: max.y },
    ]
}

pub fn bounds_of<'a>(coords: impl IntoIterator<Item = &'a Coord>) -> Option<Rect> {
    let mut iter = coords.into_iter();
    let first = *iter.next()?;
    let (min, max) = iter.fold((first, first), |(min, max), c| {
        (
            coord! { x: min.x.min(c.x), y: min.y.min(c.y) },
            coord! { x: max.x.max(c.x), y: max.y.max(c.y) },
        )
    });
    Some(Rect::new(min, max))
}

pub fn rect_contains_point(rect: &Rect, point: Coord) -> bool {
    let (min, max) = (rect.min(), rect.max());
    point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
}

pub fn rect_contains_rect(outer: &Rect, inner: &Rect) -> bool {
    rect_contains_point(outer, inner.min()) && rect_contains_point(outer, inner.max())
}

pub fn rects_intersect(a: &Rect, b: &Rect) -> bool {
    a.min().x <= b.max().x && a.max().x >= b.min().x && a.min().y <= b.max().y && a.max().y >= b.min().y
}

fn ring_contains(ring: &[Coord], point: Coord) -> bool {
    let mut inside = false;
    let mut prev = match ring.last() {
        Some(last) => *last,
        None => return false,
    };
    for current in ring {
        if (current.y > point.y) != (prev.y > point.y) {
            let cross_x = prev.x + (point.y - prev.y) / (current.y - prev.y) * (current.x - prev.x);
            if point.x < cross_x {
                inside = !inside;
            }
        }
        prev = *current;
    }
    inside
}
