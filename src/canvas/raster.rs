use std::io::Cursor;

use geo::{AffineTransform, Coord, Rect};
use image::{DynamicImage, ImageFormat, RgbaImage};
use resvg::tiny_skia::{
    self, FillRule, Mask, Paint, Path, PathBuilder, Pixmap, PixmapPaint, StrokeDash, Transform,
};

use super::GraphicsState;
use super::format::OutputFormat;
use super::surface::Surface;
use crate::error::RenderError;
use crate::geometry::Geometry;
use crate::paint::{BasicStroke, Color, LineCap, LineJoin, TextAlign};
use crate::text_metrics::text_width;
use tracing::warn;

/// Pixel backend drawing into a premultiplied RGBA pixmap.
pub struct RasterSurface {
    pixmap: Pixmap,
    clip: Option<(Rect, Mask)>,
    text_options: Option<usvg::Options<'static>>,
}

impl RasterSurface {
    /// `None` when the size is zero or the buffer cannot be allocated.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Some(Self {
            pixmap: Pixmap::new(width, height)?,
            clip: None,
            text_options: None,
        })
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>, RenderError> {
        let encode_error = |message: String| RenderError::Encode {
            format: format.extension(),
            message,
        };
        let image_format = match format {
            OutputFormat::Png => {
                return self
                    .pixmap
                    .encode_png()
                    .map_err(|err| encode_error(err.to_string()));
            }
            OutputFormat::Gif => ImageFormat::Gif,
            OutputFormat::Jpg => ImageFormat::Jpeg,
            OutputFormat::Svg => {
                return Err(RenderError::UnsupportedFormat(format.to_string()));
            }
        };

        let mut rgba = Vec::with_capacity(self.pixmap.data().len());
        for pixel in self.pixmap.pixels() {
            let color = pixel.demultiply();
            rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        let image = RgbaImage::from_raw(self.pixmap.width(), self.pixmap.height(), rgba)
            .ok_or_else(|| encode_error("pixel buffer size mismatch".to_string()))?;
        let image = if format.has_alpha() {
            DynamicImage::ImageRgba8(image)
        } else {
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(image).to_rgb8())
        };

        let mut bytes = Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, image_format)
            .map_err(|err| encode_error(err.to_string()))?;
        Ok(bytes.into_inner())
    }

    fn text_options(&mut self) -> &usvg::Options<'static> {
        self.text_options.get_or_insert_with(|| {
            let mut options = usvg::Options::default();
            options.fontdb_mut().load_system_fonts();
            options
        })
    }
}

impl Surface for RasterSurface {
    fn fill(&mut self, geometry: &Geometry, state: &GraphicsState) {
        if !geometry.is_closed() {
            return;
        }
        let Some(path) = to_path(geometry) else {
            return;
        };
        let paint = solid(state.paint);
        let transform = to_transform(&state.transform);
        let (width, height) = (self.pixmap.width(), self.pixmap.height());
        let mask = clip_mask(&mut self.clip, state.clip, width, height);
        self.pixmap
            .fill_path(&path, &paint, FillRule::EvenOdd, transform, mask);
    }

    fn stroke(&mut self, geometry: &Geometry, state: &GraphicsState) {
        let Some(path) = to_path(geometry) else {
            return;
        };
        let paint = solid(state.paint);
        let transform = to_transform(&state.transform);
        let (width, height) = (self.pixmap.width(), self.pixmap.height());
        let mask = clip_mask(&mut self.clip, state.clip, width, height);
        for pass in state.stroke.passes() {
            self.pixmap
                .stroke_path(&path, &paint, &to_stroke(pass), transform, mask);
        }
    }

    fn draw_text(&mut self, text: &str, origin: Coord, align: TextAlign, state: &GraphicsState) {
        if text.is_empty() {
            return;
        }
        let x = origin.x as f32 + align.offset(text_width(text, &state.font));
        let font = &state.font;
        let svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\"><text x=\"{x}\" y=\"{y}\" font-family=\"{family}\" font-size=\"{size}\" font-weight=\"{weight}\" font-style=\"{style}\" fill=\"{fill}\" fill-opacity=\"{opacity}\">{text}</text></svg>",
            w = self.pixmap.width(),
            h = self.pixmap.height(),
            y = origin.y,
            family = escape_attr(&font.family),
            size = font.size,
            weight = if font.bold { "bold" } else { "normal" },
            style = if font.italic { "italic" } else { "normal" },
            fill = state.paint.to_hex(),
            opacity = state.paint.opacity(),
            text = escape_attr(text),
        );
        let tree = match usvg::Tree::from_str(&svg, self.text_options()) {
            Ok(tree) => tree,
            Err(err) => {
                warn!(%err, text, "text could not be rasterized");
                return;
            }
        };

        let transform = to_transform(&state.transform);
        let (width, height) = (self.pixmap.width(), self.pixmap.height());
        match clip_mask(&mut self.clip, state.clip, width, height) {
            None => resvg::render(&tree, transform, &mut self.pixmap.as_mut()),
            Some(mask) => {
                let Some(mut layer) = Pixmap::new(width, height) else {
                    return;
                };
                resvg::render(&tree, transform, &mut layer.as_mut());
                self.pixmap.draw_pixmap(
                    0,
                    0,
                    layer.as_ref(),
                    &PixmapPaint::default(),
                    Transform::identity(),
                    Some(mask),
                );
            }
        }
    }
}

fn clip_mask<'a>(
    cache: &'a mut Option<(Rect, Mask)>,
    clip: Option<Rect>,
    width: u32,
    height: u32,
) -> Option<&'a Mask> {
    let clip = clip?;
    if !matches!(cache, Some((rect, _)) if *rect == clip) {
        *cache = build_mask(&clip, width, height).map(|mask| (clip, mask));
    }
    cache.as_ref().map(|(_, mask)| mask)
}

fn build_mask(clip: &Rect, width: u32, height: u32) -> Option<Mask> {
    let mut mask = Mask::new(width, height)?;
    let rect = tiny_skia::Rect::from_ltrb(
        clip.min().x as f32,
        clip.min().y as f32,
        clip.max().x as f32,
        clip.max().y as f32,
    )?;
    mask.fill_path(
        &PathBuilder::from_rect(rect),
        FillRule::Winding,
        false,
        Transform::identity(),
    );
    Some(mask)
}

fn to_path(geometry: &Geometry) -> Option<Path> {
    let mut builder = PathBuilder::new();
    match geometry {
        Geometry::Point(_) => return None,
        Geometry::Rect(rect) => {
            builder.push_rect(tiny_skia::Rect::from_xywh(
                rect.min().x as f32,
                rect.min().y as f32,
                rect.width() as f32,
                rect.height() as f32,
            )?);
        }
        Geometry::Ellipse(ellipse) => {
            let bounds = ellipse.bounds();
            builder.push_oval(tiny_skia::Rect::from_xywh(
                bounds.min().x as f32,
                bounds.min().y as f32,
                bounds.width() as f32,
                bounds.height() as f32,
            )?);
        }
        Geometry::Line(parts) => push_parts(&mut builder, parts, false),
        Geometry::Polygon(rings) => push_parts(&mut builder, rings, true),
    }
    builder.finish()
}

fn push_parts(builder: &mut PathBuilder, parts: &[Vec<Coord>], close: bool) {
    for part in parts {
        let mut points = part.iter();
        let Some(first) = points.next() else {
            continue;
        };
        builder.move_to(first.x as f32, first.y as f32);
        for point in points {
            builder.line_to(point.x as f32, point.y as f32);
        }
        if close {
            builder.close();
        }
    }
}

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

fn to_stroke(stroke: &BasicStroke) -> tiny_skia::Stroke {
    tiny_skia::Stroke {
        width: stroke.width,
        miter_limit: stroke.miter_limit,
        line_cap: match stroke.cap {
            LineCap::Butt => tiny_skia::LineCap::Butt,
            LineCap::Round => tiny_skia::LineCap::Round,
            LineCap::Square => tiny_skia::LineCap::Square,
        },
        line_join: match stroke.join {
            LineJoin::Miter => tiny_skia::LineJoin::Miter,
            LineJoin::Round => tiny_skia::LineJoin::Round,
            LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
        },
        dash: stroke
            .dash
            .clone()
            .and_then(|dash| StrokeDash::new(dash, stroke.dash_offset)),
    }
}

fn to_transform(transform: &AffineTransform) -> Transform {
    Transform::from_row(
        transform.a() as f32,
        transform.d() as f32,
        transform.b() as f32,
        transform.e() as f32,
        transform.xoff() as f32,
        transform.yoff() as f32,
    )
}

fn escape_attr(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Stroke;

    fn pixel(surface: &RasterSurface, x: u32, y: u32) -> (u8, u8, u8, u8) {
        let color = surface.pixmap().pixel(x, y).unwrap().demultiply();
        (color.red(), color.green(), color.blue(), color.alpha())
    }

    #[test]
    fn even_odd_fill_leaves_holes_empty() {
        let mut surface = RasterSurface::new(100, 100).unwrap();
        let polygon = Geometry::polygon(vec![
            vec![(10.0, 10.0), (90.0, 10.0), (90.0, 90.0), (10.0, 90.0)],
            vec![(30.0, 30.0), (70.0, 30.0), (70.0, 70.0), (30.0, 70.0)],
            vec![(45.0, 45.0), (55.0, 45.0), (55.0, 55.0), (45.0, 55.0)],
        ]);
        let state = GraphicsState {
            paint: Color::rgb(0, 128, 0),
            ..GraphicsState::default()
        };
        surface.fill(&polygon, &state);
        assert_eq!(pixel(&surface, 20, 20), (0, 128, 0, 255));
        assert_eq!(pixel(&surface, 35, 35).3, 0);
        assert_eq!(pixel(&surface, 50, 50), (0, 128, 0, 255));
    }

    #[test]
    fn clip_limits_painting() {
        let mut surface = RasterSurface::new(50, 50).unwrap();
        let state = GraphicsState {
            clip: Some(Rect::new(
                geo::coord! { x: 0.0, y: 0.0 },
                geo::coord! { x: 25.0, y: 50.0 },
            )),
            ..GraphicsState::default()
        };
        surface.fill(&Geometry::rect(0.0, 0.0, 50.0, 50.0), &state);
        assert_eq!(pixel(&surface, 10, 10).3, 255);
        assert_eq!(pixel(&surface, 40, 10).3, 0);
    }

    #[test]
    fn composite_stroke_paints_every_pass() {
        let mut surface = RasterSurface::new(60, 20).unwrap();
        let state = GraphicsState {
            stroke: Stroke::Composite(vec![BasicStroke::new(2.0), BasicStroke::new(8.0)]),
            ..GraphicsState::default()
        };
        surface.stroke(&Geometry::polyline(vec![(0.0, 10.0), (60.0, 10.0)]), &state);
        assert_eq!(pixel(&surface, 30, 10).3, 255);
        assert_eq!(pixel(&surface, 30, 7).3, 255);
    }

    #[test]
    fn jpeg_output_is_opaque() {
        let surface = RasterSurface::new(8, 8).unwrap();
        let bytes = surface.encode(OutputFormat::Jpg).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(!decoded.color().has_alpha());
        let png = surface.encode(OutputFormat::Png).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
}
