use geo::{AffineTransform, Coord, Rect};

use super::GraphicsState;
use super::surface::{Surface, two_pass_fill_and_stroke};
use crate::geometry::Geometry;
use crate::paint::{BasicStroke, Color, Font, Stroke, TextAlign};

const INKSCAPE_NS: &str = "http://www.inkscape.org/namespaces/inkscape";

/// Accumulates an SVG document. Layers become Inkscape layer groups.
#[derive(Debug, Clone)]
pub struct VectorSurface {
    width: u32,
    height: u32,
    body: String,
    defs: String,
    clips: Vec<(Rect, String)>,
}

impl VectorSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            body: String::new(),
            defs: String::new(),
            clips: Vec::new(),
        }
    }

    /// The complete document as of now. Open groups are not closed for you.
    pub fn document(&self) -> String {
        let (width, height) = (self.width, self.height);
        let mut svg = String::with_capacity(self.body.len() + self.defs.len() + 256);
        svg.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n");
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:inkscape=\"{INKSCAPE_NS}\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">\n",
        ));
        if !self.defs.is_empty() {
            svg.push_str("<defs>\n");
            svg.push_str(&self.defs);
            svg.push_str("</defs>\n");
        }
        svg.push_str(&self.body);
        svg.push_str("</svg>\n");
        svg
    }

    fn emit(&mut self, geometry: &Geometry, style: &str, state: &GraphicsState) {
        let Some(element) = element_for(geometry) else {
            return;
        };
        let transform = transform_attribute(&state.transform);
        self.push_clipped(state.clip, format!("<{element} style=\"{style}\"{transform}/>\n"));
    }

    // The clip wraps the element so that it is not affected by the element's own transform.
    fn push_clipped(&mut self, clip: Option<Rect>, element: String) {
        match clip {
            Some(clip) => {
                let id = self.clip_id(clip);
                self.body
                    .push_str(&format!("<g clip-path=\"url(#{id})\">{element}</g>\n"));
            }
            None => self.body.push_str(&element),
        }
    }

    fn clip_id(&mut self, clip: Rect) -> String {
        if let Some((_, id)) = self.clips.iter().find(|(rect, _)| *rect == clip) {
            return id.clone();
        }
        let id = format!("clip{}", self.clips.len() + 1);
        self.defs.push_str(&format!(
            "<clipPath id=\"{id}\" clipPathUnits=\"userSpaceOnUse\"><rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"/></clipPath>\n",
            num(clip.min().x),
            num(clip.min().y),
            num(clip.width()),
            num(clip.height()),
        ));
        self.clips.push((clip, id.clone()));
        id
    }
}

impl Surface for VectorSurface {
    fn fill(&mut self, geometry: &Geometry, state: &GraphicsState) {
        if !geometry.is_closed() {
            return;
        }
        let style = format!("{};stroke:none", fill_style(state.paint));
        self.emit(geometry, &style, state);
    }

    fn stroke(&mut self, geometry: &Geometry, state: &GraphicsState) {
        for pass in state.stroke.passes() {
            let style = format!("fill:none;{}", stroke_style(state.paint, pass));
            self.emit(geometry, &style, state);
        }
    }

    fn fill_and_stroke(&mut self, geometry: &Geometry, stroke_paint: Color, state: &GraphicsState) {
        let basic = match &state.stroke {
            Stroke::Basic(basic) if geometry.is_closed() => basic,
            _ => return two_pass_fill_and_stroke(self, geometry, stroke_paint, state),
        };
        let style = format!(
            "{};{}",
            fill_style(state.paint),
            stroke_style(stroke_paint, basic)
        );
        self.emit(geometry, &style, state);
    }

    fn draw_text(&mut self, text: &str, origin: Coord, align: TextAlign, state: &GraphicsState) {
        let mut attrs = format!("x=\"{}\" y=\"{}\"", num(origin.x), num(origin.y));
        if let Some(anchor) = align.svg_anchor() {
            attrs.push_str(&format!(" text-anchor=\"{anchor}\""));
        }
        let transform = transform_attribute(&state.transform);
        let element = format!(
            "<text {attrs} style=\"{};{}\"{transform}>{}</text>\n",
            font_style(&state.font),
            fill_style(state.paint),
            escape_xml(text)
        );
        self.push_clipped(state.clip, element);
    }

    fn begin_layer(&mut self, name: &str, id: usize) {
        let name = escape_xml(name);
        self.body.push_str(&format!(
            "<g style=\"display:inline\" inkscape:groupmode=\"layer\" id=\"layer{id}\" inkscape:label=\"{name}\">\n<title>{name} ({id})</title>\n"
        ));
    }

    fn end_layer(&mut self) {
        self.body.push_str("</g>\n");
    }

    fn begin_group(&mut self, id: &str) {
        self.body
            .push_str(&format!("<g id=\"{}\">\n", escape_xml(id)));
    }

    fn end_group(&mut self) {
        self.body.push_str("</g>\n");
    }
}

/// Picks the most specific element for the geometry: native `rect` and `ellipse` where possible.
fn element_for(geometry: &Geometry) -> Option<String> {
    match geometry {
        Geometry::Point(_) => None,
        Geometry::Rect(rect) => Some(format!(
            "rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"",
            num(rect.min().x),
            num(rect.min().y),
            num(rect.width()),
            num(rect.height())
        )),
        Geometry::Ellipse(ellipse) => Some(format!(
            "ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\"",
            num(ellipse.center.x),
            num(ellipse.center.y),
            num(ellipse.rx),
            num(ellipse.ry)
        )),
        Geometry::Line(parts) => {
            let d = path_data(parts, false);
            (!d.is_empty()).then(|| format!("path d=\"{d}\""))
        }
        Geometry::Polygon(rings) => {
            let d = path_data(rings, true);
            (!d.is_empty()).then(|| format!("path d=\"{d}\""))
        }
    }
}

fn path_data(parts: &[Vec<Coord>], close: bool) -> String {
    let mut d = String::new();
    for part in parts.iter().filter(|part| !part.is_empty()) {
        for (idx, point) in part.iter().enumerate() {
            if !d.is_empty() {
                d.push(' ');
            }
            d.push(if idx == 0 { 'M' } else { 'L' });
            d.push_str(&format!(" {} {}", num(point.x), num(point.y)));
        }
        if close {
            d.push_str(" Z");
        }
    }
    d
}

fn fill_style(paint: Color) -> String {
    let mut style = format!("fill:{};fill-rule:evenodd", paint.to_hex());
    if !paint.is_opaque() {
        style.push_str(&format!(";fill-opacity:{}", num(paint.opacity() as f64)));
    }
    style
}

fn stroke_style(paint: Color, stroke: &BasicStroke) -> String {
    let mut style = format!(
        "stroke:{};stroke-width:{};stroke-linecap:{};stroke-linejoin:{};stroke-miterlimit:{}",
        paint.to_hex(),
        num(stroke.width as f64),
        stroke.cap.as_svg(),
        stroke.join.as_svg(),
        num(stroke.miter_limit as f64)
    );
    if !paint.is_opaque() {
        style.push_str(&format!(";stroke-opacity:{}", num(paint.opacity() as f64)));
    }
    match stroke.dash.as_deref() {
        Some(dash) if !dash.is_empty() => {
            let dash: Vec<String> = dash.iter().map(|len| num(*len as f64)).collect();
            style.push_str(&format!(";stroke-dasharray:{}", dash.join(",")));
            if stroke.dash_offset != 0.0 {
                style.push_str(&format!(";stroke-dashoffset:{}", num(stroke.dash_offset as f64)));
            }
        }
        _ => style.push_str(";stroke-dasharray:none"),
    }
    style
}

fn font_style(font: &Font) -> String {
    let mut style = format!(
        "font-family:{};font-size:{}px",
        escape_xml(&font.family),
        num(font.size as f64)
    );
    if font.bold {
        style.push_str(";font-weight:bold");
    }
    if font.italic {
        style.push_str(";font-style:italic");
    }
    style
}

fn transform_attribute(transform: &AffineTransform) -> String {
    if transform.is_identity() {
        return String::new();
    }
    format!(
        " transform=\"matrix({} {} {} {} {} {})\"",
        num(transform.a()),
        num(transform.d()),
        num(transform.b()),
        num(transform.e()),
        num(transform.xoff()),
        num(transform.yoff())
    )
}

/// At most four decimals, without trailing zeros.
fn num(value: f64) -> String {
    let text = format!("{value:.4}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
