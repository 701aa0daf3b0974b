mod format;
mod raster;
mod surface;
mod vector;

use std::borrow::Cow;
use std::io::Write;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use geo::{AffineTransform, Rect, coord};
use resvg::tiny_skia::Pixmap;
use tracing::{debug, trace, warn};

use crate::crop::crop;
use crate::error::RenderError;
use crate::geometry::{Geometry, is_axis_aligned, rect_contains_point};
use crate::paint::{Color, Font, Stroke, TextAlign};
use crate::shape::{Layer, Shape, ShapeGroup};

pub use format::{Backend, OutputFormat};
pub use raster::RasterSurface;
pub use surface::{Surface, two_pass_fill_and_stroke};
pub use vector::VectorSurface;

/// Layer opened implicitly when something is drawn outside any layer.
pub const DEFAULT_LAYER_NAME: &str = "Unnamed";

/// Paint, stroke, font, transform and clip shared by both backends.
///
/// The clip rectangle is in device space and is not affected by the transform.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    pub paint: Color,
    pub stroke: Stroke,
    pub font: Font,
    pub transform: AffineTransform,
    pub clip: Option<Rect>,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            paint: Color::BLACK,
            stroke: Stroke::default(),
            font: Font::default(),
            transform: AffineTransform::identity(),
            clip: None,
        }
    }
}

/// Draws into a raster pixmap and an SVG document at the same time.
///
/// Not meant to be shared between threads: state changes made while drawing a shape or label
/// are scoped to that call through [`StateGuard`].
pub struct Canvas {
    width: u32,
    height: u32,
    raster: Option<RasterSurface>,
    vector: Option<VectorSurface>,
    state: GraphicsState,
    drawing_area: Rect,
    crop: bool,
    current_layer: Option<String>,
    layer_counter: usize,
}

impl Canvas {
    /// `margin` is kept free on every side; a negative margin lets shapes reach past the edge.
    pub fn new(width: u32, height: u32, margin: f64) -> Result<Self, RenderError> {
        let invalid = RenderError::InvalidSize { width, height };
        if width == 0 || height == 0 {
            return Err(invalid);
        }
        let raster = RasterSurface::new(width, height).ok_or(invalid)?;
        let (w, h) = (width as f64, height as f64);
        let drawing_area = Rect::new(
            coord! { x: margin, y: margin },
            coord! { x: (w - margin).max(margin), y: (h - margin).max(margin) },
        );
        Ok(Self {
            width,
            height,
            raster: Some(raster),
            vector: Some(VectorSurface::new(width, height)),
            state: GraphicsState::default(),
            drawing_area,
            crop: true,
            current_layer: None,
            layer_counter: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn drawing_area(&self) -> Rect {
        self.drawing_area
    }

    pub fn set_crop(&mut self, crop: bool) {
        self.crop = crop;
    }

    pub fn is_crop(&self) -> bool {
        self.crop
    }

    pub fn state(&self) -> &GraphicsState {
        &self.state
    }

    pub fn set_paint(&mut self, paint: Color) {
        self.state.paint = paint;
    }

    pub fn set_stroke(&mut self, stroke: impl Into<Stroke>) {
        self.state.stroke = stroke.into();
    }

    pub fn set_font(&mut self, font: Font) {
        self.state.font = font;
    }

    pub fn set_transform(&mut self, transform: AffineTransform) {
        self.state.transform = transform;
    }

    /// Appends `transform`: it is applied to user coordinates before the current transform.
    pub fn transform_by(&mut self, transform: &AffineTransform) {
        self.state.transform = transform.compose(&self.state.transform);
    }

    pub fn set_clip(&mut self, clip: Option<Rect>) {
        self.state.clip = clip;
    }

    /// Snapshot of the graphics state, restored when the returned guard is dropped.
    pub fn save(&mut self) -> StateGuard<'_> {
        let saved = self.state.clone();
        StateGuard {
            canvas: self,
            saved,
        }
    }

    pub fn is_raster_enabled(&self) -> bool {
        self.raster.is_some()
    }

    pub fn is_vector_enabled(&self) -> bool {
        self.vector.is_some()
    }

    /// Frees the pixmap; later raster draw calls are skipped.
    pub fn disable_raster(&mut self) {
        if self.raster.take().is_some() {
            debug!("raster generation disabled");
        }
    }

    /// Frees the SVG buffer; later vector draw calls are skipped.
    pub fn disable_vector(&mut self) {
        if self.vector.take().is_some() {
            debug!("vector generation disabled");
        }
    }

    pub fn current_layer(&self) -> Option<&str> {
        self.current_layer.as_deref()
    }

    /// Opens a layer, closing the current one first. Re-opening the current layer is a no-op.
    pub fn create_layer(&mut self, name: &str) {
        if self.current_layer.as_deref() == Some(name) {
            return;
        }
        self.close_layer();
        self.layer_counter += 1;
        let id = self.layer_counter;
        self.for_each_surface(|surface, _| surface.begin_layer(name, id));
        debug!(layer = name, id, "layer opened");
        self.current_layer = Some(name.to_string());
    }

    pub fn close_layer(&mut self) {
        if let Some(name) = self.current_layer.take() {
            self.for_each_surface(|surface, _| surface.end_layer());
            debug!(layer = %name, "layer closed");
        }
    }

    fn ensure_layer(&mut self) {
        if self.current_layer.is_none() {
            self.create_layer(DEFAULT_LAYER_NAME);
        }
    }

    pub fn fill(&mut self, geometry: &Geometry) {
        self.ensure_layer();
        let Some(geometry) = self.cropped(geometry) else {
            return;
        };
        self.for_each_surface(|surface, state| surface.fill(&geometry, state));
    }

    /// Outlines `geometry` with the current paint and stroke.
    pub fn draw(&mut self, geometry: &Geometry) {
        self.ensure_layer();
        let Some(geometry) = self.cropped(geometry) else {
            return;
        };
        self.for_each_surface(|surface, state| surface.stroke(&geometry, state));
    }

    /// Fills with the current paint and outlines with `stroke_paint` and the current stroke.
    /// The SVG side gets a single element when the stroke is a plain line stroke.
    pub fn fill_and_stroke(&mut self, geometry: &Geometry, stroke_paint: Color) {
        self.ensure_layer();
        let Some(geometry) = self.cropped(geometry) else {
            return;
        };
        self.for_each_surface(|surface, state| {
            surface.fill_and_stroke(&geometry, stroke_paint, state)
        });
    }

    pub fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.fill(&Geometry::rect(x, y, width, height));
    }

    pub fn draw_string(&mut self, text: &str, x: f64, y: f64, align: TextAlign) {
        self.ensure_layer();
        let origin = coord! { x: x, y: y };
        self.for_each_surface(|surface, state| surface.draw_text(text, origin, align, state));
    }

    pub fn draw_layers(&mut self, layers: &[Layer]) {
        for layer in layers {
            self.draw_layer(layer);
        }
    }

    /// Opens a layer named after `layer`, draws its groups, then its labels in `<name>_text`.
    /// The layer is closed afterwards.
    pub fn draw_layer(&mut self, layer: &Layer) {
        self.create_layer(layer.name());
        let mut labels = Vec::new();
        for group in layer.groups() {
            self.paint_group(group, &mut labels);
        }
        self.fill_labels(layer.name(), &labels);
        self.close_layer();
    }

    pub fn draw_group(&mut self, group: &ShapeGroup) {
        self.ensure_layer();
        let mut labels = Vec::new();
        self.paint_group(group, &mut labels);
        self.fill_labels(group.name(), &labels);
    }

    pub fn draw_shape(&mut self, shape: &Shape) {
        self.ensure_layer();
        self.paint_shape(shape);
        if shape.label().is_some() {
            self.fill_label(shape);
        }
    }

    fn paint_group<'s>(&mut self, group: &'s ShapeGroup, labels: &mut Vec<&'s Shape>) {
        if group.is_empty() {
            return;
        }
        self.for_each_surface(|surface, _| surface.begin_group(group.name()));
        for child in group.groups() {
            self.paint_group(child, labels);
        }
        for shape in group.shapes() {
            self.paint_shape(shape);
            if shape.label().is_some() {
                labels.push(shape);
            }
        }
        self.for_each_surface(|surface, _| surface.end_group());
    }

    fn paint_shape(&mut self, shape: &Shape) {
        let style = shape.style();
        let geometry = shape.geometry();
        if let (Some(fill), Some(stroke_paint), Some(stroke)) =
            (style.fill, style.stroke_paint, &style.stroke)
        {
            let mut canvas = self.save();
            canvas.set_paint(fill);
            canvas.set_stroke(stroke.clone());
            canvas.fill_and_stroke(geometry, stroke_paint);
            return;
        }
        if let Some(fill) = style.fill {
            let mut canvas = self.save();
            canvas.set_paint(fill);
            canvas.fill(geometry);
        }
        if let Some(stroke_paint) = style.stroke_paint {
            let mut canvas = self.save();
            canvas.set_paint(stroke_paint);
            if let Some(stroke) = &style.stroke {
                canvas.set_stroke(stroke.clone());
            }
            canvas.draw(geometry);
        }
    }

    fn fill_labels(&mut self, name: &str, labels: &[&Shape]) {
        if labels.is_empty() {
            return;
        }
        let group = format!("{name}_text");
        self.for_each_surface(|surface, _| surface.begin_group(&group));
        for shape in labels {
            self.fill_label(shape);
        }
        self.for_each_surface(|surface, _| surface.end_group());
    }

    /// Draws the label at the shape's anchor with the shape's fill paint and font. Labels whose
    /// anchor falls outside the drawing area are skipped without looking at the text extent.
    fn fill_label(&mut self, shape: &Shape) {
        let Some(text) = shape.label() else {
            return;
        };
        let Some(anchor) = shape.geometry().anchor() else {
            warn!(label = text, "label without anchor, skipped");
            return;
        };
        let device = self.state.transform.apply(anchor);
        if !rect_contains_point(&self.drawing_area, device) {
            trace!(label = text, "label anchor outside the drawing area");
            return;
        }
        let style = shape.style();
        let mut canvas = self.save();
        if let Some(fill) = style.fill {
            canvas.set_paint(fill);
        }
        if let Some(font) = &style.font {
            canvas.set_font(font.clone());
        }
        canvas.draw_string(text, anchor.x, anchor.y, style.label_align);
    }

    /// Closes any open layer and writes the image to `destination`. Nothing is written when
    /// the format's backend is disabled or encoding fails.
    pub fn render(&mut self, format: OutputFormat, destination: &Path) -> Result<(), RenderError> {
        if destination.as_os_str().is_empty() {
            return Err(RenderError::InvalidDestination);
        }
        let bytes = self.encode(format)?;
        std::fs::write(destination, bytes).map_err(|source| RenderError::Io {
            path: destination.to_path_buf(),
            source,
        })
    }

    pub fn render_to_writer<W: Write>(
        &mut self,
        format: OutputFormat,
        writer: &mut W,
    ) -> Result<(), RenderError> {
        let bytes = self.encode(format)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    pub fn encode(&mut self, format: OutputFormat) -> Result<Vec<u8>, RenderError> {
        self.close_layer();
        match format.backend() {
            Backend::Vector => self
                .vector
                .as_ref()
                .map(|vector| vector.document().into_bytes())
                .ok_or(RenderError::BackendDisabled(Backend::Vector)),
            Backend::Raster => self
                .raster
                .as_ref()
                .ok_or(RenderError::BackendDisabled(Backend::Raster))?
                .encode(format),
        }
    }

    /// The SVG document so far, with the open layer closed.
    pub fn svg_document(&mut self) -> Option<String> {
        self.close_layer();
        self.vector.as_ref().map(VectorSurface::document)
    }

    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.raster.as_ref().map(RasterSurface::pixmap)
    }

    /// Geometry as it should be handed to the backends, or `None` when it is cropped away.
    fn cropped<'g>(&self, geometry: &'g Geometry) -> Option<Cow<'g, Geometry>> {
        match self.visible_area() {
            Some(area) => crop(geometry, &area),
            None => Some(Cow::Borrowed(geometry)),
        }
    }

    /// The drawing area in user space. Cropping is skipped under rotation or shear, where the
    /// area stops being an axis-aligned rectangle.
    fn visible_area(&self) -> Option<Rect> {
        if !self.crop {
            return None;
        }
        let transform = &self.state.transform;
        if transform.is_identity() {
            return Some(self.drawing_area);
        }
        if !is_axis_aligned(transform) {
            trace!("transform rotates or shears, crop skipped");
            return None;
        }
        let inverse = transform.inverse()?;
        Some(Rect::new(
            inverse.apply(self.drawing_area.min()),
            inverse.apply(self.drawing_area.max()),
        ))
    }

    fn for_each_surface(&mut self, mut f: impl FnMut(&mut dyn Surface, &GraphicsState)) {
        let Self {
            raster,
            vector,
            state,
            ..
        } = self;
        if let Some(raster) = raster {
            f(raster, state);
        }
        if let Some(vector) = vector {
            f(vector, state);
        }
    }
}

/// Restores the canvas graphics state when dropped.
pub struct StateGuard<'a> {
    canvas: &'a mut Canvas,
    saved: GraphicsState,
}

impl Deref for StateGuard<'_> {
    type Target = Canvas;

    fn deref(&self) -> &Canvas {
        self.canvas
    }
}

impl DerefMut for StateGuard<'_> {
    fn deref_mut(&mut self) -> &mut Canvas {
        self.canvas
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.canvas.state = std::mem::take(&mut self.saved);
    }
}
