use serde::{Deserialize, Serialize};

use crate::paint::{BasicStroke, Color, Font, LineCap, LineJoin, Stroke, TextAlign};
use crate::shape::{Layer, Shape, ShapeStyle};

/// Turns a transformed layer into styled layers for the canvas.
///
/// `scale` is the display scale denominator; stylers may drop or split layers based on it.
pub trait Styler {
    fn style_layer(&self, layer: &Layer, scale: f64) -> Vec<Layer>;
}

/// One fill, stroke and label rule applied to every shape of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UniformStyle {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub stroke_width: f32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub dash: Option<Vec<f32>>,
    pub font_family: String,
    pub font_size: f32,
    pub bold: bool,
    /// Attribute whose value becomes the label of point shapes.
    pub label_attribute: Option<String>,
    pub label_color: Option<Color>,
    pub label_align: TextAlign,
    pub min_scale: Option<f64>,
    pub max_scale: Option<f64>,
}

impl Default for UniformStyle {
    fn default() -> Self {
        Self {
            fill: Some(Color::rgb(0xc8, 0xdc, 0xdc)),
            stroke: Some(Color::rgb(0x40, 0x40, 0x40)),
            stroke_width: 1.0,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            dash: None,
            font_family: "sans-serif".to_string(),
            font_size: 12.0,
            bold: false,
            label_attribute: None,
            label_color: None,
            label_align: TextAlign::Left,
            min_scale: None,
            max_scale: None,
        }
    }
}

impl UniformStyle {
    pub fn is_visible_at(&self, scale: f64) -> bool {
        self.min_scale.is_none_or(|min| scale >= min) && self.max_scale.is_none_or(|max| scale < max)
    }

    fn stroke_style(&self) -> Stroke {
        let mut stroke = BasicStroke {
            cap: self.line_cap,
            join: self.line_join,
            ..BasicStroke::new(self.stroke_width)
        };
        if let Some(dash) = &self.dash {
            stroke = stroke.with_dash(dash.clone());
        }
        Stroke::Basic(stroke)
    }

    fn style_for(&self, shape: &Shape) -> ShapeStyle {
        let geometry = shape.geometry();
        if geometry.is_closed() {
            return ShapeStyle {
                fill: self.fill,
                stroke_paint: self.stroke,
                stroke: self.stroke.map(|_| self.stroke_style()),
                ..ShapeStyle::default()
            };
        }
        if geometry.anchor().is_none() {
            return ShapeStyle {
                stroke_paint: self.stroke,
                stroke: self.stroke.map(|_| self.stroke_style()),
                ..ShapeStyle::default()
            };
        }
        let label = self
            .label_attribute
            .as_deref()
            .and_then(|name| shape.attribute(name))
            .map(|value| value.to_string());
        ShapeStyle {
            fill: Some(self.label_color.or(self.stroke).unwrap_or(Color::BLACK)),
            font: Some(Font {
                bold: self.bold,
                ..Font::new(self.font_family.clone(), self.font_size)
            }),
            label,
            label_align: self.label_align,
            ..ShapeStyle::default()
        }
    }
}

impl Styler for UniformStyle {
    fn style_layer(&self, layer: &Layer, scale: f64) -> Vec<Layer> {
        if !self.is_visible_at(scale) {
            return Vec::new();
        }
        vec![layer.map_shapes(&|shape| shape.clone().with_style(self.style_for(shape)))]
    }
}
