use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use geo::AffineTransform;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::geometry::Geometry;
use crate::paint::{Color, Font, Stroke, TextAlign};

static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
}

impl AttributeValue {
    /// Numeric-looking input becomes a number, anything else is kept as text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if NUMERIC_RE.is_match(trimmed)
            && let Ok(value) = trimmed.parse::<f64>()
        {
            return Self::Number(value);
        }
        Self::Text(raw.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => match Self::parse(text) {
                Self::Number(value) => Some(value),
                Self::Text(_) => None,
            },
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Number(_) => None,
        }
    }
}

impl PartialOrd for AttributeValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

/// Paint, stroke and label settings assigned by a styler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeStyle {
    pub fill: Option<Color>,
    pub stroke_paint: Option<Color>,
    pub stroke: Option<Stroke>,
    pub font: Option<Font>,
    pub label: Option<String>,
    pub label_align: TextAlign,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    geometry: Geometry,
    attributes: Arc<Attributes>,
    style: ShapeStyle,
}

impl Shape {
    pub fn new(geometry: Geometry, attributes: Arc<Attributes>) -> Self {
        Self {
            geometry,
            attributes,
            style: ShapeStyle::default(),
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Shared handle to the attribute map; multi-part features hand the same map to every part.
    pub fn shared_attributes(&self) -> &Arc<Attributes> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn style(&self) -> &ShapeStyle {
        &self.style
    }

    pub fn with_style(mut self, style: ShapeStyle) -> Self {
        self.style = style;
        self
    }

    /// Label text, if any and non-empty.
    pub fn label(&self) -> Option<&str> {
        self.style.label.as_deref().filter(|label| !label.is_empty())
    }

    pub fn transformed(&self, transform: &AffineTransform) -> Self {
        Self {
            geometry: self.geometry.transformed(transform),
            attributes: Arc::clone(&self.attributes),
            style: self.style.clone(),
        }
    }
}

/// Read-only tree of shapes, produced by [`ShapeGroupBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeGroup {
    name: String,
    shapes: Vec<Shape>,
    groups: Vec<ShapeGroup>,
}

impl ShapeGroup {
    pub fn builder(name: impl Into<String>) -> ShapeGroupBuilder {
        ShapeGroupBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn groups(&self) -> &[ShapeGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty() && self.groups.is_empty()
    }

    /// Number of shapes in this group and every nested group.
    pub fn shape_count(&self) -> usize {
        self.shapes.len() + self.groups.iter().map(ShapeGroup::shape_count).sum::<usize>()
    }

    /// Depth-first walk: nested groups first, then this group's own shapes.
    pub fn iter_shapes(&self) -> Box<dyn Iterator<Item = &Shape> + '_> {
        Box::new(
            self.groups
                .iter()
                .flat_map(|group| group.iter_shapes())
                .chain(self.shapes.iter()),
        )
    }

    /// Structurally identical copy with `f` applied to every shape.
    pub fn map_shapes(&self, f: &dyn Fn(&Shape) -> Shape) -> ShapeGroup {
        ShapeGroup {
            name: self.name.clone(),
            shapes: self.shapes.iter().map(f).collect(),
            groups: self.groups.iter().map(|group| group.map_shapes(f)).collect(),
        }
    }

    pub fn transformed(&self, transform: &AffineTransform) -> ShapeGroup {
        self.map_shapes(&|shape| shape.transformed(transform))
    }
}

/// Mutable phase of a [`ShapeGroup`], used by parsers while reading input.
#[derive(Debug, Clone, Default)]
pub struct ShapeGroupBuilder {
    name: String,
    shapes: Vec<Shape>,
    groups: Vec<ShapeGroup>,
}

impl ShapeGroupBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shapes: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn add(&mut self, geometry: Geometry, attributes: Arc<Attributes>) -> &mut Self {
        self.shapes.push(Shape::new(geometry, attributes));
        self
    }

    pub fn add_shape(&mut self, shape: Shape) -> &mut Self {
        self.shapes.push(shape);
        self
    }

    pub fn add_group(&mut self, group: ShapeGroup) -> &mut Self {
        self.groups.push(group);
        self
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty() && self.groups.is_empty()
    }

    pub fn build(self) -> ShapeGroup {
        ShapeGroup {
            name: self.name,
            shapes: self.shapes,
            groups: self.groups,
        }
    }
}

/// Named top-level collection of groups; one visual layer in the output.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    name: String,
    groups: Vec<ShapeGroup>,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
        }
    }

    pub fn with_groups(name: impl Into<String>, groups: Vec<ShapeGroup>) -> Self {
        Self {
            name: name.into(),
            groups,
        }
    }

    pub fn add(&mut self, group: ShapeGroup) {
        self.groups.push(group);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[ShapeGroup] {
        &self.groups
    }

    pub fn shape_count(&self) -> usize {
        self.groups.iter().map(ShapeGroup::shape_count).sum()
    }

    pub fn map_shapes(&self, f: &dyn Fn(&Shape) -> Shape) -> Layer {
        Layer {
            name: self.name.clone(),
            groups: self.groups.iter().map(|group| group.map_shapes(f)).collect(),
        }
    }

    /// Copy of this layer with every geometry passed through `transform`.
    pub fn transformed(&self, transform: &AffineTransform) -> Layer {
        self.map_shapes(&|shape| shape.transformed(transform))
    }
}
