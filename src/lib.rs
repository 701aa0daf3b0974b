pub mod canvas;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod crop;
pub mod error;
pub mod geometry;
pub mod paint;
pub mod parser;
pub mod shape;
pub mod style;
pub mod text_metrics;

pub use canvas::{Backend, Canvas, OutputFormat};
#[cfg(feature = "cli")]
pub use cli::run;
pub use error::{ParseError, RenderError};
pub use geometry::Geometry;
pub use shape::{AttributeValue, Layer, Shape, ShapeGroup, ShapeGroupBuilder};
