use geo::Coord;

use super::GraphicsState;
use crate::geometry::Geometry;
use crate::paint::{Color, TextAlign};

/// One output backend. The canvas fans every draw call out to each enabled surface with the
/// same graphics state, so the surfaces never hold paint, stroke or transform themselves.
pub trait Surface {
    fn fill(&mut self, geometry: &Geometry, state: &GraphicsState);

    /// Outlines `geometry` with `state.paint` and `state.stroke`.
    fn stroke(&mut self, geometry: &Geometry, state: &GraphicsState);

    /// Fills with `state.paint`, then outlines with `stroke_paint`.
    fn fill_and_stroke(&mut self, geometry: &Geometry, stroke_paint: Color, state: &GraphicsState) {
        two_pass_fill_and_stroke(self, geometry, stroke_paint, state);
    }

    /// `origin` is the baseline start of left-aligned text, in user space.
    fn draw_text(&mut self, text: &str, origin: Coord, align: TextAlign, state: &GraphicsState);

    fn begin_layer(&mut self, _name: &str, _id: usize) {}

    fn end_layer(&mut self) {}

    fn begin_group(&mut self, _id: &str) {}

    fn end_group(&mut self) {}
}

pub fn two_pass_fill_and_stroke<S: Surface + ?Sized>(
    surface: &mut S,
    geometry: &Geometry,
    stroke_paint: Color,
    state: &GraphicsState,
) {
    surface.fill(geometry, state);
    let outline = GraphicsState {
        paint: stroke_paint,
        ..state.clone()
    };
    surface.stroke(geometry, &outline);
}
