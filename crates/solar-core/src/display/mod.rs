//! Drawing surface used by the graph, realtime header and menu.
//!
//! The core never talks to a panel directly. Everything it draws goes through
//! [`RenderSink`], a small set of primitives that maps onto the
//! TFT driver API: clear a rectangle, draw a line, draw a string and measure a
//! string. [`DrawTargetSink`] implements it for any `embedded-graphics`
//! [`DrawTarget`](embedded_graphics::draw_target::DrawTarget), which covers
//! both the hardware panel and the desktop simulator.

mod constants;
mod sink;

pub use constants::*;
pub use sink::DrawTargetSink;

use embedded_graphics::pixelcolor::Rgb565;

/// Drawing primitives consumed by the renderers.
///
/// Coordinates are in screen pixels with the origin at the top-left corner.
/// Rectangles and lines include both end points.
pub trait RenderSink {
    type Error: core::fmt::Debug;

    /// Fill the rectangle spanned by the two corners with the background color.
    fn clear_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) -> Result<(), Self::Error>;

    fn draw_line(
        &mut self,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        color: Rgb565,
    ) -> Result<(), Self::Error>;

    /// Draw `text` with its top-left corner at `(x, y)`.
    ///
    /// Opaque text also paints the background behind each glyph, so it
    /// overwrites whatever was there before.
    fn draw_text(
        &mut self,
        x: i32,
        y: i32,
        text: &str,
        color: Rgb565,
        opaque: bool,
    ) -> Result<(), Self::Error>;

    /// Width in pixels `text` will occupy when drawn.
    fn measure_text_width(&self, text: &str) -> i32;
}

/// Horizontal placement helpers shared by the header and the menu.
pub(crate) fn centered_x<S: RenderSink>(sink: &S, text: &str) -> i32 {
    (SCREEN_WIDTH_PX - sink.measure_text_width(text)) / 2
}

pub(crate) fn right_aligned_x<S: RenderSink>(sink: &S, text: &str) -> i32 {
    SCREEN_WIDTH_PX - sink.measure_text_width(text)
}
