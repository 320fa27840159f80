use embedded_graphics::Drawable;
use embedded_graphics::mono_font::{MonoTextStyleBuilder, ascii::FONT_6X10};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};

use super::{CHAR_WIDTH_PX, COLOR_BACKGROUND, RenderSink};

/// [`RenderSink`] backed by an `embedded-graphics` draw target.
pub struct DrawTargetSink<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    target: D,
}

impl<D> DrawTargetSink<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    pub fn new(target: D) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &D {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut D {
        &mut self.target
    }

}

impl<D> RenderSink for DrawTargetSink<D>
where
    D: DrawTarget<Color = Rgb565>,
    D::Error: core::fmt::Debug,
{
    type Error = D::Error;

    fn clear_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) -> Result<(), Self::Error> {
        Rectangle::with_corners(Point::new(x0, y0), Point::new(x1, y1))
            .into_styled(PrimitiveStyle::with_fill(COLOR_BACKGROUND))
            .draw(&mut self.target)
    }

    fn draw_line(
        &mut self,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        color: Rgb565,
    ) -> Result<(), Self::Error> {
        Line::new(Point::new(x0, y0), Point::new(x1, y1))
            .into_styled(PrimitiveStyle::with_stroke(color, 1))
            .draw(&mut self.target)
    }

    fn draw_text(
        &mut self,
        x: i32,
        y: i32,
        text: &str,
        color: Rgb565,
        opaque: bool,
    ) -> Result<(), Self::Error> {
        let builder = MonoTextStyleBuilder::new()
            .font(&FONT_6X10)
            .text_color(color);
        let style = if opaque {
            builder.background_color(COLOR_BACKGROUND).build()
        } else {
            builder.build()
        };

        Text::with_baseline(text, Point::new(x, y), style, Baseline::Top)
            .draw(&mut self.target)?;
        Ok(())
    }

    fn measure_text_width(&self, text: &str) -> i32 {
        text.chars().count() as i32 * CHAR_WIDTH_PX
    }
}
