//! Test doubles for the hardware seams.

use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::convert::Infallible;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_hal::digital;
use embedded_hal::i2c;

use crate::battery::BatteryGauge;
use crate::display::{CHAR_WIDTH_PX, RenderSink};
use crate::indicator::{IndicatorColor, IndicatorSink};
use crate::watchdog::Link;

// ============================================================================
// Pixels
// ============================================================================

/// Plain in-memory frame used to check what the sink adapter paints.
pub struct PixelGrid {
    width: u32,
    height: u32,
    pixels: Vec<Rgb565>,
}

impl PixelGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb565::BLACK; (width * height) as usize],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb565> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }
}

impl OriginDimensions for PixelGrid {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for PixelGrid {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < self.width && y < self.height {
                self.pixels[(y * self.width + x) as usize] = color;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Render sink
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Clear {
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
    },
    Line {
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        color: Rgb565,
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        color: Rgb565,
        opaque: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkFault;

/// Records every primitive. Lines or text can be made to fail.
#[derive(Default)]
pub struct RecordingSink {
    pub ops: Vec<DrawOp>,
    pub fail_lines: bool,
    pub fail_text: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn lines_at(&self, x: i32) -> Vec<&DrawOp> {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Line { x0, x1, .. } if *x0 == x && *x1 == x))
            .collect()
    }

    pub fn clears(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Clear { .. }))
            .count()
    }
}

impl RenderSink for RecordingSink {
    type Error = SinkFault;

    fn clear_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) -> Result<(), SinkFault> {
        self.ops.push(DrawOp::Clear { x0, y0, x1, y1 });
        Ok(())
    }

    fn draw_line(
        &mut self,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        color: Rgb565,
    ) -> Result<(), SinkFault> {
        if self.fail_lines {
            return Err(SinkFault);
        }
        self.ops.push(DrawOp::Line {
            x0,
            y0,
            x1,
            y1,
            color,
        });
        Ok(())
    }

    fn draw_text(
        &mut self,
        x: i32,
        y: i32,
        text: &str,
        color: Rgb565,
        opaque: bool,
    ) -> Result<(), SinkFault> {
        if self.fail_text {
            return Err(SinkFault);
        }
        self.ops.push(DrawOp::Text {
            x,
            y,
            text: text.to_string(),
            color,
            opaque,
        });
        Ok(())
    }

    fn measure_text_width(&self, text: &str) -> i32 {
        text.chars().count() as i32 * CHAR_WIDTH_PX
    }
}

// ============================================================================
// Pins and buses
// ============================================================================

/// Input pin replaying a fixed list of levels, repeating the last one.
pub struct ScriptedPin {
    levels: Vec<bool>,
    position: usize,
    fail: bool,
}

impl ScriptedPin {
    pub fn new(levels: &[bool]) -> Self {
        Self {
            levels: levels.to_vec(),
            position: 0,
            fail: false,
        }
    }

    pub fn constant(level: bool) -> Self {
        Self::new(&[level])
    }

    /// Every read returns an error.
    pub fn failing() -> Self {
        Self {
            levels: vec![false],
            position: 0,
            fail: true,
        }
    }

    pub fn reads(&self) -> usize {
        self.position
    }

    fn sample(&mut self) -> Result<bool, digital::ErrorKind> {
        let index = self.position.min(self.levels.len() - 1);
        self.position += 1;
        if self.fail {
            return Err(digital::ErrorKind::Other);
        }
        Ok(self.levels[index])
    }
}

impl digital::ErrorType for ScriptedPin {
    type Error = digital::ErrorKind;
}

impl digital::InputPin for ScriptedPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.sample()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.sample().map(|level| !level)
    }
}

/// I2C bus with a single readable register value.
pub struct MockI2c {
    pub register_value: u8,
    pub fail: bool,
    /// `(address, bytes written)` for every transaction
    pub writes: Vec<(u8, Vec<u8>)>,
}

impl MockI2c {
    pub fn new(register_value: u8) -> Self {
        Self {
            register_value,
            fail: false,
            writes: Vec::new(),
        }
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = i2c::ErrorKind;
}

impl i2c::I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.fail {
            return Err(i2c::ErrorKind::Other);
        }
        for operation in operations {
            match operation {
                i2c::Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                i2c::Operation::Read(buffer) => buffer.fill(self.register_value),
            }
        }
        Ok(())
    }
}

// ============================================================================
// Other collaborators
// ============================================================================

#[derive(Default)]
pub struct RecordingIndicator {
    pub writes: Vec<IndicatorColor>,
    pub fail: bool,
}

impl IndicatorSink for RecordingIndicator {
    type Error = SinkFault;

    fn set_color(&mut self, color: IndicatorColor) -> Result<(), SinkFault> {
        if self.fail {
            return Err(SinkFault);
        }
        self.writes.push(color);
        Ok(())
    }
}

/// Battery that always reports the same level, or always fails.
pub struct FixedBattery(pub Option<u8>);

impl BatteryGauge for FixedBattery {
    type Error = SinkFault;

    fn level(&mut self) -> Result<u8, SinkFault> {
        self.0.ok_or(SinkFault)
    }
}

/// Link that comes back up after a set number of reconnect attempts.
pub struct FakeLink {
    pub connected: bool,
    /// Reconnect attempts that fail before one succeeds; `None` never succeeds
    pub failures_before_up: Option<u8>,
    pub attempts: u8,
}

impl FakeLink {
    pub fn up() -> Self {
        Self {
            connected: true,
            failures_before_up: Some(0),
            attempts: 0,
        }
    }

    pub fn down(failures_before_up: Option<u8>) -> Self {
        Self {
            connected: false,
            failures_before_up,
            attempts: 0,
        }
    }
}

impl Link for FakeLink {
    type Error = SinkFault;

    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn reconnect(&mut self) -> Result<(), SinkFault> {
        self.attempts += 1;
        match self.failures_before_up {
            Some(limit) if self.attempts > limit => {
                self.connected = true;
                Ok(())
            }
            _ => Err(SinkFault),
        }
    }
}
