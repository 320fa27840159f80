//! Ambient status light.
//!
//! A strip of RGB LEDs shows at a glance how good the current consumption
//! is. Greens while exporting, blues to red while importing, shifted one step
//! towards the "bad" end when usage is unusually high for the recent history.

use embedded_graphics::pixelcolor::Rgb888;
use log::debug;

use crate::history::{BufferStatistics, History};
use crate::ingest::InstantReading;
use crate::series::Series;

/// Export beyond this (W) is worth one step towards yellow
const EXPORT_STEP_W: f64 = 500.0;

/// Colours the indicator can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorColor {
    Off,
    Green,
    Lime,
    Yellow,
    Blue,
    Purple,
    Red,
}

impl IndicatorColor {
    const EXPORTING: [Self; 3] = [Self::Green, Self::Lime, Self::Yellow];
    const IMPORTING: [Self; 3] = [Self::Blue, Self::Purple, Self::Red];

    pub const fn rgb(self) -> Rgb888 {
        match self {
            Self::Off => Rgb888::new(0, 0, 0),
            Self::Green => Rgb888::new(0, 128, 0),
            Self::Lime => Rgb888::new(0, 255, 0),
            Self::Yellow => Rgb888::new(255, 255, 0),
            Self::Blue => Rgb888::new(0, 0, 255),
            Self::Purple => Rgb888::new(128, 0, 128),
            Self::Red => Rgb888::new(255, 0, 0),
        }
    }

    /// Pick the colour for a reading given the usage history.
    pub fn assess(reading: &InstantReading, usage: &BufferStatistics) -> Self {
        let high_usage = reading.usage > usage.high();

        if reading.grid < 0.0 {
            let score = i32::from(reading.grid < -EXPORT_STEP_W)
                + i32::from(reading.grid < -2.0 * EXPORT_STEP_W)
                - i32::from(high_usage);
            Self::EXPORTING[score.max(0) as usize]
        } else {
            let score = usize::from(high_usage) + usize::from(reading.solar == 0.0);
            Self::IMPORTING[score]
        }
    }
}

/// Output side of the indicator, e.g. a NeoPixel strip.
pub trait IndicatorSink {
    type Error: core::fmt::Debug;

    /// Set every LED to `color`.
    fn set_color(&mut self, color: IndicatorColor) -> Result<(), Self::Error>;
}

#[derive(Debug, Default)]
pub struct StatusIndicator {
    written: Option<IndicatorColor>,
}

impl StatusIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Colour last written to the hardware.
    pub fn color(&self) -> Option<IndicatorColor> {
        self.written
    }

    /// Recompute the colour and write it if it changed.
    ///
    /// The light stays off until there is both a reading and some history to
    /// compare it with. Returns whether the hardware was written.
    pub fn update<I: IndicatorSink>(
        &mut self,
        sink: &mut I,
        reading: Option<&InstantReading>,
        history: &History,
    ) -> Result<bool, I::Error> {
        let color = match reading {
            Some(reading) if !history.buffer(Series::Solar).is_empty() => {
                IndicatorColor::assess(reading, history.stats(Series::Usage))
            }
            _ => IndicatorColor::Off,
        };

        if self.written == Some(color) {
            return Ok(false);
        }
        sink.set_color(color)?;
        debug!("Indicator set to {:?}", color);
        self.written = Some(color);
        Ok(true)
    }
}
