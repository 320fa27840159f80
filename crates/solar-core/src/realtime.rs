//! Header with the latest usage, grid and solar readings.

use core::fmt::Write;

use heapless::String;

use crate::display::{
    COLOR_EXPORTING, COLOR_IMPORTING, COLOR_SOLAR, COLOR_TEXT, COLOR_USAGE, HEADER_LABEL_Y,
    HEADER_VALUE_Y, RenderSink, centered_x, right_aligned_x,
};
use crate::ingest::InstantReading;

/// Room for a padded value such as `"          12345.67W"`
type ValueText = String<32>;

#[derive(Debug, Default)]
pub struct RealtimeHeader {
    /// Direction shown by the centre label, `None` before the first draw
    importing: Option<bool>,
}

impl RealtimeHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Static labels plus a loading notice, shown until the first reading.
    pub fn draw_splash<S: RenderSink>(&mut self, sink: &mut S) -> Result<(), S::Error> {
        sink.draw_text(0, HEADER_LABEL_Y, "USAGE", COLOR_TEXT, true)?;
        sink.draw_text(
            centered_x(sink, "IMPORTING"),
            HEADER_LABEL_Y,
            "IMPORTING",
            COLOR_TEXT,
            true,
        )?;
        sink.draw_text(
            right_aligned_x(sink, "SOLAR"),
            HEADER_LABEL_Y,
            "SOLAR",
            COLOR_TEXT,
            true,
        )?;
        sink.draw_text(0, HEADER_VALUE_Y, "Loading...", COLOR_TEXT, true)?;
        self.importing = Some(true);
        Ok(())
    }

    /// Draw the values of `reading`.
    ///
    /// Values are padded with spaces and drawn opaque so a shorter number
    /// fully covers a longer previous one.
    pub fn draw<S: RenderSink>(
        &mut self,
        sink: &mut S,
        reading: &InstantReading,
    ) -> Result<(), S::Error> {
        let mut text = ValueText::new();

        write!(text, "          {:.2}W", reading.solar).ok();
        sink.draw_text(
            right_aligned_x(sink, &text),
            HEADER_VALUE_Y,
            &text,
            COLOR_SOLAR,
            true,
        )?;

        text.clear();
        write!(text, "{:.2}W          ", reading.usage).ok();
        sink.draw_text(0, HEADER_VALUE_Y, &text, COLOR_USAGE, true)?;

        let importing = reading.importing();
        if self.importing != Some(importing) {
            let label = if importing {
                "  IMPORTING  "
            } else {
                "  EXPORTING  "
            };
            sink.draw_text(
                centered_x(sink, label),
                HEADER_LABEL_Y,
                label,
                COLOR_TEXT,
                true,
            )?;
            self.importing = Some(importing);
        }

        text.clear();
        write!(text, "  {:.2}W  ", libm::fabs(reading.grid)).ok();
        let color = if importing {
            COLOR_IMPORTING
        } else {
            COLOR_EXPORTING
        };
        sink.draw_text(centered_x(sink, &text), HEADER_VALUE_Y, &text, color, true)
    }
}
