//! Incremental bar graph of solar production against usage.
//!
//! Every graph column is one vertical composite line made of up to three
//! segments: background above the taller value, the dominant series' colour
//! between the two values, and the overlap colour from the shorter value down
//! to the baseline. Historical columns are only repainted when the history or
//! the scale changed; the live column at the end is repainted on every call.

use core::fmt::Write;

use embedded_graphics::prelude::Point;
use heapless::String;

use crate::display::{
    COLOR_BACKGROUND, COLOR_OVERLAP, COLOR_SOLAR, COLOR_TEXT, COLOR_USAGE, PLOT_BOTTOM_Y,
    PLOT_HEIGHT_PX, PLOT_TOP_Y, RenderSink, SCREEN_HEIGHT_PX, SCREEN_WIDTH_PX,
};
use crate::history::History;
use crate::series::{PerSeries, Series};

/// Gap between a peak and its marker text
const MARKER_OFFSET_PX: i32 = 10;

#[derive(Debug, Default)]
pub struct GraphRenderer {
    graph_max: i32,
    series_max: PerSeries<i32>,
    /// Screen position of each series' peak as of the last render
    max_coords: PerSeries<Point>,
    buffer_updated: bool,
    /// Marker text may still be on screen
    markers_drawn: bool,
}

impl GraphRenderer {
    pub fn new() -> Self {
        Self {
            buffer_updated: true,
            ..Self::default()
        }
    }

    /// Largest value on screen, in W.
    pub fn graph_max(&self) -> i32 {
        self.graph_max
    }

    pub fn buffer_updated(&self) -> bool {
        self.buffer_updated
    }

    /// Force every column to be repainted on the next render.
    pub fn invalidate(&mut self) {
        self.buffer_updated = true;
    }

    /// Draw the graph.
    ///
    /// `live` is the average of the in-progress bucket and is drawn in the
    /// column right after the history. When drawing fails part way the
    /// pending full redraw is kept, so the next call starts over.
    pub fn render<S: RenderSink>(
        &mut self,
        sink: &mut S,
        history: &History,
        live: PerSeries<i32>,
        show_markers: bool,
    ) -> Result<(), S::Error> {
        let series_max = PerSeries::new(
            history.stats(Series::Solar).max.max(live[Series::Solar]),
            history.stats(Series::Usage).max.max(live[Series::Usage]),
        );
        let graph_max = series_max[Series::Solar].max(series_max[Series::Usage]);
        if graph_max != self.graph_max || series_max != self.series_max {
            self.graph_max = graph_max;
            self.series_max = series_max;
            self.buffer_updated = true;
        }

        // Marker text reaches past the history, so hiding needs a full repaint
        let hide_markers = !show_markers && self.markers_drawn;
        if hide_markers {
            self.buffer_updated = true;
        }

        let scale = if graph_max <= 0 {
            1.0
        } else {
            PLOT_HEIGHT_PX as f64 / graph_max as f64
        };
        let len = history.len() as i32;

        let mut coords = self.max_coords;
        if self.buffer_updated {
            for (x, (solar, usage)) in (0..).zip(history.columns()) {
                let tops = draw_column(sink, x, PerSeries::new(solar, usage), scale)?;
                for series in Series::ALL {
                    let value = if series == Series::Solar { solar } else { usage };
                    if value == series_max[series] {
                        coords[series] = Point::new(x, tops[series]);
                    }
                }
            }
        }

        let tops = draw_column(sink, len, live, scale)?;
        let mut avg_marker = false;
        for series in Series::ALL {
            if live[series] == series_max[series] {
                avg_marker = true;
                coords[series] = Point::new(len, tops[series]);
            }
        }

        let coords_changed = coords != self.max_coords;
        if self.buffer_updated && (coords_changed || hide_markers) && len + 1 < SCREEN_WIDTH_PX {
            // Old markers to the right of the graph
            sink.clear_rect(len + 1, PLOT_TOP_Y, SCREEN_WIDTH_PX - 1, PLOT_BOTTOM_Y)?;
        }

        if show_markers
            && graph_max > 0
            && (coords_changed || self.buffer_updated || avg_marker)
        {
            for series in Series::ALL {
                let mut text: String<12> = String::new();
                write!(text, "{}W", series_max[series]).ok();
                draw_marker(sink, &text, coords[series], avg_marker)?;
            }
            self.markers_drawn = true;
        } else if !show_markers {
            self.markers_drawn = false;
        }

        self.max_coords = coords;
        self.buffer_updated = false;
        Ok(())
    }
}

/// Scaled bar height, clamped to the plot area.
fn bar_height(value: i32, scale: f64) -> i32 {
    ((value as f64 * scale) as i32).clamp(0, PLOT_HEIGHT_PX)
}

/// Paint one column and return the top row of each series.
fn draw_column<S: RenderSink>(
    sink: &mut S,
    x: i32,
    values: PerSeries<i32>,
    scale: f64,
) -> Result<PerSeries<i32>, S::Error> {
    let usage_h = bar_height(values[Series::Usage], scale);
    let solar_h = bar_height(values[Series::Solar], scale);
    let usage_y = PLOT_BOTTOM_Y - usage_h;
    let solar_y = PLOT_BOTTOM_Y - solar_h;

    sink.draw_line(
        x,
        PLOT_TOP_Y,
        x,
        PLOT_BOTTOM_Y - usage_h.max(solar_h),
        COLOR_BACKGROUND,
    )?;
    if usage_h > solar_h {
        sink.draw_line(x, usage_y, x, solar_y, COLOR_USAGE)?;
        if solar_h > 0 {
            sink.draw_line(x, solar_y, x, PLOT_BOTTOM_Y, COLOR_OVERLAP)?;
        }
    } else {
        sink.draw_line(x, solar_y, x, usage_y, COLOR_SOLAR)?;
        if usage_h > 0 {
            sink.draw_line(x, usage_y, x, PLOT_BOTTOM_Y, COLOR_OVERLAP)?;
        }
    }

    Ok(PerSeries::new(solar_y, usage_y))
}

/// Label a peak, placing the text on whichever side keeps it on screen.
fn draw_marker<S: RenderSink>(
    sink: &mut S,
    text: &str,
    at: Point,
    opaque: bool,
) -> Result<(), S::Error> {
    let (text_x, line_start_x, line_end_x) = if at.x > SCREEN_WIDTH_PX / 2 {
        let text_x = at.x - sink.measure_text_width(text) - MARKER_OFFSET_PX;
        (text_x, at.x - 2, at.x - 8)
    } else {
        let text_x = at.x + MARKER_OFFSET_PX;
        (text_x, at.x + 2, text_x - 2)
    };
    let text_y = if at.y > SCREEN_HEIGHT_PX / 2 {
        at.y - 22
    } else {
        at.y + 10
    };

    sink.draw_text(text_x, text_y, text, COLOR_TEXT, opaque)?;
    sink.draw_line(line_start_x, at.y, line_end_x, text_y + 6, COLOR_TEXT)
}
