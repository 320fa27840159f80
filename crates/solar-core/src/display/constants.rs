//! Screen layout and palette for the 320x240 panel.

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::RgbColor;

// ============================================================================
// Screen
// ============================================================================

pub const SCREEN_WIDTH_PX: i32 = 320;
pub const SCREEN_HEIGHT_PX: i32 = 240;

// ============================================================================
// Regions
// ============================================================================

/// Row of the header labels (USAGE / IMPORTING / SOLAR)
pub const HEADER_LABEL_Y: i32 = 0;

/// Row of the realtime values below the header labels
pub const HEADER_VALUE_Y: i32 = 14;

/// First row of the graph area
pub const PLOT_TOP_Y: i32 = 40;

/// Baseline of the graph; a zero value draws nothing above this row
pub const PLOT_BOTTOM_Y: i32 = 220;

/// Usable graph height in pixels
pub const PLOT_HEIGHT_PX: i32 = PLOT_BOTTOM_Y - PLOT_TOP_Y;

/// One column per pixel across the full width
pub const PLOT_COLUMNS: usize = SCREEN_WIDTH_PX as usize;

/// First row of the menu strip
pub const MENU_TOP_Y: i32 = 221;

/// Last row of the menu strip
pub const MENU_BOTTOM_Y: i32 = 240;

/// Row the menu text is drawn on
pub const MENU_TEXT_Y: i32 = 226;

// ============================================================================
// Text
// ============================================================================

/// Advance of one glyph of the mono font, spacing included
pub const CHAR_WIDTH_PX: i32 = 6;

/// Height of one glyph of the mono font
pub const CHAR_HEIGHT_PX: i32 = 10;

// ============================================================================
// Palette
// ============================================================================

pub const COLOR_BACKGROUND: Rgb565 = Rgb565::BLACK;

/// Labels, menu text and peak markers
pub const COLOR_TEXT: Rgb565 = Rgb565::new(16, 32, 16);

/// Usage line and realtime usage value
pub const COLOR_USAGE: Rgb565 = Rgb565::BLUE;

/// Solar line and realtime solar value
pub const COLOR_SOLAR: Rgb565 = Rgb565::YELLOW;

/// Part of a column covered by both series
pub const COLOR_OVERLAP: Rgb565 = Rgb565::new(0, 32, 16);

pub const COLOR_IMPORTING: Rgb565 = Rgb565::RED;

pub const COLOR_EXPORTING: Rgb565 = Rgb565::GREEN;
