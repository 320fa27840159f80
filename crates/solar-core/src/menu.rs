//! Single-line status menu along the bottom of the screen.
//!
//! Buttons A and C step through a cyclic list of pages, button B triggers the
//! action of the current page (if it has one). Stat pages rotate through
//! min/avg/high/max on their own, one step every few renders.

use core::fmt::Write;

use heapless::String;

use crate::button::ButtonId;
use crate::clock::DateTime;
use crate::counters::TickCounters;
use crate::display::{
    COLOR_TEXT, MENU_BOTTOM_Y, MENU_TEXT_Y, MENU_TOP_Y, RenderSink, SCREEN_WIDTH_PX, centered_x,
    right_aligned_x,
};
use crate::error::Truncating;
use crate::history::History;
use crate::ingest::InstantReading;
use crate::series::{PerSeries, Series};

/// Renders between two steps of the stat rotation
pub const SUB_TICK_DIVIDER: u8 = 3;

/// Menu text is centred by padding to this many characters
pub const MENU_COLUMNS: usize = 32;

/// Width of the log excerpt on the log page
pub const LOG_EXCERPT_LEN: usize = 26;

pub type MenuLine = String<64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuPage {
    Updated,
    Battery,
    Graph,
    SolarStats,
    UsageStats,
    Time,
    Exception,
    Reboot,
    Backup,
    Markers,
    Log,
    Ticks,
}

impl MenuPage {
    /// The full page set, in navigation order.
    pub const ALL: [MenuPage; 12] = [
        Self::Updated,
        Self::Battery,
        Self::Graph,
        Self::SolarStats,
        Self::UsageStats,
        Self::Time,
        Self::Exception,
        Self::Reboot,
        Self::Backup,
        Self::Markers,
        Self::Log,
        Self::Ticks,
    ];

    /// Action button B performs on this page.
    pub const fn action(self) -> Option<MenuAction> {
        match self {
            Self::Reboot => Some(MenuAction::Reboot),
            Self::Backup => Some(MenuAction::Backup),
            Self::Markers => Some(MenuAction::ToggleMarkers),
            _ => None,
        }
    }
}

pub const PAGE_COUNT: usize = MenuPage::ALL.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Reboot,
    Backup,
    ToggleMarkers,
}

/// Rotating view on the stat pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatView {
    Min,
    Avg,
    High,
    Max,
}

impl StatView {
    pub const ALL: [StatView; 4] = [Self::Min, Self::Avg, Self::High, Self::Max];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Avg => "avg",
            Self::High => "high",
            Self::Max => "max",
        }
    }
}

/// Result of a button press on the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuInput {
    /// Page changed (A or C)
    Navigated,
    /// B on a page with an action
    Action(MenuAction),
    /// B on a page without an action
    Ignored,
}

#[derive(Debug, Clone)]
pub struct MenuStateMachine {
    pages: &'static [MenuPage],
    page: usize,
    sub_tick: usize,
    sub_tick_divider: u8,
    needs_blank: bool,
}

impl Default for MenuStateMachine {
    fn default() -> Self {
        Self::new(&MenuPage::ALL)
    }
}

impl MenuStateMachine {
    /// Menu over `pages`. An empty list falls back to the full set.
    pub fn new(pages: &'static [MenuPage]) -> Self {
        Self {
            pages: if pages.is_empty() {
                &MenuPage::ALL
            } else {
                pages
            },
            page: 0,
            sub_tick: 0,
            sub_tick_divider: 0,
            needs_blank: true,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn current(&self) -> MenuPage {
        self.pages[self.page]
    }

    pub fn stat_view(&self) -> StatView {
        StatView::ALL[self.sub_tick]
    }

    pub fn needs_blank(&self) -> bool {
        self.needs_blank
    }

    pub fn previous(&mut self) {
        self.page = self.page.checked_sub(1).unwrap_or(self.pages.len() - 1);
        self.needs_blank = true;
    }

    pub fn next(&mut self) {
        self.page = (self.page + 1) % self.pages.len();
        self.needs_blank = true;
    }

    /// Apply a debounced press.
    pub fn press(&mut self, button: ButtonId) -> MenuInput {
        match button {
            ButtonId::A => {
                self.previous();
                MenuInput::Navigated
            }
            ButtonId::C => {
                self.next();
                MenuInput::Navigated
            }
            ButtonId::B => self
                .current()
                .action()
                .map_or(MenuInput::Ignored, MenuInput::Action),
        }
    }

    /// Draw `line` as the menu row and advance the stat rotation.
    pub fn render<S: RenderSink>(&mut self, sink: &mut S, line: &str) -> Result<(), S::Error> {
        if self.needs_blank {
            sink.clear_rect(0, MENU_TOP_Y, SCREEN_WIDTH_PX - 1, MENU_BOTTOM_Y - 1)?;
            self.needs_blank = false;
        }

        sink.draw_text(0, MENU_TEXT_Y, "<", COLOR_TEXT, true)?;
        sink.draw_text(right_aligned_x(sink, ">"), MENU_TEXT_Y, ">", COLOR_TEXT, true)?;
        let padded = pad_center(line);
        sink.draw_text(centered_x(sink, &padded), MENU_TEXT_Y, &padded, COLOR_TEXT, true)?;

        self.sub_tick_divider += 1;
        if self.sub_tick_divider == SUB_TICK_DIVIDER {
            self.sub_tick = (self.sub_tick + 1) % StatView::ALL.len();
            self.sub_tick_divider = 0;
        }
        Ok(())
    }
}

/// Everything the pages display, gathered by the monitor for one render.
pub struct MenuContext<'a> {
    /// Epoch seconds of the last complete reading
    pub last_update: u64,
    pub utc_offset_s: i32,
    pub now: u64,
    pub battery: Option<u8>,
    pub history: &'a History,
    pub graph_window: &'a str,
    pub graph_max: i32,
    pub live: PerSeries<i32>,
    pub reading: Option<&'a InstantReading>,
    pub last_error: &'a str,
    pub last_log: &'a str,
    pub show_markers: bool,
    pub counters: &'a TickCounters,
}

/// Text of `page`, before padding.
pub fn format_page(page: MenuPage, view: StatView, ctx: &MenuContext<'_>) -> MenuLine {
    let mut line = MenuLine::new();
    let mut out = Truncating(&mut line);

    match page {
        MenuPage::Updated => {
            let at = DateTime::from_epoch(ctx.last_update, ctx.utc_offset_s);
            write!(out, "Updated:  {}", at).ok();
        }
        MenuPage::Battery => {
            match ctx.battery {
                Some(level) => write!(out, "Battery: {}%", level),
                None => out.write_str("Battery: -"),
            }
            .ok();
        }
        MenuPage::Graph => {
            write!(
                out,
                "Graph: {} {}, max {:.2}W",
                ctx.history.len(),
                ctx.graph_window,
                ctx.graph_max as f64
            )
            .ok();
        }
        MenuPage::SolarStats => write_stat(&mut out, Series::Solar, view, ctx),
        MenuPage::UsageStats => write_stat(&mut out, Series::Usage, view, ctx),
        MenuPage::Time => {
            write!(out, "Time: {}", ctx.now).ok();
        }
        MenuPage::Exception => {
            write!(out, "Exception: {}", ctx.last_error).ok();
        }
        MenuPage::Reboot => {
            out.write_str("Press B to reboot").ok();
        }
        MenuPage::Backup => {
            out.write_str("Press B to take a backup").ok();
        }
        MenuPage::Markers => {
            let verb = if ctx.show_markers { "hide" } else { "show" };
            write!(out, "Press B to {} markers", verb).ok();
        }
        MenuPage::Log => {
            write!(
                out,
                "Log: {:<width$.width$}",
                ctx.last_log,
                width = LOG_EXCERPT_LEN
            )
            .ok();
        }
        MenuPage::Ticks => {
            write!(out, "Ticks: {}", ctx.counters).ok();
        }
    }

    line
}

fn write_stat<W: Write>(out: &mut W, series: Series, view: StatView, ctx: &MenuContext<'_>) {
    let stats = ctx.history.stats(series);
    let live = f64::from(ctx.live[series]);
    let current = ctx.reading.map(|reading| match series {
        Series::Solar => reading.solar,
        Series::Usage => reading.usage,
    });

    let value = match view {
        StatView::Min => current.map_or(live, |c| c.min(live)).min(f64::from(stats.min)),
        StatView::Avg => stats.mean,
        StatView::High => stats.high(),
        StatView::Max => current.map_or(live, |c| c.max(live)).max(f64::from(stats.max)),
    };
    write!(out, "{} stats: {:.2}W {}", series.label(), value, view.label()).ok();
}

/// Pad short lines on both sides so the centred text overwrites the previous one.
fn pad_center(line: &str) -> MenuLine {
    let len = line.chars().count();
    let padding = if len < MENU_COLUMNS {
        (MENU_COLUMNS - len + 1) / 2
    } else {
        0
    };

    let mut padded = MenuLine::new();
    let mut out = Truncating(&mut padded);
    write!(out, "{:p$}{}{:p$}", "", line, "", p = padding).ok();
    padded
}
