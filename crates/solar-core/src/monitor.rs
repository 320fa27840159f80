//! The monitor aggregate and its periodic tick.
//!
//! [`Monitor`] owns every piece of mutable state: ingest, downsampling,
//! history, renderers, menu and counters. It is built once at startup and is
//! the only writer of that state. Interrupt and delivery contexts never touch
//! it directly; they push onto the button and telemetry queues, which the
//! driver drains at the start of each tick.
//!
//! A tick runs four drawing phases (realtime header, graph, menu, indicator)
//! followed by the connectivity watchdog. Each phase returns its own result;
//! a failure is counted, remembered for the diagnostics page and logged, and
//! the remaining phases still run.

use core::fmt::{self, Write};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::String;
use log::{debug, error, info};

use crate::battery::BatteryGauge;
use crate::button::{BUTTON_EVENTS, ButtonEvent};
use crate::config::{Config, RuntimeSettings};
use crate::counters::TickCounters;
use crate::display::RenderSink;
use crate::downsample::RollingDownsampler;
use crate::error::{ERROR_TEXT_LEN, MonitorError, RenderPhase, Truncating, truncated};
use crate::graph::GraphRenderer;
use crate::history::{History, Snapshot};
use crate::indicator::{IndicatorSink, StatusIndicator};
use crate::ingest::{
    Ingested, InstantReading, TELEMETRY, TelemetryIngest, TelemetryQueue, parse_payload,
};
use crate::menu::{
    LOG_EXCERPT_LEN, MenuAction, MenuContext, MenuInput, MenuPage, MenuStateMachine, format_page,
};
use crate::realtime::RealtimeHeader;
use crate::series::Series;
use crate::watchdog::{Link, Watchdog};

/// Flags for the supervisor, raised from the menu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlRequests {
    /// Save a snapshot and the settings, then reset the device
    pub reboot: bool,
    /// Save a snapshot and the settings
    pub backup: bool,
    /// Save the settings
    pub config_save: bool,
}

impl ControlRequests {
    pub fn any(&self) -> bool {
        self.reboot || self.backup || self.config_save
    }
}

/// Hardware handed to [`Monitor::tick`].
pub struct Devices<'a, S, I, B, L> {
    pub display: &'a mut S,
    /// `None` when no LED strip is fitted
    pub indicator: Option<&'a mut I>,
    pub battery: &'a mut B,
    pub link: &'a mut L,
}

pub struct Monitor {
    ingest: TelemetryIngest,
    downsampler: RollingDownsampler,
    history: History,
    graph: GraphRenderer,
    header: RealtimeHeader,
    menu: MenuStateMachine,
    indicator: StatusIndicator,
    watchdog: Watchdog,
    counters: TickCounters,
    settings: RuntimeSettings,
    requests: ControlRequests,
    graph_window: String<16>,
    utc_offset_s: i32,
    last_update: Option<u64>,
    last_error: String<ERROR_TEXT_LEN>,
    last_log: String<LOG_EXCERPT_LEN>,
}

impl Monitor {
    pub fn new(config: &Config<'_>) -> Result<Self, MonitorError> {
        info!(
            "Monitor on {} / {}, {}s per graph column",
            config.solar_topic, config.grid_topic, config.graph_interval_s
        );
        Ok(Self {
            ingest: TelemetryIngest::new(config.solar_topic, config.grid_topic)?,
            downsampler: RollingDownsampler::new(config.graph_interval_s),
            history: History::new(),
            graph: GraphRenderer::new(),
            header: RealtimeHeader::new(),
            menu: MenuStateMachine::default(),
            indicator: StatusIndicator::new(),
            watchdog: Watchdog::default(),
            counters: TickCounters::default(),
            settings: RuntimeSettings::default(),
            requests: ControlRequests::default(),
            graph_window: config.graph_window(),
            utc_offset_s: config.utc_offset_s,
            last_update: None,
            last_error: truncated("None"),
            last_log: String::new(),
        })
    }

    /// Use a reduced page set.
    pub fn with_menu_pages(mut self, pages: &'static [MenuPage]) -> Self {
        self.menu = MenuStateMachine::new(pages);
        self
    }

    pub fn with_watchdog(mut self, watchdog: Watchdog) -> Self {
        self.watchdog = watchdog;
        self
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Replace the history with a persisted snapshot.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.history.restore(snapshot);
        self.graph.invalidate();
        self.remember(format_args!("Restored {} points", self.history.len()));
    }

    pub fn load_settings(&mut self, settings: RuntimeSettings) {
        self.settings = settings;
        self.graph.invalidate();
    }

    pub fn snapshot(&self) -> Snapshot {
        self.history.snapshot()
    }

    pub fn settings(&self) -> RuntimeSettings {
        self.settings
    }

    /// Return and clear the pending supervisor requests.
    pub fn take_requests(&mut self) -> ControlRequests {
        core::mem::take(&mut self.requests)
    }

    /// Final state to persist before an intentional reset.
    pub fn shutdown(self) -> (Snapshot, RuntimeSettings) {
        info!("Shutting down with {} history points", self.history.len());
        (self.history.snapshot(), self.settings)
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    /// Feed one telemetry message.
    ///
    /// A malformed payload is counted and logged and leaves every other piece
    /// of state untouched; `None` is returned in that case.
    pub fn on_message(&mut self, topic: &str, payload: &str, now: u64) -> Option<Ingested> {
        self.on_parsed(topic, parse_payload(payload), now)
    }

    fn on_parsed(
        &mut self,
        topic: &str,
        value: Result<f64, MonitorError>,
        now: u64,
    ) -> Option<Ingested> {
        let value = match value {
            Ok(value) => value,
            Err(e) => {
                self.record_error(e);
                return None;
            }
        };
        let ingested = self.ingest.on_value(topic, value, now);
        self.counters.messages += 1;

        if let Ingested::Reading(reading) = ingested {
            self.counters.samples += 1;
            self.last_update = Some(reading.timestamp);

            let flush = self.downsampler.accept(reading.solar, reading.grid, now);
            self.counters.seconds_remaining =
                u32::try_from(self.downsampler.seconds_remaining()).unwrap_or(u32::MAX);
            if let Some(flush) = flush {
                self.history.append(Series::Solar, flush.solar);
                self.history.append(Series::Usage, flush.usage);
                self.counters.graph_points += 1;
                self.graph.invalidate();
            }
        }
        Some(ingested)
    }

    /// Apply a debounced button event. Releases are ignored.
    pub fn on_button(&mut self, event: ButtonEvent) -> Option<MenuAction> {
        if !event.pressed {
            return None;
        }

        match self.menu.press(event.button) {
            MenuInput::Navigated => {
                self.counters.button_presses += 1;
                None
            }
            MenuInput::Ignored => None,
            MenuInput::Action(action) => {
                self.apply(action);
                Some(action)
            }
        }
    }

    fn apply(&mut self, action: MenuAction) {
        match action {
            MenuAction::Reboot => {
                self.requests.reboot = true;
                self.remember(format_args!("Reboot requested"));
            }
            MenuAction::Backup => {
                self.requests.backup = true;
                self.remember(format_args!("Backup requested"));
            }
            MenuAction::ToggleMarkers => {
                self.settings.show_markers = !self.settings.show_markers;
                self.requests.config_save = true;
                // Repaint so the markers appear or vanish on the next tick
                self.graph.invalidate();
                self.remember(format_args!(
                    "Markers {}",
                    if self.settings.show_markers {
                        "shown"
                    } else {
                        "hidden"
                    }
                ));
            }
        }
    }

    /// Apply everything queued by the interrupt and delivery contexts.
    ///
    /// Returns the number of queue entries processed.
    pub fn drain<const NB: usize, const NT: usize>(
        &mut self,
        buttons: &Channel<CriticalSectionRawMutex, ButtonEvent, NB>,
        telemetry: &TelemetryQueue<NT>,
    ) -> usize {
        let mut processed = 0;
        while let Ok(event) = buttons.try_receive() {
            self.on_button(event);
            processed += 1;
        }
        while let Some(message) = telemetry.try_receive() {
            self.on_parsed(&message.topic, message.value, message.received_at);
            processed += 1;
        }

        let dropped = telemetry.take_dropped();
        if dropped > 0 {
            self.record_error(MonitorError::QueueFull);
            self.counters.errors += dropped - 1;
        }
        processed
    }

    /// [`drain`](Self::drain) the global queues.
    pub fn drain_queues(&mut self) -> usize {
        self.drain(&BUTTON_EVENTS, &TELEMETRY)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Draw the splash screen shown until the first reading arrives.
    pub fn draw_splash<S: RenderSink>(&mut self, display: &mut S) -> Result<(), MonitorError> {
        self.header.draw_splash(display).map_err(|e| {
            debug!("Splash failed: {:?}", e);
            MonitorError::Render(RenderPhase::Realtime)
        })
    }

    /// One periodic tick at `now` (epoch seconds).
    ///
    /// Returns the number of phases that failed.
    pub fn tick<S, I, B, L>(&mut self, now: u64, devices: &mut Devices<'_, S, I, B, L>) -> u32
    where
        S: RenderSink,
        I: IndicatorSink,
        B: BatteryGauge,
        L: Link,
    {
        let mut failures = 0;

        let results = [
            self.draw_realtime(devices.display),
            self.draw_graph(devices.display),
            self.draw_menu(now, devices.display, devices.battery),
            match devices.indicator.as_deref_mut() {
                Some(indicator) => self.draw_indicator(indicator),
                None => Ok(()),
            },
        ];
        for result in results {
            if let Err(e) = result {
                self.record_error(e);
                failures += 1;
            }
        }

        match self.watchdog.check(devices.link) {
            Ok(true) => self.remember(format_args!("Link restored")),
            Ok(false) => {}
            Err(e) => {
                self.record_error(e);
                failures += 1;
            }
        }

        failures
    }

    fn draw_realtime<S: RenderSink>(&mut self, display: &mut S) -> Result<(), MonitorError> {
        if !self.ingest.realtime_updated() {
            return Ok(());
        }
        let Some(reading) = self.ingest.reading().copied() else {
            return Ok(());
        };

        self.header
            .draw(display, &reading)
            .map_err(|e| render_failed(RenderPhase::Realtime, e))?;
        self.ingest.mark_realtime_drawn();
        Ok(())
    }

    fn draw_graph<S: RenderSink>(&mut self, display: &mut S) -> Result<(), MonitorError> {
        self.graph
            .render(
                display,
                &self.history,
                self.downsampler.live_average(),
                self.settings.show_markers,
            )
            .map_err(|e| render_failed(RenderPhase::Graph, e))
    }

    fn draw_menu<S: RenderSink, B: BatteryGauge>(
        &mut self,
        now: u64,
        display: &mut S,
        battery: &mut B,
    ) -> Result<(), MonitorError> {
        let page = self.menu.current();
        let battery = if page == MenuPage::Battery {
            let level = battery.level().map_err(|e| {
                debug!("Battery read failed: {:?}", e);
                MonitorError::Battery
            })?;
            Some(level)
        } else {
            None
        };

        let context = MenuContext {
            last_update: self.last_update.unwrap_or(now),
            utc_offset_s: self.utc_offset_s,
            now,
            battery,
            history: &self.history,
            graph_window: &self.graph_window,
            graph_max: self.graph.graph_max(),
            live: self.downsampler.live_average(),
            reading: self.ingest.reading(),
            last_error: &self.last_error,
            last_log: &self.last_log,
            show_markers: self.settings.show_markers,
            counters: &self.counters,
        };
        let line = format_page(page, self.menu.stat_view(), &context);

        self.menu
            .render(display, &line)
            .map_err(|e| render_failed(RenderPhase::Menu, e))
    }

    fn draw_indicator<I: IndicatorSink>(&mut self, indicator: &mut I) -> Result<(), MonitorError> {
        self.indicator
            .update(indicator, self.ingest.reading(), &self.history)
            .map(|_| ())
            .map_err(|e| {
                debug!("Indicator write failed: {:?}", e);
                MonitorError::Render(RenderPhase::Indicator)
            })
    }

    fn record_error(&mut self, e: MonitorError) {
        error!("{}", e);
        self.counters.errors += 1;
        self.last_error = e.short_text();
        self.remember(format_args!("{}", e));
    }

    /// Keep the start of a notable log line for the log page.
    fn remember(&mut self, args: fmt::Arguments<'_>) {
        self.last_log.clear();
        Truncating(&mut self.last_log).write_fmt(args).ok();
        debug!("{}", self.last_log);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn counters(&self) -> &TickCounters {
        &self.counters
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn reading(&self) -> Option<&InstantReading> {
        self.ingest.reading()
    }

    pub fn menu(&self) -> &MenuStateMachine {
        &self.menu
    }

    pub fn graph(&self) -> &GraphRenderer {
        &self.graph
    }

    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    pub fn last_log(&self) -> &str {
        &self.last_log
    }
}

fn render_failed<E: fmt::Debug>(phase: RenderPhase, e: E) -> MonitorError {
    debug!("Sink error during {}: {:?}", phase, e);
    MonitorError::Render(phase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::button::ButtonId;
    use crate::indicator::IndicatorColor;
    use crate::menu::PAGE_COUNT;
    use crate::testing::{FakeLink, FixedBattery, RecordingIndicator, RecordingSink};

    const SOLAR: &str = "emon/solar";
    const GRID: &str = "emon/grid";

    struct Rig {
        display: RecordingSink,
        indicator: RecordingIndicator,
        battery: FixedBattery,
        link: FakeLink,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                display: RecordingSink::new(),
                indicator: RecordingIndicator::default(),
                battery: FixedBattery(Some(100)),
                link: FakeLink::up(),
            }
        }

        fn tick(&mut self, monitor: &mut Monitor, now: u64) -> u32 {
            let mut devices = Devices {
                display: &mut self.display,
                indicator: Some(&mut self.indicator),
                battery: &mut self.battery,
                link: &mut self.link,
            };
            monitor.tick(now, &mut devices)
        }
    }

    fn monitor() -> Monitor {
        Monitor::new(&Config::new(SOLAR, GRID)).unwrap()
    }

    fn press(monitor: &mut Monitor, button: ButtonId) -> Option<MenuAction> {
        monitor.on_button(ButtonEvent {
            button,
            pressed: true,
        })
    }

    fn feed(monitor: &mut Monitor, solar: f64, grid: f64, now: u64) {
        let solar = alloc::format!("{}", solar);
        let grid = alloc::format!("{}", grid);
        monitor.on_message(SOLAR, &solar, now);
        monitor.on_message(GRID, &grid, now);
    }

    #[test]
    fn test_readings_flow_into_history() {
        let mut monitor = monitor();
        feed(&mut monitor, 2.0, -1.0, 600);
        feed(&mut monitor, 4.0, -3.0, 620);
        feed(&mut monitor, 6.0, -2.0, 660);

        let counters = monitor.counters();
        assert_eq!(counters.messages, 6);
        assert_eq!(counters.samples, 3);
        assert_eq!(counters.graph_points, 1);
        assert_eq!(counters.seconds_remaining, 60);

        let history = monitor.history();
        assert_eq!(history.buffer(Series::Solar).iter().last(), Some(4));
        assert_eq!(history.buffer(Series::Usage).iter().last(), Some(2));
        assert!(monitor.graph().buffer_updated());
    }

    #[test]
    fn test_bad_payload_is_counted_not_propagated() {
        let mut monitor = monitor();
        assert_eq!(monitor.on_message(SOLAR, "garbage", 0), None);
        assert_eq!(monitor.counters().errors, 1);
        assert_eq!(monitor.counters().messages, 0);
        assert_eq!(monitor.last_error(), "Invalid payload: gar");
        assert!(monitor.reading().is_none());
    }

    #[test]
    fn test_page_wraps_both_ways() {
        let mut monitor = monitor();
        press(&mut monitor, ButtonId::A);
        assert_eq!(monitor.menu().page(), PAGE_COUNT - 1);
        press(&mut monitor, ButtonId::C);
        assert_eq!(monitor.menu().page(), 0);
        assert_eq!(monitor.counters().button_presses, 2);

        // Releases are not presses
        monitor.on_button(ButtonEvent {
            button: ButtonId::C,
            pressed: false,
        });
        assert_eq!(monitor.menu().page(), 0);
    }

    #[test]
    fn test_reboot_and_backup_requests() {
        let mut monitor = monitor();
        for _ in 0..7 {
            press(&mut monitor, ButtonId::C);
        }
        assert_eq!(press(&mut monitor, ButtonId::B), Some(MenuAction::Reboot));
        press(&mut monitor, ButtonId::C);
        assert_eq!(press(&mut monitor, ButtonId::B), Some(MenuAction::Backup));

        let requests = monitor.take_requests();
        assert!(requests.reboot && requests.backup && !requests.config_save);
        assert!(!monitor.take_requests().any());
        // B is not a navigation press
        assert_eq!(monitor.counters().button_presses, 8);
    }

    #[test]
    fn test_toggle_markers_requests_save() {
        let mut monitor = monitor();
        for _ in 0..9 {
            press(&mut monitor, ButtonId::C);
        }
        assert_eq!(
            press(&mut monitor, ButtonId::B),
            Some(MenuAction::ToggleMarkers)
        );
        assert!(!monitor.settings().show_markers);
        assert!(monitor.take_requests().config_save);
        assert_eq!(monitor.last_log(), "Markers hidden");
    }

    #[test]
    fn test_failing_phase_does_not_stop_others() {
        let mut monitor = monitor();
        feed(&mut monitor, 500.0, -200.0, 0);
        feed(&mut monitor, 500.0, -200.0, 60);

        let mut rig = Rig::new();
        rig.display.fail_lines = true;
        assert_eq!(rig.tick(&mut monitor, 61), 1);

        assert_eq!(monitor.counters().errors, 1);
        assert_eq!(monitor.last_error(), "Failed to draw graph");
        // Realtime and menu text still made it out, and so did the indicator
        let texts = rig.display.texts();
        assert!(texts.contains(&"300.00W          "));
        assert!(texts.contains(&">"));
        assert_eq!(rig.indicator.writes, [IndicatorColor::Green]);
    }

    #[test]
    fn test_every_phase_failing_is_counted() {
        let mut monitor = monitor();
        feed(&mut monitor, 500.0, -200.0, 0);

        let mut rig = Rig::new();
        rig.display.fail_lines = true;
        rig.display.fail_text = true;
        rig.indicator.fail = true;
        rig.link = FakeLink::down(None);
        assert_eq!(rig.tick(&mut monitor, 1), 5);
        assert_eq!(monitor.counters().errors, 5);
        assert_eq!(monitor.last_error(), "Reconnect failed aft");

        // Nothing is stuck: the next healthy tick draws normally
        let mut rig = Rig::new();
        assert_eq!(rig.tick(&mut monitor, 2), 0);
        assert!(rig.display.texts().contains(&"300.00W          "));
    }

    #[test]
    fn test_battery_failure_only_affects_menu() {
        let mut monitor = monitor();
        press(&mut monitor, ButtonId::C);
        let mut rig = Rig::new();
        rig.battery = FixedBattery(None);

        assert_eq!(rig.tick(&mut monitor, 0), 1);
        assert_eq!(monitor.last_error(), "Battery read failed");

        rig.battery = FixedBattery(Some(75));
        rig.display.clear();
        assert_eq!(rig.tick(&mut monitor, 1), 0);
        assert!(
            rig.display
                .texts()
                .iter()
                .any(|text| text.trim() == "Battery: 75%")
        );
    }

    #[test]
    fn test_indicator_written_once_for_same_color() {
        let mut monitor = monitor();
        feed(&mut monitor, 500.0, -200.0, 0);
        feed(&mut monitor, 500.0, -200.0, 60);

        let mut rig = Rig::new();
        rig.tick(&mut monitor, 61);
        rig.tick(&mut monitor, 62);
        assert_eq!(rig.indicator.writes, [IndicatorColor::Green]);
    }

    #[test]
    fn test_drain_applies_queued_inputs() {
        let buttons: Channel<CriticalSectionRawMutex, ButtonEvent, 4> = Channel::new();
        let telemetry: TelemetryQueue<4> = TelemetryQueue::new();
        buttons
            .try_send(ButtonEvent {
                button: ButtonId::A,
                pressed: true,
            })
            .unwrap();
        telemetry.submit(SOLAR, "120", 5).unwrap();
        telemetry.submit(GRID, "80", 5).unwrap();

        let mut monitor = monitor();
        assert_eq!(monitor.drain(&buttons, &telemetry), 3);
        assert_eq!(monitor.menu().page(), PAGE_COUNT - 1);
        assert_eq!(monitor.reading().unwrap().usage, 200.0);
        assert_eq!(monitor.drain(&buttons, &telemetry), 0);
    }

    #[test]
    fn test_watchdog_recovery_is_logged() {
        let mut monitor = monitor();
        let mut rig = Rig::new();
        rig.link = FakeLink::down(Some(1));

        assert_eq!(rig.tick(&mut monitor, 0), 0);
        assert_eq!(monitor.last_log(), "Link restored");
        assert_eq!(rig.link.attempts, 2);
    }

    #[test]
    fn test_snapshot_survives_shutdown_and_restore() {
        let mut monitor = monitor();
        for minute in 0..=5u64 {
            feed(&mut monitor, 100.0 * minute as f64, 50.0, minute * 60);
        }
        assert_eq!(monitor.history().len(), 5);
        let stats = Series::ALL.map(|series| *monitor.history().stats(series));

        let (snapshot, settings) = monitor.shutdown();
        let bytes = snapshot.to_bytes().unwrap();

        let mut restored = Monitor::new(&Config::new(SOLAR, GRID)).unwrap();
        restored.restore(&Snapshot::from_bytes(&bytes).unwrap());
        restored.load_settings(settings);

        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.last_log(), "Restored 5 points");
        assert_eq!(Series::ALL.map(|series| *restored.history().stats(series)), stats);
    }

    #[test]
    fn test_queued_rejections_and_drops_are_counted() {
        let buttons: Channel<CriticalSectionRawMutex, ButtonEvent, 1> = Channel::new();
        let telemetry: TelemetryQueue<2> = TelemetryQueue::new();
        telemetry.submit(SOLAR, "1234.000000000000000000001", 0).unwrap();
        telemetry.submit(GRID, "offline", 0).unwrap();
        for _ in 0..3 {
            assert_eq!(
                telemetry.submit(GRID, "10", 0),
                Err(MonitorError::QueueFull)
            );
        }

        let mut monitor = monitor();
        assert_eq!(monitor.drain(&buttons, &telemetry), 2);
        assert_eq!(monitor.counters().messages, 1);
        assert_eq!(monitor.counters().errors, 4);
        assert_eq!(monitor.last_error(), "Telemetry queue full");

        // The long but valid solar value is waiting for its grid half
        telemetry.submit(GRID, "-34", 1).unwrap();
        monitor.drain(&buttons, &telemetry);
        assert_eq!(monitor.reading().unwrap().usage, 1200.0);
        assert_eq!(monitor.counters().errors, 4);
    }
}
