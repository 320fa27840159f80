//! Desktop simulator for the solar-display energy monitor.
//!
//! Plays the part of the firmware around `solar-core`: it publishes a
//! synthetic day of solar and grid telemetry onto the telemetry queue, feeds
//! bouncy button edges through the debouncers, runs the periodic tick against
//! a headless `embedded-graphics-simulator` display, and acts on the backup,
//! settings and reboot requests the menu raises.
//!
//! Time is simulated, so several hours run in a few seconds. The final frame
//! is written as a PNG next to the persisted snapshot and settings.
//!
//! ```text
//! solar-simulator [OUTPUT_DIR] [HOURS]
//! ```
//!
//! `RUST_LOG=debug` shows every graph bucket and indicator change.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{OutputSettingsBuilder, SimulatorDisplay};
use embedded_hal::digital::{ErrorType, InputPin};
use log::{error, info, warn};

use solar_core::battery::BatteryGauge;
use solar_core::button::{ButtonId, DebouncedButton};
use solar_core::display::{DrawTargetSink, SCREEN_HEIGHT_PX, SCREEN_WIDTH_PX};
use solar_core::history::Snapshot;
use solar_core::indicator::{IndicatorColor, IndicatorSink};
use solar_core::ingest;
use solar_core::watchdog::Link;
use solar_core::{Config, Devices, Monitor, RuntimeSettings};

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

const SOLAR_TOPIC: &str = "emon/emonpi/solar";
const GRID_TOPIC: &str = "emon/emonpi/grid";

/// 2024-06-21 06:00:00 UTC, early on a long day
const START_EPOCH: u64 = 1_718_949_600;

/// Seconds between published reading pairs
const PUBLISH_INTERVAL_S: u64 = 5;

const DEFAULT_HOURS: u64 = 6;

/// Scripted user, as `(tick, button)`: browse to Backup and take one, hide
/// and show the markers, then settle on the Ticks page.
const BUTTON_SCRIPT: &[(u64, ButtonId)] = &[
    (600, ButtonId::C),
    (1200, ButtonId::C),
    (3600, ButtonId::C),
    (3601, ButtonId::C),
    (3602, ButtonId::C),
    (3603, ButtonId::C),
    (3604, ButtonId::C),
    (3605, ButtonId::C),
    (3606, ButtonId::B),
    (4000, ButtonId::C),
    (4010, ButtonId::B),
    (4020, ButtonId::B),
    (4030, ButtonId::C),
    (4040, ButtonId::C),
];

const LINK_OUTAGE_TICK: u64 = 7200;

const SNAPSHOT_FILE: &str = "backup.bin";
const SETTINGS_FILE: &str = "runtime_config.bin";
const FRAME_FILE: &str = "solar-display.png";

// ---------------------------------------------------------------------------
// Synthetic telemetry
// ---------------------------------------------------------------------------

/// Produces a plausible solar curve and household load for a given instant.
struct MockTelemetry {
    peak_solar_w: f64,
}

impl MockTelemetry {
    /// `(solar, grid)` in W at epoch second `t`.
    fn sample(&self, t: u64) -> (f64, f64) {
        let hour = (t % 86_400) as f64 / 3600.0;
        let tf = t as f64;

        // Sunrise at 05:00, sunset at 21:00, with some passing clouds
        let daylight = ((hour - 5.0) / 16.0 * PI).sin().max(0.0);
        let clouds = 0.85 + 0.15 * (tf / 420.0).sin() * (tf / 97.0).cos();
        let solar = self.peak_solar_w * daylight * clouds;

        // Base load, a fridge cycling, and a kettle now and then
        let fridge = if (t / 900) % 2 == 0 { 120.0 } else { 0.0 };
        let kettle = if t % 5400 < 180 { 2000.0 } else { 0.0 };
        let usage = 280.0 + 40.0 * (tf / 63.0).sin() + fridge + kettle;

        (solar, usage - solar)
    }
}

// ---------------------------------------------------------------------------
// Simulated hardware
// ---------------------------------------------------------------------------

/// Active-low push button that bounces for a few samples after every edge.
struct BouncyPin {
    pending: VecDeque<bool>,
    level: bool,
}

impl BouncyPin {
    fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            level: true,
        }
    }

    /// Move to `high`, passing through a short burst of contact bounce.
    fn settle_to(&mut self, high: bool) {
        self.pending.extend([high, !high, high, !high]);
        self.level = high;
    }
}

impl ErrorType for BouncyPin {
    type Error = Infallible;
}

impl InputPin for BouncyPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.pending.pop_front().unwrap_or(self.level))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

/// One button with its pin and debouncer.
struct PanelButton {
    pin: BouncyPin,
    debouncer: DebouncedButton,
}

impl PanelButton {
    fn new(id: ButtonId) -> Self {
        Self {
            pin: BouncyPin::new(),
            debouncer: DebouncedButton::new(id),
        }
    }

    /// Press and release, firing one interrupt per bounce edge.
    fn click(&mut self) {
        for high in [false, true] {
            self.pin.settle_to(high);
            for _ in 0..3 {
                self.debouncer.on_interrupt(&mut self.pin);
            }
        }
    }
}

/// Battery slowly draining while the simulation runs.
struct SimBattery {
    charge: f64,
}

impl BatteryGauge for SimBattery {
    type Error = Infallible;

    fn level(&mut self) -> Result<u8, Infallible> {
        self.charge = (self.charge - 0.01).max(0.0);
        // The gauge only reports quarters
        Ok(((self.charge / 25.0).ceil() * 25.0).min(100.0) as u8)
    }
}

/// Wi-Fi session with a scheduled outage.
struct SimLink {
    connected: bool,
    failures_left: u8,
}

impl SimLink {
    fn drop_connection(&mut self, failures: u8) {
        warn!("Simulating a network outage");
        self.connected = false;
        self.failures_left = failures;
    }
}

impl Link for SimLink {
    type Error = &'static str;

    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn reconnect(&mut self) -> Result<(), &'static str> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err("access point not found");
        }
        self.connected = true;
        Ok(())
    }
}

/// Stand-in for the NeoPixel strip; logs colour changes.
struct LogIndicator;

impl IndicatorSink for LogIndicator {
    type Error = Infallible;

    fn set_color(&mut self, color: IndicatorColor) -> Result<(), Infallible> {
        let rgb = color.rgb();
        info!(
            "LEDs -> {:?} (#{:02x}{:02x}{:02x})",
            color,
            rgb.r(),
            rgb.g(),
            rgb.b()
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

fn write_state(dir: &Path, snapshot: &Snapshot, settings: &RuntimeSettings) {
    match snapshot.to_bytes() {
        Ok(bytes) => match fs::write(dir.join(SNAPSHOT_FILE), bytes) {
            Ok(()) => info!("Backup written ({} points)", snapshot.usage_buffer.len()),
            Err(e) => error!("Writing backup failed: {}", e),
        },
        Err(e) => error!("Encoding backup failed: {}", e),
    }
    write_settings(dir, settings);
}

fn write_settings(dir: &Path, settings: &RuntimeSettings) {
    match settings.to_bytes() {
        Ok(bytes) => {
            if let Err(e) = fs::write(dir.join(SETTINGS_FILE), bytes) {
                error!("Writing settings failed: {}", e);
            }
        }
        Err(e) => error!("Encoding settings failed: {}", e),
    }
}

/// Restore settings and a pending backup. The backup is consumed.
fn load_state(dir: &Path, monitor: &mut Monitor) {
    if let Ok(bytes) = fs::read(dir.join(SETTINGS_FILE)) {
        match RuntimeSettings::from_bytes(&bytes) {
            Ok(settings) => monitor.load_settings(settings),
            Err(e) => warn!("Ignoring settings file: {}", e),
        }
    }

    let backup = dir.join(SNAPSHOT_FILE);
    if let Ok(bytes) = fs::read(&backup) {
        match Snapshot::from_bytes(&bytes) {
            Ok(snapshot) => {
                monitor.restore(&snapshot);
                info!("Restored {} graph points", monitor.history().len());
            }
            Err(e) => warn!("Ignoring backup file: {}", e),
        }
        if let Err(e) = fs::remove_file(&backup) {
            warn!("Could not remove backup: {}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "solar-simulator-out".into()));
    let hours = args
        .next()
        .and_then(|h| h.parse::<u64>().ok())
        .unwrap_or(DEFAULT_HOURS);
    if let Err(e) = fs::create_dir_all(&out_dir) {
        error!("Cannot create {}: {}", out_dir.display(), e);
        return;
    }

    let config = Config::new(SOLAR_TOPIC, GRID_TOPIC).with_utc_offset(2 * 3600);
    info!(
        "Simulating {}h, graph window {}, output in {}",
        hours,
        config.graph_window(),
        out_dir.display()
    );

    let mut monitor = match Monitor::new(&config) {
        Ok(monitor) => monitor,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };
    load_state(&out_dir, &mut monitor);

    let mut display = DrawTargetSink::new(SimulatorDisplay::<Rgb565>::new(Size::new(
        SCREEN_WIDTH_PX as u32,
        SCREEN_HEIGHT_PX as u32,
    )));
    if let Err(e) = display.target_mut().clear(Rgb565::BLACK) {
        error!("Clearing display failed: {:?}", e);
    }
    if let Err(e) = monitor.draw_splash(&mut display) {
        error!("{}", e);
    }

    let telemetry = MockTelemetry {
        peak_solar_w: 3800.0,
    };
    let mut button_a = PanelButton::new(ButtonId::A);
    let mut button_b = PanelButton::new(ButtonId::B);
    let mut button_c = PanelButton::new(ButtonId::C);
    let mut battery = SimBattery { charge: 100.0 };
    let mut link = SimLink {
        connected: true,
        failures_left: 0,
    };
    let mut indicator = LogIndicator;

    let tick_s = u64::from(config.update_interval_ms / 1000).max(1);
    let end = START_EPOCH + hours * 3600;
    let mut now = START_EPOCH;
    let mut ticks = 0u64;

    while now < end {
        if ticks == LINK_OUTAGE_TICK {
            link.drop_connection(2);
        }
        for &(at, id) in BUTTON_SCRIPT {
            if at == ticks {
                match id {
                    ButtonId::A => button_a.click(),
                    ButtonId::B => button_b.click(),
                    ButtonId::C => button_c.click(),
                }
            }
        }

        if now % PUBLISH_INTERVAL_S == 0 {
            let (solar, grid) = telemetry.sample(now);
            for (topic, value) in [(SOLAR_TOPIC, solar), (GRID_TOPIC, grid)] {
                if let Err(e) = ingest::submit(topic, &format!("{:.1}", value), now) {
                    warn!("Dropped telemetry: {}", e);
                }
            }
        }
        if ticks % 3600 == 1800 {
            // A junk payload, which must only bump the error counter
            let _ = ingest::submit(GRID_TOPIC, "nan", now);
        }

        monitor.drain_queues();
        let mut devices = Devices {
            display: &mut display,
            indicator: Some(&mut indicator),
            battery: &mut battery,
            link: &mut link,
        };
        monitor.tick(now, &mut devices);

        let requests = monitor.take_requests();
        if requests.reboot {
            info!("Reboot requested");
            break;
        }
        if requests.backup {
            write_state(&out_dir, &monitor.snapshot(), &monitor.settings());
        } else if requests.config_save {
            write_settings(&out_dir, &monitor.settings());
        }

        now += tick_s;
        ticks += 1;
    }

    let counters = *monitor.counters();
    info!("Finished after {} ticks, counters M, D, G, B, R, E = {}", ticks, counters);

    let (snapshot, settings) = monitor.shutdown();
    write_state(&out_dir, &snapshot, &settings);

    let frame = out_dir.join(FRAME_FILE);
    let output_settings = OutputSettingsBuilder::new().scale(2).build();
    match display
        .target()
        .to_rgb_output_image(&output_settings)
        .save_png(&frame)
    {
        Ok(()) => info!("Frame saved to {}", frame.display()),
        Err(e) => error!("Saving frame failed: {}", e),
    }
}
