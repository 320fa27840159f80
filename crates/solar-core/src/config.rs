//! Startup configuration and persisted runtime settings.

use core::fmt::Write;

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::MonitorError;
use crate::display::PLOT_COLUMNS;

pub const DEFAULT_GRAPH_INTERVAL_S: u32 = 60;
pub const DEFAULT_UPDATE_INTERVAL_MS: u32 = 1000;

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    /// Topic carrying instantaneous solar production (W)
    pub solar_topic: &'a str,
    /// Topic carrying grid power (W, positive when importing)
    pub grid_topic: &'a str,
    /// Width of one graph column in seconds
    #[serde(default = "default_graph_interval")]
    pub graph_interval_s: u32,
    /// Period of the driver tick
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: u32,
    /// Offset applied to timestamps shown on the menu
    #[serde(default)]
    pub utc_offset_s: i32,
    #[serde(default)]
    pub network: NetworkConfig<'a>,
}

/// Connection details for the bootstrap code. The core never reads these.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy)]
pub struct NetworkConfig<'a> {
    pub mqtt_broker: &'a str,
    pub ssid: &'a str,
    pub password: &'a str,
}

fn default_graph_interval() -> u32 {
    DEFAULT_GRAPH_INTERVAL_S
}

fn default_update_interval() -> u32 {
    DEFAULT_UPDATE_INTERVAL_MS
}

impl<'a> Config<'a> {
    pub fn new(solar_topic: &'a str, grid_topic: &'a str) -> Self {
        Self {
            solar_topic,
            grid_topic,
            graph_interval_s: DEFAULT_GRAPH_INTERVAL_S,
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            utc_offset_s: 0,
            network: NetworkConfig::default(),
        }
    }

    pub fn with_graph_interval(mut self, seconds: u32) -> Self {
        self.graph_interval_s = seconds.max(1);
        self
    }

    pub fn with_utc_offset(mut self, seconds: i32) -> Self {
        self.utc_offset_s = seconds;
        self
    }

    /// Decode a postcard-encoded configuration blob.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self, MonitorError> {
        postcard::from_bytes(bytes).map_err(MonitorError::Config)
    }

    /// Time span covered by a full graph, e.g. `"5h 20m"` for one-minute columns.
    pub fn graph_window(&self) -> String<16> {
        shorten(self.graph_interval_s * PLOT_COLUMNS as u32)
    }
}

/// Settings that can be changed from the menu and survive a reboot.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub show_markers: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self { show_markers: true }
    }
}

impl RuntimeSettings {
    pub fn to_bytes(&self) -> Result<alloc::vec::Vec<u8>, MonitorError> {
        postcard::to_allocvec(self).map_err(MonitorError::Config)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MonitorError> {
        postcard::from_bytes(bytes).map_err(MonitorError::Config)
    }
}

/// Render a duration as `Xh Ym Zs`, leaving out zero parts.
pub fn shorten(seconds: u32) -> String<16> {
    let hours = seconds / 3600;
    let minutes = seconds % 3600 / 60;
    let secs = seconds % 60;

    let mut text = String::new();
    let mut parts = [(hours, 'h'), (minutes, 'm'), (secs, 's')]
        .into_iter()
        .filter(|(value, _)| *value > 0)
        .peekable();
    while let Some((value, unit)) = parts.next() {
        write!(text, "{}{}", value, unit).ok();
        if parts.peek().is_some() {
            text.push(' ').ok();
        }
    }
    text
}
