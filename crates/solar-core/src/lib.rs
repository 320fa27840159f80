//! Hardware-independent core of the solar-display energy monitor
//!
//! Two power readings (solar production and grid import/export) arrive over a
//! publish/subscribe feed. This crate turns them into a realtime header, a
//! downsampled bar graph with rolling statistics, a paged status menu driven
//! by three debounced buttons, and an ambient RGB status light.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the simulator and tests). Board
//! bring-up, networking and file I/O live outside and are reached through the
//! traits in [`display`], [`battery`], [`indicator`] and [`watchdog`].

#![no_std]

extern crate alloc;

pub mod battery;
pub mod button;
pub mod clock;
pub mod config;
pub mod counters;
pub mod display;
pub mod downsample;
pub mod error;
pub mod graph;
pub mod history;
pub mod indicator;
pub mod ingest;
pub mod menu;
pub mod monitor;
pub mod realtime;
pub mod series;
pub mod watchdog;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, RuntimeSettings};
pub use error::MonitorError;
pub use monitor::{ControlRequests, Devices, Monitor};
