//! Time-bucketed downsampling of reading pairs into graph points.
//!
//! Readings arrive every few seconds but the graph has one column per
//! `interval` seconds. Samples are collected in per-series accumulation
//! windows and, when the wall clock crosses an interval boundary, averaged
//! into a single [`Flush`] that becomes the next history point.

use alloc::vec::Vec;

use log::debug;

use crate::series::PerSeries;

/// Samples of one series collected since the last interval boundary.
#[derive(Debug, Clone, Default)]
pub struct AccumulationWindow {
    samples: Vec<i32>,
}

impl AccumulationWindow {
    pub const fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    /// Add a sample, rounded to whole watts.
    pub fn push(&mut self, value: f64) {
        self.samples.push(libm::round(value) as i32);
    }

    /// Rounded mean of the collected samples, `None` when empty.
    pub fn average(&self) -> Option<i32> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: i64 = self.samples.iter().map(|&v| v as i64).sum();
        Some(libm::round(sum as f64 / self.samples.len() as f64) as i32)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Averages produced when an interval boundary is crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flush {
    pub solar: i32,
    pub grid: i32,
    /// `solar + grid`, the value appended to the usage history
    pub usage: i32,
    /// Boundary (epoch seconds) that triggered the flush
    pub bucket: u64,
}

pub struct RollingDownsampler {
    interval: u64,
    solar: AccumulationWindow,
    grid: AccumulationWindow,
    last_flush_bucket: Option<u64>,
    seconds_remaining: u64,
}

impl RollingDownsampler {
    pub fn new(interval_s: u32) -> Self {
        Self {
            interval: u64::from(interval_s.max(1)),
            solar: AccumulationWindow::new(),
            grid: AccumulationWindow::new(),
            last_flush_bucket: None,
            seconds_remaining: 0,
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Seconds until the current bucket closes, as of the last accepted pair.
    pub fn seconds_remaining(&self) -> u64 {
        self.seconds_remaining
    }

    /// Record one reading pair taken at `now` (epoch seconds).
    ///
    /// The sample is added to the windows first; if `now` falls in a later
    /// bucket than the previous flush, the windows are averaged, cleared and
    /// returned as a [`Flush`]. The very first pair only seeds the bucket.
    pub fn accept(&mut self, solar: f64, grid: f64, now: u64) -> Option<Flush> {
        let rounded_now = now - now % self.interval;
        let last = *self.last_flush_bucket.get_or_insert(rounded_now);
        self.seconds_remaining = rounded_now + self.interval - now;

        self.solar.push(solar);
        self.grid.push(grid);

        if rounded_now == last {
            return None;
        }

        let averages = self.read(true);
        self.last_flush_bucket = Some(rounded_now);
        let flush = Flush {
            solar: averages.solar,
            grid: averages.grid,
            usage: averages.solar + averages.grid,
            bucket: rounded_now,
        };
        debug!(
            "Bucket {} closed: solar {}W usage {}W",
            rounded_now, flush.solar, flush.usage
        );
        Some(flush)
    }

    /// Average of the in-progress bucket, per graphed series.
    ///
    /// Reads as zero for both series while either window is empty.
    pub fn live_average(&self) -> PerSeries<i32> {
        let averages = self.averages();
        PerSeries::new(averages.solar, averages.solar + averages.grid)
    }

    fn averages(&self) -> Averages {
        match (self.solar.average(), self.grid.average()) {
            (Some(solar), Some(grid)) => Averages { solar, grid },
            _ => Averages { solar: 0, grid: 0 },
        }
    }

    fn read(&mut self, reset: bool) -> Averages {
        let averages = self.averages();
        if reset {
            self.solar.clear();
            self.grid.clear();
        }
        averages
    }
}

#[derive(Debug, Clone, Copy)]
struct Averages {
    solar: i32,
    grid: i32,
}
