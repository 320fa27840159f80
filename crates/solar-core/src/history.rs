//! Fixed-length graph history and the statistics derived from it.
//!
//! Each series keeps one averaged value per graph column. The buffers hold
//! [`CAP`] points, one less than the panel width, so the right-most column is
//! always free for the in-progress bucket. Statistics are recomputed after
//! every append and therefore always describe exactly the current contents.

use alloc::vec::Vec;

use heapless::Deque;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::display::PLOT_COLUMNS;
use crate::error::MonitorError;
use crate::series::{PerSeries, Series};

/// History length per series; one column is reserved for the live bucket.
pub const CAP: usize = PLOT_COLUMNS - 1;

/// Chronological FIFO of downsampled values, oldest first.
#[derive(Debug, Clone, Default)]
pub struct HistoryBuffer {
    values: Deque<i32, CAP>,
}

impl HistoryBuffer {
    pub const fn new() -> Self {
        Self {
            values: Deque::new(),
        }
    }

    /// Append a value, evicting the oldest one when full.
    pub fn append(&mut self, value: i32) {
        if self.values.is_full() {
            self.values.pop_front();
        }
        // Room was made above
        let _ = self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.values.iter().copied()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Summary of one history buffer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BufferStatistics {
    pub max: i32,
    pub min: i32,
    pub mean: f64,
    /// Population standard deviation (divides by N)
    pub stddev: f64,
}

impl BufferStatistics {
    /// Refresh after `just_appended` was pushed onto `buffer`.
    ///
    /// An empty buffer leaves the previous values untouched.
    pub fn recompute(&mut self, buffer: &HistoryBuffer, just_appended: i32) {
        match buffer.len() {
            0 => {}
            1 => {
                *self = Self {
                    max: just_appended,
                    min: just_appended,
                    mean: just_appended as f64,
                    stddev: 0.0,
                };
            }
            _ => *self = Self::of(buffer),
        }
    }

    /// Direct computation over the whole buffer.
    pub fn of(buffer: &HistoryBuffer) -> Self {
        let mut count = 0usize;
        let mut sum = 0i64;
        let mut max = i32::MIN;
        let mut min = i32::MAX;
        for value in buffer.iter() {
            count += 1;
            sum += value as i64;
            max = max.max(value);
            min = min.min(value);
        }
        if count == 0 {
            return Self::default();
        }

        let mean = sum as f64 / count as f64;
        let variance = buffer
            .iter()
            .map(|value| {
                let delta = value as f64 - mean;
                delta * delta
            })
            .sum::<f64>()
            / count as f64;

        Self {
            max,
            min,
            mean,
            stddev: libm::sqrt(variance),
        }
    }

    /// Upper bound of "normal" values: mean plus two standard deviations.
    pub fn high(&self) -> f64 {
        self.mean + 2.0 * self.stddev
    }
}

/// Persisted form of the graph history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub usage_buffer: Vec<i32>,
    pub solar_buffer: Vec<i32>,
}

impl Snapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, MonitorError> {
        postcard::to_allocvec(self).map_err(MonitorError::Snapshot)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MonitorError> {
        postcard::from_bytes(bytes).map_err(MonitorError::Snapshot)
    }
}

/// History buffers for both series together with their statistics.
#[derive(Debug, Clone, Default)]
pub struct History {
    buffers: PerSeries<HistoryBuffer>,
    stats: PerSeries<BufferStatistics>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one value to a series and refresh that series' statistics.
    pub fn append(&mut self, series: Series, value: i32) {
        let buffer = &mut self.buffers[series];
        buffer.append(value);
        self.stats[series].recompute(buffer, value);
    }

    pub fn buffer(&self, series: Series) -> &HistoryBuffer {
        &self.buffers[series]
    }

    pub fn stats(&self, series: Series) -> &BufferStatistics {
        &self.stats[series]
    }

    /// Number of completed graph columns.
    pub fn len(&self) -> usize {
        self.buffers[Series::Usage].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(solar, usage)` per column, oldest first.
    pub fn columns(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.buffers[Series::Solar]
            .iter()
            .zip(self.buffers[Series::Usage].iter())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            usage_buffer: self.buffers[Series::Usage].iter().collect(),
            solar_buffer: self.buffers[Series::Solar].iter().collect(),
        }
    }

    /// Replace the contents with a persisted snapshot.
    ///
    /// Only the newest points that fit are kept, and both series are cut to
    /// the same length so columns stay aligned.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        let len = snapshot
            .usage_buffer
            .len()
            .min(snapshot.solar_buffer.len())
            .min(CAP);
        if snapshot.usage_buffer.len() != snapshot.solar_buffer.len() {
            info!(
                "Snapshot series differ in length ({} usage, {} solar), keeping {}",
                snapshot.usage_buffer.len(),
                snapshot.solar_buffer.len(),
                len
            );
        }

        for (series, values) in [
            (Series::Usage, &snapshot.usage_buffer),
            (Series::Solar, &snapshot.solar_buffer),
        ] {
            let buffer = &mut self.buffers[series];
            buffer.clear();
            for &value in &values[values.len() - len..] {
                buffer.append(value);
            }
            self.stats[series] = if buffer.is_empty() {
                BufferStatistics::default()
            } else {
                BufferStatistics::of(buffer)
            };
        }
        debug!("Restored {} history points", len);
    }
}
