//! Telemetry ingest from the publish/subscribe feed.
//!
//! Solar and grid power arrive as separate messages in no particular order.
//! A usable reading exists only once both have been refreshed; at that point
//! usage is derived and the pair is handed on to the downsampler.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::String;
use log::{debug, warn};

use crate::error::{MonitorError, truncated};

pub const TOPIC_LEN: usize = 64;

/// Capacity of the telemetry queue.
pub const TELEMETRY_CAPACITY: usize = 16;

/// A message as delivered by the broker client, with the payload already
/// parsed. A rejected payload still travels to the monitor so it is counted.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryMessage {
    pub topic: String<TOPIC_LEN>,
    pub value: Result<f64, MonitorError>,
    /// Epoch seconds at delivery
    pub received_at: u64,
}

impl TelemetryMessage {
    /// Fails only when the topic does not fit, which no configured topic can.
    pub fn new(topic: &str, payload: &str, received_at: u64) -> Result<Self, MonitorError> {
        Ok(Self {
            topic: String::try_from(topic).map_err(|_| MonitorError::TopicTooLong)?,
            value: parse_payload(payload),
            received_at,
        })
    }
}

/// Telemetry channel plus a count of messages it had to drop.
pub struct TelemetryQueue<const N: usize> {
    messages: Channel<CriticalSectionRawMutex, TelemetryMessage, N>,
    dropped: Mutex<CriticalSectionRawMutex, Cell<u32>>,
}

impl<const N: usize> TelemetryQueue<N> {
    pub const fn new() -> Self {
        Self {
            messages: Channel::new(),
            dropped: Mutex::new(Cell::new(0)),
        }
    }

    /// Queue a message from the delivery context. Never blocks.
    ///
    /// Messages on over-long topics cannot belong to the monitor and are
    /// discarded. A full queue drops the message and counts it.
    pub fn submit(&self, topic: &str, payload: &str, received_at: u64) -> Result<(), MonitorError> {
        let Ok(message) = TelemetryMessage::new(topic, payload, received_at) else {
            debug!("Ignoring message on over-long topic");
            return Ok(());
        };
        self.messages.try_send(message).map_err(|_| {
            self.dropped.lock(|dropped| dropped.set(dropped.get().saturating_add(1)));
            warn!("Telemetry queue full, dropping message on {}", topic);
            MonitorError::QueueFull
        })
    }

    pub fn try_receive(&self) -> Option<TelemetryMessage> {
        self.messages.try_receive().ok()
    }

    /// Messages dropped since the last call.
    pub fn take_dropped(&self) -> u32 {
        self.dropped.lock(|dropped| dropped.replace(0))
    }
}

impl<const N: usize> Default for TelemetryQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue from the broker client callback to the driver tick.
pub static TELEMETRY: TelemetryQueue<TELEMETRY_CAPACITY> = TelemetryQueue::new();

/// [`TelemetryQueue::submit`] on the global queue.
pub fn submit(topic: &str, payload: &str, received_at: u64) -> Result<(), MonitorError> {
    TELEMETRY.submit(topic, payload, received_at)
}

/// The latest complete reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstantReading {
    /// Solar production in W, never negative
    pub solar: f64,
    /// Grid power in W, positive when importing
    pub grid: f64,
    /// Consumption, `solar + grid`
    pub usage: f64,
    /// Epoch seconds of the message that completed the pair
    pub timestamp: u64,
}

impl InstantReading {
    pub fn importing(&self) -> bool {
        self.grid > 0.0
    }
}

/// What a single message did to the ingest state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ingested {
    /// Topic matched neither configured topic
    Ignored,
    /// One half of a pair was refreshed
    Partial,
    /// Both halves are fresh; a new reading was computed
    Reading(InstantReading),
}

pub struct TelemetryIngest {
    solar_topic: String<TOPIC_LEN>,
    grid_topic: String<TOPIC_LEN>,
    solar: f64,
    grid: f64,
    solar_received: bool,
    grid_received: bool,
    reading: Option<InstantReading>,
    realtime_updated: bool,
}

impl TelemetryIngest {
    pub fn new(solar_topic: &str, grid_topic: &str) -> Result<Self, MonitorError> {
        Ok(Self {
            solar_topic: String::try_from(solar_topic).map_err(|_| MonitorError::TopicTooLong)?,
            grid_topic: String::try_from(grid_topic).map_err(|_| MonitorError::TopicTooLong)?,
            solar: 0.0,
            grid: 0.0,
            solar_received: false,
            grid_received: false,
            reading: None,
            realtime_updated: false,
        })
    }

    /// Process one message.
    ///
    /// The payload must be a finite decimal number; anything else is rejected
    /// without touching the state.
    pub fn on_message(
        &mut self,
        topic: &str,
        payload: &str,
        now: u64,
    ) -> Result<Ingested, MonitorError> {
        let value = parse_payload(payload)?;
        Ok(self.on_value(topic, value, now))
    }

    /// Process one already parsed value.
    pub fn on_value(&mut self, topic: &str, value: f64, now: u64) -> Ingested {
        if topic == self.solar_topic.as_str() {
            self.solar = value.max(0.0);
            self.solar_received = true;
        } else if topic == self.grid_topic.as_str() {
            self.grid = value;
            self.grid_received = true;
        } else {
            return Ingested::Ignored;
        }

        if !(self.solar_received && self.grid_received) {
            return Ingested::Partial;
        }

        let reading = InstantReading {
            solar: self.solar,
            grid: self.grid,
            usage: self.solar + self.grid,
            timestamp: now,
        };
        self.reading = Some(reading);
        self.realtime_updated = true;
        self.solar_received = false;
        self.grid_received = false;
        debug!(
            "Reading: solar {:.1}W grid {:.1}W usage {:.1}W",
            reading.solar, reading.grid, reading.usage
        );

        Ingested::Reading(reading)
    }

    pub fn reading(&self) -> Option<&InstantReading> {
        self.reading.as_ref()
    }

    pub fn realtime_updated(&self) -> bool {
        self.realtime_updated
    }

    /// Consume the realtime flag after the header has been redrawn.
    pub fn mark_realtime_drawn(&mut self) {
        self.realtime_updated = false;
    }
}

/// Parse a payload as a finite number of watts.
pub fn parse_payload(payload: &str) -> Result<f64, MonitorError> {
    payload
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| MonitorError::InvalidPayload(truncated(payload)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingest() -> TelemetryIngest {
        TelemetryIngest::new("emon/solar", "emon/grid").unwrap()
    }

    #[test]
    fn test_pair_produces_reading() {
        let mut ingest = ingest();

        assert_eq!(
            ingest.on_message("emon/solar", "1200.5", 10).unwrap(),
            Ingested::Partial
        );
        assert!(!ingest.realtime_updated());

        let Ingested::Reading(reading) = ingest.on_message("emon/grid", "-300", 11).unwrap() else {
            panic!("expected a reading");
        };
        assert_eq!(reading.solar, 1200.5);
        assert_eq!(reading.grid, -300.0);
        assert_eq!(reading.usage, 900.5);
        assert_eq!(reading.timestamp, 11);
        assert!(!reading.importing());
        assert!(ingest.realtime_updated());
    }

    #[test]
    fn test_negative_solar_is_clamped() {
        let mut ingest = ingest();
        ingest.on_message("emon/solar", "-4", 0).unwrap();
        let Ingested::Reading(reading) = ingest.on_message("emon/grid", "250", 0).unwrap() else {
            panic!("expected a reading");
        };
        assert_eq!(reading.solar, 0.0);
        assert_eq!(reading.usage, 250.0);
        assert!(reading.importing());
    }

    #[test]
    fn test_pair_must_refresh_before_recompute() {
        let mut ingest = ingest();
        ingest.on_message("emon/solar", "100", 0).unwrap();
        ingest.on_message("emon/grid", "50", 0).unwrap();

        // Same topic twice is still only half a pair
        assert_eq!(
            ingest.on_message("emon/grid", "60", 1).unwrap(),
            Ingested::Partial
        );
        assert_eq!(ingest.reading().unwrap().usage, 150.0);

        let Ingested::Reading(reading) = ingest.on_message("emon/solar", "110", 2).unwrap() else {
            panic!("expected a reading");
        };
        assert_eq!(reading.usage, 170.0);
    }

    #[test]
    fn test_invalid_payload_leaves_state() {
        let mut ingest = ingest();
        ingest.on_message("emon/solar", "100", 0).unwrap();

        let err = ingest.on_message("emon/grid", "n/a", 0).unwrap_err();
        assert_eq!(err, MonitorError::InvalidPayload(truncated("n/a")));
        assert_eq!(
            ingest.on_message("emon/grid", "NaN", 0).unwrap_err(),
            MonitorError::InvalidPayload(truncated("NaN"))
        );
        assert!(ingest.reading().is_none());
    }

    #[test]
    fn test_unknown_topic_is_ignored() {
        let mut ingest = ingest();
        assert_eq!(
            ingest.on_message("emon/temperature", "21.5", 0).unwrap(),
            Ingested::Ignored
        );
    }

    #[test]
    fn test_message_rejects_long_topic() {
        let topic = "t".repeat(TOPIC_LEN + 1);
        assert_eq!(
            TelemetryMessage::new(&topic, "1", 0),
            Err(MonitorError::TopicTooLong)
        );

        let queue: TelemetryQueue<2> = TelemetryQueue::new();
        assert_eq!(queue.submit(&topic, "1", 0), Ok(()));
        assert_eq!(queue.try_receive(), None);
        assert_eq!(queue.take_dropped(), 0);
    }

    #[test]
    fn test_long_valid_payload_is_accepted() {
        let message = TelemetryMessage::new("emon/solar", "1234.000000000000000000001", 0).unwrap();
        assert_eq!(message.value, Ok(1234.0));
    }

    #[test]
    fn test_bad_payload_is_queued_as_rejection() {
        let queue: TelemetryQueue<2> = TelemetryQueue::new();
        queue.submit("emon/grid", "offline", 3).unwrap();

        let message = queue.try_receive().unwrap();
        assert_eq!(
            message.value,
            Err(MonitorError::InvalidPayload(truncated("offline")))
        );
        assert_eq!(message.received_at, 3);
    }

    #[test]
    fn test_full_queue_counts_drops() {
        let queue: TelemetryQueue<4> = TelemetryQueue::new();
        let results: alloc::vec::Vec<_> = (0..6)
            .map(|i| queue.submit("emon/solar", "1", i))
            .collect();

        assert!(results[..4].iter().all(Result::is_ok));
        assert_eq!(results[4], Err(MonitorError::QueueFull));
        assert_eq!(queue.take_dropped(), 2);
        assert_eq!(queue.take_dropped(), 0);
    }
}
