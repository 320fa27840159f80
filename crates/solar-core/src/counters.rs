//! Diagnostic counters shown on the "Ticks" menu page.

use core::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCounters {
    /// Telemetry messages with a valid payload (M)
    pub messages: u32,
    /// Complete solar + grid pairs (D)
    pub samples: u32,
    /// Points added to the graph history (G)
    pub graph_points: u32,
    /// Menu navigation presses (B)
    pub button_presses: u32,
    /// Seconds until the next graph point (R)
    pub seconds_remaining: u32,
    /// Failures of any kind (E)
    pub errors: u32,
}

/// `M, D, G, B, R, E`
impl fmt::Display for TickCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}, {}",
            self.messages,
            self.samples,
            self.graph_points,
            self.button_presses,
            self.seconds_remaining,
            self.errors
        )
    }
}
