//! Connectivity watchdog run at the end of every tick.

use log::{info, warn};

use crate::error::MonitorError;

pub const DEFAULT_RECONNECT_ATTEMPTS: u8 = 3;

/// Network session owned by the bootstrap code (Wi-Fi plus broker).
pub trait Link {
    type Error: core::fmt::Debug;

    fn is_connected(&mut self) -> bool;

    /// One attempt to bring the session back. Must not block indefinitely.
    fn reconnect(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    max_attempts: u8,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_ATTEMPTS)
    }
}

impl Watchdog {
    pub fn new(max_attempts: u8) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u8 {
        self.max_attempts
    }

    /// Make sure the link is up, reconnecting a bounded number of times.
    ///
    /// Returns whether a reconnect was needed. Running out of attempts is an
    /// error, but the caller is expected to carry on and try again on the
    /// next tick.
    pub fn check<L: Link>(&self, link: &mut L) -> Result<bool, MonitorError> {
        if link.is_connected() {
            return Ok(false);
        }

        warn!("Link down, reconnecting");
        for attempt in 1..=self.max_attempts {
            match link.reconnect() {
                Ok(()) if link.is_connected() => {
                    info!("Link restored after {} attempt(s)", attempt);
                    return Ok(true);
                }
                Ok(()) => warn!("Reconnect attempt {} left the link down", attempt),
                Err(e) => warn!("Reconnect attempt {} failed: {:?}", attempt, e),
            }
        }

        Err(MonitorError::ReconnectExhausted {
            attempts: self.max_attempts,
        })
    }
}
