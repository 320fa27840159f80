//! Error types for the monitor core.

use core::fmt;

use heapless::String;
use thiserror_no_std::Error;

/// Length of the error text shown on the diagnostics menu page.
pub const ERROR_TEXT_LEN: usize = 20;

/// Drawing phases run by the periodic tick.
///
/// Each phase is fault-isolated: a failure is recorded and the remaining
/// phases still run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Realtime,
    Graph,
    Menu,
    Indicator,
}

impl RenderPhase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Realtime => "draw realtime",
            Self::Graph => "draw graph",
            Self::Menu => "draw menu",
            Self::Indicator => "draw rgb",
        }
    }
}

impl fmt::Display for RenderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MonitorError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String<24>),
    #[error("Telemetry queue full")]
    QueueFull,
    #[error("Topic too long")]
    TopicTooLong,
    #[error("Failed to {0}")]
    Render(RenderPhase),
    #[error("Battery read failed")]
    Battery,
    #[error("Reconnect failed after {attempts} attempts")]
    ReconnectExhausted { attempts: u8 },
    #[error("Snapshot error: {0}")]
    Snapshot(postcard::Error),
    #[error("Config error: {0}")]
    Config(postcard::Error),
}

impl MonitorError {
    /// Short form of the error for the diagnostics page.
    pub fn short_text(&self) -> String<ERROR_TEXT_LEN> {
        let mut text = String::new();
        let mut writer = Truncating(&mut text);
        let _ = fmt::write(&mut writer, format_args!("{}", self));
        text
    }
}

/// Copy as much of `value` as fits into a fixed-capacity string.
pub fn truncated<const N: usize>(value: &str) -> String<N> {
    let mut text = String::new();
    for c in value.chars() {
        if text.push(c).is_err() {
            break;
        }
    }
    text
}

/// `fmt::Write` adapter that silently drops whatever no longer fits.
pub(crate) struct Truncating<'a, const N: usize>(pub(crate) &'a mut String<N>);

impl<const N: usize> fmt::Write for Truncating<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_truncates() {
        let err = MonitorError::ReconnectExhausted { attempts: 3 };
        assert_eq!(err.short_text().as_str(), "Reconnect failed aft");
    }

    #[test]
    fn test_render_error_names_phase() {
        let err = MonitorError::Render(RenderPhase::Graph);
        assert_eq!(err.short_text().as_str(), "Failed to draw graph");
    }

    #[test]
    fn test_truncated_keeps_prefix() {
        let text: String<4> = truncated("abcdef");
        assert_eq!(text.as_str(), "abcd");
    }
}
