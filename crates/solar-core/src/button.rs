//! Shift-register debouncing for the three front-panel buttons.
//!
//! Each electrical edge triggers [`DebouncedButton::on_edge`] from interrupt
//! context. The pin is re-sampled into an 8-bit register until eight
//! consecutive samples agree, then the stable level is compared against the
//! last reported one. Converged changes are forwarded as [`ButtonEvent`]s over
//! [`BUTTON_EVENTS`] so the main tick is the only writer of menu state.
//!
//! Buttons are active-low: eight low samples mean pressed, eight high samples
//! mean released.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::digital::InputPin;
use log::warn;

/// Number of identical samples needed before a level is trusted.
pub const DEBOUNCE_DEPTH: usize = 8;

/// Capacity of the button event queue.
pub const BUTTON_EVENT_CAPACITY: usize = 8;

const ALL_HIGH: u8 = 0b1111_1111;
const ALL_LOW: u8 = 0b0000_0000;

/// Physical button position, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonId {
    A,
    B,
    C,
}

/// A debounced level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: ButtonId,
    pub pressed: bool,
}

/// Queue from the button interrupts to the driver tick.
pub static BUTTON_EVENTS: Channel<CriticalSectionRawMutex, ButtonEvent, BUTTON_EVENT_CAPACITY> =
    Channel::new();

/// Debounce state for one button.
#[derive(Debug, Clone)]
pub struct DebouncedButton {
    id: ButtonId,
    register: u8,
    stable: bool,
    previous_stable: bool,
}

impl DebouncedButton {
    /// Released buttons read high, so the register starts all ones.
    pub const fn new(id: ButtonId) -> Self {
        Self {
            id,
            register: ALL_HIGH,
            stable: false,
            previous_stable: false,
        }
    }

    pub const fn id(&self) -> ButtonId {
        self.id
    }

    /// Last converged level (`true` = pressed).
    pub const fn is_pressed(&self) -> bool {
        self.stable
    }

    /// Handle one edge interrupt.
    ///
    /// Samples `pin` until the register converges, bounded to
    /// [`DEBOUNCE_DEPTH`] reads. Returns an event only when the converged
    /// level differs from the previously reported one, so a duplicate edge
    /// never produces a second press. If the pin is still bouncing when the
    /// bound is reached the previous level is kept and nothing is reported;
    /// the next edge resumes from the partially filled register.
    pub fn on_edge<P: InputPin>(&mut self, pin: &mut P) -> Option<ButtonEvent> {
        for _ in 0..DEBOUNCE_DEPTH {
            // A failed read counts as released, the idle level
            let level = pin.is_high().unwrap_or(true);
            self.register = (self.register << 1) | u8::from(level);

            match self.register {
                ALL_HIGH => {
                    self.stable = false;
                    break;
                }
                ALL_LOW => {
                    self.stable = true;
                    break;
                }
                _ => {}
            }
        }

        if self.stable != self.previous_stable {
            self.previous_stable = self.stable;
            Some(ButtonEvent {
                button: self.id,
                pressed: self.stable,
            })
        } else {
            None
        }
    }

    /// Run [`on_edge`](Self::on_edge) with interrupts masked and queue the result.
    ///
    /// Intended as the body of the GPIO interrupt handler. Never blocks: when
    /// the queue is full the event is dropped.
    pub fn on_interrupt<P: InputPin>(&mut self, pin: &mut P) {
        let event = critical_section::with(|_| self.on_edge(pin));
        if let Some(event) = event
            && BUTTON_EVENTS.try_send(event).is_err()
        {
            warn!("Button queue full, dropping {:?}", event);
        }
    }
}
