//! Status LED with off, on and flash modes.

use portable_atomic::{AtomicU8, Ordering};

use crate::hal::DigitalOutput;

/// Display mode of the status LED.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum LedMode {
    Off = 0,
    On = 1,
    Flash = 2,
}

impl LedMode {
    /// Maps the raw mode byte from an LED command.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(LedMode::Off),
            1 => Some(LedMode::On),
            2 => Some(LedMode::Flash),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            LedMode::Off => "off",
            LedMode::On => "on",
            LedMode::Flash => "flash",
        }
    }
}

impl core::fmt::Display for LedMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// LED mode shared between the dispatcher and the tick callback.
///
/// In [`LedMode::Flash`] the tick asserts the line with [`begin_pulse`] and
/// releases it with [`end_pulse`] once the pulse width has elapsed.
///
/// [`begin_pulse`]: LedIndicator::begin_pulse
/// [`end_pulse`]: LedIndicator::end_pulse
pub struct LedIndicator {
    mode: AtomicU8,
}

impl LedIndicator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: AtomicU8::new(LedMode::Off as u8),
        }
    }

    #[must_use]
    pub fn mode(&self) -> LedMode {
        LedMode::from_raw(self.mode.load(Ordering::Acquire)).unwrap_or(LedMode::Off)
    }

    /// Switches mode. `Off` and `On` drive the line immediately; `Flash` leaves
    /// it alone until the next tick.
    pub fn set_mode(&self, mode: LedMode, led: &mut impl DigitalOutput) {
        self.mode.store(mode as u8, Ordering::Release);
        match mode {
            LedMode::Off => led.set(false),
            LedMode::On => led.set(true),
            LedMode::Flash => {}
        }
    }

    /// Asserts the line if flashing. Returns `true` when a pulse was started.
    pub fn begin_pulse(&self, led: &mut impl DigitalOutput) -> bool {
        if self.mode() == LedMode::Flash {
            led.set(true);
            true
        } else {
            false
        }
    }

    /// Releases a pulse. A mode change made while the pulse was high wins.
    pub fn end_pulse(&self, led: &mut impl DigitalOutput) {
        if self.mode() == LedMode::Flash {
            led.set(false);
        }
    }
}

impl Default for LedIndicator {
    fn default() -> Self {
        Self::new()
    }
}
