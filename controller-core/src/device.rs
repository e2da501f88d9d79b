//! Device state shared by the dispatcher and the periodic callbacks.

use crate::analog::AnalogBank;
use crate::hal::DigitalOutput;
use crate::led::{LedIndicator, LedMode};
use crate::power::PowerSequencer;

/// Every piece of state touched from more than one execution context.
///
/// All methods take `&self`; the aggregate is meant to live in a `static` (or
/// a leaked allocation on the host) and be handed out as `&'static`.
pub struct DeviceState {
    power: PowerSequencer,
    led: LedIndicator,
    analog: AnalogBank,
}

impl DeviceState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            power: PowerSequencer::new(),
            led: LedIndicator::new(),
            analog: AnalogBank::new(),
        }
    }

    #[must_use]
    pub fn power(&self) -> &PowerSequencer {
        &self.power
    }

    #[must_use]
    pub fn led(&self) -> &LedIndicator {
        &self.led
    }

    #[must_use]
    pub fn analog(&self) -> &AnalogBank {
        &self.analog
    }

    /// Power-on defaults: host rail up, LED flashing.
    pub fn boot(&self, rail: &mut impl DigitalOutput, led: &mut impl DigitalOutput) {
        self.power.power_on(rail);
        self.led.set_mode(LedMode::Flash, led);
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}
