//! Manual power switch monitor.
//!
//! The switch is polled from the bus loop. A press is noticed, the caller
//! waits [`SWITCH_DEBOUNCE`](crate::config::SWITCH_DEBOUNCE), and the power
//! state toggles once the switch is released again.

use crate::device::DeviceState;
use crate::hal::DigitalOutput;
use crate::power::PowerState;

/// What the polling loop should do after sampling the switch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SwitchAction {
    /// Nothing to do.
    Idle,
    /// Switch reads pressed; wait out the debounce delay before polling again.
    Debounce,
    /// Switch was released after a press; toggle the power state.
    Toggle,
}

/// Press/release tracker.
#[derive(Debug, Default)]
pub struct ManualSwitch {
    awaiting_release: bool,
}

impl ManualSwitch {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            awaiting_release: false,
        }
    }

    /// Feeds one sample of the switch (`true` = pressed).
    pub fn poll(&mut self, pressed: bool) -> SwitchAction {
        if pressed {
            self.awaiting_release = true;
            SwitchAction::Debounce
        } else if self.awaiting_release {
            self.awaiting_release = false;
            SwitchAction::Toggle
        } else {
            SwitchAction::Idle
        }
    }

    /// `true` between a press and its release.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.awaiting_release
    }

    /// Polls and applies a resulting toggle to `device`. Returns the action
    /// taken and, on toggle, the new power state.
    pub fn service(
        &mut self,
        pressed: bool,
        device: &DeviceState,
        rail: &mut impl DigitalOutput,
    ) -> (SwitchAction, Option<PowerState>) {
        match self.poll(pressed) {
            SwitchAction::Toggle => (SwitchAction::Toggle, Some(device.power().toggle(rail))),
            action => (action, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sink;

    impl DigitalOutput for Sink {
        fn set(&mut self, _level: bool) {}
    }

    #[test]
    fn toggles_once_per_press_on_release() {
        let mut switch = ManualSwitch::new();

        assert_eq!(switch.poll(false), SwitchAction::Idle);
        assert_eq!(switch.poll(true), SwitchAction::Debounce);
        assert_eq!(switch.poll(true), SwitchAction::Debounce);
        assert!(switch.is_held());
        assert_eq!(switch.poll(false), SwitchAction::Toggle);
        assert_eq!(switch.poll(false), SwitchAction::Idle);
    }

    #[test]
    fn service_flips_power_state() {
        let device = DeviceState::new();
        let mut switch = ManualSwitch::new();

        switch.service(true, &device, &mut Sink);
        let (action, state) = switch.service(false, &device, &mut Sink);

        assert_eq!(action, SwitchAction::Toggle);
        assert_eq!(state, Some(PowerState::Up));
        assert_eq!(device.power().state(), PowerState::Up);
    }
}
