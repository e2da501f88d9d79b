//! Once-per-second tick: countdowns first, then the LED pulse.

use crate::device::DeviceState;
use crate::hal::DigitalOutput;

/// What a single tick did.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TickOutcome {
    pub powered_on: bool,
    pub powered_off: bool,
    /// The LED was asserted; the caller must call
    /// [`LedIndicator::end_pulse`](crate::led::LedIndicator::end_pulse) after
    /// [`LED_PULSE`](crate::config::LED_PULSE).
    pub pulse_started: bool,
}

impl DeviceState {
    /// Runs one tick of the power countdowns and the LED flasher.
    pub fn tick(
        &self,
        rail: &mut impl DigitalOutput,
        led: &mut impl DigitalOutput,
    ) -> TickOutcome {
        let transitions = self.power().advance(rail);
        let pulse_started = self.led().begin_pulse(led);

        TickOutcome {
            powered_on: transitions.powered_on,
            powered_off: transitions.powered_off,
            pulse_started,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::LedMode;
    use crate::power::{PowerState, TIMER_INACTIVE};

    #[derive(Default)]
    struct Line(bool);

    impl DigitalOutput for Line {
        fn set(&mut self, level: bool) {
            self.0 = level;
        }
    }

    #[test]
    fn on_timer_fires_on_the_armed_tick() {
        let device = DeviceState::new();
        let (mut rail, mut led) = (Line::default(), Line::default());
        device.power().request_up(5, &mut rail);

        for _ in 0..4 {
            let outcome = device.tick(&mut rail, &mut led);
            assert!(!outcome.powered_on);
            assert_eq!(device.power().state(), PowerState::Down);
        }

        let outcome = device.tick(&mut rail, &mut led);
        assert!(outcome.powered_on);
        assert_eq!(device.power().state(), PowerState::Up);
        assert_eq!(device.power().on_timer().raw(), TIMER_INACTIVE);
        assert!(rail.0);
    }

    #[test]
    fn flash_pulses_every_tick_without_timers() {
        let device = DeviceState::new();
        let (mut rail, mut led) = (Line::default(), Line::default());
        device.led().set_mode(LedMode::Flash, &mut led);

        for _ in 0..3 {
            let outcome = device.tick(&mut rail, &mut led);
            assert!(outcome.pulse_started);
            assert!(led.0);
            device.led().end_pulse(&mut led);
            assert!(!led.0);
        }
    }
}
