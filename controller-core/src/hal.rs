//! Narrow hardware seams consumed by the controller logic.
//!
//! Firmware implements these traits on top of Embassy drivers, the emulator
//! on top of simulated lines, and the tests on top of recording mocks. None of
//! the operations can fail: a line either exists on the board or the
//! corresponding [`Board`] accessor returns `None`.

use core::time::Duration;

/// Push-pull output line.
pub trait DigitalOutput {
    /// Drives the line high (`true`) or low (`false`).
    fn set(&mut self, level: bool);
}

/// Sampled input line.
pub trait DigitalInput {
    /// Returns the current logic level.
    fn get(&mut self) -> bool;
}

/// Analog input normalised to the reference voltage.
pub trait AnalogInput {
    /// Returns the instantaneous reading in `0.0..=1.0`.
    fn read(&mut self) -> f32;
}

/// PWM output channel.
pub trait PwmOutput {
    /// Sets the PWM period in microseconds.
    fn set_period_us(&mut self, period_us: u32);

    /// Sets the duty cycle as a fraction of the period.
    fn set_duty(&mut self, duty: f32);
}

/// Periodic callback source that can be re-armed at runtime.
///
/// Arming an already running source restarts it with the new period.
pub trait PeriodicSource {
    /// Starts (or restarts) the periodic callback.
    fn arm(&mut self, period: Duration);

    /// Stops the periodic callback. Stopping an idle source is a no-op.
    fn disarm(&mut self);
}

/// Channel-indexed view of every line the dispatcher touches.
///
/// Each accessor performs the bounds check for its own table and returns
/// `None` for indices the board does not wire.
pub trait Board {
    type PowerRail: DigitalOutput;
    type Led: DigitalOutput;
    type Analog: AnalogInput;
    type Sampler: PeriodicSource;
    type DigitalIn: DigitalInput;
    type DigitalOut: DigitalOutput;
    type Pwm: PwmOutput;

    /// Power rail and status LED, borrowed together for operations that drive both.
    fn status_outputs(&mut self) -> (&mut Self::PowerRail, &mut Self::Led);

    /// Output switching the host power rail.
    fn power_rail(&mut self) -> &mut Self::PowerRail {
        self.status_outputs().0
    }

    /// Status LED output.
    fn led(&mut self) -> &mut Self::Led {
        self.status_outputs().1
    }

    /// Analog input for `channel`.
    fn analog_input(&mut self, channel: usize) -> Option<&mut Self::Analog>;

    /// Periodic sampling source for analog `channel`.
    fn sampler(&mut self, channel: usize) -> Option<&mut Self::Sampler>;

    /// Digital input for `channel`.
    fn digital_input(&mut self, channel: usize) -> Option<&mut Self::DigitalIn>;

    /// Digital output for `channel`.
    fn digital_output(&mut self, channel: usize) -> Option<&mut Self::DigitalOut>;

    /// PWM output for `channel`.
    fn pwm_output(&mut self, channel: usize) -> Option<&mut Self::Pwm>;
}
