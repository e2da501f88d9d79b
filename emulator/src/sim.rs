//! Simulated board lines.

use std::time::Duration;

use hostctl_core::config::{ANALOG_CHANNELS, DIGITAL_INPUTS, DIGITAL_OUTPUTS, PWM_CHANNELS};
use hostctl_core::hal::{
    AnalogInput, Board, DigitalInput, DigitalOutput, PeriodicSource, PwmOutput,
};

const DIGITAL_LINES: usize = if DIGITAL_INPUTS < DIGITAL_OUTPUTS {
    DIGITAL_INPUTS
} else {
    DIGITAL_OUTPUTS
};

/// Logic line that counts rising edges.
#[derive(Clone, Debug, Default)]
pub struct SimLine {
    pub level: bool,
    pub rising_edges: u32,
}

impl DigitalOutput for SimLine {
    fn set(&mut self, level: bool) {
        if level && !self.level {
            self.rising_edges += 1;
        }
        self.level = level;
    }
}

impl DigitalInput for SimLine {
    fn get(&mut self) -> bool {
        self.level
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SimAnalog {
    pub level: f32,
}

impl AnalogInput for SimAnalog {
    fn read(&mut self) -> f32 {
        self.level
    }
}

/// Sampler whose schedule is driven by the session's virtual clock.
///
/// `generation` changes on every arm so the clock can tell a restart from a
/// sampler that simply kept running.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimSampler {
    pub period: Option<Duration>,
    pub generation: u32,
}

impl PeriodicSource for SimSampler {
    fn arm(&mut self, period: Duration) {
        self.period = Some(period);
        self.generation = self.generation.wrapping_add(1);
    }

    fn disarm(&mut self) {
        self.period = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SimPwm {
    pub period_us: Option<u32>,
    pub duty: f32,
}

impl PwmOutput for SimPwm {
    fn set_period_us(&mut self, period_us: u32) {
        self.period_us = Some(period_us);
    }

    fn set_duty(&mut self, duty: f32) {
        self.duty = duty;
    }
}

/// Emulated board. Digital output `i` and digital input `i` are the same wire.
#[derive(Debug, Default)]
pub struct SimBoard {
    pub rail: SimLine,
    pub led: SimLine,
    pub analog: [SimAnalog; ANALOG_CHANNELS],
    pub samplers: [SimSampler; ANALOG_CHANNELS],
    pub wires: [SimLine; DIGITAL_LINES],
    pub pwm: [SimPwm; PWM_CHANNELS],
}

impl Board for SimBoard {
    type PowerRail = SimLine;
    type Led = SimLine;
    type Analog = SimAnalog;
    type Sampler = SimSampler;
    type DigitalIn = SimLine;
    type DigitalOut = SimLine;
    type Pwm = SimPwm;

    fn status_outputs(&mut self) -> (&mut SimLine, &mut SimLine) {
        (&mut self.rail, &mut self.led)
    }

    fn analog_input(&mut self, channel: usize) -> Option<&mut SimAnalog> {
        self.analog.get_mut(channel)
    }

    fn sampler(&mut self, channel: usize) -> Option<&mut SimSampler> {
        self.samplers.get_mut(channel)
    }

    fn digital_input(&mut self, channel: usize) -> Option<&mut SimLine> {
        self.wires.get_mut(channel)
    }

    fn digital_output(&mut self, channel: usize) -> Option<&mut SimLine> {
        self.wires.get_mut(channel)
    }

    fn pwm_output(&mut self, channel: usize) -> Option<&mut SimPwm> {
        self.pwm.get_mut(channel)
    }
}
