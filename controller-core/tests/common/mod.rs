#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use hostctl_core::config::{ANALOG_CHANNELS, DIGITAL_INPUTS, PWM_CHANNELS};
use hostctl_core::hal::{
    AnalogInput, Board, DigitalInput, DigitalOutput, PeriodicSource, PwmOutput,
};
use hostctl_core::protocol::{CommandCode, MODE_BINARY, encode_binary};
use hostctl_core::{DeviceState, Dispatcher};

/// Output that remembers every level written to it.
#[derive(Default)]
pub struct RecordingLine {
    pub level: bool,
    pub history: Vec<bool>,
}

impl DigitalOutput for RecordingLine {
    fn set(&mut self, level: bool) {
        self.level = level;
        self.history.push(level);
    }
}

/// Digital line whose output and input halves are wired together.
#[derive(Clone, Default)]
pub struct Wire(Rc<Cell<bool>>);

impl DigitalOutput for Wire {
    fn set(&mut self, level: bool) {
        self.0.set(level);
    }
}

impl DigitalInput for Wire {
    fn get(&mut self) -> bool {
        self.0.get()
    }
}

pub struct FixedLevel(pub f32);

impl AnalogInput for FixedLevel {
    fn read(&mut self) -> f32 {
        self.0
    }
}

#[derive(Default)]
pub struct MockSampler {
    pub period: Option<Duration>,
    pub arms: usize,
}

impl PeriodicSource for MockSampler {
    fn arm(&mut self, period: Duration) {
        self.period = Some(period);
        self.arms += 1;
    }

    fn disarm(&mut self) {
        self.period = None;
    }
}

#[derive(Default)]
pub struct MockPwm {
    pub period_us: Option<u32>,
    pub duty: Option<f32>,
}

impl PwmOutput for MockPwm {
    fn set_period_us(&mut self, period_us: u32) {
        self.period_us = Some(period_us);
    }

    fn set_duty(&mut self, duty: f32) {
        self.duty = Some(duty);
    }
}

/// Board with digital output `i` looped back onto digital input `i`.
pub struct MockBoard {
    pub rail: RecordingLine,
    pub led: RecordingLine,
    pub analog: [FixedLevel; ANALOG_CHANNELS],
    pub samplers: [MockSampler; ANALOG_CHANNELS],
    pub digital_in: [Wire; DIGITAL_INPUTS],
    pub digital_out: [Wire; DIGITAL_INPUTS],
    pub pwm: [MockPwm; PWM_CHANNELS],
}

impl Default for MockBoard {
    fn default() -> Self {
        let digital_in: [Wire; DIGITAL_INPUTS] = Default::default();
        let digital_out = digital_in.clone();
        Self {
            rail: RecordingLine::default(),
            led: RecordingLine::default(),
            analog: [FixedLevel(0.0), FixedLevel(0.0), FixedLevel(0.0)],
            samplers: Default::default(),
            digital_in,
            digital_out,
            pwm: Default::default(),
        }
    }
}

impl Board for MockBoard {
    type PowerRail = RecordingLine;
    type Led = RecordingLine;
    type Analog = FixedLevel;
    type Sampler = MockSampler;
    type DigitalIn = Wire;
    type DigitalOut = Wire;
    type Pwm = MockPwm;

    fn status_outputs(&mut self) -> (&mut RecordingLine, &mut RecordingLine) {
        (&mut self.rail, &mut self.led)
    }

    fn analog_input(&mut self, channel: usize) -> Option<&mut FixedLevel> {
        self.analog.get_mut(channel)
    }

    fn sampler(&mut self, channel: usize) -> Option<&mut MockSampler> {
        self.samplers.get_mut(channel)
    }

    fn digital_input(&mut self, channel: usize) -> Option<&mut Wire> {
        self.digital_in.get_mut(channel)
    }

    fn digital_output(&mut self, channel: usize) -> Option<&mut Wire> {
        self.digital_out.get_mut(channel)
    }

    fn pwm_output(&mut self, channel: usize) -> Option<&mut MockPwm> {
        self.pwm.get_mut(channel)
    }
}

pub fn dispatcher(device: &DeviceState) -> Dispatcher<'_, MockBoard> {
    Dispatcher::new(device, MockBoard::default())
}

/// Sends a binary-mode packet, ignoring rejections.
pub fn send(
    dispatcher: &mut Dispatcher<'_, MockBoard>,
    code: CommandCode,
    channel: u8,
    value: i32,
) {
    let _ = dispatcher.on_write(&encode_binary(code, channel, MODE_BINARY, value));
}
