//! STM32G0B1 board wiring.
//!
//! | function        | pins                         |
//! |-----------------|------------------------------|
//! | I2C1 slave      | PB6 (SCL), PB7 (SDA)         |
//! | power rail      | PA11                         |
//! | status LED      | PC6                          |
//! | manual switch   | PA12, active low, pulled up  |
//! | analog 0..=2    | PA0, PA1, PA6 (ADC1)         |
//! | digital out 0..=3 | PD0, PD1, PD2, PD3         |
//! | digital in 0..=3  | PA2, PA3, PA9, PA10        |
//! | pwm 0, pwm 1    | PA15 (TIM2 CH1), PB4 (TIM3 CH1) |

#![cfg(target_os = "none")]

use embassy_stm32::Peri;
use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
use embassy_stm32::gpio::{Input, Level, Output, Pin, Pull, Speed};
use embassy_stm32::peripherals::{ADC1, TIM2, TIM3};
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::GeneralInstance4Channel;
use embassy_stm32::timer::simple_pwm::{SimplePwm, SimplePwmChannel};
use hostctl_core::config::{ANALOG_CHANNELS, DIGITAL_INPUTS, DIGITAL_OUTPUTS, PWM_CHANNELS};
use hostctl_core::hal::{AnalogInput, Board, DigitalInput, DigitalOutput, PwmOutput};

use crate::sampler::SignalSampler;
use crate::shared::Shared;

/// Full-scale ADC1 reading at 12-bit resolution.
const ADC_FULL_SCALE: f32 = 4095.0;

/// Push-pull output that starts low.
pub struct OutputLine(Output<'static>);

impl OutputLine {
    pub fn new(pin: Peri<'static, impl Pin>) -> Self {
        Self(Output::new(pin, Level::Low, Speed::Low))
    }
}

impl DigitalOutput for OutputLine {
    fn set(&mut self, level: bool) {
        self.0.set_level(Level::from(level));
    }
}

pub struct InputLine(Input<'static>);

impl InputLine {
    pub fn new(pin: Peri<'static, impl Pin>, pull: Pull) -> Self {
        Self(Input::new(pin, pull))
    }

    pub fn is_low(&self) -> bool {
        self.0.is_low()
    }
}

impl DigitalInput for InputLine {
    fn get(&mut self) -> bool {
        self.0.is_high()
    }
}

/// ADC1 together with the analog pins it converts.
pub struct AdcBank {
    adc: Adc<'static, ADC1>,
    channels: [AnyAdcChannel<ADC1>; ANALOG_CHANNELS],
}

impl AdcBank {
    pub fn new(
        adc: Peri<'static, ADC1>,
        channels: [AnyAdcChannel<ADC1>; ANALOG_CHANNELS],
    ) -> Self {
        let mut adc = Adc::new(adc);
        adc.set_sample_time(SampleTime::CYCLES79_5);
        Self { adc, channels }
    }

    fn read(&mut self, channel: usize) -> f32 {
        let Some(pin) = self.channels.get_mut(channel) else {
            return 0.0;
        };
        f32::from(self.adc.blocking_read(pin)) / ADC_FULL_SCALE
    }
}

/// One channel of the shared [`AdcBank`].
#[derive(Clone, Copy)]
pub struct AdcInput {
    bank: Shared<AdcBank>,
    channel: usize,
}

impl AdcInput {
    pub const fn new(bank: Shared<AdcBank>, channel: usize) -> Self {
        Self { bank, channel }
    }
}

impl AnalogInput for AdcInput {
    fn read(&mut self) -> f32 {
        let channel = self.channel;
        self.bank.with(|bank| bank.read(channel))
    }
}

pub enum PwmTimer {
    Tim2(SimplePwm<'static, TIM2>),
    Tim3(SimplePwm<'static, TIM3>),
}

/// Channel 1 of a general-purpose timer. The duty fraction is kept so it
/// survives a period change.
pub struct PwmChannel {
    timer: PwmTimer,
    duty: f32,
}

impl PwmChannel {
    pub fn new(timer: PwmTimer) -> Self {
        let mut channel = Self { timer, duty: 0.0 };
        match &mut channel.timer {
            PwmTimer::Tim2(pwm) => pwm.ch1().enable(),
            PwmTimer::Tim3(pwm) => pwm.ch1().enable(),
        }
        channel.apply_duty();
        channel
    }

    fn apply_duty(&mut self) {
        match &mut self.timer {
            PwmTimer::Tim2(pwm) => set_fraction(&mut pwm.ch1(), self.duty),
            PwmTimer::Tim3(pwm) => set_fraction(&mut pwm.ch1(), self.duty),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn set_fraction<T: GeneralInstance4Channel>(channel: &mut SimplePwmChannel<'_, T>, duty: f32) {
    let max = channel.max_duty_cycle();
    channel.set_duty_cycle((duty.clamp(0.0, 1.0) * f32::from(max)) as u16);
}

impl PwmOutput for PwmChannel {
    fn set_period_us(&mut self, period_us: u32) {
        let frequency = Hertz(1_000_000 / period_us.max(1));
        match &mut self.timer {
            PwmTimer::Tim2(pwm) => pwm.set_frequency(frequency),
            PwmTimer::Tim3(pwm) => pwm.set_frequency(frequency),
        }
        self.apply_duty();
    }

    fn set_duty(&mut self, duty: f32) {
        self.duty = duty;
        self.apply_duty();
    }
}

/// Everything the dispatcher drives from thread mode.
pub struct FirmwareBoard {
    pub rail: Shared<OutputLine>,
    pub led: Shared<OutputLine>,
    pub analog: [AdcInput; ANALOG_CHANNELS],
    pub samplers: [SignalSampler; ANALOG_CHANNELS],
    pub digital_in: [InputLine; DIGITAL_INPUTS],
    pub digital_out: [OutputLine; DIGITAL_OUTPUTS],
    pub pwm: [PwmChannel; PWM_CHANNELS],
}

impl Board for FirmwareBoard {
    type PowerRail = Shared<OutputLine>;
    type Led = Shared<OutputLine>;
    type Analog = AdcInput;
    type Sampler = SignalSampler;
    type DigitalIn = InputLine;
    type DigitalOut = OutputLine;
    type Pwm = PwmChannel;

    fn status_outputs(&mut self) -> (&mut Self::PowerRail, &mut Self::Led) {
        (&mut self.rail, &mut self.led)
    }

    fn analog_input(&mut self, channel: usize) -> Option<&mut AdcInput> {
        self.analog.get_mut(channel)
    }

    fn sampler(&mut self, channel: usize) -> Option<&mut SignalSampler> {
        self.samplers.get_mut(channel)
    }

    fn digital_input(&mut self, channel: usize) -> Option<&mut InputLine> {
        self.digital_in.get_mut(channel)
    }

    fn digital_output(&mut self, channel: usize) -> Option<&mut OutputLine> {
        self.digital_out.get_mut(channel)
    }

    fn pwm_output(&mut self, channel: usize) -> Option<&mut PwmChannel> {
        self.pwm.get_mut(channel)
    }
}
