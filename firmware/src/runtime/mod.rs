use core::cell::RefCell;

use cortex_m::interrupt as cortex_interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32 as hal;
use embassy_stm32::adc::AdcChannel;
use embassy_stm32::gpio::{OutputType, Pull};
use embassy_stm32::i2c::{self, I2c, SlaveAddrConfig};
use embassy_stm32::interrupt::{self, InterruptExt, Priority};
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use hostctl_core::config::{ANALOG_CHANNELS, FIRMWARE_VERSION, I2C_ADDRESS};
use hostctl_core::{DeviceState, Dispatcher};
use static_cell::StaticCell;

use crate::hw::{
    AdcBank, AdcInput, FirmwareBoard, InputLine, OutputLine, PwmChannel, PwmTimer,
};
use crate::sampler::{SamplerSignal, SignalSampler};
use crate::shared::{Shared, SharedCell};

mod bus_task;
mod sampler_task;
mod switch_task;
mod tick_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        cortex_interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                cortex_interrupt::enable();
            }
        }
    }
}

hal::bind_interrupts!(struct I2cIrqs {
    I2C1 => i2c::EventInterruptHandler<hal::peripherals::I2C1>,
        i2c::ErrorInterruptHandler<hal::peripherals::I2C1>;
});

/// Default PWM carrier before the first `pwm-period`.
const PWM_DEFAULT_FREQUENCY: Hertz = Hertz(1_000);
const I2C_BUS_FREQUENCY: Hertz = Hertz(100_000);

static DEVICE: DeviceState = DeviceState::new();
static SAMPLER_CONTROL: [SamplerSignal; ANALOG_CHANNELS] =
    [const { Signal::new() }; ANALOG_CHANNELS];
static RAIL: StaticCell<SharedCell<OutputLine>> = StaticCell::new();
static LED: StaticCell<SharedCell<OutputLine>> = StaticCell::new();
static ADC_BANK: StaticCell<SharedCell<AdcBank>> = StaticCell::new();

/// Runs the tick and sampler tasks ahead of the bus loop.
static URGENT_EXECUTOR: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn USART3_4_5_6_LPUART1() {
    unsafe { URGENT_EXECUTOR.on_interrupt() }
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA2,
        PA3,
        PA6,
        PA9,
        PA10,
        PA11,
        PA12,
        PA15,
        PB4,
        PB6,
        PB7,
        PC6,
        PD0,
        PD1,
        PD2,
        PD3,
        ADC1,
        I2C1,
        TIM2,
        TIM3,
        DMA1_CH1,
        DMA1_CH2,
        ..
    } = hal::init(config);

    let rail = Shared::new(RAIL.init(Mutex::new(RefCell::new(OutputLine::new(PA11)))));
    let led = Shared::new(LED.init(Mutex::new(RefCell::new(OutputLine::new(PC6)))));
    let bank = Shared::new(ADC_BANK.init(Mutex::new(RefCell::new(AdcBank::new(
        ADC1,
        [PA0.degrade_adc(), PA1.degrade_adc(), PA6.degrade_adc()],
    )))));

    let tim2 = SimplePwm::new(
        TIM2,
        Some(PwmPin::new(PA15, OutputType::PushPull)),
        None,
        None,
        None,
        PWM_DEFAULT_FREQUENCY,
        CountingMode::EdgeAlignedUp,
    );
    let tim3 = SimplePwm::new(
        TIM3,
        Some(PwmPin::new(PB4, OutputType::PushPull)),
        None,
        None,
        None,
        PWM_DEFAULT_FREQUENCY,
        CountingMode::EdgeAlignedUp,
    );

    let board = FirmwareBoard {
        rail,
        led,
        analog: core::array::from_fn(|channel| AdcInput::new(bank, channel)),
        samplers: SAMPLER_CONTROL.each_ref().map(SignalSampler::new),
        digital_in: [
            InputLine::new(PA2, Pull::Down),
            InputLine::new(PA3, Pull::Down),
            InputLine::new(PA9, Pull::Down),
            InputLine::new(PA10, Pull::Down),
        ],
        digital_out: [
            OutputLine::new(PD0),
            OutputLine::new(PD1),
            OutputLine::new(PD2),
            OutputLine::new(PD3),
        ],
        pwm: [
            PwmChannel::new(PwmTimer::Tim2(tim2)),
            PwmChannel::new(PwmTimer::Tim3(tim3)),
        ],
    };

    let mut dispatcher = Dispatcher::new(&DEVICE, board);
    dispatcher.boot();

    let bus = I2c::new(
        I2C1,
        PB6,
        PB7,
        I2cIrqs,
        DMA1_CH1,
        DMA1_CH2,
        I2C_BUS_FREQUENCY,
        i2c::Config::default(),
    )
    .into_slave_multimaster(SlaveAddrConfig::basic(I2C_ADDRESS));

    defmt::info!(
        "hostctl firmware 0x{=u16:04x} listening at i2c 0x{=u8:02x}",
        FIRMWARE_VERSION,
        I2C_ADDRESS
    );

    interrupt::USART3_4_5_6_LPUART1.set_priority(Priority::P1);
    let urgent = URGENT_EXECUTOR.start(interrupt::USART3_4_5_6_LPUART1);

    urgent
        .spawn(tick_task::run(&DEVICE, rail, led))
        .expect("failed to spawn tick task");

    for (channel, control) in SAMPLER_CONTROL.iter().enumerate() {
        urgent
            .spawn(sampler_task::run(
                channel,
                &DEVICE,
                AdcInput::new(bank, channel),
                control,
            ))
            .expect("failed to spawn sampler task");
    }

    spawner
        .spawn(switch_task::run(&DEVICE, InputLine::new(PA12, Pull::Up), rail))
        .expect("failed to spawn switch task");

    spawner
        .spawn(bus_task::run(dispatcher, bus))
        .expect("failed to spawn bus task");

    core::future::pending::<()>().await;
}
