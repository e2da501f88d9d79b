use embassy_time::{Ticker, Timer};
use hostctl_core::DeviceState;
use hostctl_core::config::{LED_PULSE, TICK_PERIOD};

use crate::hw::OutputLine;
use crate::sampler::embassy_duration;
use crate::shared::Shared;

#[embassy_executor::task]
pub async fn run(
    device: &'static DeviceState,
    mut rail: Shared<OutputLine>,
    mut led: Shared<OutputLine>,
) -> ! {
    let mut ticker = Ticker::every(embassy_duration(TICK_PERIOD));

    loop {
        ticker.next().await;

        let outcome = device.tick(&mut rail, &mut led);
        if outcome.powered_on {
            defmt::info!("power: rail up");
        }
        if outcome.powered_off {
            defmt::info!("power: rail down");
        }
        if outcome.pulse_started {
            Timer::after(embassy_duration(LED_PULSE)).await;
            device.led().end_pulse(&mut led);
        }
    }
}
