use embassy_time::Timer;
use hostctl_core::DeviceState;
use hostctl_core::config::{POLL_INTERVAL, SWITCH_DEBOUNCE};
use hostctl_core::power::PowerState;
use hostctl_core::switch::{ManualSwitch, SwitchAction};

use crate::hw::{InputLine, OutputLine};
use crate::sampler::embassy_duration;
use crate::shared::Shared;

#[embassy_executor::task]
pub async fn run(
    device: &'static DeviceState,
    switch: InputLine,
    mut rail: Shared<OutputLine>,
) -> ! {
    let mut manual = ManualSwitch::new();

    loop {
        let (action, toggled) = manual.service(switch.is_low(), device, &mut rail);
        if let Some(state) = toggled {
            defmt::info!(
                "switch: power {=str}",
                match state {
                    PowerState::Up => "up",
                    PowerState::Down => "down",
                }
            );
        }

        let pause = match action {
            SwitchAction::Debounce => SWITCH_DEBOUNCE,
            SwitchAction::Idle | SwitchAction::Toggle => POLL_INTERVAL,
        };
        Timer::after(embassy_duration(pause)).await;
    }
}
