use embassy_futures::select::{Either, select};
use embassy_time::Ticker;
use hostctl_core::DeviceState;
use hostctl_core::config::ANALOG_CHANNELS;

use crate::hw::AdcInput;
use crate::sampler::{SamplerControl, SamplerSignal};

#[embassy_executor::task(pool_size = ANALOG_CHANNELS)]
pub async fn run(
    channel: usize,
    device: &'static DeviceState,
    mut input: AdcInput,
    control: &'static SamplerSignal,
) -> ! {
    let mut ticker: Option<Ticker> = None;

    loop {
        let request = match ticker.as_mut() {
            Some(running) => match select(running.next(), control.wait()).await {
                Either::First(()) => {
                    if device.analog().sample(channel, &mut input) == Some(false) {
                        defmt::trace!("analog {=usize}: buffer full", channel);
                    }
                    continue;
                }
                Either::Second(request) => request,
            },
            None => control.wait().await,
        };

        ticker = match request {
            SamplerControl::Start(period) => {
                defmt::debug!(
                    "analog {=usize}: sampling every {=u64} us",
                    channel,
                    period.as_micros()
                );
                Some(Ticker::every(period))
            }
            SamplerControl::Stop => None,
        };
    }
}
