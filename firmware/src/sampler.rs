//! Sampler control handed from the dispatcher to the sampler tasks.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use hostctl_core::hal::PeriodicSource;

/// Latest request for one channel's sampler; a newer request replaces an
/// unread one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplerControl {
    Start(embassy_time::Duration),
    Stop,
}

pub type SamplerSignal = Signal<CriticalSectionRawMutex, SamplerControl>;

/// Converts a core duration into an embassy one, saturating at the top.
pub fn embassy_duration(duration: Duration) -> embassy_time::Duration {
    embassy_time::Duration::from_micros(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
}

/// [`PeriodicSource`] that forwards arm/disarm to a sampler task.
pub struct SignalSampler {
    control: &'static SamplerSignal,
}

impl SignalSampler {
    pub const fn new(control: &'static SamplerSignal) -> Self {
        Self { control }
    }
}

impl PeriodicSource for SignalSampler {
    fn arm(&mut self, period: Duration) {
        self.control.signal(SamplerControl::Start(embassy_duration(period)));
    }

    fn disarm(&mut self) {
        self.control.signal(SamplerControl::Stop);
    }
}
