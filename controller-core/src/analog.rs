//! Burst sample buffers filled by the per-channel sampler callbacks.
//!
//! Each buffer is a flat `u16` array whose first word is the sample count and
//! whose following words are the samples, so a dump is one contiguous copy of
//! `words[..=count]`. Appends come from the sampler context and drains from
//! the dispatcher; both run inside `critical_section::with`, which keeps the
//! count and the samples consistent with each other.

use core::cell::RefCell;
use core::time::Duration;

use critical_section::Mutex;
use heapless::Vec;
use portable_atomic::{AtomicU32, Ordering};

use crate::config::{
    ANALOG_CHANNELS, ANALOG_SCALE, SAMPLE_CAPACITY, SAMPLE_PERIOD_DEFAULT_MS,
    SAMPLE_PERIOD_MAX_MS, SAMPLE_PERIOD_MIN_MS,
};
use crate::hal::AnalogInput;
use crate::protocol::Response;

/// Converts a normalised reading into a stored sample (truncating).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn scale_sample(value: f32) -> u16 {
    (value * ANALOG_SCALE) as u16
}

/// Fixed-capacity sample buffer. Holds at most `WORDS - 1` samples.
pub struct SampleBuffer<const WORDS: usize> {
    words: Mutex<RefCell<[u16; WORDS]>>,
    dropped: AtomicU32,
}

impl<const WORDS: usize> SampleBuffer<WORDS> {
    /// Samples the buffer can hold.
    pub const CAPACITY: usize = WORDS - 1;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: Mutex::new(RefCell::new([0; WORDS])),
            dropped: AtomicU32::new(0),
        }
    }

    /// Appends a sample. Returns `false` and counts a drop when full.
    pub fn push(&self, sample: u16) -> bool {
        let stored = critical_section::with(|cs| {
            let mut words = self.words.borrow_ref_mut(cs);
            let count = usize::from(words[0]);
            if count < Self::CAPACITY {
                words[count + 1] = sample;
                words[0] += 1;
                true
            } else {
                false
            }
        });
        if !stored {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        stored
    }

    /// Resets the count to zero. Sample words are left as they are.
    pub fn clear(&self) {
        critical_section::with(|cs| self.words.borrow_ref_mut(cs)[0] = 0);
    }

    /// Number of samples currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        critical_section::with(|cs| usize::from(self.words.borrow_ref(cs)[0]))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples rejected because the buffer was full.
    #[must_use]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Appends the count and the samples as little-endian words, then resets
    /// the count. Returns the number of samples drained.
    pub fn drain_into(&self, response: &mut Response) -> usize {
        critical_section::with(|cs| {
            let mut words = self.words.borrow_ref_mut(cs);
            let count = usize::from(words[0]);
            for word in &words[..=count] {
                if response.extend_from_slice(&word.to_le_bytes()).is_err() {
                    break;
                }
            }
            words[0] = 0;
            count
        })
    }

    /// Copy of the held samples, oldest first.
    #[must_use]
    pub fn samples(&self) -> Vec<u16, WORDS> {
        critical_section::with(|cs| {
            let words = self.words.borrow_ref(cs);
            let count = usize::from(words[0]);
            Vec::from_slice(&words[1..=count]).unwrap_or_default()
        })
    }
}

impl<const WORDS: usize> Default for SampleBuffer<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

/// Buffer type used for every analog channel.
pub type ChannelBuffer = SampleBuffer<SAMPLE_CAPACITY>;

/// Sampling period granted to an analog-start request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SamplePeriod {
    pub millis: u32,
    /// The request fell outside the accepted range and was replaced.
    pub defaulted: bool,
}

impl SamplePeriod {
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_request(requested_ms: i32) -> Self {
        if requested_ms >= SAMPLE_PERIOD_MIN_MS && requested_ms <= SAMPLE_PERIOD_MAX_MS {
            Self {
                millis: requested_ms as u32,
                defaulted: false,
            }
        } else {
            Self {
                millis: SAMPLE_PERIOD_DEFAULT_MS as u32,
                defaulted: true,
            }
        }
    }

    #[must_use]
    pub fn duration(self) -> Duration {
        Duration::from_millis(u64::from(self.millis))
    }
}

/// Sample buffers and sampler bookkeeping for every analog channel.
pub struct AnalogBank {
    buffers: [ChannelBuffer; ANALOG_CHANNELS],
    periods_ms: [AtomicU32; ANALOG_CHANNELS],
}

impl AnalogBank {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffers: [const { ChannelBuffer::new() }; ANALOG_CHANNELS],
            periods_ms: [const { AtomicU32::new(0) }; ANALOG_CHANNELS],
        }
    }

    #[must_use]
    pub fn buffer(&self, channel: usize) -> Option<&ChannelBuffer> {
        self.buffers.get(channel)
    }

    /// Period the channel's sampler was last started with, `None` when stopped.
    #[must_use]
    pub fn period(&self, channel: usize) -> Option<SamplePeriod> {
        let millis = self.periods_ms.get(channel)?.load(Ordering::Acquire);
        (millis != 0).then_some(SamplePeriod {
            millis,
            defaulted: false,
        })
    }

    /// Records the sampler state for `channel`.
    pub fn set_period(&self, channel: usize, period: Option<SamplePeriod>) {
        if let Some(slot) = self.periods_ms.get(channel) {
            slot.store(period.map_or(0, |period| period.millis), Ordering::Release);
        }
    }

    /// Sampler callback body: reads `input` once and appends the scaled value.
    /// Returns `None` for an unknown channel, otherwise whether the sample was kept.
    pub fn sample(&self, channel: usize, input: &mut impl AnalogInput) -> Option<bool> {
        let buffer = self.buffers.get(channel)?;
        Some(buffer.push(scale_sample(input.read())))
    }
}

impl Default for AnalogBank {
    fn default() -> Self {
        Self::new()
    }
}
