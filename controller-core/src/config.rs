//! Compile-time configuration shared by the firmware and host tooling.
//!
//! Everything here is fixed at build time: the device has no configuration
//! storage, so channel counts and buffer sizes double as the static memory
//! budget for the controller.

use core::time::Duration;

/// 7-bit I2C slave address the host uses to reach the controller.
pub const I2C_ADDRESS: u8 = 0x28;

/// Largest write-phase payload accepted from the host.
pub const MAX_PACKET_SIZE: usize = 32;

/// Protocol revision reported by the version query (major in the high byte).
pub const FIRMWARE_VERSION: u16 = 0x0300;

/// Number of analog input channels with their own sample buffer.
pub const ANALOG_CHANNELS: usize = 3;

/// Number of digital input lines.
pub const DIGITAL_INPUTS: usize = 4;

/// Number of digital output lines.
pub const DIGITAL_OUTPUTS: usize = 4;

/// Number of PWM output channels.
pub const PWM_CHANNELS: usize = 2;

/// Words backing each analog buffer. Slot 0 holds the sample count, so at most
/// `SAMPLE_CAPACITY - 1` samples are retained.
pub const SAMPLE_CAPACITY: usize = 64;

/// Largest read-phase payload: a full analog buffer dump.
pub const MAX_RESPONSE_SIZE: usize = SAMPLE_CAPACITY * 2;

/// Period of the power/LED tick.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Width of the LED pulse emitted on every tick while flashing.
pub const LED_PULSE: Duration = Duration::from_millis(10);

/// Settling delay applied after the manual switch reads as pressed.
pub const SWITCH_DEBOUNCE: Duration = Duration::from_millis(5);

/// Idle delay between polls of the bus/switch loop.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Shortest accepted analog sampling period in milliseconds.
pub const SAMPLE_PERIOD_MIN_MS: i32 = 10;

/// Longest accepted analog sampling period in milliseconds.
pub const SAMPLE_PERIOD_MAX_MS: i32 = 10_000;

/// Period substituted when a start request falls outside the accepted range.
pub const SAMPLE_PERIOD_DEFAULT_MS: i32 = 1_000;

/// Largest PWM period, in microseconds, accepted by the period command.
pub const PWM_PERIOD_MAX_US: i32 = 32_767;

/// Fixed-point scale applied to analog readings and PWM duty values.
pub const ANALOG_SCALE: f32 = 1024.0;
