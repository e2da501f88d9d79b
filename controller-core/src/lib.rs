#![no_std]

// Portable logic for the I2C host controller.
//
// Everything here runs unchanged on the MCU firmware, the host emulator and
// the unit tests: hardware is reached only through the traits in `hal`, and
// state shared with interrupt context lives in `DeviceState`.

pub mod analog;
pub mod config;
pub mod device;
pub mod dispatcher;
pub mod hal;
pub mod led;
pub mod power;
pub mod protocol;
pub mod switch;
pub mod telemetry;
pub mod tick;

pub use device::DeviceState;
pub use dispatcher::Dispatcher;
