//! Lines shared between the bus loop and the interrupt-priority tasks.
//!
//! The power rail and the LED are driven both from I2C commands (thread
//! mode) and from the tick task (interrupt executor); the ADC is read both by
//! `analog-read` and by the samplers. Each of them lives in a static
//! blocking mutex and is handed out as a copyable [`Shared`] handle.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use hostctl_core::hal::DigitalOutput;

pub type SharedCell<T> = Mutex<CriticalSectionRawMutex, RefCell<T>>;

/// Handle to a value in a static [`SharedCell`]. Copies refer to the same
/// value.
pub struct Shared<T: 'static> {
    cell: &'static SharedCell<T>,
}

impl<T> Shared<T> {
    pub const fn new(cell: &'static SharedCell<T>) -> Self {
        Self { cell }
    }

    /// Runs `f` with exclusive access to the value, interrupts masked.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.cell.lock(|value| f(&mut value.borrow_mut()))
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Shared<T> {}

impl<T: DigitalOutput> DigitalOutput for Shared<T> {
    fn set(&mut self, level: bool) {
        self.with(|line| line.set(level));
    }
}
