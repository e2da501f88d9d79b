//! Host power rail sequencing.
//!
//! The rail is switched either immediately or after a countdown measured in
//! ticks. Countdowns are shared between the dispatch context (which arms
//! them) and the tick callback (which decrements them), so every field is a
//! single atomic and each update is one read-modify-write.

use portable_atomic::{AtomicI32, AtomicU8, Ordering};

use crate::hal::DigitalOutput;

/// Countdown value meaning "not armed".
pub const TIMER_INACTIVE: i32 = -1;

/// Logical state of the host power rail.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PowerState {
    Down = 0,
    Up = 1,
}

impl PowerState {
    const fn from_raw(raw: u8) -> Self {
        if raw == PowerState::Up as u8 {
            PowerState::Up
        } else {
            PowerState::Down
        }
    }

    /// Opposite state, used by the manual switch.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            PowerState::Up => PowerState::Down,
            PowerState::Down => PowerState::Up,
        }
    }

    /// Rail level that realises this state.
    #[must_use]
    pub const fn level(self) -> bool {
        matches!(self, PowerState::Up)
    }
}

/// Tick countdown with a [`TIMER_INACTIVE`] sentinel.
pub struct Countdown {
    ticks: AtomicI32,
}

impl Countdown {
    /// Creates a disarmed countdown.
    #[must_use]
    pub const fn inactive() -> Self {
        Self {
            ticks: AtomicI32::new(TIMER_INACTIVE),
        }
    }

    /// Arms the countdown, replacing any pending value.
    pub fn arm(&self, ticks: i32) {
        self.ticks.store(ticks, Ordering::Release);
    }

    /// Disarms the countdown.
    pub fn disarm(&self) {
        self.ticks.store(TIMER_INACTIVE, Ordering::Release);
    }

    /// Raw countdown value (`-1` when inactive).
    #[must_use]
    pub fn raw(&self) -> i32 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Remaining ticks while armed.
    #[must_use]
    pub fn remaining(&self) -> Option<i32> {
        match self.raw() {
            ticks if ticks > 0 => Some(ticks),
            _ => None,
        }
    }

    /// Advances by one tick. Returns `true` when the countdown expired on this
    /// tick, in which case it is left disarmed.
    pub fn advance(&self) -> bool {
        let mut expired = false;
        let _ = self
            .ticks
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |ticks| {
                expired = ticks == 1;
                match ticks {
                    1 => Some(TIMER_INACTIVE),
                    ticks if ticks > 1 => Some(ticks - 1),
                    _ => None,
                }
            });
        expired
    }
}

/// Effect of a power-up or power-down request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerRequest {
    /// Countdown armed for the given number of ticks.
    Scheduled(i32),
    /// Rail switched immediately.
    Immediate,
    /// Negative delay; nothing changed.
    Ignored,
}

/// Transitions fired by a single tick.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PowerTransitions {
    pub powered_on: bool,
    pub powered_off: bool,
}

/// Power rail state plus the on/off countdowns.
pub struct PowerSequencer {
    state: AtomicU8,
    on_timer: Countdown,
    off_timer: Countdown,
}

impl PowerSequencer {
    /// Creates a sequencer in the `Down` state with both countdowns disarmed.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(PowerState::Down as u8),
            on_timer: Countdown::inactive(),
            off_timer: Countdown::inactive(),
        }
    }

    /// Current rail state.
    #[must_use]
    pub fn state(&self) -> PowerState {
        PowerState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Countdown toward power-on.
    #[must_use]
    pub fn on_timer(&self) -> &Countdown {
        &self.on_timer
    }

    /// Countdown toward power-off.
    #[must_use]
    pub fn off_timer(&self) -> &Countdown {
        &self.off_timer
    }

    /// Drives the rail to `state`. The rail write and the recorded state
    /// change together so a preempting tick never sees them disagree.
    pub fn apply(&self, state: PowerState, rail: &mut impl DigitalOutput) {
        critical_section::with(|_| self.drive(state, rail));
    }

    fn drive(&self, state: PowerState, rail: &mut impl DigitalOutput) {
        rail.set(state.level());
        self.state.store(state as u8, Ordering::Release);
    }

    /// Switches the rail on immediately.
    pub fn power_on(&self, rail: &mut impl DigitalOutput) {
        self.apply(PowerState::Up, rail);
    }

    /// Switches the rail off immediately.
    pub fn power_off(&self, rail: &mut impl DigitalOutput) {
        self.apply(PowerState::Down, rail);
    }

    /// Flips the rail, returning the new state.
    pub fn toggle(&self, rail: &mut impl DigitalOutput) -> PowerState {
        critical_section::with(|_| {
            let next = self.state().toggled();
            self.drive(next, rail);
            next
        })
    }

    /// Handles a power-up request with a delay in ticks.
    pub fn request_up(&self, delay: i32, rail: &mut impl DigitalOutput) -> PowerRequest {
        Self::request(delay, &self.on_timer, || self.power_on(rail))
    }

    /// Handles a power-down request with a delay in ticks.
    pub fn request_down(&self, delay: i32, rail: &mut impl DigitalOutput) -> PowerRequest {
        Self::request(delay, &self.off_timer, || self.power_off(rail))
    }

    fn request(delay: i32, timer: &Countdown, immediate: impl FnOnce()) -> PowerRequest {
        match delay {
            0 => {
                immediate();
                PowerRequest::Immediate
            }
            delay if delay > 0 => {
                timer.arm(delay);
                PowerRequest::Scheduled(delay)
            }
            _ => PowerRequest::Ignored,
        }
    }

    /// Advances both countdowns by one tick, switching the rail for each that
    /// expires. The on countdown is evaluated first.
    pub fn advance(&self, rail: &mut impl DigitalOutput) -> PowerTransitions {
        let mut transitions = PowerTransitions::default();
        if self.on_timer.advance() {
            self.power_on(rail);
            transitions.powered_on = true;
        }
        if self.off_timer.advance() {
            self.power_off(rail);
            transitions.powered_off = true;
        }
        transitions
    }
}

impl Default for PowerSequencer {
    fn default() -> Self {
        Self::new()
    }
}
