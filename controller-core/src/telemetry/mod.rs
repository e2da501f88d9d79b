//! Dispatch telemetry.
//!
//! The wire protocol has no error channel, so everything the dispatcher
//! accepts, stages, emits, or silently drops is recorded here instead. The
//! firmware mirrors records over `defmt` and the emulator prints them; the
//! bus-visible behaviour is the same either way.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::protocol::{CommandCode, Query};

/// Monotonic identifier assigned to each telemetry record.
pub type EventId = u32;

/// Number of dispatch records retained in memory.
pub const DISPATCH_RING_CAPACITY: usize = 32;

/// Why a packet or read phase was dropped without effect.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Rejection {
    /// Write phase carried no bytes.
    EmptyPacket,
    /// Command byte outside the known code space.
    UnknownCommand(u8),
    /// Channel index beyond the table for this command.
    ChannelOutOfRange { code: CommandCode, channel: u8 },
    /// Numeric value outside the accepted range.
    ValueOutOfRange { code: CommandCode, value: i32 },
    /// LED mode byte other than off, on or flash.
    InvalidLedMode(u8),
    /// Read phase with no staged descriptor.
    NothingStaged,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::EmptyPacket => f.write_str("empty packet"),
            Rejection::UnknownCommand(raw) => write!(f, "unknown command 0x{raw:02x}"),
            Rejection::ChannelOutOfRange { code, channel } => {
                write!(f, "{code}: channel {channel} out of range")
            }
            Rejection::ValueOutOfRange { code, value } => {
                write!(f, "{code}: value {value} out of range")
            }
            Rejection::InvalidLedMode(mode) => write!(f, "led: invalid mode {mode}"),
            Rejection::NothingStaged => f.write_str("read with nothing staged"),
        }
    }
}

/// Kinds of dispatch events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DispatchEventKind {
    /// Write-class command applied.
    Executed(CommandCode),
    /// Read-class command captured for the next read phase.
    Staged(Query),
    /// Read phase answered with `bytes` bytes.
    Emitted { query: Query, bytes: u8 },
    /// Packet or read phase dropped.
    Rejected(Rejection),
    /// Analog-start period replaced by the default.
    SamplePeriodDefaulted { channel: u8, requested: i32 },
}

impl fmt::Display for DispatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchEventKind::Executed(code) => write!(f, "executed {code}"),
            DispatchEventKind::Staged(query) => write!(f, "staged {}", query.code()),
            DispatchEventKind::Emitted { query, bytes } => {
                write!(f, "emitted {} ({bytes} bytes)", query.code())
            }
            DispatchEventKind::Rejected(reason) => write!(f, "rejected: {reason}"),
            DispatchEventKind::SamplePeriodDefaulted { channel, requested } => {
                write!(
                    f,
                    "analog-start: channel {channel} period {requested} ms replaced by default"
                )
            }
        }
    }
}

/// Record stored in the telemetry ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DispatchRecord {
    pub id: EventId,
    pub event: DispatchEventKind,
}

/// Running totals kept alongside the ring.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DispatchCounters {
    pub executed: u32,
    pub staged: u32,
    pub emitted: u32,
    pub rejected: u32,
}

/// Bounded history of dispatch events plus counters.
pub struct DispatchTelemetry<const CAPACITY: usize = DISPATCH_RING_CAPACITY> {
    ring: HistoryBuf<DispatchRecord, CAPACITY>,
    counters: DispatchCounters,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> DispatchTelemetry<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            counters: DispatchCounters {
                executed: 0,
                staged: 0,
                emitted: 0,
                rejected: 0,
            },
            next_event_id: 0,
        }
    }

    /// Records `event`, bumping the matching counter.
    pub fn record(&mut self, event: DispatchEventKind) -> EventId {
        let counter = match event {
            DispatchEventKind::Executed(_) => Some(&mut self.counters.executed),
            DispatchEventKind::Staged(_) => Some(&mut self.counters.staged),
            DispatchEventKind::Emitted { .. } => Some(&mut self.counters.emitted),
            DispatchEventKind::Rejected(_) => Some(&mut self.counters.rejected),
            DispatchEventKind::SamplePeriodDefaulted { .. } => None,
        };
        if let Some(counter) = counter {
            *counter = counter.saturating_add(1);
        }

        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(DispatchRecord { id, event });
        id
    }

    #[must_use]
    pub fn counters(&self) -> DispatchCounters {
        self.counters
    }

    /// Records in chronological order.
    #[must_use]
    pub fn oldest_first(&self) -> OldestOrdered<'_, DispatchRecord> {
        self.ring.oldest_ordered()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&DispatchRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<const CAPACITY: usize> Default for DispatchTelemetry<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
