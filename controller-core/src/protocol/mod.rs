//! Wire format for host command packets.
//!
//! A write-phase packet is `[command, channel, mode, value...]`. The value is
//! either a little-endian `i32` (binary mode) or NUL-terminated decimal text
//! (ASCII mode). Decoding never fails on malformed content: short packets are
//! zero padded and unparsable text reads as `0`, matching the controller's
//! silent no-error policy. Only an empty write is reported as an error.

use core::fmt;

use winnow::ModalResult;
use winnow::ascii::digit0;
use winnow::binary::{le_i32, u8 as byte};
use winnow::combinator::{opt, preceded};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use crate::config::MAX_PACKET_SIZE;

pub mod response;

pub use response::Response;

/// Raw mode byte selecting binary value encoding.
pub const MODE_BINARY: u8 = 0x00;

/// Raw mode byte selecting ASCII value encoding.
pub const MODE_ASCII: u8 = 0x10;

/// Byte offset of the value field inside a packet.
const VALUE_OFFSET: usize = 3;

/// Closed set of command codes understood by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum CommandCode {
    Version = 0x00,
    PowerUp = 0x10,
    PowerDown = 0x11,
    Led = 0x20,
    AnalogRead = 0x30,
    AnalogReset = 0x31,
    AnalogStart = 0x32,
    AnalogStop = 0x33,
    AnalogLoad = 0x34,
    PwmOut = 0x40,
    PwmPeriod = 0x41,
    DigitalIn = 0x50,
    DigitalOut = 0x60,
}

impl CommandCode {
    /// Every command code, in wire order.
    pub const ALL: [CommandCode; 13] = [
        CommandCode::Version,
        CommandCode::PowerUp,
        CommandCode::PowerDown,
        CommandCode::Led,
        CommandCode::AnalogRead,
        CommandCode::AnalogReset,
        CommandCode::AnalogStart,
        CommandCode::AnalogStop,
        CommandCode::AnalogLoad,
        CommandCode::PwmOut,
        CommandCode::PwmPeriod,
        CommandCode::DigitalIn,
        CommandCode::DigitalOut,
    ];

    /// Maps a raw command byte onto a known code.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(CommandCode::Version),
            0x10 => Some(CommandCode::PowerUp),
            0x11 => Some(CommandCode::PowerDown),
            0x20 => Some(CommandCode::Led),
            0x30 => Some(CommandCode::AnalogRead),
            0x31 => Some(CommandCode::AnalogReset),
            0x32 => Some(CommandCode::AnalogStart),
            0x33 => Some(CommandCode::AnalogStop),
            0x34 => Some(CommandCode::AnalogLoad),
            0x40 => Some(CommandCode::PwmOut),
            0x41 => Some(CommandCode::PwmPeriod),
            0x50 => Some(CommandCode::DigitalIn),
            0x60 => Some(CommandCode::DigitalOut),
            _ => None,
        }
    }

    /// Returns the raw wire byte.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        self as u8
    }

    /// Kebab-case name used by logs and the emulator console.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            CommandCode::Version => "version",
            CommandCode::PowerUp => "power-up",
            CommandCode::PowerDown => "power-down",
            CommandCode::Led => "led",
            CommandCode::AnalogRead => "analog-read",
            CommandCode::AnalogReset => "analog-reset",
            CommandCode::AnalogStart => "analog-start",
            CommandCode::AnalogStop => "analog-stop",
            CommandCode::AnalogLoad => "analog-load",
            CommandCode::PwmOut => "pwm-out",
            CommandCode::PwmPeriod => "pwm-period",
            CommandCode::DigitalIn => "digital-in",
            CommandCode::DigitalOut => "digital-out",
        }
    }

    /// Looks a code up by its [`name`](Self::name), ignoring ASCII case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.name().eq_ignore_ascii_case(name))
    }

    /// Returns `true` for commands answered in the following read phase.
    #[must_use]
    pub const fn is_read_class(self) -> bool {
        matches!(
            self,
            CommandCode::Version
                | CommandCode::AnalogRead
                | CommandCode::AnalogLoad
                | CommandCode::DigitalIn
        )
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encoding of the packet value and of read-phase responses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ValueMode {
    Binary,
    Ascii,
}

impl ValueMode {
    /// Interprets a mode byte. Anything other than [`MODE_ASCII`] is binary.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        if raw == MODE_ASCII {
            ValueMode::Ascii
        } else {
            ValueMode::Binary
        }
    }

    /// Returns the canonical mode byte.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            ValueMode::Binary => MODE_BINARY,
            ValueMode::Ascii => MODE_ASCII,
        }
    }
}

/// Raw packet fields after value decoding.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Packet {
    pub command: u8,
    pub channel: u8,
    pub mode: u8,
    pub value: i32,
}

/// Failure to decode a write-phase payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// The host addressed the device without sending any byte.
    Empty,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Empty => f.write_str("empty packet"),
        }
    }
}

impl Packet {
    /// Decodes a write-phase payload. Bytes beyond [`MAX_PACKET_SIZE`] are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Empty`] when `bytes` is empty.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mut frame = [0u8; MAX_PACKET_SIZE];
        let len = bytes.len().min(MAX_PACKET_SIZE);
        frame[..len].copy_from_slice(&bytes[..len]);

        let mut input: &[u8] = &frame;
        let (command, channel, mode) = header(&mut input).unwrap_or((0, 0, 0));
        let value = match ValueMode::from_raw(mode) {
            ValueMode::Binary => binary_value(&mut input).map_or(0, |value| value.max(0)),
            ValueMode::Ascii => ascii_value(&mut input).unwrap_or(0),
        };

        Ok(Self {
            command,
            channel,
            mode,
            value,
        })
    }

    /// Value encoding selected by the mode byte.
    #[must_use]
    pub const fn value_mode(&self) -> ValueMode {
        ValueMode::from_raw(self.mode)
    }

    /// Channel index as a table offset.
    #[must_use]
    pub fn channel_index(&self) -> usize {
        usize::from(self.channel)
    }
}

fn header(input: &mut &[u8]) -> ModalResult<(u8, u8, u8)> {
    (byte, byte, byte).parse_next(input)
}

fn binary_value(input: &mut &[u8]) -> ModalResult<i32> {
    le_i32.parse_next(input)
}

/// `atol`-style parse: optional whitespace, optional sign, then digits up to the
/// first non-digit (normally the NUL terminator). Overflow saturates.
fn ascii_value(input: &mut &[u8]) -> ModalResult<i32> {
    preceded(
        take_while(0.., |b: u8| b.is_ascii_whitespace() || b == 0x0b),
        (opt(one_of([b'+', b'-'])), digit0),
    )
    .map(|(sign, digits): (Option<u8>, &[u8])| {
        let magnitude = digits.iter().fold(0i32, |acc, digit| {
            acc.saturating_mul(10)
                .saturating_add(i32::from(digit - b'0'))
        });
        if sign == Some(b'-') {
            magnitude.saturating_neg()
        } else {
            magnitude
        }
    })
    .parse_next(input)
}

/// Which read-class query a staged descriptor answers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Query {
    Version,
    AnalogRead,
    AnalogLoad,
    DigitalIn,
}

impl Query {
    /// Command code that staged this query.
    #[must_use]
    pub const fn code(self) -> CommandCode {
        match self {
            Query::Version => CommandCode::Version,
            Query::AnalogRead => CommandCode::AnalogRead,
            Query::AnalogLoad => CommandCode::AnalogLoad,
            Query::DigitalIn => CommandCode::DigitalIn,
        }
    }
}

/// Pending response descriptor captured from a read-class command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PendingResponse {
    pub query: Query,
    pub channel: u8,
    pub mode: ValueMode,
}

/// Typed command produced from a decoded [`Packet`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command {
    PowerUp { delay: i32 },
    PowerDown { delay: i32 },
    Led { mode: u8 },
    AnalogReset { channel: u8 },
    AnalogStart { channel: u8, period_ms: i32 },
    AnalogStop { channel: u8 },
    PwmOut { channel: u8, value: i32 },
    PwmPeriod { channel: u8, period_us: i32 },
    DigitalOut { channel: u8, value: i32 },
    Stage(PendingResponse),
    Unrecognized(u8),
}

impl Command {
    /// Routes a packet onto its typed command.
    #[must_use]
    pub fn from_packet(packet: &Packet) -> Self {
        let Packet {
            command,
            channel,
            mode,
            value,
        } = *packet;
        let Some(code) = CommandCode::from_raw(command) else {
            return Command::Unrecognized(command);
        };

        let stage = |query| {
            Command::Stage(PendingResponse {
                query,
                channel,
                mode: ValueMode::from_raw(mode),
            })
        };

        match code {
            CommandCode::Version => stage(Query::Version),
            CommandCode::AnalogRead => stage(Query::AnalogRead),
            CommandCode::AnalogLoad => stage(Query::AnalogLoad),
            CommandCode::DigitalIn => stage(Query::DigitalIn),
            CommandCode::PowerUp => Command::PowerUp { delay: value },
            CommandCode::PowerDown => Command::PowerDown { delay: value },
            CommandCode::Led => Command::Led { mode },
            CommandCode::AnalogReset => Command::AnalogReset { channel },
            CommandCode::AnalogStart => Command::AnalogStart {
                channel,
                period_ms: value,
            },
            CommandCode::AnalogStop => Command::AnalogStop { channel },
            CommandCode::PwmOut => Command::PwmOut { channel, value },
            CommandCode::PwmPeriod => Command::PwmPeriod {
                channel,
                period_us: value,
            },
            CommandCode::DigitalOut => Command::DigitalOut { channel, value },
        }
    }

    /// Known command code, if any.
    #[must_use]
    pub const fn code(&self) -> Option<CommandCode> {
        match self {
            Command::PowerUp { .. } => Some(CommandCode::PowerUp),
            Command::PowerDown { .. } => Some(CommandCode::PowerDown),
            Command::Led { .. } => Some(CommandCode::Led),
            Command::AnalogReset { .. } => Some(CommandCode::AnalogReset),
            Command::AnalogStart { .. } => Some(CommandCode::AnalogStart),
            Command::AnalogStop { .. } => Some(CommandCode::AnalogStop),
            Command::PwmOut { .. } => Some(CommandCode::PwmOut),
            Command::PwmPeriod { .. } => Some(CommandCode::PwmPeriod),
            Command::DigitalOut { .. } => Some(CommandCode::DigitalOut),
            Command::Stage(pending) => Some(pending.query.code()),
            Command::Unrecognized(_) => None,
        }
    }
}

/// Builds a binary-mode packet. Used by host tooling and tests.
#[must_use]
pub fn encode_binary(code: CommandCode, channel: u8, mode: u8, value: i32) -> [u8; 7] {
    let value = value.to_le_bytes();
    [
        code.to_raw(),
        channel,
        mode,
        value[0],
        value[1],
        value[2],
        value[3],
    ]
}

/// Builds an ASCII-mode packet carrying `value` as NUL-terminated text.
#[must_use]
pub fn encode_ascii(
    code: CommandCode,
    channel: u8,
    value: i32,
) -> heapless::Vec<u8, MAX_PACKET_SIZE> {
    use core::fmt::Write as _;

    let mut text: heapless::String<16> = heapless::String::new();
    // An i32 always fits in 16 characters.
    let _ = write!(text, "{value}");

    let mut packet = heapless::Vec::new();
    let _ = packet.extend_from_slice(&[code.to_raw(), channel, MODE_ASCII]);
    let _ = packet.extend_from_slice(text.as_bytes());
    let _ = packet.push(0);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_value_is_little_endian_and_clamped() {
        let packet = Packet::decode(&[0x10, 0, MODE_BINARY, 0x05, 0x01, 0, 0]).unwrap();
        assert_eq!(packet.value, 0x0105);

        let negative = encode_binary(CommandCode::PowerUp, 0, MODE_BINARY, -7);
        assert_eq!(Packet::decode(&negative).unwrap().value, 0);
    }

    #[test]
    fn ascii_value_parses_like_atol() {
        let cases: [(&[u8], i32); 7] = [
            (b"42\0", 42),
            (b"-15\0junk", -15),
            (b"  +8\0", 8),
            (b"\n\r\x0b\x0c\t 7\0", 7),
            (b"12ab", 12),
            (b"abc", 0),
            (b"99999999999\0", i32::MAX),
        ];

        for (text, expected) in cases {
            let mut bytes: heapless::Vec<u8, MAX_PACKET_SIZE> = heapless::Vec::new();
            bytes.extend_from_slice(&[0x32, 1, MODE_ASCII]).unwrap();
            bytes.extend_from_slice(text).unwrap();
            let packet = Packet::decode(&bytes).unwrap();
            assert_eq!(packet.value, expected, "text {text:?}");
        }
    }

    #[test]
    fn short_packets_are_zero_padded() {
        let packet = Packet::decode(&[0x20]).unwrap();
        assert_eq!(
            packet,
            Packet {
                command: 0x20,
                channel: 0,
                mode: 0,
                value: 0
            }
        );
    }

    #[test]
    fn empty_packet_is_rejected() {
        assert_eq!(Packet::decode(&[]), Err(DecodeError::Empty));
    }

    #[test]
    fn oversize_packets_are_truncated() {
        let mut bytes = [b'7'; MAX_PACKET_SIZE + 8];
        bytes[0] = 0x10;
        bytes[1] = 0;
        bytes[2] = MODE_ASCII;
        let packet = Packet::decode(&bytes).unwrap();
        assert_eq!(packet.value, i32::MAX);
    }

    #[test]
    fn read_class_codes_stage_a_descriptor() {
        let packet = Packet::decode(&[0x34, 2, MODE_ASCII]).unwrap();
        assert_eq!(
            Command::from_packet(&packet),
            Command::Stage(PendingResponse {
                query: Query::AnalogLoad,
                channel: 2,
                mode: ValueMode::Ascii,
            })
        );

        for code in CommandCode::ALL {
            let packet = Packet::decode(&[code.to_raw()]).unwrap();
            let staged = matches!(Command::from_packet(&packet), Command::Stage(_));
            assert_eq!(staged, code.is_read_class(), "{code}");
        }
    }

    #[test]
    fn unknown_codes_are_unrecognized() {
        let packet = Packet::decode(&[0x7f, 0, 0]).unwrap();
        assert_eq!(Command::from_packet(&packet), Command::Unrecognized(0x7f));
        assert_eq!(Command::from_packet(&packet).code(), None);
    }

    #[test]
    fn names_round_trip_through_lookup() {
        for code in CommandCode::ALL {
            assert_eq!(CommandCode::from_name(code.name()), Some(code));
            assert_eq!(CommandCode::from_raw(code.to_raw()), Some(code));
        }
        assert_eq!(CommandCode::from_name("PoWeR-Up"), Some(CommandCode::PowerUp));
    }

    #[test]
    fn ascii_encoder_appends_terminator() {
        let packet = encode_ascii(CommandCode::AnalogStart, 1, -250);
        assert_eq!(packet.as_slice(), b"\x32\x01\x10-250\0");
    }
}
