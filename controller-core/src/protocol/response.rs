//! Read-phase payload encoders.

use core::fmt::Write as _;

use heapless::{String, Vec};

use super::ValueMode;
use crate::config::{ANALOG_SCALE, MAX_RESPONSE_SIZE};

/// Bytes clocked out to the host during a read phase.
pub type Response = Vec<u8, MAX_RESPONSE_SIZE>;

/// Longest ASCII rendering produced by the encoders, terminator included.
const TEXT_CAPACITY: usize = 24;

/// Firmware version as two little-endian bytes.
#[must_use]
pub fn version(version: u16) -> Response {
    let mut response = Response::new();
    let _ = response.extend_from_slice(&version.to_le_bytes());
    response
}

/// Integer as a little-endian `i32` or as NUL-terminated decimal text.
#[must_use]
pub fn integer(value: i32, mode: ValueMode) -> Response {
    let mut response = Response::new();
    match mode {
        ValueMode::Binary => {
            let _ = response.extend_from_slice(&value.to_le_bytes());
        }
        ValueMode::Ascii => {
            let mut text: String<TEXT_CAPACITY> = String::new();
            let _ = write!(text, "{value}");
            push_text(&mut response, &text);
        }
    }
    response
}

/// Analog reading as a scaled little-endian `i32` or as NUL-terminated float text.
#[must_use]
pub fn analog(value: f32, mode: ValueMode) -> Response {
    match mode {
        ValueMode::Binary => integer(scale_rounded(value), ValueMode::Binary),
        ValueMode::Ascii => {
            let mut response = Response::new();
            let mut text: String<TEXT_CAPACITY> = String::new();
            let _ = write!(text, "{value:.6}");
            push_text(&mut response, &text);
            response
        }
    }
}

/// Rounds `value * ANALOG_SCALE` half away from zero.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn scale_rounded(value: f32) -> i32 {
    let scaled = value * ANALOG_SCALE;
    if scaled >= 0.0 {
        (scaled + 0.5) as i32
    } else {
        (scaled - 0.5) as i32
    }
}

fn push_text(response: &mut Response, text: &str) {
    let _ = response.extend_from_slice(text.as_bytes());
    let _ = response.push(0);
}
