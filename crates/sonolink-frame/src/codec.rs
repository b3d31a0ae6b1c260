use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::receiver::DEFAULT_ACCUMULATOR_CAPACITY;

/// Total wire size of one frame.
pub const FRAME_SIZE: usize = 11;

/// First byte of every frame.
pub const START_MARKER: u8 = 0x55;

/// Last byte of every frame.
pub const END_MARKER: u8 = 0xAA;

/// Number of leading bytes covered by the checksum (start marker + payload).
pub const CHECKSUM_SPAN: usize = 9;

const DISTANCE_OFFSET: usize = 1;
const LIGHT_OFFSET: usize = 5;
const CHECKSUM_OFFSET: usize = 9;
const END_OFFSET: usize = 10;

/// One sensor sample: ultrasonic distance and photocell level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Distance to the nearest obstacle, in centimetres.
    pub distance_cm: f32,
    /// Raw photocell level as sampled by the node's ADC.
    pub light_level: i32,
}

impl Reading {
    pub fn new(distance_cm: f32, light_level: i32) -> Self {
        Self {
            distance_cm,
            light_level,
        }
    }
}

/// XOR-fold of `bytes`.
///
/// Catches any single-bit error but not two equal bytes trading places; the
/// firmware uses this scheme so it stays.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode a reading into its wire frame.
///
/// Wire format:
/// ```text
/// ┌───────┬──────────────┬──────────────┬──────────┬───────┐
/// │ 0x55  │ distance_cm  │ light_level  │ checksum │ 0xAA  │
/// │ (1B)  │ (4B f32 LE)  │ (4B i32 LE)  │ (1B)     │ (1B)  │
/// └───────┴──────────────┴──────────────┴──────────┴───────┘
///           checksum = XOR of bytes 0..=8
/// ```
///
/// Every `f32`, NaN and infinities included, is carried bit for bit.
pub fn encode(reading: &Reading) -> [u8; FRAME_SIZE] {
    let mut frame = [0u8; FRAME_SIZE];
    frame[0] = START_MARKER;
    frame[DISTANCE_OFFSET..LIGHT_OFFSET].copy_from_slice(&reading.distance_cm.to_le_bytes());
    frame[LIGHT_OFFSET..CHECKSUM_OFFSET].copy_from_slice(&reading.light_level.to_le_bytes());
    frame[CHECKSUM_OFFSET] = checksum(&frame[..CHECKSUM_SPAN]);
    frame[END_OFFSET] = END_MARKER;
    frame
}

/// Append the wire frame for `reading` to `dst`.
pub fn encode_into(reading: &Reading, dst: &mut BytesMut) {
    let start = dst.len();
    dst.reserve(FRAME_SIZE);
    dst.put_u8(START_MARKER);
    dst.put_f32_le(reading.distance_cm);
    dst.put_i32_le(reading.light_level);
    let cs = checksum(&dst[start..start + CHECKSUM_SPAN]);
    dst.put_u8(cs);
    dst.put_u8(END_MARKER);
}

/// Validate an 11-byte window and extract the reading it carries.
///
/// Checks run in a fixed order and stop at the first failure: length, start
/// marker, end marker, checksum. Never panics on malformed input.
pub fn decode(bytes: &[u8]) -> Result<Reading> {
    let frame: &[u8; FRAME_SIZE] = bytes
        .try_into()
        .map_err(|_| FrameError::MalformedLength { len: bytes.len() })?;

    if frame[0] != START_MARKER {
        return Err(FrameError::BadStartMarker(frame[0]));
    }
    if frame[END_OFFSET] != END_MARKER {
        return Err(FrameError::BadEndMarker(frame[END_OFFSET]));
    }

    let expected = checksum(&frame[..CHECKSUM_SPAN]);
    let actual = frame[CHECKSUM_OFFSET];
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    let distance_cm = f32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]);
    let light_level = i32::from_le_bytes([frame[5], frame[6], frame[7], frame[8]]);
    Ok(Reading {
        distance_cm,
        light_level,
    })
}

/// Uppercase, space-separated hex dump (`55 00 00 48 ...`).
pub fn frame_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{b:02X}"));
    }
    out
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Receiver accumulator cap in bytes. Default: 4 frames.
    pub accumulator_capacity: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    ///
    /// When set, a send that stalls past it fails instead of retrying. Serial
    /// ports have a single timeout shared by both directions, so on a serial
    /// link this value bounds retries only and the port keeps the timeout it
    /// was opened with.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            accumulator_capacity: DEFAULT_ACCUMULATOR_CAPACITY,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
