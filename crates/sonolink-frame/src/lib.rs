//! Fixed-size telemetry frames for the sonolink sensor link.
//!
//! Every reading travels as an 11-byte frame:
//! - a `0x55` start marker
//! - the distance in centimetres as a little-endian `f32`
//! - the light level as a little-endian `i32`
//! - an XOR checksum over the nine bytes before it
//! - a `0xAA` end marker
//!
//! [`FrameReceiver`] recovers frame boundaries from an arbitrarily chunked
//! byte stream; [`FrameReader`] and [`FrameWriter`] wrap it around blocking
//! `Read`/`Write` streams.

pub mod codec;
pub mod error;
pub mod reader;
pub mod receiver;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    checksum, decode, encode, encode_into, frame_hex, LinkConfig, Reading, CHECKSUM_SPAN,
    END_MARKER, FRAME_SIZE, START_MARKER,
};
pub use error::{FrameError, Result};
pub use reader::{FrameReader, Readings};
pub use receiver::{Feed, FrameReceiver, ReceiverStats, DEFAULT_ACCUMULATOR_CAPACITY};
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_codec::ReadingCodec;
