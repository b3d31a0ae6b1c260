//! Ultrasonic distance and light-level telemetry over a byte link.
//!
//! A sensor node samples a range finder and a photocell, packs each sample
//! into a fixed 11-byte frame, and writes it to a serial port. The host reads
//! the byte stream, realigns on frame boundaries, and yields validated
//! readings.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial ports and Unix sockets as one `LinkStream`
//! - [`frame`]: the frame codec, the resynchronizing receiver, blocking
//!   reader/writer and (behind `async`) a `tokio_util` codec
//! - [`node`]: the sensor side (sampling timer, probe sources, LED zones)

/// Re-export transport types.
pub mod transport {
    pub use sonolink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sonolink_frame::*;
}

/// Re-export sensor node types.
pub mod node {
    pub use sonolink_node::*;
}

pub use sonolink_frame::{decode, encode, FrameError, FrameReceiver, Reading};
