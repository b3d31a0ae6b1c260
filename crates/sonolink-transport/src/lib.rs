//! Byte transports for the sonolink telemetry link.
//!
//! The sensor node and the host talk over a plain byte stream. In the field
//! that stream is a serial port; for local testing a Unix domain socket stands
//! in for the wire. Both are exposed as a [`LinkStream`], which implements
//! `Read + Write` and knows how to apply read/write timeouts.
//!
//! This is the lowest layer of sonolink. Framing lives in `sonolink-frame`.

pub mod error;
pub mod serial;
pub mod stream;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use serial::{available_ports, open_serial, PortInfo, PortKind, SerialConfig};
pub use stream::{LinkKind, LinkStream};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
