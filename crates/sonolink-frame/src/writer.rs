use std::io::{ErrorKind, Write};

use sonolink_transport::{LinkKind, LinkStream};
use tracing::{debug, trace};

use crate::codec::{encode, frame_hex, LinkConfig, Reading};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

/// Sends readings as whole frames over any `Write` stream.
///
/// A frame is fixed-size, so nothing is buffered between calls: each
/// [`send`](Self::send) writes all 11 bytes and flushes before returning.
pub struct FrameWriter<T> {
    inner: T,
    config: LinkConfig,
    sent: u64,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, LinkConfig::default())
    }

    pub fn with_config(inner: T, config: LinkConfig) -> Self {
        Self {
            inner,
            config,
            sent: 0,
        }
    }

    /// Encode one reading, write the frame, then flush (blocking).
    ///
    /// Short writes are continued and `Interrupted` is retried. With a write
    /// timeout configured, `WouldBlock` and `TimedOut` come back as
    /// [`FrameError::Io`]; without one, `WouldBlock` is retried. A write that
    /// accepts zero bytes means the link is gone.
    pub fn send(&mut self, reading: &Reading) -> Result<()> {
        let frame = encode(reading);
        trace!(frame = %frame_hex(&frame), "sending frame");

        let bounded = self.config.write_timeout.is_some();
        let mut rest = &frame[..];
        while !rest.is_empty() {
            match retry(bounded, || self.inner.write(rest))? {
                0 => return Err(FrameError::TransportClosed),
                n => rest = &rest[n..],
            }
        }
        self.flush()?;

        self.sent += 1;
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        let bounded = self.config.write_timeout.is_some();
        retry(bounded, || self.inner.flush())
    }

    /// Frames fully written so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}

impl FrameWriter<LinkStream> {
    /// Wrap a `LinkStream`, applying the write timeout from `config`.
    ///
    /// A serial port keeps the timeout it was opened with: reads and writes
    /// share it, and the reader half owns it.
    pub fn with_config_link(mut inner: LinkStream, config: LinkConfig) -> Result<Self> {
        if owns_write_timeout(inner.kind()) {
            inner
                .set_write_timeout(config.write_timeout)
                .map_err(transport_to_frame_error)?;
        } else {
            debug!(kind = inner.kind().as_str(), "keeping shared link timeout");
        }
        Ok(Self::with_config(inner, config))
    }
}

/// Whether the writer half may set its own timeout on this kind of link.
fn owns_write_timeout(kind: LinkKind) -> bool {
    kind != LinkKind::Serial
}

/// Run `op` until it completes with something other than a transient error.
///
/// When `bounded`, an expired write timeout is reported instead of retried.
fn retry<R>(bounded: bool, mut op: impl FnMut() -> std::io::Result<R>) -> Result<R> {
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock && !bounded => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
}
