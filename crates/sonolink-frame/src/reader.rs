use std::io::{ErrorKind, Read};

use sonolink_transport::LinkStream;
use tracing::trace;

use crate::codec::{LinkConfig, Reading};
use crate::error::{FrameError, Result};
use crate::receiver::{FrameReceiver, ReceiverStats};

/// Reads validated readings from any `Read` stream.
///
/// Handles partial reads, misaligned starts, and corrupted frames internally.
/// Callers only ever see whole readings or transport-level errors.
pub struct FrameReader<T> {
    inner: T,
    receiver: FrameReceiver,
    config: LinkConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, LinkConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: LinkConfig) -> Self {
        Self {
            inner,
            receiver: FrameReceiver::with_capacity(config.accumulator_capacity),
            config,
        }
    }

    /// Read the next valid reading (blocking).
    ///
    /// Returns `Err(FrameError::TransportClosed)` when EOF is reached. A read
    /// timeout on the underlying stream comes back as `FrameError::Io` with
    /// `TimedOut` or `WouldBlock`; bytes received so far stay buffered and the
    /// call can simply be repeated.
    pub fn read_reading(&mut self) -> Result<Reading> {
        loop {
            while let Some(item) = self.receiver.poll_reading() {
                match item {
                    Ok(reading) => return Ok(reading),
                    // Counted in the receiver's stats; resync continues.
                    Err(err) => trace!(%err, "frame rejected"),
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let limit = self.receiver.room().min(READ_CHUNK_SIZE);
            let read = match self.inner.read(&mut chunk[..limit]) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::TransportClosed);
            }

            self.receiver.extend(&chunk[..read]);
        }
    }

    /// Lazy, unbounded sequence of readings.
    ///
    /// Ends cleanly when the transport closes; any other transport error is
    /// yielded once and ends the sequence.
    pub fn readings(&mut self) -> Readings<'_, T> {
        Readings {
            reader: self,
            done: false,
        }
    }

    /// Drop buffered bytes, e.g. after swapping in a reconnected stream.
    pub fn reset(&mut self) {
        self.receiver.reset();
    }

    /// Replace the underlying stream and clear buffered bytes.
    pub fn reconnect(&mut self, inner: T) -> T {
        self.receiver.reset();
        std::mem::replace(&mut self.inner, inner)
    }

    /// Receiver counters (readings, discarded bytes, rejected frames).
    pub fn stats(&self) -> &ReceiverStats {
        self.receiver.stats()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}

/// Reads never ask for more than four frames at a time.
const READ_CHUNK_SIZE: usize = crate::receiver::DEFAULT_ACCUMULATOR_CAPACITY;

impl FrameReader<LinkStream> {
    /// Create a frame reader for a `LinkStream` and apply the read timeout
    /// from config.
    pub fn with_config_link(mut inner: LinkStream, config: LinkConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

/// Iterator returned by [`FrameReader::readings`].
pub struct Readings<'a, T> {
    reader: &'a mut FrameReader<T>,
    done: bool,
}

impl<T: Read> Iterator for Readings<'_, T> {
    type Item = Result<Reading>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_reading() {
            Ok(reading) => Some(Ok(reading)),
            Err(FrameError::TransportClosed) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

pub(crate) fn transport_to_frame_error(err: sonolink_transport::TransportError) -> FrameError {
    match err {
        sonolink_transport::TransportError::Io(io)
        | sonolink_transport::TransportError::Accept(io) => FrameError::Io(io),
        sonolink_transport::TransportError::Bind { source, .. }
        | sonolink_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
