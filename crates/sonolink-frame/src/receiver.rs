use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use crate::codec::{decode, Reading, FRAME_SIZE, START_MARKER};
use crate::error::{FrameError, Result};

/// Default accumulator cap: four frames.
pub const DEFAULT_ACCUMULATOR_CAPACITY: usize = 4 * FRAME_SIZE;

/// Smallest cap accepted. A frame plus a partial frame must always fit.
const MIN_ACCUMULATOR_CAPACITY: usize = 2 * FRAME_SIZE;

/// Running counters kept by a receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Frames that validated and produced a reading.
    pub readings: u64,
    /// Bytes dropped from the head while hunting for a start marker,
    /// including the marker byte of every rejected false start.
    pub discarded_bytes: u64,
    /// False starts rejected for a bad checksum.
    pub checksum_mismatches: u64,
    /// False starts rejected for a missing end marker.
    pub bad_end_markers: u64,
    /// Oldest bytes dropped because the accumulator was full.
    pub overflow_bytes: u64,
}

impl ReceiverStats {
    /// Total false starts seen so far.
    pub fn rejected_frames(&self) -> u64 {
        self.checksum_mismatches + self.bad_end_markers
    }

    fn record_rejection(&mut self, err: &FrameError) {
        match err {
            FrameError::ChecksumMismatch { .. } => self.checksum_mismatches += 1,
            FrameError::BadEndMarker(_) => self.bad_end_markers += 1,
            _ => {}
        }
    }
}

/// Recovers readings from an arbitrarily chunked byte stream.
///
/// The transport may hand over zero bytes, half a frame, or several frames at
/// once, and the stream may start mid-frame or carry corruption. The receiver
/// keeps a small accumulator and resynchronizes on the start marker:
///
/// - a head byte that is not `0x55` is dropped;
/// - a `0x55` head whose 11-byte window fails validation is treated as a false
///   start and only that one byte is dropped, so a genuine frame starting
///   inside the rejected window is still found.
///
/// Each receiver owns its accumulator. Create one per connection, or call
/// [`reset`](Self::reset) after reconnecting; frames are self-delimiting so no
/// handshake is needed.
#[derive(Debug)]
pub struct FrameReceiver {
    buf: BytesMut,
    capacity: usize,
    stats: ReceiverStats,
}

impl FrameReceiver {
    /// Create a receiver with the default accumulator cap.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ACCUMULATOR_CAPACITY)
    }

    /// Create a receiver whose accumulator holds at most `capacity` bytes
    /// (raised to two frames if smaller).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_ACCUMULATOR_CAPACITY);
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            stats: ReceiverStats::default(),
        }
    }

    /// Append `bytes` and lazily decode everything that becomes available.
    ///
    /// The returned iterator yields a reading for every valid frame and an
    /// error for every rejected false start. Input is moved into the
    /// accumulator only as decoding needs it, so a large chunk never overflows.
    /// If the iterator is dropped early, unconsumed input is kept (subject to
    /// the cap) and comes out of the next call.
    pub fn feed<'r>(&'r mut self, bytes: &'r [u8]) -> Feed<'r> {
        Feed {
            receiver: self,
            pending: bytes,
        }
    }

    /// Append `bytes` without decoding.
    ///
    /// When the accumulator would exceed its cap the oldest bytes are dropped.
    pub fn extend(&mut self, bytes: &[u8]) {
        let total = self.buf.len() + bytes.len();
        let overflow = total.saturating_sub(self.capacity);

        if bytes.len() >= self.capacity {
            self.buf.clear();
            self.buf.extend_from_slice(&bytes[bytes.len() - self.capacity..]);
        } else {
            self.buf.advance(overflow);
            self.buf.extend_from_slice(bytes);
        }

        if overflow > 0 {
            self.stats.overflow_bytes += overflow as u64;
            warn!(
                dropped = overflow,
                capacity = self.capacity,
                "receiver accumulator full, dropped oldest bytes"
            );
        }
    }

    /// Run one decode step over what is already buffered.
    ///
    /// Returns `None` once fewer than one frame's worth of bytes remain.
    pub fn poll_reading(&mut self) -> Option<Result<Reading>> {
        next_reading(&mut self.buf, &mut self.stats)
    }

    /// Drop everything buffered, e.g. after the transport reconnects.
    pub fn reset(&mut self) {
        if !self.buf.is_empty() {
            debug!(buffered = self.buf.len(), "receiver reset");
        }
        self.buf.clear();
    }

    /// Bytes currently held in the accumulator.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Accumulator cap in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free space left in the accumulator.
    pub fn room(&self) -> usize {
        self.capacity.saturating_sub(self.buf.len())
    }

    /// Counters since this receiver was created.
    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy decode over one chunk of input. See [`FrameReceiver::feed`].
pub struct Feed<'r> {
    receiver: &'r mut FrameReceiver,
    pending: &'r [u8],
}

impl Iterator for Feed<'_> {
    type Item = Result<Reading>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.receiver.poll_reading() {
                return Some(item);
            }
            if self.pending.is_empty() {
                return None;
            }

            // Less than a frame is buffered here, so there is always room.
            let take = self.receiver.room().min(self.pending.len());
            let (now, later) = self.pending.split_at(take);
            self.receiver.buf.extend_from_slice(now);
            self.pending = later;
        }
    }
}

impl Drop for Feed<'_> {
    fn drop(&mut self) {
        let rest = std::mem::take(&mut self.pending);
        if !rest.is_empty() {
            self.receiver.extend(rest);
        }
    }
}

/// One resynchronizing decode step over `buf`.
///
/// Shared by [`FrameReceiver`] and the async codec.
pub(crate) fn next_reading(
    buf: &mut BytesMut,
    stats: &mut ReceiverStats,
) -> Option<Result<Reading>> {
    loop {
        if buf.len() < FRAME_SIZE {
            return None;
        }

        // Same outcome as dropping one non-marker byte at a time while a full
        // frame is buffered: stop at the first marker, or when a frame no
        // longer fits.
        let skip = buf
            .iter()
            .position(|&b| b == START_MARKER)
            .unwrap_or(buf.len())
            .min(buf.len() - (FRAME_SIZE - 1));
        if skip > 0 {
            buf.advance(skip);
            stats.discarded_bytes += skip as u64;
            trace!(skip, "skipped bytes ahead of start marker");
            continue;
        }

        match decode(&buf[..FRAME_SIZE]) {
            Ok(reading) => {
                buf.advance(FRAME_SIZE);
                stats.readings += 1;
                return Some(Ok(reading));
            }
            Err(err) => {
                buf.advance(1);
                stats.discarded_bytes += 1;
                stats.record_rejection(&err);
                debug!(%err, "false start marker, resynchronizing");
                return Some(Err(err));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;

    fn readings(items: impl Iterator<Item = Result<Reading>>) -> Vec<Reading> {
        items.filter_map(|item| item.ok()).collect()
    }

    #[test]
    fn single_frame_in_one_chunk() {
        let reading = Reading::new(12.5, 300);
        let mut rx = FrameReceiver::new();

        let out: Vec<_> = rx.feed(&encode(&reading)).collect();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap(), &reading);
        assert_eq!(rx.buffered(), 0);
        assert_eq!(rx.stats().readings, 1);
    }

    #[test]
    fn leading_garbage_is_skipped() {
        let reading = Reading::new(12.5, 300);
        let mut wire = vec![0xFF, 0xFF];
        wire.extend_from_slice(&encode(&reading));

        let mut rx = FrameReceiver::new();
        let out: Vec<_> = rx.feed(&wire).collect();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap(), &reading);
        assert_eq!(rx.stats().discarded_bytes, 2);
        assert_eq!(rx.stats().rejected_frames(), 0);
    }

    #[test]
    fn false_start_does_not_swallow_genuine_frame() {
        let genuine = Reading::new(20.0, 512);
        let mut corrupted = encode(&Reading::new(12.5, 300));
        corrupted[9] ^= 0x0F;

        let mut wire = corrupted.to_vec();
        wire.extend_from_slice(&encode(&genuine));

        let mut rx = FrameReceiver::new();
        let out: Vec<_> = rx.feed(&wire).collect();

        assert_eq!(readings(out.into_iter()), vec![genuine]);
        assert_eq!(rx.stats().checksum_mismatches, 1);
        assert_eq!(rx.buffered(), 0);
    }

    #[test]
    fn false_start_window_overlapping_genuine_frame() {
        // Two markers inside the junk; the second one's window reaches into
        // the genuine frame and must not consume it.
        let junk = [
            0x55, 0x00, 0x55, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x13, 0x00,
        ];
        let genuine = Reading::new(7.5, 42);
        let mut wire = junk.to_vec();
        wire.extend_from_slice(&encode(&genuine));

        let mut rx = FrameReceiver::new();
        let out: Vec<_> = rx.feed(&wire).collect();

        let errors = out.iter().filter(|item| item.is_err()).count();
        assert_eq!(errors, 2);
        assert_eq!(readings(out.into_iter()), vec![genuine]);
        assert_eq!(rx.stats().bad_end_markers, 2);
    }

    #[test]
    fn split_delivery_matches_whole_delivery() {
        let reading = Reading::new(12.5, 300);
        let frame = encode(&reading);

        let mut rx = FrameReceiver::new();
        assert_eq!(rx.feed(&frame[..4]).count(), 0);
        assert_eq!(rx.buffered(), 4);
        let out: Vec<_> = rx.feed(&frame[4..]).collect();

        assert_eq!(readings(out.into_iter()), vec![reading]);
    }

    #[test]
    fn byte_at_a_time_delivery() {
        let samples = [Reading::new(1.0, 1), Reading::new(2.0, 2)];
        let mut wire = Vec::new();
        for r in &samples {
            wire.extend_from_slice(&encode(r));
        }

        let mut rx = FrameReceiver::new();
        let mut got = Vec::new();
        for b in &wire {
            got.extend(readings(rx.feed(std::slice::from_ref(b))));
        }

        assert_eq!(got, samples);
    }

    #[test]
    fn empty_feed_yields_nothing() {
        let mut rx = FrameReceiver::new();
        assert_eq!(rx.feed(&[]).count(), 0);
    }

    #[test]
    fn large_chunk_is_not_truncated_by_the_cap() {
        let samples: Vec<_> = (0..20).map(|i| Reading::new(i as f32, i)).collect();
        let mut wire = Vec::new();
        for r in &samples {
            wire.extend_from_slice(&encode(r));
        }
        assert!(wire.len() > DEFAULT_ACCUMULATOR_CAPACITY);

        let mut rx = FrameReceiver::new();
        let got = readings(rx.feed(&wire));

        assert_eq!(got, samples);
        assert_eq!(rx.stats().overflow_bytes, 0);
    }

    #[test]
    fn dropped_feed_keeps_the_rest_for_later() {
        let samples = [
            Reading::new(3.0, 30),
            Reading::new(4.0, 40),
            Reading::new(5.0, 50),
        ];
        let mut wire = Vec::new();
        for r in &samples {
            wire.extend_from_slice(&encode(r));
        }

        let mut rx = FrameReceiver::with_capacity(2 * FRAME_SIZE);
        let head = rx.feed(&wire).next().unwrap().unwrap();
        assert_eq!(head, samples[0]);
        assert_eq!(rx.buffered(), 2 * FRAME_SIZE);
        assert_eq!(rx.stats().overflow_bytes, 0);

        let tail = readings(rx.feed(&[]));
        assert_eq!(tail, samples[1..]);
    }

    #[test]
    fn dropped_bytes_mid_frame_cost_one_reading() {
        let samples = [
            Reading::new(12.5, 300),
            Reading::new(20.0, 512),
            Reading::new(21.0, 600),
        ];
        let mut wire = encode(&samples[0])[..6].to_vec();
        wire.extend_from_slice(&encode(&samples[1]));
        wire.extend_from_slice(&encode(&samples[2]));

        let mut rx = FrameReceiver::new();
        let got = readings(rx.feed(&wire));

        assert_eq!(got, samples[1..]);
        assert_eq!(rx.stats().rejected_frames(), 1);
    }

    #[test]
    fn garbage_only_stream_stays_bounded() {
        let mut rx = FrameReceiver::new();
        for _ in 0..100 {
            assert_eq!(rx.feed(&[0x00; 37]).count(), 0);
            assert!(rx.buffered() < FRAME_SIZE);
        }
        assert_eq!(rx.stats().overflow_bytes, 0);
    }

    #[test]
    fn extend_drops_oldest_bytes_on_overflow() {
        let mut rx = FrameReceiver::with_capacity(0);
        assert_eq!(rx.capacity(), 2 * FRAME_SIZE);

        rx.extend(&[0x00; 30]);
        assert_eq!(rx.buffered(), 2 * FRAME_SIZE);
        assert_eq!(rx.stats().overflow_bytes, 8);

        // The newest frame survives the overflow.
        let reading = Reading::new(9.0, 9);
        rx.extend(&encode(&reading));
        assert_eq!(rx.stats().overflow_bytes, 8 + FRAME_SIZE as u64);
        assert_eq!(readings(std::iter::from_fn(|| rx.poll_reading())), vec![reading]);
    }

    #[test]
    fn reset_discards_partial_frame() {
        let reading = Reading::new(5.0, 5);
        let frame = encode(&reading);

        let mut rx = FrameReceiver::new();
        assert_eq!(rx.feed(&frame[..7]).count(), 0);
        rx.reset();
        assert_eq!(rx.buffered(), 0);

        let got = readings(rx.feed(&frame));
        assert_eq!(got, vec![reading]);
    }

    #[test]
    fn trailing_partial_marker_waits_for_more() {
        let reading = Reading::new(6.0, 6);
        let frame = encode(&reading);
        let mut wire = vec![0x01; 15];
        wire.extend_from_slice(&frame[..3]);

        let mut rx = FrameReceiver::new();
        assert_eq!(rx.feed(&wire).count(), 0);
        assert_eq!(rx.buffered(), FRAME_SIZE - 1);

        let got = readings(rx.feed(&frame[3..]));
        assert_eq!(got, vec![reading]);
    }
}
