//! `tokio_util::codec` adapter for async links.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use crate::codec::{encode_into, Reading, FRAME_SIZE};
use crate::error::FrameError;
use crate::receiver::{next_reading, ReceiverStats};

/// Frames readings for `FramedRead` / `FramedWrite`.
///
/// Decoding resynchronizes exactly like [`FrameReceiver`](crate::FrameReceiver).
/// Rejected frames never end the stream; they are only counted.
#[derive(Debug, Default)]
pub struct ReadingCodec {
    stats: ReceiverStats,
}

impl ReadingCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters since this codec was created.
    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}

impl Decoder for ReadingCodec {
    type Item = Reading;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Reading>, FrameError> {
        while let Some(item) = next_reading(src, &mut self.stats) {
            match item {
                Ok(reading) => return Ok(Some(reading)),
                Err(err) => trace!(%err, "frame rejected"),
            }
        }
        src.reserve(FRAME_SIZE);
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Reading>, FrameError> {
        if let Some(reading) = self.decode(src)? {
            return Ok(Some(reading));
        }
        if !src.is_empty() {
            debug!(leftover = src.len(), "dropping partial frame at end of stream");
            src.clear();
        }
        Ok(None)
    }
}

impl Encoder<Reading> for ReadingCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Reading, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_into(&item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::encode;

    #[tokio::test]
    async fn framed_read_resynchronizes() {
        let samples = [Reading::new(12.5, 300), Reading::new(13.0, 310)];
        let mut wire = vec![0xFF, 0x55, 0x00];
        for r in &samples {
            wire.extend_from_slice(&encode(r));
        }
        wire.extend_from_slice(&[0x55, 0x01]);

        let mut framed = FramedRead::new(&wire[..], ReadingCodec::new());
        let mut got = Vec::new();
        while let Some(item) = framed.next().await {
            got.push(item.unwrap());
        }

        assert_eq!(got, samples);
        assert_eq!(framed.decoder().stats().readings, 2);
    }

    #[tokio::test]
    async fn framed_write_emits_wire_frames() {
        let mut framed = FramedWrite::new(Vec::<u8>::new(), ReadingCodec::new());
        framed.send(Reading::new(12.5, 300)).await.unwrap();
        framed.send(Reading::new(1.0, -1)).await.unwrap();

        let wire = framed.into_inner();
        assert_eq!(wire.len(), 2 * FRAME_SIZE);
        assert_eq!(&wire[..FRAME_SIZE], &encode(&Reading::new(12.5, 300)));
    }

    #[test]
    fn decode_eof_drops_leftover() {
        let mut codec = ReadingCodec::new();
        let mut buf = BytesMut::from(&encode(&Reading::new(2.0, 2))[..7]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }
}
