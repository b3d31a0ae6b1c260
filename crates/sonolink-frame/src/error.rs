/// Errors that can occur while encoding, decoding, or moving frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The input is not exactly one frame long.
    #[error("malformed frame length ({len} bytes, expected 11)")]
    MalformedLength { len: usize },

    /// The first byte is not the `0x55` start marker.
    #[error("bad start marker 0x{0:02X} (expected 0x55)")]
    BadStartMarker(u8),

    /// The last byte is not the `0xAA` end marker.
    #[error("bad end marker 0x{0:02X} (expected 0xAA)")]
    BadEndMarker(u8),

    /// The checksum byte does not match the XOR of bytes 0..=8.
    #[error("checksum mismatch (frame carries 0x{actual:02X}, computed 0x{expected:02X})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// The transport reached end of stream.
    #[error("transport closed")]
    TransportClosed,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether this error comes from validating frame bytes, as opposed to the
    /// transport. Receivers recover from these by resynchronizing.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            FrameError::MalformedLength { .. }
                | FrameError::BadStartMarker(_)
                | FrameError::BadEndMarker(_)
                | FrameError::ChecksumMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
