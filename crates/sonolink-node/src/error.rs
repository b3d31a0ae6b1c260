use sonolink_frame::FrameError;

/// Errors raised by a sensor node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The frame could not be written to the link.
    #[error("failed to send reading: {0}")]
    Send(#[from] FrameError),
}

impl NodeError {
    /// Whether the link is gone and the node should stop sending.
    pub fn is_closed(&self) -> bool {
        matches!(self, NodeError::Send(FrameError::TransportClosed))
    }
}

pub type Result<T> = std::result::Result<T, NodeError>;
