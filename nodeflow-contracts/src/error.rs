use std::time::Duration;
use thiserror::Error;

/// Failure to move one frame across a connection
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer closed the connection without sending a frame")]
    Empty,

    #[error("frame exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("no frame completed within {0:?}")]
    Timeout(Duration),

    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl FrameError {
    /// True when the peer could not be reached or dropped the stream,
    /// as opposed to sending something we could not understand.
    pub fn is_transport(&self) -> bool {
        matches!(self, FrameError::Io(_) | FrameError::Empty | FrameError::Timeout(_))
    }
}
