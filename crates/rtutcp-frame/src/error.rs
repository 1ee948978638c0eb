use std::io;

/// Errors that can occur while assembling or validating RTU frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The request frame is too short to carry address and function code,
    /// or longer than an RTU frame can be.
    #[error("invalid request frame ({len} bytes)")]
    InvalidRequest { len: usize },

    /// A response frame outside the RTU size bounds.
    #[error("invalid response frame ({len} bytes)")]
    InvalidResponse { len: usize },

    /// The exchange deadline passed before a complete reply arrived.
    #[error("timed out waiting for response")]
    Timeout,

    /// The stream ended part way through a frame.
    #[error("short read (expected {expected} bytes, received {received})")]
    ShortRead { expected: usize, received: usize },

    /// The stream ended before any byte of a reply arrived.
    #[error("connection closed (no response)")]
    ConnectionClosed,

    /// An I/O error occurred while reading frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FrameError {
    /// Map a read error, folding elapsed deadlines into [`FrameError::Timeout`].
    pub fn from_read(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout,
            _ => Self::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
