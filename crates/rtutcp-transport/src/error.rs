use std::io;

/// Errors that can occur in TCP transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The target address could not be resolved.
    #[error("failed to resolve {address}: {source}")]
    Resolve { address: String, source: io::Error },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {address}: {source}")]
    Connect { address: String, source: io::Error },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    /// The deadline set for the current exchange has passed.
    #[error("transport deadline exceeded")]
    TimedOut,

    /// No stream is open.
    #[error("transport not connected")]
    Closed,
}

impl TransportError {
    /// Classify an I/O error from a stream operation, folding timeouts into
    /// [`TransportError::TimedOut`].
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::TimedOut,
            _ => Self::Io(err),
        }
    }

    /// Whether the error means the peer is gone and the stream is unusable.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Closed => true,
            Self::Io(err) => is_disconnect_kind(err.kind()),
            _ => false,
        }
    }
}

/// I/O error kinds after which a TCP stream cannot be reused.
pub fn is_disconnect_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero
    )
}

pub type Result<T> = std::result::Result<T, TransportError>;
