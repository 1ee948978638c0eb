use rtutcp_frame::FrameError;
use rtutcp_transport::TransportError;

/// Errors returned by a request/response exchange.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connecting, writing, or setting the deadline failed.
    #[error("connection error: {0}")]
    Connection(#[from] TransportError),

    /// The reply could not be read or the request was malformed.
    #[error("response error: {0}")]
    Frame(#[from] FrameError),

    /// The background thread that closes idle connections could not start.
    #[error("failed to start idle timer: {0}")]
    IdleTimer(std::io::Error),
}

impl ClientError {
    /// A read or write deadline passed.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Connection(TransportError::TimedOut) | Self::Frame(FrameError::Timeout)
        )
    }

    /// The connection could not be established or written to.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(err) if !matches!(err, TransportError::TimedOut))
    }

    /// The stream ended part way through a reply.
    pub fn is_short_read(&self) -> bool {
        matches!(self, Self::Frame(FrameError::ShortRead { .. }))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
