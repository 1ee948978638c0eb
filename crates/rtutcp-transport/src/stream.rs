//! TCP stream with a per-exchange absolute deadline.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, TransportError};

/// Default window for discarding stale bytes before a new exchange.
pub const DEFAULT_DRAIN_WINDOW: Duration = Duration::from_micros(100);

const DRAIN_CHUNK_SIZE: usize = 512;

/// Outcome of [`RtuStream::drain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drained {
    /// Nothing more arrived within the window; `n` bytes were discarded.
    Idle(usize),
    /// The peer closed its side; `n` bytes were discarded before EOF.
    PeerClosed(usize),
}

impl Drained {
    /// Number of bytes thrown away.
    pub fn discarded(&self) -> usize {
        match *self {
            Self::Idle(n) | Self::PeerClosed(n) => n,
        }
    }
}

/// A connected TCP stream carrying RTU frames. Implements Read + Write.
///
/// Reads and writes honour an absolute deadline (see [`RtuStream::set_deadline`])
/// rather than a per-call timeout, so several reads that assemble one reply
/// share a single time budget.
pub struct RtuStream {
    inner: TcpStream,
    address: String,
    deadline: Option<Instant>,
}

impl RtuStream {
    /// Connect to `address` (`host:port`).
    ///
    /// Every resolved socket address is tried in order. A zero
    /// `connect_timeout` blocks for as long as the OS allows.
    pub fn connect(address: &str, connect_timeout: Duration) -> Result<Self> {
        let candidates: Vec<SocketAddr> = address
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                address: address.to_string(),
                source,
            })?
            .collect();

        let mut last_err = None;
        for addr in &candidates {
            let attempt = if connect_timeout.is_zero() {
                TcpStream::connect(addr)
            } else {
                TcpStream::connect_timeout(addr, connect_timeout)
            };
            match attempt {
                Ok(stream) => {
                    debug!(%address, peer = %addr, "tcp connection established");
                    return Self::from_tcp(stream, address);
                }
                Err(err) => {
                    debug!(%address, peer = %addr, error = %err, "tcp connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            address: address.to_string(),
            source: last_err.unwrap_or_else(|| {
                io::Error::new(ErrorKind::AddrNotAvailable, "no socket addresses resolved")
            }),
        })
    }

    /// Wrap an already connected TCP stream.
    pub fn from_tcp(stream: TcpStream, address: impl Into<String>) -> Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            inner: stream,
            address: address.into(),
            deadline: None,
        })
    }

    /// The address string this stream was opened for.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Remote socket address, if the socket still knows it.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr().ok()
    }

    /// Set the absolute deadline for all following reads and writes.
    ///
    /// `None` removes the deadline. Once the deadline has passed every read
    /// and write fails with [`ErrorKind::TimedOut`].
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Current deadline.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Discard whatever the peer has already sent, waiting at most `window`.
    ///
    /// Best-effort: errors and timeouts simply end the drain. The deadline in
    /// effect before the call is restored afterwards. A window too large to
    /// represent as an instant leaves the drain unbounded; it then ends only
    /// on an error or when the peer closes.
    pub fn drain(&mut self, window: Duration) -> Drained {
        let window = if window.is_zero() {
            DEFAULT_DRAIN_WINDOW
        } else {
            window
        };
        let saved = std::mem::replace(&mut self.deadline, Instant::now().checked_add(window));

        let mut scratch = [0u8; DRAIN_CHUNK_SIZE];
        let mut discarded = 0usize;
        let outcome = loop {
            match self.read(&mut scratch) {
                Ok(0) => break Drained::PeerClosed(discarded),
                Ok(n) => discarded += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break Drained::Idle(discarded),
            }
        };

        self.deadline = saved;
        if discarded > 0 {
            debug!(address = %self.address, discarded, "discarded stale bytes");
        }
        outcome
    }

    /// Shut down both halves of the socket. Safe to call more than once.
    pub fn shutdown(&self) {
        if let Err(err) = self.inner.shutdown(Shutdown::Both) {
            if err.kind() != ErrorKind::NotConnected {
                debug!(address = %self.address, error = %err, "socket shutdown failed");
            }
        }
    }

    /// Time left until the deadline, or an error once it has passed.
    fn remaining(&self) -> io::Result<Option<Duration>> {
        match self.deadline {
            None => Ok(None),
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    Err(deadline_exceeded())
                } else {
                    Ok(Some(left))
                }
            }
        }
    }
}

impl Read for RtuStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let timeout = self.remaining()?;
        self.inner.set_read_timeout(timeout)?;
        self.inner.read(buf).map_err(socket_timeout_as_deadline)
    }
}

impl Write for RtuStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let timeout = self.remaining()?;
        self.inner.set_write_timeout(timeout)?;
        self.inner.write(buf).map_err(socket_timeout_as_deadline)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for RtuStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtuStream")
            .field("address", &self.address)
            .field("deadline", &self.deadline)
            .finish()
    }
}

fn deadline_exceeded() -> io::Error {
    io::Error::new(ErrorKind::TimedOut, "deadline exceeded")
}

// Unix reports an elapsed SO_RCVTIMEO/SO_SNDTIMEO as WouldBlock.
fn socket_timeout_as_deadline(err: io::Error) -> io::Error {
    match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => deadline_exceeded(),
        _ => err,
    }
}
