//! Lifecycle of the single device connection.
//!
//! Connects lazily and tears the socket down when the peer goes away or
//! the connection sits idle.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rtutcp_frame::{
    FrameError, HexDump, RequestFrame, ResponseFrame, ResponseReader, WIRE_TARGET,
};
use rtutcp_transport::{is_disconnect_kind, Drained, RtuStream, TransportError};
use tracing::{debug, info};

use crate::config::HandlerConfig;
use crate::error::Result;
use crate::idle::{spawn_watcher, IdleTimer};

/// Owns the single TCP connection to an RTU-over-TCP device.
///
/// Opens the connection lazily, discards stale bytes before each exchange,
/// keeps the idle timer armed, and closes the socket when the peer goes away
/// or the connection sits idle. Callers serialize access through a mutex;
/// see [`RtuOverTcpHandler`](crate::RtuOverTcpHandler).
pub struct Connection {
    config: HandlerConfig,
    reader: Option<ResponseReader<RtuStream>>,
    last_activity: Option<Instant>,
    idle_timer: Arc<IdleTimer>,
    watcher: Option<JoinHandle<()>>,
    connects: u64,
}

impl Connection {
    pub fn new(config: HandlerConfig) -> Self {
        Self {
            config,
            reader: None,
            last_activity: None,
            idle_timer: Arc::new(IdleTimer::new()),
            watcher: None,
            connects: 0,
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    /// Number of TCP connections opened so far.
    pub fn connects(&self) -> u64 {
        self.connects
    }

    /// When the last exchange started.
    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    /// Time since the last exchange started.
    pub fn idle_for(&self) -> Option<Duration> {
        self.last_activity.map(|at| at.elapsed())
    }

    pub fn idle_timer(&self) -> &Arc<IdleTimer> {
        &self.idle_timer
    }

    /// Open the connection if none is open. Returns `true` when a new
    /// connection was made.
    pub fn ensure_connected(&mut self) -> Result<bool> {
        if self.reader.is_some() {
            return Ok(false);
        }

        let stream = RtuStream::connect(
            &self.config.address,
            self.config.effective_connect_timeout(),
        )?;
        self.connects += 1;
        info!(address = %self.config.address, "connected");
        self.reader = Some(ResponseReader::new(stream));
        Ok(true)
    }

    /// Throw away bytes left over from an earlier exchange.
    ///
    /// Never fails. If the peer turns out to have closed the connection the
    /// handle is dropped so the caller can reconnect.
    pub fn drain_stale(&mut self) -> Drained {
        let Some(reader) = self.reader.as_mut() else {
            return Drained::Idle(0);
        };

        let buffered = reader.discard_buffered();
        let drained = reader.get_mut().drain(self.config.drain_window);
        if buffered > 0 {
            debug!(discarded = buffered, "discarded buffered bytes from previous exchange");
        }

        if let Drained::PeerClosed(_) = drained {
            debug!(address = %self.config.address, "peer closed connection while idle");
            self.close();
        }
        drained
    }

    /// Record activity now and re-arm the idle timer. Returns the instant
    /// recorded, which also anchors the exchange deadline.
    pub fn arm_idle_timer(&mut self) -> Instant {
        let now = Instant::now();
        self.last_activity = Some(now);
        if !self.config.idle_timeout.is_zero() {
            self.idle_timer.arm(self.config.idle_timeout);
        }
        now
    }

    /// Make sure the thread that fires the idle timer is running.
    pub(crate) fn start_idle_watcher(&mut self, this: Weak<Mutex<Connection>>) -> io::Result<()> {
        if self.config.idle_timeout.is_zero() || self.watcher.is_some() {
            return Ok(());
        }
        self.watcher = Some(spawn_watcher(Arc::clone(&self.idle_timer), this)?);
        Ok(())
    }

    pub(crate) fn take_watcher(&mut self) -> Option<JoinHandle<()>> {
        self.watcher.take()
    }

    /// Bound all following I/O by the configured timeout, counted from `from`.
    ///
    /// A zero timeout, or one too large to represent as an instant, leaves
    /// the exchange without a deadline.
    pub fn set_deadline(&mut self, from: Instant) -> Result<()> {
        let reader = self.reader.as_mut().ok_or(TransportError::Closed)?;
        let deadline = if self.config.timeout.is_zero() {
            None
        } else {
            from.checked_add(self.config.timeout)
        };
        reader.get_mut().set_deadline(deadline);
        Ok(())
    }

    /// Write the whole request.
    pub fn send(&mut self, request: &RequestFrame) -> Result<()> {
        let reader = self.reader.as_mut().ok_or(TransportError::Closed)?;
        debug!(target: WIRE_TARGET, bytes = %HexDump(request.as_bytes()), "send");

        let written = reader
            .get_mut()
            .write_all(request.as_bytes())
            .and_then(|()| reader.get_mut().flush());
        if let Err(err) = written {
            let err = TransportError::from_io(err);
            if err.is_disconnect() {
                self.close();
            }
            return Err(err.into());
        }
        Ok(())
    }

    /// Read the reply to `request`.
    pub fn read_response(
        &mut self,
        request: &RequestFrame,
        expected_len: usize,
    ) -> Result<ResponseFrame> {
        let reader = self.reader.as_mut().ok_or(TransportError::Closed)?;
        match reader.read_response(request, expected_len) {
            Ok(frame) => Ok(frame),
            Err(err) => {
                if peer_gone(&err) {
                    self.close();
                }
                Err(err.into())
            }
        }
    }

    /// Close the connection if the idle timer generation `generation` is
    /// still current and nothing has happened for the idle timeout.
    pub fn close_if_idle(&mut self, generation: u64) -> bool {
        if !self.idle_timer.is_current(generation) {
            debug!("idle timer re-armed before firing");
            return false;
        }
        match self.idle_for() {
            Some(idle) if idle >= self.config.idle_timeout => {
                debug!(address = %self.config.address, ?idle, "closing idle connection");
                self.close()
            }
            _ => false,
        }
    }

    /// Close the connection and cancel the idle timer. Returns `true` if a
    /// connection was open.
    pub fn close(&mut self) -> bool {
        self.idle_timer.cancel();
        match self.reader.take() {
            Some(reader) => {
                reader.get_ref().shutdown();
                debug!(address = %self.config.address, "connection closed");
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.config.address)
            .field("connected", &self.is_connected())
            .field("last_activity", &self.last_activity)
            .field("connects", &self.connects)
            .finish()
    }
}

// The reply stream is unusable after these; timeouts keep the connection.
fn peer_gone(err: &FrameError) -> bool {
    match err {
        FrameError::ConnectionClosed | FrameError::ShortRead { .. } => true,
        FrameError::Io(io) => is_disconnect_kind(io.kind()),
        _ => false,
    }
}
