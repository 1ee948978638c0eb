use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use rtutcp_frame::{RequestFrame, ResponseFrame, ResponseLength, StandardLength};
use rtutcp_transport::Drained;

use crate::config::HandlerConfig;
use crate::connection::Connection;
use crate::error::{ClientError, Result};

/// Sends an encoded RTU request and returns the raw reply.
///
/// The seam between a packager (which encodes requests and checks CRCs) and
/// whatever carries the bytes.
pub trait Transporter {
    fn send(&self, request: &[u8]) -> Result<ResponseFrame>;
}

/// Modbus RTU over TCP client handler.
///
/// One handler owns one connection. Exchanges are strictly serialized: the
/// connection lock is held from connect through the last byte of the reply,
/// since RTU has no transaction identifiers to match replies to requests.
/// The handler is `Send + Sync`; share it between threads with an `Arc`.
pub struct RtuOverTcpHandler {
    connection: Arc<Mutex<Connection>>,
    oracle: Box<dyn ResponseLength + Send + Sync>,
}

impl RtuOverTcpHandler {
    /// Handler for `address` (`host:port`) with default timeouts.
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_config(HandlerConfig::new(address))
    }

    pub fn with_config(config: HandlerConfig) -> Self {
        Self::with_oracle(config, StandardLength)
    }

    /// Handler that predicts normal-reply lengths with `oracle`.
    pub fn with_oracle<O>(config: HandlerConfig, oracle: O) -> Self
    where
        O: ResponseLength + Send + Sync + 'static,
    {
        Self {
            connection: Arc::new(Mutex::new(Connection::new(config))),
            oracle: Box::new(oracle),
        }
    }

    /// Send `request` and wait for the reply addressed from the same device.
    pub fn send(&self, request: &[u8]) -> Result<ResponseFrame> {
        let request = RequestFrame::new(Bytes::copy_from_slice(request))?;
        self.exchange(&request)
    }

    /// Run one request/response exchange.
    pub fn exchange(&self, request: &RequestFrame) -> Result<ResponseFrame> {
        let expected_len = self.oracle.expected_length(request.as_bytes());

        let mut conn = self.lock();
        conn.ensure_connected()?;
        if let Drained::PeerClosed(_) = conn.drain_stale() {
            conn.ensure_connected()?;
        }
        conn.start_idle_watcher(Arc::downgrade(&self.connection))
            .map_err(ClientError::IdleTimer)?;

        let started = conn.arm_idle_timer();
        conn.set_deadline(started)?;
        conn.send(request)?;
        conn.read_response(request, expected_len)
    }

    /// Open the connection now instead of on the first exchange.
    pub fn connect(&self) -> Result<()> {
        self.lock().ensure_connected().map(|_| ())
    }

    /// Close the connection. The next exchange reconnects.
    pub fn close(&self) -> bool {
        self.lock().close()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_connected()
    }

    /// Number of TCP connections opened over the handler's lifetime.
    pub fn connects(&self) -> u64 {
        self.lock().connects()
    }

    pub fn config(&self) -> HandlerConfig {
        self.lock().config().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transporter for RtuOverTcpHandler {
    fn send(&self, request: &[u8]) -> Result<ResponseFrame> {
        RtuOverTcpHandler::send(self, request)
    }
}

impl Drop for RtuOverTcpHandler {
    fn drop(&mut self) {
        let watcher = {
            let mut conn = self.lock();
            conn.close();
            conn.idle_timer().shutdown();
            conn.take_watcher()
        };
        if let Some(watcher) = watcher {
            let _ = watcher.join();
        }
    }
}

impl std::fmt::Debug for RtuOverTcpHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtuOverTcpHandler")
            .field("connection", &*self.lock())
            .finish()
    }
}
