//! Connection lifecycle and exchange serialization for Modbus RTU over TCP.
//!
//! This is the layer a packager talks to. Hand [`RtuOverTcpHandler::send`]
//! an encoded RTU request and get back the matching reply; the handler
//! connects on demand, discards stale bytes, bounds every exchange with one
//! deadline, closes the socket after a period of inactivity, and lets only
//! one exchange use the connection at a time.

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod idle;

pub use config::{HandlerConfig, DEFAULT_IDLE_TIMEOUT, DEFAULT_TIMEOUT};
pub use connection::Connection;
pub use error::{ClientError, Result};
pub use handler::{RtuOverTcpHandler, Transporter};
pub use idle::IdleTimer;
