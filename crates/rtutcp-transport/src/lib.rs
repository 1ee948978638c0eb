//! TCP stream transport for Modbus RTU over TCP.
//!
//! RTU frames carry no length prefix, so the layers above read a reply in
//! several blocking steps. This crate gives them a stream whose reads and
//! writes share one absolute deadline per exchange, plus a best-effort
//! primitive for discarding stale bytes left over from an earlier exchange.
//!
//! This is the lowest layer of rtutcp. Everything else builds on top of
//! the [`RtuStream`] type provided here.

pub mod error;
pub mod stream;

pub use error::{is_disconnect_kind, Result, TransportError};
pub use stream::{Drained, RtuStream, DEFAULT_DRAIN_WINDOW};
