//! Modbus RTU framing over TCP streams.
//!
//! Many serial-to-Ethernet gateways forward raw RTU frames over a TCP
//! socket. rtutcp carries those frames: it connects on demand, drops the
//! connection after a period of inactivity, lets one request/response
//! exchange run at a time, and reassembles each reply from the request's
//! function code and address, since RTU frames carry no length field.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP stream with per-exchange deadlines
//! - [`frame`]: RTU frame types, reply length prediction, response framing
//! - [`client`]: Connection lifecycle, idle timer, serialized exchanges
//!
//! ```no_run
//! use rtutcp::RtuOverTcpHandler;
//!
//! let handler = RtuOverTcpHandler::new("192.168.1.50:4001");
//! // Read one holding register at 0x0000 from device 1.
//! let reply = handler.send(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A])?;
//! println!("{} bytes from device {}", reply.len(), reply.address());
//! # Ok::<(), rtutcp::ClientError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use rtutcp_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rtutcp_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use rtutcp_client::*;
}

pub use rtutcp_client::{ClientError, HandlerConfig, RtuOverTcpHandler, Transporter};
pub use rtutcp_frame::{RequestFrame, ResponseFrame, ResponseLength, StandardLength};
