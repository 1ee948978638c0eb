//! Response framing for Modbus RTU frames carried over a byte stream.
//!
//! On a serial line an RTU frame ends when the line goes quiet. Over TCP
//! there is no such gap and no length prefix either, so the end of a reply
//! is inferred from protocol semantics:
//! - the minimum RTU frame size (address + function + CRC16)
//! - the reply length predicted from the request (normal replies)
//! - the fixed size of exception replies
//! - the echoed device address, which rejects stray frames
//!
//! Callers hand in an encoded request and get back a complete reply. CRC
//! checking and PDU decoding belong to the layer above.

pub mod codec;
pub mod error;
pub mod function;
pub mod length;
pub mod reader;

pub use codec::{
    HexDump, RequestFrame, ResponseFrame, EXCEPTION_BIT, RTU_EXCEPTION_SIZE, RTU_MAX_SIZE,
    RTU_MIN_SIZE, WIRE_TARGET,
};
pub use error::{FrameError, Result};
pub use length::{expected_response_length, ResponseLength, StandardLength};
pub use reader::ResponseReader;
