use std::fmt;

use bytes::Bytes;

use crate::error::{FrameError, Result};

/// Smallest RTU frame: address (1) + function (1) + CRC16 (2).
pub const RTU_MIN_SIZE: usize = 4;

/// Largest RTU frame (RS-485 ADU limit).
pub const RTU_MAX_SIZE: usize = 256;

/// Exception reply: address (1) + function | 0x80 (1) + code (1) + CRC16 (2).
pub const RTU_EXCEPTION_SIZE: usize = 5;

/// Set on the echoed function code of an exception reply.
pub const EXCEPTION_BIT: u8 = 0x80;

/// `tracing` target of the `send` / `recv` frame dumps.
pub const WIRE_TARGET: &str = "rtutcp::wire";

/// An encoded RTU request, as produced by the packager.
///
/// Opaque apart from the first two bytes:
/// ```text
/// ┌──────────┬──────────┬──────────────────────┐
/// │ Address  │ Function │ Data + CRC16         │
/// │ (1B)     │ (1B)     │                      │
/// └──────────┴──────────┴──────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    bytes: Bytes,
}

impl RequestFrame {
    /// Wrap an encoded request. Must hold at least address and function code.
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < 2 || bytes.len() > RTU_MAX_SIZE {
            return Err(FrameError::InvalidRequest { len: bytes.len() });
        }
        Ok(Self { bytes })
    }

    /// Target device address.
    pub fn address(&self) -> u8 {
        self.bytes[0]
    }

    /// Requested function code.
    pub fn function(&self) -> u8 {
        self.bytes[1]
    }

    /// The function byte an exception reply to this request carries.
    pub fn exception_function(&self) -> u8 {
        self.function() | EXCEPTION_BIT
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl AsRef<[u8]> for RequestFrame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// A complete reply whose address matched the request.
///
/// CRC and PDU are not checked here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    bytes: Bytes,
}

impl ResponseFrame {
    /// Wrap a reply obtained outside [`ResponseReader`](crate::ResponseReader),
    /// such as a canned reply from a stand-in transport or a recorded capture.
    ///
    /// The length must lie within the RTU frame size bounds, otherwise
    /// [`FrameError::InvalidResponse`] is returned.
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < RTU_MIN_SIZE || bytes.len() > RTU_MAX_SIZE {
            return Err(FrameError::InvalidResponse { len: bytes.len() });
        }
        Ok(Self { bytes })
    }

    pub(crate) fn from_assembled(bytes: Bytes) -> Self {
        debug_assert!(bytes.len() >= RTU_MIN_SIZE);
        Self { bytes }
    }

    /// Responding device address.
    pub fn address(&self) -> u8 {
        self.bytes[0]
    }

    /// Echoed function code, exception bit included.
    pub fn function(&self) -> u8 {
        self.bytes[1]
    }

    pub fn is_exception(&self) -> bool {
        self.function() & EXCEPTION_BIT != 0
    }

    /// Exception code carried by an exception reply.
    pub fn exception_code(&self) -> Option<u8> {
        if self.is_exception() {
            self.bytes.get(2).copied()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl AsRef<[u8]> for ResponseFrame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Renders bytes as lowercase hex pairs separated by single spaces.
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
