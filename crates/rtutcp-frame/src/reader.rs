//! Response framing.
//!
//! A reply is complete once the predicted number of bytes has arrived;
//! frames from other devices on the same bus are skipped.

use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::debug;

use crate::codec::{
    HexDump, RequestFrame, ResponseFrame, RTU_EXCEPTION_SIZE, RTU_MAX_SIZE, RTU_MIN_SIZE,
    WIRE_TARGET,
};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 2 * RTU_MAX_SIZE;
const READ_CHUNK_SIZE: usize = RTU_MAX_SIZE;

/// How the function byte of a received frame relates to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Normal,
    Exception,
    Foreign,
}

/// Reads RTU replies from any `Read` stream.
///
/// Handles partial reads internally and skips frames addressed to other
/// devices. Bytes read past the end of a frame stay buffered for the next
/// frame; [`ResponseReader::discard_buffered`] drops them. After a skipped
/// frame the buffer is cut back to the next position that looks like the
/// start of our reply, so the tail of a long stray frame is never mistaken
/// for a frame of its own.
///
/// The loop has no iteration cap. It ends when a frame for the requested
/// address is assembled or when the stream reports an error, which for a
/// deadline-bound stream means once the exchange deadline passes.
pub struct ResponseReader<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Read> ResponseReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Read the reply to `request` (blocking).
    ///
    /// `expected_len` is the predicted size of a normal reply. Exception
    /// replies are always [`RTU_EXCEPTION_SIZE`] bytes.
    pub fn read_response(
        &mut self,
        request: &RequestFrame,
        expected_len: usize,
    ) -> Result<ResponseFrame> {
        loop {
            self.fill(RTU_MIN_SIZE)?;

            let reply = self.classify(request);
            let frame_len = self.frame_len(reply, expected_len);
            self.fill(frame_len)?;

            let frame = self.buf.split_to(frame_len).freeze();
            debug!(target: WIRE_TARGET, bytes = %HexDump(&frame), "recv");

            if frame[0] == request.address() {
                return Ok(ResponseFrame::from_assembled(frame));
            }

            let skipped = self.resync(request);
            debug!(
                expected = request.address(),
                received = frame[0],
                ?reply,
                skipped,
                "discarding frame addressed to another device"
            );
        }
    }

    /// Drop any bytes buffered beyond the last returned frame.
    pub fn discard_buffered(&mut self) -> usize {
        let dropped = self.buf.len();
        self.buf.clear();
        dropped
    }

    /// Number of bytes buffered beyond the last returned frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn classify(&self, request: &RequestFrame) -> Reply {
        let function = self.buf[1];
        if function == request.function() {
            Reply::Normal
        } else if function == request.exception_function() {
            Reply::Exception
        } else {
            Reply::Foreign
        }
    }

    fn frame_len(&self, reply: Reply, expected_len: usize) -> usize {
        let everything_read = self.buf.len().min(RTU_MAX_SIZE);
        match reply {
            Reply::Normal if expected_len > RTU_MIN_SIZE && expected_len <= RTU_MAX_SIZE => {
                expected_len
            }
            Reply::Exception => RTU_EXCEPTION_SIZE,
            Reply::Normal | Reply::Foreign => everything_read,
        }
    }

    /// Drop buffered bytes up to the next plausible start of the reply.
    ///
    /// A stray frame can be longer than the length predicted for our reply,
    /// so what follows the bytes just split off may be the tail of that
    /// frame. Only a position holding the request address followed by the
    /// request function (or its exception form) is kept; a lone trailing
    /// address byte is kept too since its function byte is still in flight.
    fn resync(&mut self, request: &RequestFrame) -> usize {
        let address = request.address();
        let functions = [request.function(), request.exception_function()];
        let start = (0..self.buf.len())
            .find(|&at| {
                self.buf[at] == address
                    && self
                        .buf
                        .get(at + 1)
                        .is_none_or(|function| functions.contains(function))
            })
            .unwrap_or(self.buf.len());
        let _ = self.buf.split_to(start);
        start
    }

    /// Read until at least `target` bytes are buffered.
    fn fill(&mut self, target: usize) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while self.buf.len() < target {
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::from_read(err)),
            };

            if read == 0 {
                return Err(if self.buf.is_empty() {
                    FrameError::ConnectionClosed
                } else {
                    FrameError::ShortRead {
                        expected: target,
                        received: self.buf.len(),
                    }
                });
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{self, Cursor};

    use super::*;

    const READ_ONE_REGISTER: [u8; 8] = [0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A];
    const ONE_REGISTER_REPLY: [u8; 7] = [0x01, 0x03, 0x02, 0x00, 0x2A, 0x39, 0x9B];
    const STRAY_REPLY: [u8; 7] = [0x02, 0x03, 0x02, 0x00, 0x07, 0xFC, 0x46];
    const EXCEPTION_REPLY: [u8; 5] = [0x01, 0x83, 0x02, 0xC0, 0xF1];

    enum Step {
        Data(Vec<u8>),
        Fail(ErrorKind),
    }

    /// Delivers scripted chunks, then EOF.
    struct Script {
        steps: VecDeque<Step>,
    }

    impl Script {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                None => Ok(0),
                Some(Step::Fail(kind)) => Err(io::Error::from(kind)),
                Some(Step::Data(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.steps.push_front(Step::Data(data.split_off(n)));
                    }
                    Ok(n)
                }
            }
        }
    }

    fn request() -> RequestFrame {
        RequestFrame::new(READ_ONE_REGISTER.to_vec()).unwrap()
    }

    #[test]
    fn normal_reply_in_two_chunks() {
        let script = Script::new(vec![
            Step::Data(ONE_REGISTER_REPLY[..4].to_vec()),
            Step::Data(ONE_REGISTER_REPLY[4..].to_vec()),
        ]);
        let mut reader = ResponseReader::new(script);

        let frame = reader.read_response(&request(), 7).unwrap();
        assert_eq!(frame.as_bytes(), &ONE_REGISTER_REPLY);
    }

    #[test]
    fn exception_reply_ignores_predicted_length() {
        let script = Script::new(vec![Step::Data(EXCEPTION_REPLY.to_vec())]);
        let mut reader = ResponseReader::new(script);

        let frame = reader.read_response(&request(), 7).unwrap();
        assert_eq!(frame.as_bytes(), &EXCEPTION_REPLY);
        assert!(frame.is_exception());
        assert_eq!(frame.exception_code(), Some(0x02));
    }

    #[test]
    fn exception_reply_split_after_minimum() {
        let script = Script::new(vec![
            Step::Data(EXCEPTION_REPLY[..4].to_vec()),
            Step::Data(EXCEPTION_REPLY[4..].to_vec()),
        ]);
        let mut reader = ResponseReader::new(script);

        let frame = reader.read_response(&request(), 7).unwrap();
        assert_eq!(frame.len(), RTU_EXCEPTION_SIZE);
    }

    #[test]
    fn stray_frame_is_skipped() {
        let script = Script::new(vec![
            Step::Data(STRAY_REPLY.to_vec()),
            Step::Data(ONE_REGISTER_REPLY.to_vec()),
        ]);
        let mut reader = ResponseReader::new(script);

        let frame = reader.read_response(&request(), 7).unwrap();
        assert_eq!(frame.as_bytes(), &ONE_REGISTER_REPLY);
    }

    #[test]
    fn stray_and_reply_in_one_segment() {
        let mut wire = STRAY_REPLY.to_vec();
        wire.extend_from_slice(&ONE_REGISTER_REPLY);
        let mut reader = ResponseReader::new(Cursor::new(wire));

        let frame = reader.read_response(&request(), 7).unwrap();
        assert_eq!(frame.as_bytes(), &ONE_REGISTER_REPLY);
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn stray_longer_than_prediction_is_dropped_whole() {
        let stray = [0x02, 0x03, 0x04, 0x00, 0x01, 0x00, 0x02, 0xAA, 0xBB];
        let script = Script::new(vec![
            Step::Data(stray.to_vec()),
            Step::Data(ONE_REGISTER_REPLY.to_vec()),
            Step::Fail(ErrorKind::TimedOut),
        ]);
        let mut reader = ResponseReader::new(script);

        let frame = reader.read_response(&request(), 7).unwrap();
        assert_eq!(frame.as_bytes(), &ONE_REGISTER_REPLY);
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn long_stray_and_reply_in_one_segment() {
        let mut wire = vec![0x02, 0x03, 0x04, 0x00, 0x01, 0x00, 0x02, 0xAA, 0xBB];
        wire.extend_from_slice(&ONE_REGISTER_REPLY);
        let mut reader = ResponseReader::new(Cursor::new(wire));

        let frame = reader.read_response(&request(), 7).unwrap();
        assert_eq!(frame.as_bytes(), &ONE_REGISTER_REPLY);
    }

    #[test]
    fn several_strays_and_reply_in_one_segment() {
        let mut wire = STRAY_REPLY.to_vec();
        wire.extend_from_slice(&[0x05, 0x03, 0x06, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03, 0x11, 0x22]);
        wire.extend_from_slice(&ONE_REGISTER_REPLY);
        let mut reader = ResponseReader::new(Cursor::new(wire));

        let frame = reader.read_response(&request(), 7).unwrap();
        assert_eq!(frame.as_bytes(), &ONE_REGISTER_REPLY);
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn stray_exception_for_other_device_is_skipped() {
        let mut stray = EXCEPTION_REPLY;
        stray[0] = 0x07;
        let script = Script::new(vec![
            Step::Data(stray.to_vec()),
            Step::Data(ONE_REGISTER_REPLY.to_vec()),
        ]);
        let mut reader = ResponseReader::new(script);

        let frame = reader.read_response(&request(), 7).unwrap();
        assert_eq!(frame.as_bytes(), &ONE_REGISTER_REPLY);
    }

    #[test]
    fn only_stray_frames_before_deadline_times_out() {
        let script = Script::new(vec![
            Step::Data(STRAY_REPLY.to_vec()),
            Step::Data(STRAY_REPLY.to_vec()),
            Step::Fail(ErrorKind::TimedOut),
        ]);
        let mut reader = ResponseReader::new(script);

        let err = reader.read_response(&request(), 7).unwrap_err();
        assert!(matches!(err, FrameError::Timeout));
    }

    #[test]
    fn nothing_arrives_times_out() {
        let script = Script::new(vec![Step::Fail(ErrorKind::TimedOut)]);
        let mut reader = ResponseReader::new(script);

        let err = reader.read_response(&request(), 7).unwrap_err();
        assert!(matches!(err, FrameError::Timeout));
    }

    #[test]
    fn would_block_counts_as_timeout() {
        let script = Script::new(vec![
            Step::Data(ONE_REGISTER_REPLY[..5].to_vec()),
            Step::Fail(ErrorKind::WouldBlock),
        ]);
        let mut reader = ResponseReader::new(script);

        let err = reader.read_response(&request(), 7).unwrap_err();
        assert!(matches!(err, FrameError::Timeout));
    }

    #[test]
    fn eof_before_reply_is_connection_closed() {
        let mut reader = ResponseReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_response(&request(), 7).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn eof_inside_minimum_is_short_read() {
        let mut reader = ResponseReader::new(Cursor::new(vec![0x01, 0x03]));
        let err = reader.read_response(&request(), 7).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ShortRead {
                expected: 4,
                received: 2
            }
        ));
    }

    #[test]
    fn eof_inside_remainder_is_short_read() {
        let mut reader = ResponseReader::new(Cursor::new(ONE_REGISTER_REPLY[..5].to_vec()));
        let err = reader.read_response(&request(), 7).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ShortRead {
                expected: 7,
                received: 5
            }
        ));
    }

    #[test]
    fn other_io_errors_propagate() {
        let script = Script::new(vec![Step::Fail(ErrorKind::ConnectionReset)]);
        let mut reader = ResponseReader::new(script);

        let err = reader.read_response(&request(), 7).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::ConnectionReset));
    }

    #[test]
    fn out_of_bounds_prediction_keeps_first_read() {
        let script = Script::new(vec![
            Step::Data(ONE_REGISTER_REPLY[..4].to_vec()),
            Step::Data(ONE_REGISTER_REPLY[4..].to_vec()),
        ]);
        let mut reader = ResponseReader::new(script);

        let frame = reader.read_response(&request(), RTU_MAX_SIZE + 1).unwrap();
        assert_eq!(frame.as_bytes(), &ONE_REGISTER_REPLY[..4]);
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn undetermined_prediction_keeps_everything_read() {
        let script = Script::new(vec![Step::Data(ONE_REGISTER_REPLY.to_vec())]);
        let mut reader = ResponseReader::new(script);

        let frame = reader.read_response(&request(), RTU_MIN_SIZE).unwrap();
        assert_eq!(frame.as_bytes(), &ONE_REGISTER_REPLY);
    }

    #[test]
    fn unexpected_function_from_target_is_returned() {
        let reply = [0x01, 0x04, 0x02, 0x00, 0x01, 0x78, 0xF0];
        let mut reader = ResponseReader::new(Cursor::new(reply.to_vec()));

        let frame = reader.read_response(&request(), 7).unwrap();
        assert_eq!(frame.as_bytes(), &reply);
    }

    #[test]
    fn bytes_past_frame_stay_buffered() {
        let mut wire = ONE_REGISTER_REPLY.to_vec();
        wire.extend_from_slice(&[0xDE, 0xAD]);
        let mut reader = ResponseReader::new(Cursor::new(wire));

        let frame = reader.read_response(&request(), 7).unwrap();
        assert_eq!(frame.as_bytes(), &ONE_REGISTER_REPLY);
        assert_eq!(reader.buffered(), 2);
        assert_eq!(reader.discard_buffered(), 2);
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn byte_by_byte_delivery() {
        let steps = ONE_REGISTER_REPLY
            .iter()
            .map(|b| Step::Data(vec![*b]))
            .collect();
        let mut reader = ResponseReader::new(Script::new(steps));

        let frame = reader.read_response(&request(), 7).unwrap();
        assert_eq!(frame.as_bytes(), &ONE_REGISTER_REPLY);
    }

    #[test]
    fn interrupted_read_retries() {
        let script = Script::new(vec![
            Step::Fail(ErrorKind::Interrupted),
            Step::Data(ONE_REGISTER_REPLY.to_vec()),
        ]);
        let mut reader = ResponseReader::new(script);

        let frame = reader.read_response(&request(), 7).unwrap();
        assert_eq!(frame.as_bytes(), &ONE_REGISTER_REPLY);
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = ResponseReader::new(Cursor::new(Vec::<u8>::new()));

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }
}
