#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Serial gateway stand-in: reads 8-byte requests and answers through
/// `respond`, one thread per accepted connection.
pub struct Gateway {
    addr: SocketAddr,
    accepts: Arc<AtomicUsize>,
}

impl Gateway {
    pub fn spawn<F>(respond: F) -> Self
    where
        F: Fn(&[u8; 8], &mut TcpStream) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("local addr");
        let accepts = Arc::new(AtomicUsize::new(0));
        let respond = Arc::new(respond);

        {
            let accepts = Arc::clone(&accepts);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { break };
                    accepts.fetch_add(1, Ordering::SeqCst);
                    let respond = Arc::clone(&respond);
                    thread::spawn(move || {
                        let mut request = [0u8; 8];
                        while stream.read_exact(&mut request).is_ok() {
                            respond(&request, &mut stream);
                        }
                    });
                }
            });
        }

        Self { addr, accepts }
    }

    /// A gateway that accepts connections and never answers.
    pub fn silent() -> Self {
        Self::spawn(|_, _| {})
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }
}

/// Write `bytes` in `chunk`-sized segments with a short pause between them.
pub fn write_chunked(stream: &mut TcpStream, bytes: &[u8], chunk: usize) {
    for piece in bytes.chunks(chunk) {
        if stream.write_all(piece).is_err() {
            return;
        }
        let _ = stream.flush();
        thread::sleep(Duration::from_millis(2));
    }
}

/// Reply the way a small RTU device would, without a real CRC.
///
/// Supports read coils, read holding registers, and write single register;
/// anything else gets an illegal-function exception.
pub fn device_reply(request: &[u8; 8]) -> Vec<u8> {
    let address = request[0];
    let function = request[1];
    let quantity = u16::from_be_bytes([request[4], request[5]]) as usize;
    let mut reply = vec![address, function];
    match function {
        0x01 => {
            let count = quantity.div_ceil(8);
            reply.push(count as u8);
            reply.extend((0..count).map(|i| 0xA0 | i as u8));
        }
        0x03 => {
            reply.push((quantity * 2) as u8);
            for register in 0..quantity {
                reply.extend_from_slice(&(register as u16 + 100).to_be_bytes());
            }
        }
        0x06 => reply.extend_from_slice(&request[2..6]),
        _ => {
            reply[1] = function | 0x80;
            reply.push(0x01);
        }
    }
    reply.extend_from_slice(&[0xCC, 0xDD]);
    reply
}
