//! Read holding registers from an RTU device behind a serial gateway.
//!
//! Run with:
//!   cargo run --example read-registers -- 192.168.1.50:4001 1 0 4
//!
//! Arguments: gateway address, unit id, start register, register count.

use std::time::Duration;

use rtutcp::{HandlerConfig, RtuOverTcpHandler};

fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for byte in data {
        crc ^= u16::from(*byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

fn read_holding_registers(unit: u8, start: u16, count: u16) -> Vec<u8> {
    let mut request = vec![unit, 0x03];
    request.extend_from_slice(&start.to_be_bytes());
    request.extend_from_slice(&count.to_be_bytes());
    let crc = crc16(&request);
    request.extend_from_slice(&crc.to_le_bytes());
    request
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let address = args.next().unwrap_or_else(|| "127.0.0.1:4001".to_string());
    let unit: u8 = args.next().as_deref().unwrap_or("1").parse()?;
    let start: u16 = args.next().as_deref().unwrap_or("0").parse()?;
    let count: u16 = args.next().as_deref().unwrap_or("1").parse()?;

    let handler = RtuOverTcpHandler::with_config(
        HandlerConfig::new(address).with_timeout(Duration::from_secs(2)),
    );

    let reply = handler.send(&read_holding_registers(unit, start, count))?;
    let body = reply.as_bytes();
    let (payload, crc) = body.split_at(body.len() - 2);
    if crc16(payload).to_le_bytes()[..] != *crc {
        return Err("reply failed CRC check".into());
    }
    if let Some(code) = reply.exception_code() {
        return Err(format!("device answered with exception 0x{code:02x}").into());
    }

    for (offset, pair) in payload[3..].chunks_exact(2).enumerate() {
        let value = u16::from_be_bytes([pair[0], pair[1]]);
        println!("register {}: {value}", usize::from(start) + offset);
    }
    Ok(())
}
