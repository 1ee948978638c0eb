use std::io::{IsTerminal, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rtutcp_frame::{function, HexDump, ResponseFrame};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ResponseOutput {
    address: u8,
    function: u8,
    function_name: &'static str,
    exception: Option<u8>,
    size: usize,
    frame: String,
    elapsed_ms: u64,
    timestamp: String,
}

impl ResponseOutput {
    fn new(frame: &ResponseFrame, elapsed: Duration) -> Self {
        Self {
            address: frame.address(),
            function: frame.function(),
            function_name: function_name(frame.function()),
            exception: frame.exception_code(),
            size: frame.len(),
            frame: hex::encode(frame.as_bytes()),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_response(frame: &ResponseFrame, elapsed: Duration, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ResponseOutput::new(frame, elapsed);
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let out = ResponseOutput::new(frame, elapsed);
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDRESS", "FUNCTION", "EXCEPTION", "SIZE", "TIME", "FRAME"])
                .add_row(vec![
                    out.address.to_string(),
                    format!("0x{:02x} {}", out.function, out.function_name),
                    out.exception
                        .map(|code| format!("0x{code:02x}"))
                        .unwrap_or_else(|| "-".to_string()),
                    out.size.to_string(),
                    format!("{}ms", out.elapsed_ms),
                    HexDump(frame.as_bytes()).to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let exception = frame
                .exception_code()
                .map(|code| format!(" exception=0x{code:02x}"))
                .unwrap_or_default();
            println!(
                "address={} function=0x{:02x} ({}){} size={} time={}ms frame={}",
                frame.address(),
                frame.function(),
                function_name(frame.function()),
                exception,
                frame.len(),
                elapsed.as_millis(),
                HexDump(frame.as_bytes())
            );
        }
        OutputFormat::Raw => {
            print_raw(frame.as_bytes());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn function_name(code: u8) -> &'static str {
    match code & !rtutcp_frame::EXCEPTION_BIT {
        function::READ_COILS => "READ_COILS",
        function::READ_DISCRETE_INPUTS => "READ_DISCRETE_INPUTS",
        function::READ_HOLDING_REGISTERS => "READ_HOLDING_REGISTERS",
        function::READ_INPUT_REGISTERS => "READ_INPUT_REGISTERS",
        function::WRITE_SINGLE_COIL => "WRITE_SINGLE_COIL",
        function::WRITE_SINGLE_REGISTER => "WRITE_SINGLE_REGISTER",
        function::WRITE_MULTIPLE_COILS => "WRITE_MULTIPLE_COILS",
        function::WRITE_MULTIPLE_REGISTERS => "WRITE_MULTIPLE_REGISTERS",
        function::MASK_WRITE_REGISTER => "MASK_WRITE_REGISTER",
        function::READ_WRITE_MULTIPLE_REGISTERS => "READ_WRITE_MULTIPLE_REGISTERS",
        function::READ_FIFO_QUEUE => "READ_FIFO_QUEUE",
        _ => "UNKNOWN",
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
