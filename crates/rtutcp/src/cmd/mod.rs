use std::time::Duration;

use clap::{Args, Subcommand};
use rtutcp_client::{HandlerConfig, RtuOverTcpHandler};
use rtutcp_frame::RequestFrame;

use crate::exit::{frame_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod poll;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one request frame and print the reply.
    Send(SendArgs),
    /// Repeat one request frame at a fixed interval.
    Poll(PollArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Poll(args) => poll::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Device address (host:port).
    #[arg(env = "RTUTCP_ADDRESS")]
    pub address: String,
    /// Deadline for each exchange (e.g. 5s, 500ms; 0 disables).
    #[arg(long, env = "RTUTCP_TIMEOUT", default_value = "10s")]
    pub timeout: String,
    /// Close the connection after this much inactivity (0 disables).
    #[arg(long, env = "RTUTCP_IDLE_TIMEOUT", default_value = "60s")]
    pub idle_timeout: String,
}

impl ConnectionArgs {
    pub fn handler(&self) -> CliResult<RtuOverTcpHandler> {
        let config = HandlerConfig::new(self.address.as_str())
            .with_timeout(parse_duration(&self.timeout)?)
            .with_idle_timeout(parse_duration(&self.idle_timeout)?);
        Ok(RtuOverTcpHandler::with_config(config))
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Request frame as hex, CRC included (whitespace ignored).
    #[arg(long, short = 'f')]
    pub frame: String,
}

#[derive(Args, Debug)]
pub struct PollArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Request frame as hex, CRC included (whitespace ignored).
    #[arg(long, short = 'f')]
    pub frame: String,
    /// Pause between exchanges.
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Exit after N replies.
    #[arg(long)]
    pub count: Option<usize>,
    /// Keep polling after a failed exchange.
    #[arg(long)]
    pub keep_going: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Decode a hex request frame such as `01 03 00 00 00 01 84 0A`.
pub fn parse_frame(input: &str) -> CliResult<RequestFrame> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);
    let bytes = hex::decode(digits)
        .map_err(|err| CliError::new(USAGE, format!("--frame is not valid hex: {err}")))?;
    RequestFrame::new(bytes).map_err(|err| frame_error("invalid request frame", err))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
