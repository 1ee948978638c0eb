use std::time::Instant;

use crate::cmd::{parse_frame, SendArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let request = parse_frame(&args.frame)?;
    let handler = args.connection.handler()?;

    let started = Instant::now();
    let reply = handler
        .exchange(&request)
        .map_err(|err| client_error("exchange failed", err))?;
    print_response(&reply, started.elapsed(), format);

    Ok(SUCCESS)
}
