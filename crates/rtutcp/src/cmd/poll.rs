use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::cmd::{parse_duration, parse_frame, PollArgs};
use crate::exit::{client_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_response, OutputFormat};

const SLEEP_SLICE: Duration = Duration::from_millis(50);

pub fn run(args: PollArgs, format: OutputFormat) -> CliResult<i32> {
    let request = parse_frame(&args.frame)?;
    let interval = parse_duration(&args.interval)?;
    let handler = args.connection.handler()?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        match handler.exchange(&request) {
            Ok(reply) => {
                print_response(&reply, started.elapsed(), format);
                printed = printed.saturating_add(1);
            }
            Err(err) if args.keep_going => {
                warn!(error = %err, "exchange failed");
            }
            Err(err) => return Err(client_error("exchange failed", err)),
        }

        if let Some(count) = args.count {
            if printed >= count {
                return Ok(SUCCESS);
            }
        }

        pause(interval, &running);
    }

    Ok(SUCCESS)
}

// An interval past the representable range waits until Ctrl-C.
fn pause(interval: Duration, running: &AtomicBool) {
    let until = Instant::now().checked_add(interval);
    while running.load(Ordering::SeqCst) {
        let slice = match until {
            Some(until) => until.saturating_duration_since(Instant::now()),
            None => SLEEP_SLICE,
        };
        if slice.is_zero() {
            break;
        }
        thread::sleep(slice.min(SLEEP_SLICE));
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
