//! stderr logging for the CLI.
//!
//! Request and reply dumps are logged under [`WIRE_TARGET`] and can be
//! switched on with `--wire` independently of `--log-level`, so frames can be
//! watched without the connection chatter that comes with `debug`.

use clap::ValueEnum;
use rtutcp_frame::WIRE_TARGET;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

fn targets(level: LogLevel, wire: bool) -> Targets {
    let targets = Targets::new().with_default(LevelFilter::from(level));
    if wire {
        targets.with_target(WIRE_TARGET, LevelFilter::DEBUG)
    } else {
        targets
    }
}

pub fn init_logging(format: LogFormat, level: LogLevel, wire: bool) {
    let registry = tracing_subscriber::registry().with(targets(level, wire));
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false);

    // A subscriber may already be set (tests); keep it.
    let _ = match format {
        LogFormat::Text => registry.with(layer).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
}
