use std::time::Duration;

use rtutcp_transport::DEFAULT_DRAIN_WINDOW;
use serde::{Deserialize, Serialize};

/// Default bound on one exchange (write plus full reply).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default inactivity period after which the connection is closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for an [`RtuOverTcpHandler`](crate::RtuOverTcpHandler).
///
/// Durations serialize as integer milliseconds (`drain_window_us` as
/// microseconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Target `host:port`.
    pub address: String,
    /// Deadline applied to each exchange. Zero disables the deadline.
    #[serde(rename = "timeout_ms", with = "millis", default = "default_timeout")]
    pub timeout: Duration,
    /// Close the connection after this long without an exchange. Zero keeps
    /// it open indefinitely.
    #[serde(
        rename = "idle_timeout_ms",
        with = "millis",
        default = "default_idle_timeout"
    )]
    pub idle_timeout: Duration,
    /// Bound on establishing the TCP connection. Zero means "use `timeout`".
    #[serde(rename = "connect_timeout_ms", with = "millis", default)]
    pub connect_timeout: Duration,
    /// How long to wait for stale bytes before each exchange.
    #[serde(
        rename = "drain_window_us",
        with = "micros",
        default = "default_drain_window"
    )]
    pub drain_window: Duration,
}

impl HandlerConfig {
    /// Configuration for `address` with default timeouts.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: DEFAULT_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            connect_timeout: Duration::ZERO,
            drain_window: DEFAULT_DRAIN_WINDOW,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_drain_window(mut self, drain_window: Duration) -> Self {
        self.drain_window = drain_window;
        self
    }

    /// Timeout used when opening the connection.
    pub fn effective_connect_timeout(&self) -> Duration {
        if self.connect_timeout.is_zero() {
            self.timeout
        } else {
            self.connect_timeout
        }
    }
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_idle_timeout() -> Duration {
    DEFAULT_IDLE_TIMEOUT
}

fn default_drain_window() -> Duration {
    DEFAULT_DRAIN_WINDOW
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod micros {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_micros()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_micros)
    }
}
