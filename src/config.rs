//! Configuration for the load harness.
//!
//! Everything is read once at startup from environment variables. Missing,
//! empty or unparsable values fall back to the documented default, so
//! loading never fails.

use std::str::FromStr;
use std::time::Duration;

use crate::client::ByteCapacity;

/// Default stream name.
pub const DEFAULT_STREAM: &str = "rust-stream-client-app";

/// Prefix used for client-provided producer and consumer names.
pub const DEFAULT_CLIENT_NAME_PREFIX: &str = "rust";

/// Default stream retention, in gigabytes.
pub const DEFAULT_MAX_LENGTH_GB: u64 = 5;

/// Per-client connection multiplexing limits.
///
/// These bound how many producers or consumers the client library may
/// share on one broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    /// Maximum producers per connection.
    ///
    /// Default: 1
    pub max_producers_per_client: u8,

    /// Maximum consumers per connection.
    ///
    /// Default: 1
    pub max_consumers_per_client: u8,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_producers_per_client: 1,
            max_consumers_per_client: 1,
        }
    }
}

impl ConnectionLimits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_producers_per_client: u8, max_consumers_per_client: u8) -> Self {
        Self {
            max_producers_per_client,
            max_consumers_per_client,
        }
    }
}

/// Timing knobs for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    /// Interval between statistics lines. Must be non-zero.
    ///
    /// Default: 5 seconds
    pub stats_interval: Duration,

    /// Pause after declaring the stream so it is available cluster-wide.
    ///
    /// Default: 3 seconds
    pub stream_settle: Duration,

    /// Producer throttle, applied once every 1000 sends.
    ///
    /// Zero disables throttling. Default: 100 ms
    pub send_delay: Duration,

    /// Upper bound on waiting for outstanding confirmations at shutdown.
    ///
    /// Default: 10 seconds
    pub drain_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            stats_interval: Duration::from_secs(5),
            stream_settle: Duration::from_secs(3),
            send_delay: Duration::from_millis(100),
            drain_timeout: Duration::from_secs(10),
        }
    }
}

impl Timings {
    /// Timings with no pauses at all, for tests and dry runs.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            stats_interval: Duration::from_secs(5),
            stream_settle: Duration::ZERO,
            send_delay: Duration::ZERO,
            drain_timeout: Duration::ZERO,
        }
    }
}

/// Immutable run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Broker host.
    pub host: String,
    /// Broker stream-protocol port.
    pub port: u16,
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
    /// Virtual host.
    pub virtual_host: String,
    /// Connect through a load balancer (advertised host checks on).
    pub load_balancer: bool,

    /// Stream all workers publish to and consume from.
    pub stream: String,
    /// Retention bound for the declared stream.
    pub max_length: ByteCapacity,
    /// Prefix for client-provided handle names.
    pub client_name_prefix: String,

    /// Number of producer workers.
    pub producers: usize,
    /// Messages each producer sends.
    pub messages_per_producer: u64,
    /// Number of consumer workers.
    pub consumers: usize,

    /// Connection multiplexing limits.
    pub limits: ConnectionLimits,
    /// Timing knobs.
    pub timings: Timings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5552,
            username: "guest".to_string(),
            password: "guest".to_string(),
            virtual_host: "/".to_string(),
            load_balancer: false,
            stream: DEFAULT_STREAM.to_string(),
            max_length: ByteCapacity::GB(DEFAULT_MAX_LENGTH_GB),
            client_name_prefix: DEFAULT_CLIENT_NAME_PREFIX.to_string(),
            producers: 2,
            messages_per_producer: 500_000,
            consumers: 10,
            limits: ConnectionLimits::default(),
            timings: Timings::default(),
        }
    }
}

impl Config {
    /// Create a configuration with every default applied.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset, and values that fail to parse
    /// keep the default.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let defaults = Self::default();
        let limit_defaults = defaults.limits;
        let timing_defaults = defaults.timings.clone();

        Self {
            host: env.string("RABBITMQ_HOST", &defaults.host),
            port: env.parsed("RABBITMQ_PORT", defaults.port),
            username: env.string("RABBITMQ_USERNAME", &defaults.username),
            password: env.string("RABBITMQ_PASSWORD", &defaults.password),
            virtual_host: env.string("RABBITMQ_VHOST", &defaults.virtual_host),
            load_balancer: env.flag("RABBITMQ_LOAD_BALANCER", defaults.load_balancer),
            stream: env.string("STREAM_APP_STREAM", &defaults.stream),
            max_length: ByteCapacity::GB(
                env.parsed("STREAM_APP_MAX_LENGTH_GB", DEFAULT_MAX_LENGTH_GB),
            ),
            client_name_prefix: defaults.client_name_prefix,
            producers: env.parsed("STREAM_APP_PRODUCERS", defaults.producers),
            messages_per_producer: env.parsed(
                "STREAM_APP_MESSAGES_PER_PRODUCER",
                defaults.messages_per_producer,
            ),
            consumers: env.parsed("STREAM_APP_CONSUMERS", defaults.consumers),
            limits: ConnectionLimits {
                max_producers_per_client: env.parsed(
                    "STREAM_APP_PRODUCERS_PER_CONNECTION",
                    limit_defaults.max_producers_per_client,
                ),
                max_consumers_per_client: env.parsed(
                    "STREAM_APP_CONSUMERS_PER_CONNECTION",
                    limit_defaults.max_consumers_per_client,
                ),
            },
            timings: Timings {
                stats_interval: env.nonzero_secs(
                    "STREAM_APP_STATS_INTERVAL_SECS",
                    timing_defaults.stats_interval,
                ),
                stream_settle: env.secs(
                    "STREAM_APP_STREAM_SETTLE_SECS",
                    timing_defaults.stream_settle,
                ),
                send_delay: env.millis("STREAM_APP_SEND_DELAY_MS", timing_defaults.send_delay),
                drain_timeout: env.secs(
                    "STREAM_APP_DRAIN_TIMEOUT_SECS",
                    timing_defaults.drain_timeout,
                ),
            },
        }
    }

    /// Set the stream name.
    #[must_use]
    pub fn with_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = stream.into();
        self
    }

    /// Set producer count and messages per producer.
    #[must_use]
    pub const fn with_producers(mut self, producers: usize, messages_per_producer: u64) -> Self {
        self.producers = producers;
        self.messages_per_producer = messages_per_producer;
        self
    }

    /// Set consumer count.
    #[must_use]
    pub const fn with_consumers(mut self, consumers: usize) -> Self {
        self.consumers = consumers;
        self
    }

    /// Set connection multiplexing limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: ConnectionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set timing knobs.
    #[must_use]
    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Client-provided name for producer `id`.
    #[must_use]
    pub fn producer_name(&self, id: usize) -> String {
        format!("{}-producer-{}", self.client_name_prefix, id)
    }

    /// Client-provided name for consumer `id`.
    #[must_use]
    pub fn consumer_name(&self, id: usize) -> String {
        format!("{}-consumer-{}", self.client_name_prefix, id)
    }

    /// Upper bound on send attempts for the whole run.
    #[must_use]
    pub fn max_sends(&self) -> u64 {
        self.producers as u64 * self.messages_per_producer
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> T {
        self.raw(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.raw(key).map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
            _ => default,
        }
    }

    fn secs(&self, key: &str, default: Duration) -> Duration {
        Duration::from_secs(self.parsed(key, default.as_secs()))
    }

    /// Like [`secs`](Self::secs), but zero keeps the default.
    fn nonzero_secs(&self, key: &str, default: Duration) -> Duration {
        match self.secs(key, default) {
            d if d.is_zero() => default,
            d => d,
        }
    }

    fn millis(&self, key: &str, default: Duration) -> Duration {
        // Durations here are always whole milliseconds.
        Duration::from_millis(self.parsed(key, default.as_millis() as u64))
    }
}
