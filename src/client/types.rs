//! Value types crossing the collaborator boundary.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

/// Stream retention size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum ByteCapacity {
    /// Bytes.
    B(u64),
    /// Kilobytes (1000 bytes).
    KB(u64),
    /// Megabytes.
    MB(u64),
    /// Gigabytes.
    GB(u64),
    /// Terabytes.
    TB(u64),
}

impl ByteCapacity {
    /// Size in bytes, saturating on overflow.
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        match *self {
            ByteCapacity::B(n) => n,
            ByteCapacity::KB(n) => n.saturating_mul(1_000),
            ByteCapacity::MB(n) => n.saturating_mul(1_000_000),
            ByteCapacity::GB(n) => n.saturating_mul(1_000_000_000),
            ByteCapacity::TB(n) => n.saturating_mul(1_000_000_000_000),
        }
    }
}

impl fmt::Display for ByteCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteCapacity::B(n) => write!(f, "{}B", n),
            ByteCapacity::KB(n) => write!(f, "{}KB", n),
            ByteCapacity::MB(n) => write!(f, "{}MB", n),
            ByteCapacity::GB(n) => write!(f, "{}GB", n),
            ByteCapacity::TB(n) => write!(f, "{}TB", n),
        }
    }
}

/// Where a consumer starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OffsetSpec {
    /// The first offset still retained.
    #[default]
    First,
    /// The last chunk.
    Last,
    /// Only messages published after subscribing.
    Next,
    /// A specific offset.
    Offset(u64),
    /// The first chunk at or after a Unix timestamp in milliseconds.
    Timestamp(i64),
}

/// Options for stream declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Maximum retained size before old segments are truncated.
    pub max_length: ByteCapacity,
}

impl StreamOptions {
    /// Options with the given retention size.
    #[must_use]
    pub const fn new(max_length: ByteCapacity) -> Self {
        Self { max_length }
    }
}

/// Options for producer creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerOptions {
    /// Client-provided name, visible in broker management tooling.
    pub client_name: String,
}

impl ProducerOptions {
    /// Options with the given client-provided name.
    #[must_use]
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }
}

/// Options for consumer creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerOptions {
    /// Client-provided name, also used as the consumer reference.
    pub client_name: String,
    /// Starting offset.
    pub offset: OffsetSpec,
}

impl ConsumerOptions {
    /// Options reading from the first retained offset.
    #[must_use]
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            offset: OffsetSpec::First,
        }
    }

    /// Set the starting offset.
    #[must_use]
    pub fn with_offset(mut self, offset: OffsetSpec) -> Self {
        self.offset = offset;
        self
    }
}

/// Outcome of one published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    /// Publishing id assigned by the producer.
    pub publishing_id: u64,
    /// Whether the broker stored the message.
    pub confirmed: bool,
}

impl Confirmation {
    /// A positive confirmation.
    #[must_use]
    pub const fn confirmed(publishing_id: u64) -> Self {
        Self {
            publishing_id,
            confirmed: true,
        }
    }

    /// A negative confirmation.
    #[must_use]
    pub const fn rejected(publishing_id: u64) -> Self {
        Self {
            publishing_id,
            confirmed: false,
        }
    }
}

/// One delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Stream offset of the message.
    pub offset: u64,
    /// Message body.
    pub payload: Bytes,
}

/// Per-delivery callback. Runs on the client's dispatch task; keep it short.
pub type MessageHandler = Arc<dyn Fn(Delivery) + Send + Sync>;
