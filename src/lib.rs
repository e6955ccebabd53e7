//! # stream-client-app - Producer/consumer load harness for RabbitMQ streams
//!
//! Spins up a configurable number of producers and consumers against one
//! stream, counts sends, confirmations and deliveries, and tears everything
//! down in a fixed order on interrupt or once production completes.
//!
//! ## Features
//!
//! - **Backend-agnostic core**: the client library sits behind the
//!   [`StreamEnvironment`] trait
//! - **Environment-driven configuration** with typed defaults
//! - **Cancellable producer loops** sharing one cancellation token
//! - **Ordered teardown**: producers always close before consumers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stream_client_app::{Config, Console, LoadTest, RabbitEnvironment, ShutdownSignal};
//!
//! let signal = ShutdownSignal::install();
//! let config = Config::from_env();
//! let env = RabbitEnvironment::connect(&config).await?;
//! let summary = LoadTest::new(env, config, Console::stdout())
//!     .run(signal.recv())
//!     .await?;
//! ```

pub mod app;
pub mod client;
pub mod config;
pub mod console;
pub mod consumer;
pub mod error;
pub mod producer;
pub mod registry;
pub mod shutdown;
pub mod stats;

pub use app::LoadTest;
pub use client::{
    ByteCapacity, Confirmation, ConsumerOptions, Delivery, OffsetSpec, ProducerOptions,
    StreamConsumer, StreamEnvironment, StreamOptions, StreamProducer,
};
pub use config::{Config, ConnectionLimits, Timings};
pub use console::Console;
pub use error::{Error, Result};
pub use registry::HandleRegistry;
pub use shutdown::{ShutdownSignal, ShutdownTrigger, Summary};
pub use stats::{Counters, Snapshot};

#[cfg(feature = "rabbitmq")]
pub use client::rabbitmq::RabbitEnvironment;
