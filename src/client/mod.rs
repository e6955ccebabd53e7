//! The stream-client collaborator contract.
//!
//! The harness never speaks the stream protocol itself. Everything it needs
//! from a client library is expressed by three traits:
//!
//! - [`StreamEnvironment`] declares streams and creates handles
//! - [`StreamProducer`] sends payloads; confirmations arrive on a channel
//! - [`StreamConsumer`] is closable; deliveries arrive through a callback
//!
//! Backends:
//!
//! - **rabbitmq** (feature `rabbitmq`): adapter over `rabbitmq-stream-client`
//!
//! ## Example
//!
//! ```rust,ignore
//! use stream_client_app::client::{ProducerOptions, StreamEnvironment, StreamProducer};
//!
//! let (producer, mut confirmations) = env
//!     .create_producer("orders", ProducerOptions::new("producer-0"))
//!     .await?;
//! producer.send(Bytes::from_static(b"hello")).await?;
//! let confirmation = confirmations.recv().await;
//! producer.close().await?;
//! ```

mod types;

#[cfg(feature = "rabbitmq")]
pub mod rabbitmq;

pub use types::{
    ByteCapacity, Confirmation, ConsumerOptions, Delivery, MessageHandler, OffsetSpec,
    ProducerOptions, StreamOptions,
};

use std::future::Future;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::error::Result;

/// Asynchronous confirmations for one producer.
///
/// The channel closes once the producer and all in-flight callbacks are gone.
pub type Confirmations = mpsc::UnboundedReceiver<Confirmation>;

/// Fires once the consumer has been closed, by us or by the broker.
///
/// A dropped sender counts as closure too.
pub type CloseNotify = oneshot::Receiver<()>;

/// A connected client environment.
pub trait StreamEnvironment: Send + Sync + 'static {
    /// Producer handle type.
    type Producer: StreamProducer;
    /// Consumer handle type.
    type Consumer: StreamConsumer;

    /// Declare a stream. An already existing stream is not an error.
    fn declare_stream(
        &self,
        stream: &str,
        options: &StreamOptions,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Create a producer bound to `stream`.
    fn create_producer(
        &self,
        stream: &str,
        options: ProducerOptions,
    ) -> impl Future<Output = Result<(Self::Producer, Confirmations)>> + Send;

    /// Create a consumer bound to `stream`, invoking `handler` per delivery.
    fn create_consumer(
        &self,
        stream: &str,
        options: ConsumerOptions,
        handler: MessageHandler,
    ) -> impl Future<Output = Result<(Self::Consumer, CloseNotify)>> + Send;

    /// Close the environment and any connections it still owns.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// A producer handle owned by the client library.
pub trait StreamProducer: Send + Sync + 'static {
    /// Send one message. Success means accepted for publishing, not confirmed.
    fn send(&self, payload: Bytes) -> impl Future<Output = Result<()>> + Send;

    /// Close the producer. Further sends fail.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// A consumer handle owned by the client library.
pub trait StreamConsumer: Send + Sync + 'static {
    /// Close the consumer; its [`CloseNotify`] fires afterwards.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}
