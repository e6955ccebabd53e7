//! RabbitMQ stream backend built on `rabbitmq-stream-client`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use futures::StreamExt;
use rabbitmq_stream_client::error::StreamCreateError;
use rabbitmq_stream_client::types::{
    ByteCapacity as RabbitCapacity, Message, OffsetSpecification, ResponseCode,
};
use rabbitmq_stream_client::{ConsumerHandle, Environment, NoDedup, Producer};
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, warn};

use super::{
    ByteCapacity, CloseNotify, Confirmation, Confirmations, ConsumerOptions, Delivery,
    MessageHandler, OffsetSpec, ProducerOptions, StreamConsumer, StreamEnvironment,
    StreamOptions, StreamProducer,
};
use crate::config::Config;
use crate::error::{Error, Result};

/// A connected RabbitMQ stream environment.
pub struct RabbitEnvironment {
    env: Environment,
}

impl RabbitEnvironment {
    /// Connect using the broker coordinates in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Environment`] if the broker cannot be reached or
    /// rejects the credentials.
    pub async fn connect(config: &Config) -> Result<Self> {
        let env = Environment::builder()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password)
            .virtual_host(&config.virtual_host)
            .load_balancer_mode(config.load_balancer)
            .build()
            .await
            .map_err(|e| Error::Environment(e.to_string()))?;

        // The Rust client dedicates one connection per handle.
        debug!(
            max_producers_per_client = config.limits.max_producers_per_client,
            max_consumers_per_client = config.limits.max_consumers_per_client,
            "connection limits recorded"
        );

        Ok(Self { env })
    }
}

impl StreamEnvironment for RabbitEnvironment {
    type Producer = RabbitProducer;
    type Consumer = RabbitConsumer;

    async fn declare_stream(&self, stream: &str, options: &StreamOptions) -> Result<()> {
        let result = self
            .env
            .stream_creator()
            .max_length(capacity(options.max_length))
            .create(stream)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(StreamCreateError::Create {
                status: ResponseCode::StreamAlreadyExists,
                ..
            }) => {
                debug!(stream, "stream already exists");
                Ok(())
            }
            Err(e) => Err(Error::DeclareStream {
                stream: stream.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn create_producer(
        &self,
        stream: &str,
        options: ProducerOptions,
    ) -> Result<(RabbitProducer, Confirmations)> {
        let producer = self
            .env
            .producer()
            .client_provided_name(&options.client_name)
            .build(stream)
            .await
            .map_err(|e| Error::ProducerCreate {
                name: options.client_name.clone(),
                reason: e.to_string(),
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = RabbitProducer {
            inner: RwLock::new(Some(producer)),
            confirmations: tx,
            next_publishing_id: AtomicU64::new(0),
        };
        Ok((handle, rx))
    }

    async fn create_consumer(
        &self,
        stream: &str,
        options: ConsumerOptions,
        handler: MessageHandler,
    ) -> Result<(RabbitConsumer, CloseNotify)> {
        let mut consumer = self
            .env
            .consumer()
            .name(&options.client_name)
            .client_provided_name(&options.client_name)
            .offset(offset(options.offset))
            .build(stream)
            .await
            .map_err(|e| Error::ConsumerCreate {
                name: options.client_name.clone(),
                reason: e.to_string(),
            })?;

        let handle = consumer.handle();
        let (closed_tx, closed_rx) = oneshot::channel();
        let name = options.client_name;

        tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                match delivery {
                    Ok(delivery) => {
                        let payload = delivery
                            .message()
                            .data()
                            .map(Bytes::copy_from_slice)
                            .unwrap_or_default();
                        handler(Delivery {
                            offset: delivery.offset(),
                            payload,
                        });
                    }
                    Err(e) => warn!(consumer = %name, error = %e, "delivery error"),
                }
            }
            debug!(consumer = %name, "delivery stream ended");
            let _ = closed_tx.send(());
        });

        Ok((
            RabbitConsumer {
                handle: Mutex::new(Some(handle)),
            },
            closed_rx,
        ))
    }

    async fn close(&self) -> Result<()> {
        // Connections are owned by the handles and dropped with them.
        Ok(())
    }
}

/// Producer handle over a deduplication-free RabbitMQ producer.
pub struct RabbitProducer {
    inner: RwLock<Option<Producer<NoDedup>>>,
    confirmations: mpsc::UnboundedSender<Confirmation>,
    next_publishing_id: AtomicU64,
}

impl StreamProducer for RabbitProducer {
    async fn send(&self, payload: Bytes) -> Result<()> {
        let guard = self.inner.read().await;
        let producer = guard.as_ref().ok_or(Error::HandleClosed)?;

        let publishing_id = self.next_publishing_id.fetch_add(1, Ordering::Relaxed);
        let tx = self.confirmations.clone();
        let message = Message::builder().body(payload.to_vec()).build();

        producer
            .send(message, move |status| {
                let confirmed = matches!(&status, Ok(s) if s.confirmed());
                let tx = tx.clone();
                async move {
                    let _ = tx.send(Confirmation {
                        publishing_id,
                        confirmed,
                    });
                }
            })
            .await
            .map_err(|e| Error::Send(e.to_string()))
    }

    async fn close(&self) -> Result<()> {
        let producer = self.inner.write().await.take();
        match producer {
            Some(producer) => producer
                .close()
                .await
                .map_err(|e| Error::Close(e.to_string())),
            None => Err(Error::HandleClosed),
        }
    }
}

/// Consumer handle; the delivery loop runs on its own task.
pub struct RabbitConsumer {
    handle: Mutex<Option<ConsumerHandle>>,
}

impl StreamConsumer for RabbitConsumer {
    async fn close(&self) -> Result<()> {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) => handle.close().await.map_err(|e| Error::Close(e.to_string())),
            None => Err(Error::HandleClosed),
        }
    }
}

fn capacity(capacity: ByteCapacity) -> RabbitCapacity {
    match capacity {
        ByteCapacity::B(n) => RabbitCapacity::B(n),
        ByteCapacity::KB(n) => RabbitCapacity::KB(n),
        ByteCapacity::MB(n) => RabbitCapacity::MB(n),
        ByteCapacity::GB(n) => RabbitCapacity::GB(n),
        ByteCapacity::TB(n) => RabbitCapacity::TB(n),
    }
}

fn offset(offset: OffsetSpec) -> OffsetSpecification {
    match offset {
        OffsetSpec::First => OffsetSpecification::First,
        OffsetSpec::Last => OffsetSpecification::Last,
        OffsetSpec::Next => OffsetSpecification::Next,
        OffsetSpec::Offset(n) => OffsetSpecification::Offset(n),
        OffsetSpec::Timestamp(ts) => OffsetSpecification::Timestamp(ts),
    }
}
