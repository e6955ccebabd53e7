//! In-memory stream environment that records every call it receives.
//!
//! Messages sent by any producer are appended to one shared log and handed
//! to every open consumer. New consumers replay the log first, matching a
//! subscription from the first offset.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use stream_client_app::client::{CloseNotify, Confirmations, MessageHandler};
use stream_client_app::{
    Confirmation, ConsumerOptions, Delivery, Error, OffsetSpec, ProducerOptions, Result,
    StreamConsumer, StreamEnvironment, StreamOptions, StreamProducer,
};
use tokio::sync::{mpsc, oneshot};

/// One recorded interaction with the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DeclareStream(String),
    CreateProducer(String),
    CreateConsumer(String),
    Send(String),
    CloseProducer(String),
    CloseConsumer(String),
    CloseEnvironment,
    /// Written by a test at the moment it interrupts the run.
    Interrupted,
}

/// Failure injection and latency knobs.
#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    pub fail_declare: bool,
    pub fail_producer_create: bool,
    /// Fail every n-th send attempt of each producer.
    pub fail_send_every: Option<u64>,
    /// Reject every n-th accepted message of each producer.
    pub reject_every: Option<u64>,
    pub send_latency: Option<Duration>,
    pub create_latency: Option<Duration>,
    /// Fail a send whose producer was closed while it was in flight.
    pub fail_closed_in_flight: bool,
}

#[derive(Default)]
struct Bus {
    messages: Vec<Bytes>,
    subscribers: Vec<(u64, MessageHandler)>,
    next_subscriber: u64,
}

struct State {
    options: MockOptions,
    calls: Mutex<Vec<Call>>,
    bus: Mutex<Bus>,
}

impl State {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn publish(&self, payload: Bytes) {
        let (offset, subscribers) = {
            let mut bus = self.bus.lock().unwrap();
            bus.messages.push(payload.clone());
            let handlers: Vec<MessageHandler> =
                bus.subscribers.iter().map(|(_, h)| h.clone()).collect();
            (bus.messages.len() as u64 - 1, handlers)
        };
        for handler in subscribers {
            handler(Delivery {
                offset,
                payload: payload.clone(),
            });
        }
    }
}

/// Cloneable handle; clones share the same call log.
#[derive(Clone)]
pub struct MockEnvironment {
    state: Arc<State>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self::with_options(MockOptions::default())
    }

    pub fn with_options(options: MockOptions) -> Self {
        Self {
            state: Arc::new(State {
                options,
                calls: Mutex::new(Vec::new()),
                bus: Mutex::new(Bus::default()),
            }),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    pub fn sends(&self) -> usize {
        self.count(|c| matches!(c, Call::Send(_)))
    }

    pub fn published(&self) -> usize {
        self.state.bus.lock().unwrap().messages.len()
    }

    /// Record the point where the test interrupted the run.
    pub fn mark_interrupted(&self) {
        self.state.record(Call::Interrupted);
    }

    /// Sends recorded after [`mark_interrupted`](Self::mark_interrupted).
    pub fn sends_after_interrupt(&self) -> usize {
        let calls = self.calls();
        match calls.iter().position(|c| *c == Call::Interrupted) {
            Some(at) => calls[at..]
                .iter()
                .filter(|c| matches!(c, Call::Send(_)))
                .count(),
            None => 0,
        }
    }

    pub fn open_subscribers(&self) -> usize {
        self.state.bus.lock().unwrap().subscribers.len()
    }

    async fn create_delay(&self) {
        if let Some(latency) = self.state.options.create_latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl StreamEnvironment for MockEnvironment {
    type Producer = MockProducer;
    type Consumer = MockConsumer;

    async fn declare_stream(&self, stream: &str, _options: &StreamOptions) -> Result<()> {
        self.state.record(Call::DeclareStream(stream.to_string()));
        if self.state.options.fail_declare {
            return Err(Error::DeclareStream {
                stream: stream.to_string(),
                reason: "access refused".to_string(),
            });
        }
        Ok(())
    }

    async fn create_producer(
        &self,
        _stream: &str,
        options: ProducerOptions,
    ) -> Result<(MockProducer, Confirmations)> {
        self.create_delay().await;
        self.state
            .record(Call::CreateProducer(options.client_name.clone()));
        if self.state.options.fail_producer_create {
            return Err(Error::ProducerCreate {
                name: options.client_name,
                reason: "resource locked".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let producer = MockProducer {
            name: options.client_name,
            state: self.state.clone(),
            closed: AtomicBool::new(false),
            confirmations: Mutex::new(Some(tx)),
            attempts: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
        };
        Ok((producer, rx))
    }

    async fn create_consumer(
        &self,
        _stream: &str,
        options: ConsumerOptions,
        handler: MessageHandler,
    ) -> Result<(MockConsumer, CloseNotify)> {
        self.create_delay().await;
        self.state
            .record(Call::CreateConsumer(options.client_name.clone()));

        let (id, replay) = {
            let mut bus = self.state.bus.lock().unwrap();
            let id = bus.next_subscriber;
            bus.next_subscriber += 1;
            bus.subscribers.push((id, handler.clone()));
            let replay = match options.offset {
                OffsetSpec::First => bus.messages.clone(),
                _ => Vec::new(),
            };
            (id, replay)
        };
        for (offset, payload) in replay.into_iter().enumerate() {
            handler(Delivery {
                offset: offset as u64,
                payload,
            });
        }

        let (closed_tx, closed_rx) = oneshot::channel();
        let consumer = MockConsumer {
            name: options.client_name,
            subscriber: id,
            state: self.state.clone(),
            closed: Mutex::new(Some(closed_tx)),
        };
        Ok((consumer, closed_rx))
    }

    async fn close(&self) -> Result<()> {
        self.state.record(Call::CloseEnvironment);
        Ok(())
    }
}

pub struct MockProducer {
    name: String,
    state: Arc<State>,
    closed: AtomicBool,
    confirmations: Mutex<Option<mpsc::UnboundedSender<Confirmation>>>,
    attempts: AtomicU64,
    accepted: AtomicU64,
}

impl StreamProducer for MockProducer {
    async fn send(&self, payload: Bytes) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::HandleClosed);
        }
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(every) = self.state.options.fail_send_every {
            if attempt % every == 0 {
                return Err(Error::Send(format!("attempt {} refused", attempt)));
            }
        }

        self.state.record(Call::Send(self.name.clone()));
        if let Some(latency) = self.state.options.send_latency {
            tokio::time::sleep(latency).await;
        }
        if self.state.options.fail_closed_in_flight && self.closed.load(Ordering::SeqCst) {
            return Err(Error::HandleClosed);
        }

        self.state.publish(payload);
        let id = self.accepted.fetch_add(1, Ordering::SeqCst) + 1;
        let rejected = self
            .state
            .options
            .reject_every
            .is_some_and(|every| id % every == 0);
        if let Some(tx) = self.confirmations.lock().unwrap().as_ref() {
            let confirmation = if rejected {
                Confirmation::rejected(id)
            } else {
                Confirmation::confirmed(id)
            };
            let _ = tx.send(confirmation);
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::HandleClosed);
        }
        self.confirmations.lock().unwrap().take();
        self.state.record(Call::CloseProducer(self.name.clone()));
        Ok(())
    }
}

pub struct MockConsumer {
    name: String,
    subscriber: u64,
    state: Arc<State>,
    closed: Mutex<Option<oneshot::Sender<()>>>,
}

impl StreamConsumer for MockConsumer {
    async fn close(&self) -> Result<()> {
        let Some(closed) = self.closed.lock().unwrap().take() else {
            return Err(Error::HandleClosed);
        };
        self.state
            .bus
            .lock()
            .unwrap()
            .subscribers
            .retain(|(id, _)| *id != self.subscriber);
        self.state.record(Call::CloseConsumer(self.name.clone()));
        let _ = closed.send(());
        Ok(())
    }
}
