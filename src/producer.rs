//! Producer pool.
//!
//! One task per producer slot. Each task creates its producer, registers
//! it for shutdown, counts confirmations on a side task and then sends
//! `messages_per_producer` generated payloads, checking the cancellation
//! token before every send.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::client::{Confirmations, ProducerOptions, StreamEnvironment, StreamProducer};
use crate::config::Config;
use crate::registry::HandleRegistry;
use crate::stats::Counters;

/// Sends between two throttle pauses.
pub const THROTTLE_EVERY: u64 = 1000;

/// Payload for message `seq` of producer `producer_id`.
pub fn message_payload(producer_id: usize, seq: u64) -> Bytes {
    Bytes::from(format!("producer-{}-message-{}", producer_id, seq))
}

/// Whether the producer pauses after sending message `seq`.
#[inline]
pub fn should_throttle(seq: u64, delay: Duration) -> bool {
    !delay.is_zero() && seq > 0 && seq % THROTTLE_EVERY == 0
}

/// A running set of producer workers.
pub struct ProducerPool<E: StreamEnvironment> {
    registry: Arc<HandleRegistry<E::Producer>>,
    tracker: TaskTracker,
}

impl<E: StreamEnvironment> ProducerPool<E> {
    /// Spawn `config.producers` workers.
    pub fn spawn(
        env: Arc<E>,
        config: Arc<Config>,
        counters: Arc<Counters>,
        cancel: CancellationToken,
    ) -> Self {
        let registry = Arc::new(HandleRegistry::new());
        let tracker = TaskTracker::new();

        for id in 0..config.producers {
            tracker.spawn(run_producer(
                id,
                env.clone(),
                config.clone(),
                counters.clone(),
                registry.clone(),
                cancel.clone(),
            ));
        }
        tracker.close();

        Self { registry, tracker }
    }

    /// Handles registered so far.
    pub fn registry(&self) -> Arc<HandleRegistry<E::Producer>> {
        self.registry.clone()
    }

    /// Tracker over the worker tasks; `wait()` resolves once all have exited.
    pub fn tracker(&self) -> TaskTracker {
        self.tracker.clone()
    }
}

async fn run_producer<E: StreamEnvironment>(
    id: usize,
    env: Arc<E>,
    config: Arc<Config>,
    counters: Arc<Counters>,
    registry: Arc<HandleRegistry<E::Producer>>,
    cancel: CancellationToken,
) {
    let name = config.producer_name(id);
    let created = env
        .create_producer(&config.stream, ProducerOptions::new(name.clone()))
        .await;
    let (producer, confirmations) = match created {
        Ok(created) => created,
        Err(e) => {
            error!(producer = %name, error = %e, "failed to create producer");
            return;
        }
    };

    let producer = Arc::new(producer);
    if let Err(producer) = registry.register(producer.clone()) {
        debug!(producer = %name, "created after shutdown began, closing");
        if let Err(e) = producer.close().await {
            debug!(producer = %name, error = %e, "close failed");
        }
        return;
    }

    tokio::spawn(count_confirmations(confirmations, counters.clone()));

    let delay = config.timings.send_delay;
    for seq in 0..config.messages_per_producer {
        if cancel.is_cancelled() {
            debug!(producer = %name, seq, "cancelled");
            return;
        }

        if let Err(e) = producer.send(message_payload(id, seq)).await {
            // Sends racing with shutdown fail routinely.
            if cancel.is_cancelled() {
                return;
            }
            warn!(producer = %name, seq, error = %e, "failed to send message");
            continue;
        }
        counters.record_sent();

        if should_throttle(seq, delay) {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    info!(producer = %name, messages = config.messages_per_producer, "producer finished");
}

async fn count_confirmations(mut confirmations: Confirmations, counters: Arc<Counters>) {
    while let Some(confirmation) = confirmations.recv().await {
        if confirmation.confirmed {
            counters.record_confirmed();
        } else {
            counters.record_rejected();
        }
    }
}
