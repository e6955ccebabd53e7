//! Consumer pool.
//!
//! One task per consumer slot, reading from the first retained offset. A
//! worker lives until the client library reports its consumer closed.

use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::{debug, error};

use crate::client::{
    ConsumerOptions, MessageHandler, OffsetSpec, StreamConsumer, StreamEnvironment,
};
use crate::config::Config;
use crate::registry::HandleRegistry;
use crate::stats::Counters;

/// A running set of consumer workers.
pub struct ConsumerPool<E: StreamEnvironment> {
    registry: Arc<HandleRegistry<E::Consumer>>,
    tracker: TaskTracker,
}

impl<E: StreamEnvironment> ConsumerPool<E> {
    /// Spawn `config.consumers` workers.
    pub fn spawn(env: Arc<E>, config: Arc<Config>, counters: Arc<Counters>) -> Self {
        let registry = Arc::new(HandleRegistry::new());
        let tracker = TaskTracker::new();

        for id in 0..config.consumers {
            tracker.spawn(run_consumer(
                id,
                env.clone(),
                config.clone(),
                counters.clone(),
                registry.clone(),
            ));
        }
        tracker.close();

        Self { registry, tracker }
    }

    /// Handles registered so far.
    pub fn registry(&self) -> Arc<HandleRegistry<E::Consumer>> {
        self.registry.clone()
    }

    /// Tracker over the worker tasks.
    pub fn tracker(&self) -> TaskTracker {
        self.tracker.clone()
    }
}

async fn run_consumer<E: StreamEnvironment>(
    id: usize,
    env: Arc<E>,
    config: Arc<Config>,
    counters: Arc<Counters>,
    registry: Arc<HandleRegistry<E::Consumer>>,
) {
    let name = config.consumer_name(id);
    let handler: MessageHandler = Arc::new(move |_delivery| counters.record_received());
    let options = ConsumerOptions::new(name.clone()).with_offset(OffsetSpec::First);

    let (consumer, closed) = match env.create_consumer(&config.stream, options, handler).await {
        Ok(created) => created,
        Err(e) => {
            error!(consumer = %name, error = %e, "failed to create consumer");
            return;
        }
    };

    if let Err(consumer) = registry.register(Arc::new(consumer)) {
        debug!(consumer = %name, "created after shutdown began, closing");
        if let Err(e) = consumer.close().await {
            debug!(consumer = %name, error = %e, "close failed");
        }
    }

    // No timeout: the library decides when this consumer is done.
    let _ = closed.await;
    debug!(consumer = %name, "consumer closed");
}
