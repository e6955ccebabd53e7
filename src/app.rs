//! Run orchestration.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::{StreamEnvironment, StreamOptions};
use crate::config::Config;
use crate::console::Console;
use crate::consumer::ConsumerPool;
use crate::error::{Error, Result};
use crate::producer::ProducerPool;
use crate::shutdown::{ShutdownCoordinator, ShutdownTrigger, Summary};
use crate::stats::{Counters, StatsReporter};

/// One load run against a connected environment.
///
/// ## Example
///
/// ```rust,ignore
/// let signal = ShutdownSignal::install();
/// let env = RabbitEnvironment::connect(&config).await?;
/// let summary = LoadTest::new(env, config, Console::stdout())
///     .run(signal.recv())
///     .await?;
/// println!("sent {} received {}", summary.sent, summary.received);
/// ```
pub struct LoadTest<E: StreamEnvironment> {
    env: Arc<E>,
    config: Arc<Config>,
    console: Console,
    counters: Arc<Counters>,
}

impl<E: StreamEnvironment> LoadTest<E> {
    /// Prepare a run. Nothing touches the environment until [`run`](Self::run).
    pub fn new(env: E, config: Config, console: Console) -> Self {
        Self {
            env: Arc::new(env),
            config: Arc::new(config),
            console,
            counters: Counters::new(),
        }
    }

    /// Counters for this run, live while it executes.
    pub fn counters(&self) -> Arc<Counters> {
        self.counters.clone()
    }

    /// Execute the run until `interrupt` resolves or all producers finish.
    ///
    /// With zero producers the run shuts down right after starting the
    /// consumers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeclareStream`] if the stream cannot be declared. All
    /// later failures are logged and do not end the run.
    pub async fn run<F>(self, interrupt: F) -> Result<Summary>
    where
        F: Future<Output = ()> + Send,
    {
        let config = &self.config;
        let console = &self.console;

        console.line(format_args!("Creating stream: {}", config.stream));
        self.env
            .declare_stream(&config.stream, &StreamOptions::new(config.max_length))
            .await
            .map_err(|e| match e {
                Error::DeclareStream { .. } => e,
                other => Error::DeclareStream {
                    stream: config.stream.clone(),
                    reason: other.to_string(),
                },
            })?;

        // Give the stream time to appear on every cluster member.
        if !config.timings.stream_settle.is_zero() {
            tokio::time::sleep(config.timings.stream_settle).await;
        }

        console.line(format_args!(
            "Starting {} producers ({} messages each)",
            config.producers, config.messages_per_producer
        ));
        let started = Instant::now();
        let reporter = StatsReporter::spawn(
            self.counters.clone(),
            console.clone(),
            config.timings.stats_interval,
            started,
        );

        let cancel = CancellationToken::new();
        let producers = ProducerPool::spawn(
            self.env.clone(),
            config.clone(),
            self.counters.clone(),
            cancel.clone(),
        );

        console.line(format_args!("Starting {} consumers", config.consumers));
        let consumers =
            ConsumerPool::spawn(self.env.clone(), config.clone(), self.counters.clone());

        // With zero producers the tracker is already empty, so the trigger
        // fires at once and shutdown goes straight to joining consumers.
        let (trigger_tx, mut trigger_rx) = mpsc::channel(1);
        let tracker = producers.tracker();
        tokio::spawn(async move {
            tracker.wait().await;
            let _ = trigger_tx.send(ShutdownTrigger::ProducersFinished).await;
        });
        if config.producers == 0 {
            info!("no producers configured");
        }

        let trigger = tokio::select! {
            Some(trigger) = trigger_rx.recv() => trigger,
            () = interrupt => ShutdownTrigger::Interrupted,
        };

        let coordinator: ShutdownCoordinator<E> = ShutdownCoordinator {
            cancel,
            producers: producers.registry(),
            consumers: consumers.registry(),
            producer_tasks: producers.tracker(),
            consumer_tasks: consumers.tracker(),
            reporter,
            counters: self.counters.clone(),
            console: console.clone(),
            drain_timeout: config.timings.drain_timeout,
            started,
        };
        let summary = coordinator.run(trigger).await;

        if let Err(e) = self.env.close().await {
            warn!(error = %e, "failed to close environment");
        }

        Ok(summary)
    }
}
