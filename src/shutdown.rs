//! Shutdown coordination.
//!
//! Teardown runs in a fixed order:
//!
//! 1. cancel the producer loops
//! 2. wait (bounded) for the loops to exit and confirmations to settle
//! 3. close every registered producer
//! 4. close every registered consumer
//! 5. wait for consumer workers to observe closure
//! 6. stop the statistics reporter
//! 7. print the final totals

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(unix)]
use tokio::signal::unix::Signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::client::{StreamConsumer, StreamEnvironment, StreamProducer};
use crate::console::Console;
use crate::registry::HandleRegistry;
use crate::stats::{Counters, StatsReporter};

const DRAIN_POLL: Duration = Duration::from_millis(100);

/// What started the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownTrigger {
    /// SIGINT, SIGTERM or another external interrupt.
    Interrupted,
    /// Every producer finished its messages.
    ProducersFinished,
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::Interrupted => write!(f, "interrupted"),
            ShutdownTrigger::ProducersFinished => write!(f, "producers finished"),
        }
    }
}

/// Final totals of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// What ended the run.
    pub trigger: ShutdownTrigger,
    /// Messages accepted by producers.
    pub sent: u64,
    /// Messages confirmed by the broker.
    pub confirmed: u64,
    /// Messages rejected by the broker.
    pub rejected: u64,
    /// Messages delivered to consumers.
    pub received: u64,
    /// Producers closed during teardown.
    pub producers_closed: usize,
    /// Consumers closed during teardown.
    pub consumers_closed: usize,
    /// Wall time from production start to consumers joined.
    pub duration: Duration,
}

/// Owns everything teardown touches.
pub(crate) struct ShutdownCoordinator<E: StreamEnvironment> {
    pub(crate) cancel: CancellationToken,
    pub(crate) producers: Arc<HandleRegistry<E::Producer>>,
    pub(crate) consumers: Arc<HandleRegistry<E::Consumer>>,
    pub(crate) producer_tasks: TaskTracker,
    pub(crate) consumer_tasks: TaskTracker,
    pub(crate) reporter: StatsReporter,
    pub(crate) counters: Arc<Counters>,
    pub(crate) console: Console,
    pub(crate) drain_timeout: Duration,
    pub(crate) started: Instant,
}

impl<E: StreamEnvironment> ShutdownCoordinator<E> {
    /// Tear everything down and report the totals.
    pub(crate) async fn run(self, trigger: ShutdownTrigger) -> Summary {
        let console = &self.console;
        match trigger {
            ShutdownTrigger::ProducersFinished => {
                console.blank();
                console.line(format_args!("All producers finished, initiating shutdown..."));
            }
            ShutdownTrigger::Interrupted => {
                console.line(format_args!("Shutdown signal received, stopping..."));
            }
        }
        info!(%trigger, "shutting down");

        self.cancel.cancel();
        self.drain().await;

        console.blank();
        console.line(format_args!("Production complete:"));
        console.line(format_args!("  Messages sent: {}", self.counters.sent()));
        console.line(format_args!("  Messages confirmed: {}", self.counters.confirmed()));
        if self.counters.rejected() > 0 {
            console.line(format_args!("  Messages rejected: {}", self.counters.rejected()));
        }

        console.line(format_args!("Closing producers..."));
        let producers = self.producers.drain();
        let producers_closed = producers.len();
        for producer in producers {
            if let Err(e) = producer.close().await {
                warn!(error = %e, "failed to close producer");
            }
        }

        console.line(format_args!("Closing consumers..."));
        let consumers = self.consumers.drain();
        let consumers_closed = consumers.len();
        for consumer in consumers {
            if let Err(e) = consumer.close().await {
                warn!(error = %e, "failed to close consumer");
            }
        }

        self.consumer_tasks.close();
        self.consumer_tasks.wait().await;
        debug!("consumer workers joined");

        let duration = self.started.elapsed();
        self.reporter.stop().await;

        let summary = Summary {
            trigger,
            sent: self.counters.sent(),
            confirmed: self.counters.confirmed(),
            rejected: self.counters.rejected(),
            received: self.counters.received(),
            producers_closed,
            consumers_closed,
            duration,
        };

        let console = &self.console;
        console.blank();
        console.line(format_args!("All operations complete:"));
        console.line(format_args!("  Total duration: {:.3?}", summary.duration));
        console.line(format_args!("  Messages received: {}", summary.received));

        summary
    }

    /// Wait for producer loops to observe cancellation, then for their
    /// confirmations, both within one `drain_timeout` budget.
    async fn drain(&self) {
        if self.drain_timeout.is_zero() {
            return;
        }
        let deadline = tokio::time::Instant::now() + self.drain_timeout;

        if tokio::time::timeout_at(deadline, self.producer_tasks.wait())
            .await
            .is_err()
        {
            warn!("producers still sending at drain deadline");
        }

        if self.counters.settled() {
            return;
        }
        self.console
            .line(format_args!("Waiting for in-flight confirmations..."));
        let settled = tokio::time::timeout_at(deadline, async {
            while !self.counters.settled() {
                tokio::time::sleep(DRAIN_POLL).await;
            }
        })
        .await;

        if settled.is_err() {
            let outstanding = self
                .counters
                .sent()
                .saturating_sub(self.counters.confirmed() + self.counters.rejected());
            warn!(outstanding, "gave up waiting for confirmations");
        }
    }
}

/// SIGINT and SIGTERM listeners.
///
/// Listeners are registered by [`install`](Self::install), so signals that
/// arrive before [`recv`](Self::recv) is polled are buffered rather than
/// killing the process.
#[derive(Debug)]
pub struct ShutdownSignal {
    #[cfg(unix)]
    listeners: Option<(Signal, Signal)>,
}

impl ShutdownSignal {
    /// Register the listeners. Must be called inside a tokio runtime.
    ///
    /// A registration failure is logged; [`recv`](Self::recv) then never
    /// resolves and the run ends only when producers finish.
    pub fn install() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let listeners = signal(SignalKind::interrupt())
                .and_then(|interrupt| Ok((interrupt, signal(SignalKind::terminate())?)));
            match listeners {
                Ok(listeners) => Self {
                    listeners: Some(listeners),
                },
                Err(e) => {
                    error!(error = %e, "failed to install signal handlers");
                    Self { listeners: None }
                }
            }
        }

        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    /// Whether the listeners are registered.
    pub fn is_installed(&self) -> bool {
        #[cfg(unix)]
        {
            self.listeners.is_some()
        }

        #[cfg(not(unix))]
        {
            true
        }
    }

    /// Resolve on the first SIGINT or SIGTERM.
    pub async fn recv(self) {
        #[cfg(unix)]
        {
            let Some((mut interrupt, mut terminate)) = self.listeners else {
                return std::future::pending().await;
            };
            tokio::select! {
                _ = interrupt.recv() => debug!("SIGINT received"),
                _ = terminate.recv() => debug!("SIGTERM received"),
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_listeners_register_eagerly() {
        let signal = ShutdownSignal::install();
        assert!(signal.is_installed());
    }

    #[test]
    fn test_trigger_display() {
        assert_eq!(ShutdownTrigger::Interrupted.to_string(), "interrupted");
        assert_eq!(
            ShutdownTrigger::ProducersFinished.to_string(),
            "producers finished"
        );
    }
}
