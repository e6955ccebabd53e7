//! Run counters and the periodic statistics reporter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

use crate::console::Console;

/// Reporter interval used when a zero interval is requested.
const FALLBACK_INTERVAL: Duration = Duration::from_secs(5);

/// Monotonic counters shared by every worker.
#[derive(Debug, Default)]
pub struct Counters {
    sent: AtomicU64,
    confirmed: AtomicU64,
    rejected: AtomicU64,
    received: AtomicU64,
}

impl Counters {
    /// Fresh zeroed counters behind an `Arc`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A send was accepted by the producer.
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    /// The broker confirmed a message.
    pub fn record_confirmed(&self) {
        self.confirmed.fetch_add(1, Ordering::Relaxed);
    }

    /// The broker rejected a message.
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// A consumer received a message.
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Messages accepted by producers so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Messages confirmed by the broker so far.
    pub fn confirmed(&self) -> u64 {
        self.confirmed.load(Ordering::Relaxed)
    }

    /// Messages rejected by the broker so far.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Messages delivered to consumers so far.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Whether every sent message has been confirmed or rejected.
    pub fn settled(&self) -> bool {
        self.confirmed() + self.rejected() >= self.sent()
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sent: self.sent(),
            confirmed: self.confirmed(),
            rejected: self.rejected(),
            received: self.received(),
        }
    }
}

/// A copy of [`Counters`] taken at one moment.
///
/// Fields are loaded one at a time, so they are not mutually consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// Messages accepted by producers.
    pub sent: u64,
    /// Messages confirmed by the broker.
    pub confirmed: u64,
    /// Messages rejected by the broker.
    pub rejected: u64,
    /// Messages delivered to consumers.
    pub received: u64,
}

/// Format a duration rounded to whole seconds, e.g. `1h2m3s`, `45s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs() + u64::from(elapsed.subsec_millis() >= 500);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Render one periodic status line.
pub fn status_line(clock: &str, snapshot: &Snapshot, elapsed: Duration) -> String {
    format!(
        "[{}] Sent: {}, Confirmed: {}, Consumed: {}, Elapsed: {}",
        clock,
        snapshot.sent,
        snapshot.confirmed,
        snapshot.received,
        format_elapsed(elapsed)
    )
}

/// Periodic reporter task printing a status line every interval.
pub struct StatsReporter {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl StatsReporter {
    /// Spawn the reporter. The first line appears one interval after start.
    ///
    /// A zero `interval` is replaced by five seconds.
    pub fn spawn(
        counters: Arc<Counters>,
        console: Console,
        interval: Duration,
        started: Instant,
    ) -> Self {
        let interval = if interval.is_zero() {
            warn!(fallback = ?FALLBACK_INTERVAL, "zero stats interval requested");
            FALLBACK_INTERVAL
        } else {
            interval
        };
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let first = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(first, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let clock = chrono::Local::now().format("%H:%M:%S").to_string();
                        console.line(format_args!(
                            "{}",
                            status_line(&clock, &counters.snapshot(), started.elapsed())
                        ));
                    }
                }
            }
            debug!("stats reporter stopped");
        });

        Self {
            stop: stop_tx,
            task,
        }
    }

    /// Stop the reporter and wait for its task to finish.
    ///
    /// Once this returns the reporter will not write again.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            error!(error = %e, "stats reporter task failed");
        }
    }
}
