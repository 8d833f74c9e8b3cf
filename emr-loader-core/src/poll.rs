//! Fixed-interval polling of remote state.
//!
//! [`poll`] fetches a value, classifies it and either finishes or sleeps for
//! the policy interval before the next fetch. The loop ends on a
//! [`PollDecision::Done`], on the first fetch error, when the policy limits
//! are exhausted, or when the [`Shutdown`] signal fires.

use crate::error::{LoaderError, LoaderResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Interval and optional limits of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Time between two fetches.
    pub interval: Duration,
    /// Maximum number of fetches. Unbounded when `None`.
    pub max_attempts: Option<u32>,
    /// Maximum time spent polling. Unbounded when `None`.
    pub timeout: Option<Duration>,
}

impl PollPolicy {
    /// Poll every `interval` with no limit.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            timeout: None,
        }
    }

    /// Stop after `attempts` fetches.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Stop after `timeout` has elapsed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::every(Duration::from_secs(10))
    }
}

/// Outcome of classifying one fetched value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollDecision<T> {
    /// Fetch again after the interval.
    Continue,
    /// Stop polling with this result.
    Done(T),
}

/// Sending half of the shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Ask every poll loop holding a matching [`Shutdown`] to stop.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half of the shutdown signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Create a connected trigger and signal.
    pub fn channel() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Shutdown { rx })
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        let (_trigger, shutdown) = Self::channel();
        shutdown
    }

    /// Whether shutdown was requested.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested.
    pub async fn wait(&mut self) {
        if self.rx.wait_for(|triggered| *triggered).await.is_err() {
            // Trigger dropped without firing: never resolve.
            std::future::pending::<()>().await;
        }
    }
}

/// Poll until `classify` returns [`PollDecision::Done`].
///
/// `what` names the awaited condition in logs and errors.
pub async fn poll<S, T, F, Fut, C>(
    what: &str,
    policy: &PollPolicy,
    shutdown: &mut Shutdown,
    mut fetch: F,
    mut classify: C,
) -> LoaderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LoaderResult<S>>,
    C: FnMut(S) -> LoaderResult<PollDecision<T>>,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        if shutdown.is_triggered() {
            return Err(LoaderError::Cancelled {
                what: what.to_string(),
            });
        }

        attempts += 1;
        let value = fetch().await?;
        if let PollDecision::Done(result) = classify(value)? {
            tracing::debug!(what, attempts, "Poll finished");
            return Ok(result);
        }

        let elapsed = started.elapsed();
        let out_of_attempts = policy.max_attempts.is_some_and(|max| attempts >= max);
        let out_of_time = policy
            .timeout
            .is_some_and(|timeout| elapsed + policy.interval > timeout);
        if out_of_attempts || out_of_time {
            return Err(LoaderError::PollTimeout {
                what: what.to_string(),
                attempts,
                elapsed,
            });
        }

        tracing::trace!(what, attempts, interval = ?policy.interval, "Sleeping before next poll");
        tokio::select! {
            _ = shutdown.wait() => {
                tracing::info!(what, attempts, "Shutdown requested, stopping poll");
                return Err(LoaderError::Cancelled { what: what.to_string() });
            }
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }
}
