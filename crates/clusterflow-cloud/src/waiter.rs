//! Status convergence waiter
//!
//! Remote create/update/delete calls return before the backend has finished
//! the work. [`wait_until`] turns such an operation into a synchronous one by
//! polling a [`StatusSource`] until the resource converges, reports a failure
//! status, or the deadline passes.
//!
//! ```text
//!            ┌──────── pending ────────┐
//!            ▼                         │
//!        PENDING ── fetch ──► classify ┤
//!                                      ├──► SUCCESS
//!                                      ├──► FAILED
//!                                      └──► TIMED_OUT
//! ```

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::time::{Instant, sleep_until, timeout_at};

/// Result of a single status fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The resource exists and reports this status
    Found(String),
    /// The resource does not exist (404)
    NotFound,
}

impl Observation {
    pub fn found(status: impl Into<String>) -> Self {
        Observation::Found(status.into())
    }

    pub fn status(&self) -> Option<&str> {
        match self {
            Observation::Found(status) => Some(status),
            Observation::NotFound => None,
        }
    }
}

/// Anything that can report the current status of a poll target
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch the current status of `target`.
    ///
    /// A missing resource must be reported as [`Observation::NotFound`], not
    /// as an error.
    async fn fetch_status(&self, target: &PollTarget) -> Result<Observation>;
}

/// What the waiter is waiting for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convergence {
    /// Any of these statuses ends the wait successfully
    Status(Vec<String>),
    /// The resource disappearing ends the wait successfully
    Gone,
}

/// A single wait invocation: which resource, what counts as done, how long
#[derive(Debug, Clone)]
pub struct PollTarget {
    pub service_name: String,
    pub engine: String,
    pub cluster_id: String,
    pub resource_id: String,
    pub convergence: Convergence,
    pub failure: Vec<String>,
    pub timeout: Duration,
}

impl PollTarget {
    /// Wait until the resource reports one of `statuses`
    pub fn ready<I, S>(
        service_name: impl Into<String>,
        engine: impl Into<String>,
        cluster_id: impl Into<String>,
        resource_id: impl Into<String>,
        statuses: I,
        timeout: Duration,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            service_name: service_name.into(),
            engine: engine.into(),
            cluster_id: cluster_id.into(),
            resource_id: resource_id.into(),
            convergence: Convergence::Status(statuses.into_iter().map(Into::into).collect()),
            failure: Vec::new(),
            timeout,
        }
    }

    /// Wait until the resource no longer exists
    pub fn gone(
        service_name: impl Into<String>,
        engine: impl Into<String>,
        cluster_id: impl Into<String>,
        resource_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            engine: engine.into(),
            cluster_id: cluster_id.into(),
            resource_id: resource_id.into(),
            convergence: Convergence::Gone,
            failure: Vec::new(),
            timeout,
        }
    }

    /// Statuses that end the wait with [`CloudError::RemoteFailure`]
    pub fn with_failure<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failure = statuses.into_iter().map(Into::into).collect();
        self
    }

    fn classify(&self, observation: &Observation) -> PollOutcome {
        match (&self.convergence, observation) {
            (Convergence::Gone, Observation::NotFound) => PollOutcome::Converged,
            (Convergence::Status(_), Observation::NotFound) => {
                PollOutcome::Failed("resource vanished while waiting")
            }
            (Convergence::Status(success), Observation::Found(status))
                if success.iter().any(|s| s == status) =>
            {
                PollOutcome::Converged
            }
            (_, Observation::Found(status)) if self.failure.iter().any(|s| s == status) => {
                PollOutcome::Failed("reached failure status")
            }
            (_, Observation::Found(_)) => PollOutcome::Pending,
        }
    }
}

impl fmt::Display for PollTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} user {} (cluster {}, project {})",
            self.engine, self.resource_id, self.cluster_id, self.service_name
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollOutcome {
    Converged,
    Failed(&'static str),
    Pending,
}

/// Poll timing configuration
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the first fetch
    pub initial_delay: Duration,

    /// Delay after the first unsuccessful fetch
    pub interval: Duration,

    /// Upper bound for the backed-off interval
    pub max_interval: Duration,

    /// Growth factor applied to the interval after each cycle
    pub multiplier: f64,

    /// Consecutive transient fetch errors tolerated before giving up
    pub max_fetch_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            interval: Duration::from_secs(3),
            max_interval: Duration::from_secs(30),
            multiplier: 1.5,
            max_fetch_retries: 3,
        }
    }
}

impl PollConfig {
    /// Fixed interval, no backoff
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            multiplier: 1.0,
            ..Self::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_fetch_retries(mut self, retries: u32) -> Self {
        self.max_fetch_retries = retries;
        self
    }

    /// Delay to sleep after the `cycle`-th unsuccessful fetch (0-based)
    pub fn delay_for_cycle(&self, cycle: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(cycle.min(i32::MAX as u32) as i32);
        let delay = self.interval.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max_interval.as_secs_f64() {
            return self.max_interval;
        }
        Duration::from_secs_f64(delay)
    }
}

/// Roughly 30 years; stands in for deadlines `Instant` cannot represent
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `base + duration`, saturating instead of overflowing
fn instant_after(base: Instant, duration: Duration) -> Instant {
    base.checked_add(duration)
        .or_else(|| base.checked_add(FAR_FUTURE))
        .unwrap_or(base)
}

/// Wait until `target` converges.
///
/// Returns the observation that ended the wait: the success status for
/// [`Convergence::Status`], [`Observation::NotFound`] for
/// [`Convergence::Gone`].
///
/// # Errors
/// * [`CloudError::RemoteFailure`] - a failure status was observed, or the
///   resource vanished while waiting for a status
/// * [`CloudError::Timeout`] - the deadline passed while still pending
/// * [`CloudError::FetchFailed`] - a non-transient fetch error, or more than
///   `max_fetch_retries` consecutive transient ones
pub async fn wait_until<S>(source: &S, target: &PollTarget, config: &PollConfig) -> Result<Observation>
where
    S: StatusSource + ?Sized,
{
    let started = Instant::now();
    let deadline = instant_after(started, target.timeout);
    let mut last_status: Option<String> = None;
    let mut consecutive_errors = 0u32;
    let mut cycle = 0u32;

    if !config.initial_delay.is_zero() {
        sleep_until(instant_after(started, config.initial_delay).min(deadline)).await;
    }

    loop {
        let fetched = match timeout_at(deadline, source.fetch_status(target)).await {
            Ok(fetched) => fetched,
            Err(_) => {
                return Err(CloudError::Timeout {
                    target: target.to_string(),
                    elapsed: started.elapsed(),
                    last_status,
                });
            }
        };

        match fetched {
            Ok(observation) => {
                consecutive_errors = 0;
                tracing::debug!(
                    "{}: observed {}",
                    target,
                    observation.status().unwrap_or("NOT_FOUND")
                );

                match target.classify(&observation) {
                    PollOutcome::Converged => return Ok(observation),
                    PollOutcome::Failed(reason) => {
                        return Err(CloudError::RemoteFailure {
                            target: target.to_string(),
                            reason: reason.to_string(),
                            last_status: observation.status().map(str::to_string).or(last_status),
                        });
                    }
                    PollOutcome::Pending => {}
                }

                if let Observation::Found(status) = observation {
                    last_status = Some(status);
                }
            }
            Err(e) if e.is_transient() && consecutive_errors < config.max_fetch_retries => {
                consecutive_errors += 1;
                tracing::warn!(
                    "{}: status fetch failed ({}/{}), retrying: {}",
                    target,
                    consecutive_errors,
                    config.max_fetch_retries,
                    e
                );
            }
            Err(e) => {
                return Err(CloudError::FetchFailed {
                    target: target.to_string(),
                    attempts: consecutive_errors + 1,
                    last_status,
                    source: Box::new(e),
                });
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(CloudError::Timeout {
                target: target.to_string(),
                elapsed: now - started,
                last_status,
            });
        }

        let delay = config.delay_for_cycle(cycle);
        cycle = cycle.saturating_add(1);
        sleep_until(instant_after(now, delay).min(deadline)).await;
    }
}
