//! Driving an agent run to a terminal state.
//!
//! Both agent backends create a run and then have to wait for it. The
//! [`RunPoller`] owns that wait: it re-fetches the run status on a fixed
//! interval until the run succeeds, fails, or the [`PollBudget`] runs out. On
//! success it fetches the thread's messages exactly once.
//!
//! Suspension goes through a [`Clock`] so tests can use [`ManualClock`] and
//! observe every sleep without waiting in real time.

use super::traits::{ConversationHandle, MessageRecord, RunSnapshot};
use crate::RelayError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Time source and suspend point used while polling
#[async_trait]
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: sleeping advances time instantly
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Arc<Mutex<Duration>>,
    sleeps: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            sleeps: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Move time forward without counting a sleep
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += duration;
        }
    }

    /// Total virtual time that has passed
    pub fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|e| *e).unwrap_or_default()
    }

    /// Number of times `sleep` was called
    pub fn sleep_count(&self) -> u32 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(duration);
    }
}

/// How long a run may be polled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollBudget {
    /// Give up once more than this much time has passed since polling began
    Deadline(Duration),
    /// Give up after this many status checks
    Attempts(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub budget: PollBudget,
}

impl PollPolicy {
    pub fn deadline(interval: Duration, deadline: Duration) -> Self {
        Self {
            interval,
            budget: PollBudget::Deadline(deadline),
        }
    }

    pub fn attempts(interval: Duration, attempts: u32) -> Self {
        Self {
            interval,
            budget: PollBudget::Attempts(attempts),
        }
    }
}

/// Where run state and thread messages are read from
#[async_trait]
pub trait RunSource: Send + Sync {
    type Message: MessageRecord + Send;

    async fn run_status(&self, handle: &ConversationHandle) -> Result<RunSnapshot, RelayError>;

    async fn thread_messages(
        &self,
        handle: &ConversationHandle,
    ) -> Result<Vec<Self::Message>, RelayError>;
}

/// How a poll ended
#[derive(Debug)]
pub enum PollConclusion<M> {
    /// Run completed; the thread's messages as listed once afterwards
    Completed(Vec<M>),
    /// Run reached a failure status
    Failed(RunSnapshot),
    /// Budget ran out while the run was still active
    TimedOut { waited: Duration, checks: u32 },
}

/// Polls one run until it is terminal or out of budget
#[derive(Debug, Clone)]
pub struct RunPoller {
    clock: Arc<dyn Clock>,
    policy: PollPolicy,
}

impl RunPoller {
    pub fn new(clock: Arc<dyn Clock>, policy: PollPolicy) -> Self {
        Self { clock, policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Poll `handle` until it concludes
    ///
    /// `initial` is the status returned when the run was created, if the
    /// backend reports one. Without it the first status check happens
    /// immediately; afterwards every check is preceded by one interval of sleep.
    /// A deadline is tested before that sleep; an attempt budget after it, so
    /// `n` attempts at interval `i` wait `n * i` in total.
    /// Errors from the source end the poll and are returned as-is.
    pub async fn drive<S>(
        &self,
        source: &S,
        handle: &ConversationHandle,
        initial: Option<RunSnapshot>,
    ) -> Result<PollConclusion<S::Message>, RelayError>
    where
        S: RunSource + ?Sized,
    {
        let started = self.clock.now();
        let mut checks: u32 = 0;
        let mut snapshot = initial;

        loop {
            if let Some(current) = &snapshot {
                if current.status.is_success() {
                    info!(
                        thread_id = %handle.thread_id,
                        run_id = %handle.run_id,
                        checks,
                        "Run completed"
                    );
                    let messages = source.thread_messages(handle).await?;
                    return Ok(PollConclusion::Completed(messages));
                }
                if current.status.is_failure() {
                    warn!(
                        thread_id = %handle.thread_id,
                        run_id = %handle.run_id,
                        status = %current.status,
                        last_error = current.last_error.as_deref().unwrap_or(""),
                        "Run ended without completing"
                    );
                    return Ok(PollConclusion::Failed(current.clone()));
                }
            }

            // An attempt budget rests after every pending check, the last one included
            let attempt_budget = matches!(self.policy.budget, PollBudget::Attempts(_));
            if attempt_budget && snapshot.is_some() {
                self.clock.sleep(self.policy.interval).await;
            }

            let waited = self.clock.now().saturating_duration_since(started);
            let exhausted = match self.policy.budget {
                PollBudget::Deadline(deadline) => waited > deadline,
                PollBudget::Attempts(max) => checks >= max,
            };
            if exhausted {
                warn!(
                    thread_id = %handle.thread_id,
                    run_id = %handle.run_id,
                    checks,
                    waited_ms = waited.as_millis() as u64,
                    "Run polling budget exhausted"
                );
                return Ok(PollConclusion::TimedOut { waited, checks });
            }

            if !attempt_budget && snapshot.is_some() {
                self.clock.sleep(self.policy.interval).await;
            }

            let next = source.run_status(handle).await?;
            checks += 1;
            debug!(
                thread_id = %handle.thread_id,
                run_id = %handle.run_id,
                attempt = checks,
                status = %next.status,
                "Polled run status"
            );
            snapshot = Some(next);
        }
    }
}
