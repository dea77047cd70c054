//! Retry policy with a fixed backoff schedule
//!
//! Each attempt's outcome is classified into [`Attempt`]: success ends the
//! loop, a fatal error is returned immediately, and a transient error waits
//! out the backoff for that attempt before the next one.
//!
//! ```text
//! Attempting(n) --ok--------------------------> Succeeded
//! Attempting(n) --fatal-----------------------> Failed(error)
//! Attempting(n) --transient, n < max--> Waiting(n) --> Attempting(n + 1)
//! Attempting(n) --transient, n = max--> Waiting(n) --> Failed(RetryExhausted)
//! ```
//!
//! The final failure also waits out its backoff before the error is returned,
//! so a fully failing call under the default schedule takes 31 seconds.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Default backoff schedule in seconds, one entry per attempt
pub const DEFAULT_BACKOFF_SECS: [u64; 5] = [1, 2, 4, 8, 16];

/// Classified outcome of one attempt
#[derive(Debug)]
pub enum Attempt<T> {
    /// The attempt produced a value
    Success(T),
    /// The attempt failed and may be retried
    Transient(Error),
    /// The attempt failed and must not be retried
    Fatal(Error),
}

/// Record of one failed attempt, handed to the retry hook
#[derive(Debug)]
pub struct RetryAttempt<'a> {
    /// 1-based attempt number that failed
    pub attempt: u32,
    /// Attempt budget
    pub max_attempts: u32,
    /// Backoff that is about to be waited
    pub delay: Duration,
    /// The error of the failed attempt
    pub error: &'a Error,
}

impl RetryAttempt<'_> {
    /// Whether this was the last attempt in the budget
    pub fn is_final(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// Bounded retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    schedule: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(
            DEFAULT_BACKOFF_SECS
                .iter()
                .map(|secs| Duration::from_secs(*secs))
                .collect(),
        )
    }
}

impl RetryPolicy {
    /// Policy with an explicit attempt budget and schedule.
    ///
    /// Attempts beyond the schedule reuse its last entry.
    pub fn new(max_attempts: u32, schedule: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            schedule,
        }
    }

    /// One attempt per schedule entry
    pub fn fixed(schedule: Vec<Duration>) -> Self {
        let attempts = u32::try_from(schedule.len()).unwrap_or(u32::MAX);
        Self::new(attempts, schedule)
    }

    /// Single attempt, no waiting
    pub fn no_retry() -> Self {
        Self::new(1, Vec::new())
    }

    /// Attempt budget (initial attempt included)
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Configured schedule
    #[inline]
    pub fn schedule(&self) -> &[Duration] {
        &self.schedule
    }

    /// Backoff after the given failed attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let idx = (attempt - 1) as usize;
        self.schedule
            .get(idx)
            .or_else(|| self.schedule.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Sum of all backoffs a fully failing call waits
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_attempts).map(|n| self.delay_for_attempt(n)).sum()
    }

    /// Tag an attempt's result for the retry loop
    pub fn classify<T>(result: Result<T>) -> Attempt<T> {
        match result {
            Ok(value) => Attempt::Success(value),
            Err(e) if e.is_retriable() => Attempt::Transient(e),
            Err(e) => Attempt::Fatal(e),
        }
    }

    /// Run `operation` until it succeeds, fails fatally, or the budget runs out.
    ///
    /// `on_retry` sees every transient failure before its backoff is waited.
    /// The waits are plain `tokio::time::sleep`s on the calling task; a
    /// cancelled `cancel` token ends the wait with [`Error::Cancelled`].
    pub async fn execute<T, F, Fut, H>(
        &self,
        mut operation: F,
        mut on_retry: H,
        cancel: Option<&CancellationToken>,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        H: FnMut(&RetryAttempt<'_>),
    {
        let mut waits = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match Self::classify(operation(attempt).await) {
                Attempt::Success(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                        waits,
                    };
                }
                Attempt::Fatal(e) => {
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt,
                        waits,
                    };
                }
                Attempt::Transient(e) => e,
            };

            let delay = self.delay_for_attempt(attempt);
            on_retry(&RetryAttempt {
                attempt,
                max_attempts: self.max_attempts,
                delay,
                error: &error,
            });

            if !delay.is_zero() {
                waits.push(delay);
                if !wait(delay, cancel).await {
                    return RetryOutcome {
                        result: Err(Error::Cancelled),
                        attempts: attempt,
                        waits,
                    };
                }
            }

            if attempt >= self.max_attempts {
                return RetryOutcome {
                    result: Err(Error::RetryExhausted {
                        attempts: attempt,
                        last: Box::new(error),
                    }),
                    attempts: attempt,
                    waits,
                };
            }
        }
    }
}

/// Sleep for `delay`; returns false when cancelled first
async fn wait(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => {
            tokio::select! {
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            }
        }
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}

/// Result of a retried operation
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Final result
    pub result: Result<T>,
    /// Number of attempts made
    pub attempts: u32,
    /// Backoffs waited, in order
    pub waits: Vec<Duration>,
}

impl<T> RetryOutcome<T> {
    /// Total time spent waiting
    pub fn total_wait(&self) -> Duration {
        self.waits.iter().sum()
    }

    /// Get the result
    pub fn into_result(self) -> Result<T> {
        self.result
    }
}
