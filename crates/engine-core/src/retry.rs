use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Errors worth another attempt. Sources flap and heal on their own; data
/// and storage errors do not.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Why the retry loop gave up.
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// The error was not transient; no further attempts were made.
    Fatal(E),
    /// Every configured attempt failed with a transient error.
    Exhausted(E),
}

impl<E> RetryFailure<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryFailure::Fatal(err) | RetryFailure::Exhausted(err) => err,
        }
    }
}

/// Bounded retry with capped exponential backoff, wrapped around the
/// extract stage so a flapping source does not fail the run outright.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200), Duration::from_secs(5))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Preset for source connectors: sources flap more than local storage.
    pub fn for_connector() -> Self {
        Self::new(5, Duration::from_millis(500), Duration::from_secs(10))
    }

    /// Immediate retries, for tests.
    pub fn no_backoff(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or
    /// exhausts the attempt budget. Every backoff is logged under the stage
    /// name, so a flapping source shows up in the run's trace before the
    /// run fails.
    pub async fn run<F, Fut, T, E>(&self, stage: &str, mut op: F) -> Result<T, RetryFailure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        let mut attempt = 1u32;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(RetryFailure::Fatal(err)),
                Err(err) if attempt >= self.max_attempts => {
                    return Err(RetryFailure::Exhausted(err));
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        stage,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Doubles from `base_delay` per failed attempt, saturating at
    /// `max_delay`.
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(self.max_delay)
    }
}
