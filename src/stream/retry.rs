//! Bounded polling with backoff and cancellation
//!
//! Used for long-running remote jobs (torrent processing) where the only
//! way to learn about progress is to ask again.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay every time
    Fixed(Duration),
    /// `initial * factor^n`, capped at `max`
    Exponential {
        initial: Duration,
        factor: f64,
        max: Duration,
    },
}

impl Backoff {
    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(d) => d,
            Backoff::Exponential {
                initial,
                factor,
                max,
            } => {
                let exp = attempt.saturating_sub(1).min(32) as i32;
                let secs = initial.as_secs_f64() * factor.powi(exp);
                if secs.is_nan() || secs <= 0.0 {
                    Duration::ZERO
                } else if secs.is_finite() {
                    Duration::from_secs_f64(secs).min(max)
                } else {
                    max
                }
            }
        }
    }
}

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub backoff: Backoff,
    /// Total attempts, including the first one. Never less than 1.
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            backoff: Backoff::Fixed(interval),
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for PollPolicy {
    /// 30 attempts, 2 seconds apart
    fn default() -> Self {
        Self::fixed(Duration::from_secs(2), 30)
    }
}

/// Value that satisfied the predicate and the attempt it arrived on
#[derive(Debug, Clone, PartialEq)]
pub struct Polled<T> {
    pub value: T,
    /// 1-based; `attempts - 1` delays were slept
    pub attempts: u32,
}

#[derive(Debug, Error)]
pub enum RetryError<T, E> {
    /// Every attempt ran and none satisfied the predicate
    #[error("gave up after {attempts} attempts")]
    Exhausted { attempts: u32, last: T },

    #[error("cancelled")]
    Cancelled,

    /// An attempt itself failed; polling stops immediately
    #[error(transparent)]
    Operation(E),
}

/// Call `op` until `done` accepts its result, sleeping per `policy` between
/// attempts. No sleep happens before the first attempt or after the last.
///
/// Operation errors abort immediately. Cancellation is observed while an
/// attempt is in flight and while sleeping.
pub async fn poll_until<T, E, F, Fut, P>(
    policy: PollPolicy,
    cancel: &CancellationToken,
    mut op: F,
    done: P,
) -> Result<Polled<T>, RetryError<T, E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = op(attempt) => result.map_err(RetryError::Operation)?,
        };

        if done(&value) {
            return Ok(Polled {
                value,
                attempts: attempt,
            });
        }

        if attempt >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: value,
            });
        }

        let delay = policy.backoff.delay(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "not ready, waiting");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }
}

/// Run a future unless the token fires first
pub async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        value = fut => Some(value),
    }
}
