//! Bounded exponential backoff for status writes.

use crate::Error;
use rand::Rng;
use std::{future::Future, time::Duration};

/// Controls how often, and how far apart, a failed status write is retried.
#[derive(Clone, Debug, PartialEq)]
pub struct Backoff {
    /// The maximum number of attempts, including the first.
    pub steps: u32,
    pub base: Duration,
    pub max: Duration,
    pub factor: f64,
    /// Each delay is extended by a random fraction of itself, up to this ratio.
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            steps: 5,
            base: Duration::from_millis(10),
            max: Duration::from_secs(1),
            factor: 5.0,
            jitter: 0.1,
        }
    }
}

impl Backoff {
    /// The un-jittered delay before the given retry, starting at zero.
    pub fn delay(&self, retry: u32) -> Duration {
        let delay = self.base.as_secs_f64() * self.factor.powi(retry as i32);
        Duration::from_secs_f64(delay.min(self.max.as_secs_f64()))
    }

    fn jittered(&self, retry: u32) -> Duration {
        let delay = self.delay(retry);
        if self.jitter <= 0.0 {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0.0..self.jitter);
        delay.mul_f64(1.0 + extra)
    }

    /// Runs `op` until it succeeds, fails with an error that is not retryable, or the attempts
    /// are exhausted. The last error is returned.
    pub async fn retry<T, F, Fut>(&self, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < self.steps => {
                    let delay = self.jittered(attempt - 1);
                    tracing::debug!(%error, attempt, ?delay, "Retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
