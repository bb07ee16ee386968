//! Bounded retry with fixed backoff.

use ar_types::{ArResult, OracleError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Blocks the calling thread between attempts.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Real-time sleeper backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Fake clock that records requested waits instead of sleeping.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    pub waits: Vec<Duration>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.waits.push(duration);
    }
}

/// Attempt count and delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Call `attempt` until it yields a value, waiting `backoff` between
    /// attempts (never after the last one).
    ///
    /// `Ok(None)` and transient oracle errors count as an empty attempt; any
    /// other error is returned immediately. Returns `Ok(None)` once all
    /// attempts came back empty.
    pub fn run<T, S, F>(&self, sleeper: &mut S, mut attempt: F) -> ArResult<Option<T>>
    where
        S: Sleeper + ?Sized,
        F: FnMut(u32) -> Result<Option<T>, OracleError>,
    {
        for number in 1..=self.max_attempts {
            match attempt(number) {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => {}
                Err(e) if e.is_transient() => {}
                Err(e) => return Err(e.into()),
            }

            if number < self.max_attempts {
                info!(
                    attempt = number,
                    backoff_secs = self.backoff.as_secs_f64(),
                    "measurement not available yet, waiting before retry"
                );
                sleeper.sleep(self.backoff);
            }
        }
        Ok(None)
    }
}
