use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CellError, CellResult};

/// How the delay grows between attempts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    Fixed,
    Linear,
    #[default]
    Exponential,
}

/// Caller-side retry for operations that lose a compare-and-swap race.
///
/// Nothing in Rhizome retries on its own. Wrap a whole operation (reads,
/// validation, commit) in [`RetryPolicy::run`] to re-run it from scratch
/// while it keeps failing with a retriable error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 10,
            max_backoff_ms: 1_000,
            backoff: Backoff::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Run `op` once, with no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let step = attempt.saturating_sub(1);
        let ms = match self.backoff {
            Backoff::Fixed => self.initial_backoff_ms,
            Backoff::Linear => self.initial_backoff_ms.saturating_mul(u64::from(attempt)),
            Backoff::Exponential => self
                .initial_backoff_ms
                .saturating_mul(1u64.checked_shl(step).unwrap_or(u64::MAX)),
        };
        Duration::from_millis(ms.min(self.max_backoff_ms))
    }

    /// Call `op` with the 1-based attempt number until it succeeds, fails
    /// with a non-retriable error, or attempts run out. The last error is
    /// returned.
    pub fn run<T, F>(&self, mut op: F) -> CellResult<T>
    where
        F: FnMut(u32) -> CellResult<T>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Err(e) if e.is_retriable() && attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retry scheduled");
                    thread::sleep(delay);
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    pub(crate) fn check(&self) -> CellResult<()> {
        if self.max_attempts == 0 {
            return Err(CellError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(CellError::Config(
                "retry.max_backoff_ms must not be below initial_backoff_ms".into(),
            ));
        }
        Ok(())
    }
}
