use std::time::Duration;

use tracing::warn;

use crate::error::{Result, WranglerError};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(2);

/// Bounded exponential backoff around a whole wrangle.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts. Used by tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `attempt` until it succeeds, fails permanently, or the retry budget
    /// is spent.
    ///
    /// The closure records the ids it is about to write into `affected` right
    /// before applying its batch. A failure once that list is non-empty means
    /// the write phase was reached, and is reported as
    /// [`WranglerError::PartialFailure`] so the caller learns which posts to
    /// check. Failures before that point keep their own kind.
    pub fn run<T, F>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut(&mut Vec<String>) -> Result<T>,
    {
        let mut retry = 0;
        loop {
            let mut affected = Vec::new();
            let err = match attempt(&mut affected) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match err {
                WranglerError::TransientIo(reason) if retry < self.max_retries => {
                    let delay = self.delay_for(retry);
                    retry += 1;
                    warn!(
                        operation,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "transient storage failure, retrying: {}",
                        reason
                    );
                    std::thread::sleep(delay);
                }
                WranglerError::TransientIo(reason) | WranglerError::Internal(reason)
                    if !affected.is_empty() =>
                {
                    return Err(WranglerError::PartialFailure {
                        operation,
                        post_ids: affected,
                        reason,
                    });
                }
                other => return Err(other),
            }
        }
    }
}
