//! Job-wide request rate limiter
//!
//! Every outbound request of a job, retries included, acquires a token here
//! before it is issued. The bucket holds `capacity` tokens; a spent token
//! comes back exactly one interval after it was spent. That keeps the
//! long-run rate at `capacity` per interval and also guarantees that no
//! window of one interval ever sees more than `capacity` request starts,
//! which a continuously refilled bucket cannot promise after an idle burst.

use crate::config::JobConfig;
use crate::HarvestError;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Token bucket shared by all workers of one job
pub struct RateLimiter {
    capacity: usize,
    interval: Duration,

    /// Times at which currently outstanding tokens were spent, oldest first.
    ///
    /// The async mutex queues waiters in FIFO order, and the holder keeps it
    /// while sleeping for the next token, so tokens are granted in arrival
    /// order and no waiter starves.
    spent: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `capacity` request starts per `interval`
    pub fn new(capacity: u32, interval: Duration) -> Self {
        let capacity = capacity.max(1) as usize;
        Self {
            capacity,
            interval,
            spent: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn from_config(config: &JobConfig) -> Self {
        Self::new(config.rate_limit_per_interval, config.rate_interval())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for a token
    ///
    /// # Returns
    ///
    /// * `Ok(())` - A token was granted; the caller may start its request
    /// * `Err(HarvestError::Cancelled)` - The job was cancelled while waiting
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), HarvestError> {
        let mut spent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
            guard = self.spent.lock() => guard,
        };

        loop {
            let now = Instant::now();

            // Return tokens spent at least one interval ago
            while let Some(&oldest) = spent.front() {
                if now.duration_since(oldest) >= self.interval {
                    spent.pop_front();
                } else {
                    break;
                }
            }

            if spent.len() < self.capacity {
                spent.push_back(now);
                return Ok(());
            }

            let wait = match spent.front() {
                Some(&oldest) => self.interval.saturating_sub(now.duration_since(oldest)),
                None => Duration::ZERO,
            };

            tracing::trace!("Rate limit reached, next token in {:?}", wait);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}
