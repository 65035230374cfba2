use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::UnitOfWork;
use crate::error::{FleetError, FleetResult};
use crate::store::{Datastore, IsolationLevel};

/// Capped exponential backoff between conflict retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = run once).
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 8,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << shift)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Clone)]
pub struct TransactionExecutor {
    store: Arc<dyn Datastore>,
    retry: RetryPolicy,
    isolation: IsolationLevel,
}

impl TransactionExecutor {
    /// Runs every unit of work at `SERIALIZABLE`.
    pub fn new(store: Arc<dyn Datastore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            isolation: IsolationLevel::Serializable,
        }
    }

    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    /// Runs `work` to commit, replaying it from scratch on serialization
    /// conflicts. Any other error is returned as is after rollback. When
    /// the retries run out the caller gets `FleetError::Conflict`.
    pub async fn run<W: UnitOfWork>(&self, work: &W) -> FleetResult<W::Output> {
        let mut last_conflict = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let delay = self.retry.delay_for(attempt);
                warn!(
                    "{} hit a serialization conflict, retry {}/{} in {:?}",
                    work.name(),
                    attempt,
                    self.retry.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            match self.attempt(work).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() => last_conflict = Some(e),
                Err(e) => return Err(e),
            }
        }

        let attempts = self.retry.max_retries + 1;
        error!(
            "{} gave up after {} attempts: {:?}",
            work.name(),
            attempts,
            last_conflict
        );
        Err(FleetError::Conflict(format!(
            "{} could not be serialized after {} attempts",
            work.name(),
            attempts
        )))
    }

    async fn attempt<W: UnitOfWork>(&self, work: &W) -> FleetResult<W::Output> {
        let mut tx = self.store.begin(self.isolation).await?;

        match work.run(tx.as_mut()).await {
            Ok(output) => {
                tx.commit().await?;
                debug!("{} committed", work.name());
                Ok(output)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("{} rollback failed: {}", work.name(), rollback_err);
                }
                Err(e)
            }
        }
    }
}
