use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::StatusFetcher;
use crate::error::MediaflowError;
use crate::job::Job;
use crate::parsers::{self, NormalizedOutcome};
use crate::registry::Provider;

/// Default ceiling on status checks per job.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

/// Default fixed interval between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Consecutive transport-level fetch failures before a job is failed.
pub const MAX_CONSECUTIVE_FETCH_FAILURES: u32 = 5;

/// Delay before poll number `attempt` (0-based: 0 is the first poll).
pub trait PollDelay: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct FixedInterval(pub Duration);

impl PollDelay for FixedInterval {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// base × factor^attempt, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub factor: f64,
    pub max: Duration,
}

impl PollDelay for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        // Factors below 1 (or NaN) would shrink or negate the delay.
        let factor = self.factor.max(1.0);
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.base.as_secs_f64() * factor.powi(exp);
        if !scaled.is_finite() || scaled >= self.max.as_secs_f64() {
            return self.max;
        }
        self.base.mul_f64(factor.powi(exp)).min(self.max)
    }
}

/// Snapshot handed to the progress callback on non-terminal polls.
#[derive(Debug, Clone, Copy)]
pub struct PollProgress<'a> {
    pub job_id: &'a str,
    pub provider: Provider,
    /// 1-based number of the poll that produced this status.
    pub attempt: u32,
    pub status: &'a str,
}

pub type ProgressCallback = Arc<dyn Fn(&PollProgress<'_>) + Send + Sync>;

/// Performs single status checks. Holds no timers: the reconciler decides
/// when to call [`PollingScheduler::poll`] and records the bookkeeping.
pub struct PollingScheduler {
    fetcher: Arc<dyn StatusFetcher>,
    delay: Box<dyn PollDelay>,
    max_attempts: u32,
    progress: Option<ProgressCallback>,
}

impl PollingScheduler {
    pub fn new(fetcher: Arc<dyn StatusFetcher>) -> Self {
        Self {
            fetcher,
            delay: Box::new(FixedInterval(DEFAULT_POLL_INTERVAL)),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            progress: None,
        }
    }

    pub fn with_delay(mut self, delay: impl PollDelay + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub fn with_boxed_delay(mut self, delay: Box<dyn PollDelay>) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before poll number `attempt` (0-based).
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.delay.delay(attempt)
    }

    /// One status round trip, interpreted by the shared normalizer.
    pub async fn poll(&self, job: &Job) -> Result<NormalizedOutcome, MediaflowError> {
        let provider_job_id = job.provider_job_id().ok_or_else(|| {
            MediaflowError::Other(format!("job {} has no provider job id", job.job_id()))
        })?;

        let body = self
            .fetcher
            .fetch_status(job.provider(), job.model_id(), provider_job_id)
            .await?;
        let outcome = parsers::normalize(job.provider(), &body);

        if let NormalizedOutcome::Processing { status } = &outcome {
            tracing::debug!(
                provider = %job.provider(),
                job_id = job.job_id(),
                attempt = job.poll_attempts() + 1,
                status = status.as_str(),
                "job still in progress"
            );
            if let Some(cb) = &self.progress {
                cb(&PollProgress {
                    job_id: job.job_id(),
                    provider: job.provider(),
                    attempt: job.poll_attempts() + 1,
                    status,
                });
            }
        }

        Ok(outcome)
    }
}
