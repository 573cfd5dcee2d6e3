use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::dispatch::poll::{MAX_CONSECUTIVE_FETCH_FAILURES, PollingScheduler};
use crate::dispatch::strategy::{self, WaitingStrategy};
use crate::dispatch::{SubmitRequest, Submitter};
use crate::error::MediaflowError;
use crate::job::{Applied, FailureKind, Job};
use crate::mapping::{self, UnifiedOptions};
use crate::parsers;
use crate::registry::{ModelDescriptor, Provider, Registry};
use crate::store::JobStore;

/// Max length of a caller-assigned job id.
pub const MAX_JOB_ID_LEN: usize = 128;

/// Monotonic counter for generated job ids within one process.
static JOB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Wall clock in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// Per-job critical sections, handed out by job id.
#[derive(Default)]
struct JobLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl JobLocks {
    async fn acquire(&self, job_id: &str) -> OwnedMutexGuard<()> {
        // TODO: drop the entry when its job reaches a terminal state.
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(job_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// A caller's request for one generation.
#[derive(Debug, Clone, Default)]
pub struct SubmitJob {
    pub provider: String,
    pub model_id: String,
    pub options: UnifiedOptions,
    /// Caller-assigned id. Re-submitting an existing id returns that job.
    pub job_id: Option<String>,
    pub strategy: Option<WaitingStrategy>,
}

/// Owns every job transition: submission, webhook and poll signals, and
/// cancellation. Each transition is load, modify, save under the job's lock.
pub struct Reconciler {
    registry: Arc<Registry>,
    submitter: Arc<dyn Submitter>,
    scheduler: PollingScheduler,
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    webhook_base_url: Option<String>,
    locks: JobLocks,
}

impl Reconciler {
    pub fn new(
        registry: Arc<Registry>,
        submitter: Arc<dyn Submitter>,
        scheduler: PollingScheduler,
        store: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            registry,
            submitter,
            scheduler,
            store,
            clock: Arc::new(SystemClock),
            webhook_base_url: None,
            locks: JobLocks::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Webhook jobs get `<base>/<provider>/<job_id>` as their callback URL,
    /// delivered through [`Reconciler::on_callback`]. Without a base URL
    /// every job polls.
    pub fn with_webhook_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base = base_url.into();
        let base = base.trim_end_matches('/');
        self.webhook_base_url = (!base.is_empty()).then(|| base.to_string());
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scheduler(&self) -> &PollingScheduler {
        &self.scheduler
    }

    pub fn webhook_url(&self, provider: Provider, job_id: &str) -> Option<String> {
        self.webhook_base_url
            .as_ref()
            .map(|base| format!("{base}/{provider}/{job_id}"))
    }

    /// Map, validate and launch a job.
    ///
    /// Caller errors (unknown model, mapping, validation, strategy) return
    /// `Err` and leave nothing behind. A provider rejection is recorded as
    /// a failed job and returned as `Ok`.
    pub async fn submit(&self, req: SubmitJob) -> Result<Job, MediaflowError> {
        let descriptor = self.registry.lookup(&req.provider, &req.model_id)?;
        let raw_options = mapping::to_provider_options(descriptor, &req.options)?;
        descriptor.schema.validate(&raw_options)?;
        let strategy = strategy::select(&self.reachable(descriptor), req.strategy)?;

        let job_id = match req.job_id {
            Some(id) => {
                validate_job_id(&id)?;
                id
            }
            None => generate_job_id(self.clock.now_ms()),
        };

        let _guard = self.locks.acquire(&job_id).await;
        if let Some(existing) = self.store.load(&job_id).await? {
            return reuse_existing(existing, descriptor);
        }

        let request = SubmitRequest {
            job_id: job_id.clone(),
            provider: descriptor.provider,
            model_id: descriptor.model_id.clone(),
            options: raw_options.clone(),
            webhook_url: match strategy {
                WaitingStrategy::Webhook => self.webhook_url(descriptor.provider, &job_id),
                WaitingStrategy::Polling => None,
            },
        };

        let result = self.submitter.submit(&request).await;
        let now = self.clock.now_ms();
        let job = match result {
            Ok(provider_job_id) if !provider_job_id.trim().is_empty() => {
                let first_poll = now.saturating_add(duration_ms(self.scheduler.next_delay(0)));
                Job::accepted(
                    job_id,
                    descriptor,
                    strategy,
                    provider_job_id,
                    raw_options,
                    now,
                    first_poll,
                )
            }
            Ok(_) => {
                let err = MediaflowError::ProviderSubmission {
                    provider: descriptor.provider.to_string(),
                    message: "empty job id in response".to_string(),
                };
                self.rejected(job_id, descriptor, strategy, raw_options, now, err.user_message())
            }
            Err(e) => {
                let message = e.user_message();
                self.rejected(job_id, descriptor, strategy, raw_options, now, message)
            }
        };

        self.store.save(&job).await?;
        if !job.is_terminal() {
            tracing::info!(
                provider = %job.provider(),
                model = job.model_id(),
                job_id = job.job_id(),
                provider_job_id = job.provider_job_id(),
                strategy = strategy.as_str(),
                status = job.status().as_str(),
                "job submitted"
            );
        }
        Ok(job)
    }

    /// The descriptor as seen by strategy selection: no receiver URL means
    /// no webhook can reach us.
    fn reachable<'a>(&self, descriptor: &'a ModelDescriptor) -> Cow<'a, ModelDescriptor> {
        if self.webhook_base_url.is_some() || !descriptor.capabilities.supports_webhook {
            return Cow::Borrowed(descriptor);
        }
        let mut reachable = descriptor.clone();
        reachable.capabilities.supports_webhook = false;
        Cow::Owned(reachable)
    }

    fn rejected(
        &self,
        job_id: String,
        descriptor: &ModelDescriptor,
        strategy: WaitingStrategy,
        raw_options: mapping::RawOptions,
        now: u64,
        message: String,
    ) -> Job {
        tracing::warn!(
            provider = %descriptor.provider,
            model = %descriptor.model_id,
            job_id = %job_id,
            "provider rejected submission: {message}"
        );
        Job::rejected(job_id, descriptor, strategy, raw_options, message, now)
    }

    /// Apply a pushed status payload, routed by the provider's job id.
    pub async fn on_webhook(
        &self,
        provider: &str,
        provider_job_id: &str,
        payload: &Value,
    ) -> Result<Job, MediaflowError> {
        let unknown = || MediaflowError::UnknownJob(format!("{provider}/{provider_job_id}"));
        let parsed = Provider::parse(provider).ok_or_else(unknown)?;
        let job_id = self
            .store
            .find_by_provider_job(parsed, provider_job_id)
            .await?
            .ok_or_else(unknown)?;
        self.apply_pushed(parsed, &job_id, payload).await
    }

    /// Apply a pushed status payload arriving on our own callback URL,
    /// `<base>/<provider>/<job_id>`.
    pub async fn on_callback(
        &self,
        provider: &str,
        job_id: &str,
        payload: &Value,
    ) -> Result<Job, MediaflowError> {
        let parsed = Provider::parse(provider)
            .ok_or_else(|| MediaflowError::UnknownJob(format!("{provider}/{job_id}")))?;
        self.apply_pushed(parsed, job_id, payload).await
    }

    async fn apply_pushed(
        &self,
        provider: Provider,
        job_id: &str,
        payload: &Value,
    ) -> Result<Job, MediaflowError> {
        let _guard = self.locks.acquire(job_id).await;
        let mut job = self.load(job_id).await?;
        if job.provider() != provider {
            return Err(MediaflowError::UnknownJob(format!("{provider}/{job_id}")));
        }

        let outcome = parsers::normalize(provider, payload);
        let now = self.clock.now_ms();
        let applied = job.apply(outcome, now);
        log_applied(&job, &applied, "webhook");
        if matches!(applied, Applied::Changed { .. }) {
            self.store.save(&job).await?;
        }
        Ok(job)
    }

    /// Run one poll cycle if the job is due.
    ///
    /// Ticks are at-least-once: ticks for terminal or webhook jobs, and ticks
    /// arriving before `next_poll_at`, return the job untouched.
    pub async fn on_poll_tick(&self, job_id: &str) -> Result<Job, MediaflowError> {
        let _guard = self.locks.acquire(job_id).await;
        let mut job = self.load(job_id).await?;

        if job.is_terminal() || job.waiting_strategy() != WaitingStrategy::Polling {
            tracing::debug!(job_id, status = job.status().as_str(), "poll tick ignored");
            return Ok(job);
        }
        let now = self.clock.now_ms();
        if let Some(due) = job.next_poll_at_ms()
            && now < due
        {
            tracing::debug!(job_id, due_in_ms = due - now, "poll tick before due time");
            return Ok(job);
        }

        let result = self.scheduler.poll(&job).await;
        let now = self.clock.now_ms();
        let max_attempts = self.scheduler.max_attempts();

        match result {
            Ok(outcome) => {
                job.record_poll_cycle(true, now);
                let applied = job.apply(outcome, now);
                log_applied(&job, &applied, "poll");
            }
            Err(e) => {
                let failures = job.record_poll_cycle(false, now);
                tracing::warn!(
                    provider = %job.provider(),
                    job_id,
                    attempt = job.poll_attempts(),
                    consecutive_failures = failures,
                    "status check failed: {e}"
                );
                if failures >= MAX_CONSECUTIVE_FETCH_FAILURES {
                    let err = MediaflowError::PollFailed {
                        provider: job.provider().to_string(),
                        job_id: job.job_id().to_string(),
                        message: e.user_message(),
                    };
                    let applied = job.fail(
                        FailureKind::PollFailed,
                        format!(
                            "{} ({failures} consecutive failures, last: {})",
                            err.user_message(),
                            e.user_message()
                        ),
                        now,
                    );
                    log_applied(&job, &applied, "poll");
                }
            }
        }

        if !job.is_terminal() {
            if job.poll_attempts() >= max_attempts {
                let applied = job.fail(
                    FailureKind::PollingTimeout,
                    MediaflowError::PollingTimeout {
                        attempts: job.poll_attempts(),
                    }
                    .user_message(),
                    now,
                );
                log_applied(&job, &applied, "poll");
            } else {
                let delay = self.scheduler.next_delay(job.poll_attempts());
                job.schedule_next_poll(now, duration_ms(delay));
            }
        }

        self.store.save(&job).await?;
        Ok(job)
    }

    /// Fail a live job with `"cancelled"`. Terminal jobs are returned as is.
    pub async fn cancel(&self, job_id: &str) -> Result<Job, MediaflowError> {
        let _guard = self.locks.acquire(job_id).await;
        let mut job = self.load(job_id).await?;
        if job.is_terminal() {
            return Ok(job);
        }
        let applied = job.fail(FailureKind::Cancelled, "cancelled".to_string(), self.clock.now_ms());
        log_applied(&job, &applied, "cancel");
        self.store.save(&job).await?;
        Ok(job)
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Job, MediaflowError> {
        self.load(job_id).await
    }

    pub fn list_models(&self, provider: Option<Provider>) -> Vec<&ModelDescriptor> {
        self.registry.list_models(provider)
    }

    /// Live polling jobs in the store, for resuming after a restart.
    pub async fn resumable_polls(&self) -> Result<Vec<Job>, MediaflowError> {
        let mut jobs: Vec<Job> = self
            .store
            .active_jobs()
            .await?
            .into_iter()
            .filter(|j| j.waiting_strategy() == WaitingStrategy::Polling)
            .collect();
        jobs.sort_by_key(|j| j.created_at_ms());
        Ok(jobs)
    }

    /// Sleep until each `next_poll_at` and tick, until the job is terminal or
    /// `cancel` fires. Returns the last snapshot.
    ///
    /// A failed tick (store or fetch plumbing) is logged and retried after
    /// the poll interval. Only `UnknownJob` ends the loop with an error.
    pub async fn drive_polling(
        &self,
        job_id: &str,
        cancel: CancellationToken,
    ) -> Result<Job, MediaflowError> {
        let mut job = self.load(job_id).await?;
        loop {
            if job.is_terminal() || job.waiting_strategy() != WaitingStrategy::Polling {
                return Ok(job);
            }
            let wait_ms = job
                .next_poll_at_ms()
                .map_or(0, |due| due.saturating_sub(self.clock.now_ms()));
            if !sleep_unless_cancelled(&cancel, Duration::from_millis(wait_ms)).await {
                tracing::debug!(job_id, "poll driver stopped");
                return Ok(job);
            }

            match self.on_poll_tick(job_id).await {
                Ok(next) => job = next,
                Err(e @ MediaflowError::UnknownJob(_)) => return Err(e),
                Err(e) => {
                    let retry = self.scheduler.next_delay(job.poll_attempts());
                    tracing::warn!(
                        job_id,
                        retry_in_ms = duration_ms(retry),
                        "poll tick failed: {e}"
                    );
                    if !sleep_unless_cancelled(&cancel, retry).await {
                        tracing::debug!(job_id, "poll driver stopped");
                        return Ok(job);
                    }
                    job = match self.load(job_id).await {
                        Ok(fresh) => fresh,
                        Err(e @ MediaflowError::UnknownJob(_)) => return Err(e),
                        Err(_) => job,
                    };
                }
            }
        }
    }

    async fn load(&self, job_id: &str) -> Result<Job, MediaflowError> {
        self.store
            .load(job_id)
            .await?
            .ok_or_else(|| MediaflowError::UnknownJob(job_id.to_string()))
    }
}

/// False when `cancel` fired first.
async fn sleep_unless_cancelled(cancel: &CancellationToken, wait: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(wait) => true,
    }
}

fn reuse_existing(existing: Job, descriptor: &ModelDescriptor) -> Result<Job, MediaflowError> {
    if existing.provider() != descriptor.provider || existing.model_id() != descriptor.model_id {
        return Err(MediaflowError::Validation {
            field: "job_id".to_string(),
            reason: format!(
                "already used for {}/{}",
                existing.provider(),
                existing.model_id()
            ),
        });
    }
    tracing::debug!(job_id = existing.job_id(), "job id already submitted, returning existing job");
    Ok(existing)
}

fn log_applied(job: &Job, applied: &Applied, channel: &str) {
    match applied {
        Applied::Changed { from, to } => tracing::info!(
            provider = %job.provider(),
            job_id = job.job_id(),
            provider_job_id = job.provider_job_id(),
            attempt = job.poll_attempts(),
            channel,
            "job {} -> {}",
            from.as_str(),
            to.as_str()
        ),
        Applied::Unchanged | Applied::Duplicate => tracing::debug!(
            job_id = job.job_id(),
            channel,
            status = job.status().as_str(),
            "signal did not change job"
        ),
        Applied::Discarded { reason } => tracing::warn!(
            provider = %job.provider(),
            job_id = job.job_id(),
            channel,
            "discarded signal: {reason}"
        ),
    }
}

/// Job ids become file names and URL path segments.
pub fn validate_job_id(job_id: &str) -> Result<(), MediaflowError> {
    let reason = if job_id.is_empty() {
        Some("must not be empty".to_string())
    } else if job_id.len() > MAX_JOB_ID_LEN {
        Some(format!("must be at most {MAX_JOB_ID_LEN} characters"))
    } else if !job_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        Some("may only contain letters, digits, '-', '_' and '.'".to_string())
    } else if job_id.starts_with('.') {
        Some("must not start with '.'".to_string())
    } else {
        None
    };
    match reason {
        Some(reason) => Err(MediaflowError::Validation {
            field: "job_id".to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn generate_job_id(now_ms: u64) -> String {
    let seq = JOB_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("job_{now_ms}_{seq}")
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
