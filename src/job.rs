use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dispatch::strategy::WaitingStrategy;
use crate::error::MediaflowError;
use crate::mapping::RawOptions;
use crate::parsers::{MediaOutput, NormalizedOutcome};
use crate::registry::{ModelDescriptor, Provider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Why a job ended in `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Provider reported failure or cancellation.
    Provider,
    /// Provider reported success with an unusable or malformed payload.
    ProviderResult,
    /// Provider rejected the job at submit time.
    ProviderSubmission,
    PollingTimeout,
    /// Status checks kept failing at the transport level.
    PollFailed,
    /// Cancelled by the caller.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Polling bookkeeping, present only on polling jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollState {
    pub attempts: u32,
    pub next_poll_at_ms: Option<u64>,
    pub consecutive_fetch_failures: u32,
}

/// Effect of feeding one signal into a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Changed { from: JobStatus, to: JobStatus },
    /// Non-terminal signal that leaves the status where it was.
    Unchanged,
    /// Re-delivery of the terminal outcome already recorded.
    Duplicate,
    /// Signal contradicts a terminal state and was dropped.
    Discarded { reason: String },
}

/// One generation request and everything learned about it since submission.
///
/// Fields are private: only the reconciler mutates a job, and only through
/// the transition methods below, which keep status monotonic and the
/// identity fields write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    job_id: String,
    provider_job_id: Option<String>,
    provider: Provider,
    model_id: String,
    waiting_strategy: WaitingStrategy,
    status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    polling: Option<PollState>,
    #[serde(default)]
    outputs: Vec<MediaOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<JobFailure>,
    #[serde(default)]
    metadata: Map<String, Value>,
    raw_options: RawOptions,
    created_at_ms: u64,
    updated_at_ms: u64,
}

impl Job {
    /// A job the provider accepted.
    pub(crate) fn accepted(
        job_id: String,
        descriptor: &ModelDescriptor,
        strategy: WaitingStrategy,
        provider_job_id: String,
        raw_options: RawOptions,
        now_ms: u64,
        first_poll_at_ms: u64,
    ) -> Self {
        let status = if descriptor.capabilities.reports_intermediate {
            JobStatus::Submitted
        } else {
            JobStatus::Processing
        };
        let polling = (strategy == WaitingStrategy::Polling).then(|| PollState {
            next_poll_at_ms: Some(first_poll_at_ms),
            ..Default::default()
        });
        Self {
            job_id,
            provider_job_id: Some(provider_job_id),
            provider: descriptor.provider,
            model_id: descriptor.model_id.clone(),
            waiting_strategy: strategy,
            status,
            polling,
            outputs: vec![],
            error: None,
            metadata: Map::new(),
            raw_options,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    /// A job the provider refused at submit time. It never gets a provider id.
    pub(crate) fn rejected(
        job_id: String,
        descriptor: &ModelDescriptor,
        strategy: WaitingStrategy,
        raw_options: RawOptions,
        message: String,
        now_ms: u64,
    ) -> Self {
        let polling = (strategy == WaitingStrategy::Polling).then(PollState::default);
        Self {
            job_id,
            provider_job_id: None,
            provider: descriptor.provider,
            model_id: descriptor.model_id.clone(),
            waiting_strategy: strategy,
            status: JobStatus::Failed,
            polling,
            outputs: vec![],
            error: Some(JobFailure {
                kind: FailureKind::ProviderSubmission,
                message,
            }),
            metadata: Map::new(),
            raw_options,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn provider_job_id(&self) -> Option<&str> {
        self.provider_job_id.as_deref()
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn waiting_strategy(&self) -> WaitingStrategy {
        self.waiting_strategy
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Completed poll cycles. Always 0 for webhook jobs.
    pub fn poll_attempts(&self) -> u32 {
        self.polling.as_ref().map_or(0, |p| p.attempts)
    }

    pub fn next_poll_at_ms(&self) -> Option<u64> {
        self.polling.as_ref().and_then(|p| p.next_poll_at_ms)
    }

    pub fn poll_state(&self) -> Option<&PollState> {
        self.polling.as_ref()
    }

    pub fn outputs(&self) -> &[MediaOutput] {
        &self.outputs
    }

    pub fn error(&self) -> Option<&JobFailure> {
        self.error.as_ref()
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn raw_options(&self) -> &RawOptions {
        &self.raw_options
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    pub fn updated_at_ms(&self) -> u64 {
        self.updated_at_ms
    }

    /// Feed a normalized outcome into the state machine.
    pub(crate) fn apply(&mut self, outcome: NormalizedOutcome, now_ms: u64) -> Applied {
        if self.status.is_terminal() {
            return self.check_terminal_signal(&outcome);
        }

        let from = self.status;
        match outcome {
            NormalizedOutcome::Processing { .. } => {
                if self.status == JobStatus::Submitted {
                    self.status = JobStatus::Processing;
                    self.updated_at_ms = now_ms;
                    Applied::Changed {
                        from,
                        to: JobStatus::Processing,
                    }
                } else {
                    Applied::Unchanged
                }
            }
            NormalizedOutcome::Completed { outputs, metadata } if !outputs.is_empty() => {
                self.status = JobStatus::Completed;
                self.outputs = outputs;
                self.metadata.extend(metadata);
                self.finish(now_ms);
                Applied::Changed {
                    from,
                    to: JobStatus::Completed,
                }
            }
            NormalizedOutcome::Completed { .. } => {
                let err = MediaflowError::ProviderResult {
                    provider: self.provider.to_string(),
                    message: "completed without outputs".to_string(),
                };
                self.fail(FailureKind::ProviderResult, err.to_string(), now_ms)
            }
            NormalizedOutcome::Failed { kind, error } => self.fail(kind, error, now_ms),
        }
    }

    /// Move a live job to `failed`. No-op on terminal jobs.
    pub(crate) fn fail(&mut self, kind: FailureKind, message: String, now_ms: u64) -> Applied {
        if self.status.is_terminal() {
            return self.check_terminal_signal(&NormalizedOutcome::Failed {
                kind,
                error: message,
            });
        }
        let from = self.status;
        self.status = JobStatus::Failed;
        self.error = Some(JobFailure { kind, message });
        self.finish(now_ms);
        Applied::Changed {
            from,
            to: JobStatus::Failed,
        }
    }

    /// Count one finished poll cycle. Returns the consecutive fetch failure
    /// count after this cycle. No-op for webhook jobs.
    pub(crate) fn record_poll_cycle(&mut self, fetch_ok: bool, now_ms: u64) -> u32 {
        let Some(state) = self.polling.as_mut() else {
            return 0;
        };
        state.attempts += 1;
        state.next_poll_at_ms = None;
        if fetch_ok {
            state.consecutive_fetch_failures = 0;
        } else {
            state.consecutive_fetch_failures += 1;
        }
        self.updated_at_ms = now_ms;
        state.consecutive_fetch_failures
    }

    /// Schedule the next poll strictly after `now_ms`.
    pub(crate) fn schedule_next_poll(&mut self, now_ms: u64, delay_ms: u64) {
        if self.status.is_terminal() {
            return;
        }
        if let Some(state) = self.polling.as_mut() {
            state.next_poll_at_ms = Some(now_ms.saturating_add(delay_ms.max(1)));
        }
    }

    fn finish(&mut self, now_ms: u64) {
        if let Some(state) = self.polling.as_mut() {
            state.next_poll_at_ms = None;
        }
        self.updated_at_ms = now_ms;
    }

    fn check_terminal_signal(&self, outcome: &NormalizedOutcome) -> Applied {
        match (self.status, outcome) {
            (JobStatus::Completed, NormalizedOutcome::Completed { outputs, .. })
                if *outputs == self.outputs =>
            {
                Applied::Duplicate
            }
            (JobStatus::Failed, NormalizedOutcome::Failed { error, .. })
                if self.error.as_ref().is_some_and(|e| e.message == *error) =>
            {
                Applied::Duplicate
            }
            (status, outcome) => Applied::Discarded {
                reason: format!(
                    "{} signal for job already {}",
                    outcome.label(),
                    status.as_str()
                ),
            },
        }
    }
}
