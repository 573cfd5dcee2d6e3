use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaflowError {
    #[error("unknown model: {provider}/{model}")]
    UnknownModel {
        provider: String,
        model: String,
        suggestions: Vec<String>,
    },

    #[error("invalid field `{field}`: {reason}")]
    Validation { field: String, reason: String },

    #[error("model {model} requires `{field}`")]
    Mapping { model: String, field: String },

    #[error("no supported waiting strategy for {provider}/{model}")]
    UnsupportedStrategy { provider: String, model: String },

    #[error("submission rejected by {provider}: {message}")]
    ProviderSubmission { provider: String, message: String },

    #[error("anomalous result from {provider}: {message}")]
    ProviderResult { provider: String, message: String },

    #[error("polling timed out after {attempts} attempts")]
    PollingTimeout { attempts: u32 },

    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("poll failed for {provider} job {job_id}: {message}")]
    PollFailed {
        provider: String,
        job_id: String,
        message: String,
    },

    #[error("auth failed for {provider}: {message}")]
    AuthFailed { provider: String, message: String },

    #[error("rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("upstream error from {provider}: {message}")]
    Upstream {
        provider: String,
        message: String,
        status: Option<u16>,
    },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("schema parse error: {0}")]
    SchemaParse(String),

    #[error("job store error: {0}")]
    Store(String),

    #[error("{0}")]
    Other(String),
}

impl MediaflowError {
    /// Extract provider name from structured error variants.
    /// Returns None for variants that don't carry provider context.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::UnknownModel { provider, .. } => Some(provider),
            Self::UnsupportedStrategy { provider, .. } => Some(provider),
            Self::ProviderSubmission { provider, .. } => Some(provider),
            Self::ProviderResult { provider, .. } => Some(provider),
            Self::PollFailed { provider, .. } => Some(provider),
            Self::AuthFailed { provider, .. } => Some(provider),
            Self::RateLimited { provider } => Some(provider),
            Self::Upstream { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Returns true for transient errors that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            // status: None = not from HTTP, treat as permanent
            Self::Upstream { status, .. } => status.is_some_and(|s| s >= 500),
            Self::Request(_) => true,
            Self::PollFailed { .. } => true,
            _ => false,
        }
    }

    /// Returns true for errors raised before anything reaches a provider.
    /// These go straight back to the submitter and never create a job.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownModel { .. }
                | Self::Validation { .. }
                | Self::Mapping { .. }
                | Self::UnsupportedStrategy { .. }
        )
    }

    /// Produce a sanitized error message safe for returning to tool clients.
    /// Does not leak provider URLs, credentials, or upstream bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownModel {
                provider,
                model,
                suggestions,
            } => {
                if suggestions.is_empty() {
                    format!("unknown model: {provider}/{model}")
                } else {
                    format!(
                        "unknown model: {provider}/{model}. Did you mean: {}?",
                        suggestions.join(", ")
                    )
                }
            }
            Self::Validation { field, reason } => format!("invalid field `{field}`: {reason}"),
            Self::Mapping { model, field } => format!("model {model} requires `{field}`"),
            Self::UnsupportedStrategy { provider, model } => {
                format!("{provider}/{model} supports neither webhooks nor polling")
            }
            Self::ProviderSubmission { provider, message } => {
                format!("submission rejected by {provider}: {message}")
            }
            Self::ProviderResult { provider, .. } => {
                format!("{provider} returned an unusable result")
            }
            Self::PollingTimeout { attempts } => {
                format!("job did not finish within {attempts} status checks")
            }
            Self::UnknownJob(id) => format!("unknown job: {id}"),
            Self::PollFailed { provider, .. } => {
                format!("failed to check job status with {provider}")
            }
            Self::AuthFailed { provider, message } => {
                format!("authentication failed for {provider}: {message}")
            }
            Self::RateLimited { provider } => {
                format!("rate limited by {provider}, try again shortly")
            }
            Self::Upstream { provider, status, .. } => match status {
                Some(s) => format!("upstream error from {provider} (HTTP {s})"),
                None => format!("upstream error from {provider}"),
            },
            Self::Request(_) => "request to provider failed".to_string(),
            Self::SchemaParse(_) => "failed to parse provider response".to_string(),
            Self::Store(_) => "job store unavailable".to_string(),
            Self::Other(msg) => msg.clone(),
        }
    }
}
