use schemars::JsonSchema;
use serde::Deserialize;

/// Request naming one job.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct JobRequest {
    /// Job id returned by `submit_job`.
    pub job_id: String,
}

/// A provider status callback, forwarded by the webhook receiver.
///
/// Callbacks hitting our URL (`<base>/<provider>/<job_id>`) pass the
/// `job_id` path segment. Otherwise pass the provider's own id.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct WebhookRequest {
    /// Provider that sent the callback.
    pub provider: String,
    /// Our job id, the last segment of the callback URL.
    pub job_id: Option<String>,
    /// The provider's own id for the job (prediction id, request id, task id).
    pub provider_job_id: Option<String>,
    /// The callback body, unmodified.
    pub payload: serde_json::Value,
}

/// Which id a webhook delivery is routed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookTarget {
    Job(String),
    ProviderJob(String),
}

impl WebhookRequest {
    /// `job_id` wins when both are given. Blank ids count as absent.
    pub fn target(&self) -> Option<WebhookTarget> {
        let present = |id: &Option<String>| id.clone().filter(|s| !s.trim().is_empty());
        present(&self.job_id)
            .map(WebhookTarget::Job)
            .or_else(|| present(&self.provider_job_id).map(WebhookTarget::ProviderJob))
    }
}
