pub mod http;
pub mod poll;
pub mod strategy;

use async_trait::async_trait;

use crate::error::MediaflowError;
use crate::mapping::RawOptions;
use crate::registry::Provider;

/// Everything a transport needs to launch one job.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub job_id: String,
    pub provider: Provider,
    pub model_id: String,
    /// Already validated against the model's schema.
    pub options: RawOptions,
    /// Callback URL for webhook-strategy jobs.
    pub webhook_url: Option<String>,
}

/// Launches a job with a provider and returns the provider's job id.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, req: &SubmitRequest) -> Result<String, MediaflowError>;
}

/// Fetches the current raw status payload of a provider job.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch_status(
        &self,
        provider: Provider,
        model_id: &str,
        provider_job_id: &str,
    ) -> Result<serde_json::Value, MediaflowError>;
}
