use schemars::JsonSchema;
use serde::Deserialize;

use crate::dispatch::strategy::WaitingStrategy;
use crate::mapping::UnifiedOptions;
use crate::reconciler::SubmitJob;

/// Request to start one generation job.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SubmitJobRequest {
    /// Provider name from `list_models`: "replicate", "fal" or "runway".
    pub provider: String,
    /// Exact model id from `list_models` (e.g. "black-forest-labs/flux-schnell").
    pub model: String,
    /// Unified generation options. Which fields are required depends on the model.
    #[serde(default)]
    pub options: UnifiedOptions,
    /// Optional caller-chosen job id (letters, digits, '-', '_', '.'). Re-using an id
    /// returns the existing job instead of submitting again.
    pub job_id: Option<String>,
    /// Preferred completion channel: "webhook" or "polling". Ignored when the model
    /// does not support it.
    pub strategy: Option<WaitingStrategy>,
}

impl From<SubmitJobRequest> for SubmitJob {
    fn from(req: SubmitJobRequest) -> Self {
        Self {
            provider: req.provider,
            model_id: req.model,
            options: req.options,
            job_id: req.job_id.filter(|id| !id.trim().is_empty()),
            strategy: req.strategy,
        }
    }
}
