use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dispatch::strategy::WaitingStrategy;
use crate::registry::{ModelDescriptor, Provider};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListModelsRequest {
    /// Only list models of this provider.
    pub provider: Option<Provider>,
}

#[derive(Debug, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub kind: &'static str,
    pub required: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub provider: Provider,
    pub model: String,
    pub media: &'static str,
    pub description: String,
    pub default_strategy: &'static str,
    pub strategies: Vec<&'static str>,
    pub fields: Vec<FieldInfo>,
}

impl From<&ModelDescriptor> for ModelInfo {
    fn from(d: &ModelDescriptor) -> Self {
        let strategies = [WaitingStrategy::Webhook, WaitingStrategy::Polling]
            .into_iter()
            .filter(|s| d.capabilities.supports(*s))
            .map(|s| s.as_str())
            .collect();
        Self {
            provider: d.provider,
            model: d.model_id.clone(),
            media: d.media.as_str(),
            description: d.description.clone(),
            default_strategy: d.capabilities.default_strategy.as_str(),
            strategies,
            fields: d
                .schema
                .fields()
                .iter()
                .map(|f| FieldInfo {
                    name: f.name.to_string(),
                    kind: f.kind.as_str(),
                    required: f.required,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListModelsResponse {
    pub models: Vec<ModelInfo>,
}
