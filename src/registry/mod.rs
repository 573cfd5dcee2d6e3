pub mod catalog;
pub mod schema;

use std::collections::HashMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dispatch::strategy::WaitingStrategy;
use crate::error::MediaflowError;
use crate::mapping::{ModelKind, RawOptions};
use crate::registry::schema::RawSchema;

/// Third-party generative-media backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Replicate,
    Fal,
    Runway,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Replicate, Provider::Fal, Provider::Runway];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replicate => "replicate",
            Self::Fal => "fal",
            Self::Runway => "runway",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }
}

/// What completion channels a model offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub supports_webhook: bool,
    pub supports_polling: bool,
    pub default_strategy: WaitingStrategy,
    /// False when the provider never acknowledges an in-flight state,
    /// so a freshly submitted job is already `processing`.
    pub reports_intermediate: bool,
}

impl Capabilities {
    pub fn supports(&self, strategy: WaitingStrategy) -> bool {
        match strategy {
            WaitingStrategy::Webhook => self.supports_webhook,
            WaitingStrategy::Polling => self.supports_polling,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub provider: Provider,
    pub model_id: String,
    pub media: MediaKind,
    /// Selects the mapper function pair for this model.
    pub kind: ModelKind,
    pub description: String,
    pub schema: RawSchema,
    pub capabilities: Capabilities,
}

/// Immutable (provider, model) table built once at startup.
#[derive(Debug, Default)]
pub struct Registry {
    models: HashMap<(Provider, String), ModelDescriptor>,
}

impl Registry {
    pub fn new(descriptors: impl IntoIterator<Item = ModelDescriptor>) -> Self {
        let models = descriptors
            .into_iter()
            .map(|d| ((d.provider, d.model_id.clone()), d))
            .collect();
        Self { models }
    }

    /// The built-in model catalog.
    pub fn builtin() -> Self {
        Self::new(catalog::builtin_models())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, provider: Provider, model_id: &str) -> Option<&ModelDescriptor> {
        self.models.get(&(provider, model_id.to_string()))
    }

    pub fn lookup(&self, provider: &str, model_id: &str) -> Result<&ModelDescriptor, MediaflowError> {
        Provider::parse(provider)
            .and_then(|p| self.get(p, model_id))
            .ok_or_else(|| MediaflowError::UnknownModel {
                provider: provider.to_string(),
                model: model_id.to_string(),
                suggestions: self.suggest_models(model_id),
            })
    }

    pub fn validate(
        &self,
        provider: &str,
        model_id: &str,
        raw: &RawOptions,
    ) -> Result<(), MediaflowError> {
        self.lookup(provider, model_id)?.schema.validate(raw)
    }

    /// Models sorted by (provider, model_id), optionally for one provider.
    pub fn list_models(&self, provider: Option<Provider>) -> Vec<&ModelDescriptor> {
        let mut models: Vec<&ModelDescriptor> = self
            .models
            .values()
            .filter(|d| provider.is_none_or(|p| d.provider == p))
            .collect();
        models.sort_by(|a, b| (a.provider, &a.model_id).cmp(&(b.provider, &b.model_id)));
        models
    }

    /// Suggest similar model ids for a failed lookup (substring match).
    /// Sorted alphabetically, capped at 5 to keep error messages readable.
    pub fn suggest_models(&self, query: &str) -> Vec<String> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return vec![];
        }
        let mut suggestions: Vec<String> = self
            .models
            .values()
            .filter(|d| {
                let id = d.model_id.to_lowercase();
                id.contains(&q) || q.contains(&id)
            })
            .map(|d| format!("{}/{}", d.provider, d.model_id))
            .collect();
        suggestions.sort();
        suggestions.truncate(5);
        suggestions
    }
}
