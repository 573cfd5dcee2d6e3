use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::MediaflowError;
use crate::registry::ModelDescriptor;

/// How completion of a submitted job is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WaitingStrategy {
    Webhook,
    Polling,
}

impl WaitingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Polling => "polling",
        }
    }

    fn other(&self) -> Self {
        match self {
            Self::Webhook => Self::Polling,
            Self::Polling => Self::Webhook,
        }
    }
}

/// Pick the waiting strategy for a new job.
///
/// A supported caller preference wins, then the model's default, then
/// whichever channel remains.
pub fn select(
    descriptor: &ModelDescriptor,
    preference: Option<WaitingStrategy>,
) -> Result<WaitingStrategy, MediaflowError> {
    let caps = &descriptor.capabilities;
    let default = caps.default_strategy;

    let chosen = preference
        .filter(|p| caps.supports(*p))
        .or_else(|| caps.supports(default).then_some(default))
        .or_else(|| caps.supports(default.other()).then_some(default.other()));

    if let Some(p) = preference
        && chosen != Some(p)
    {
        tracing::debug!(
            provider = %descriptor.provider,
            model = %descriptor.model_id,
            preferred = p.as_str(),
            "preferred waiting strategy unsupported, falling back"
        );
    }

    chosen.ok_or_else(|| MediaflowError::UnsupportedStrategy {
        provider: descriptor.provider.to_string(),
        model: descriptor.model_id.clone(),
    })
}
