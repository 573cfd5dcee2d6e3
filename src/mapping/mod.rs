//! Bidirectional mapping between the unified request vocabulary and each
//! model's raw provider options.
//!
//! Forward mapping (`to_provider_options`) fails only when a field the model
//! requires is absent. Values the model cannot accept are passed through and
//! rejected by schema validation, so every constraint lives in one place.
//! Reverse mapping is best-effort and audit-only: fields the raw shape does
//! not carry stay `None`.

pub mod fal;
pub mod replicate;
pub mod runway;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MediaflowError;
use crate::registry::ModelDescriptor;

/// Exact parameter object a provider+model expects.
pub type RawOptions = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape16x9,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "3:2")]
    Landscape3x2,
    #[serde(rename = "2:3")]
    Portrait2x3,
    #[serde(rename = "21:9")]
    Cinema21x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 8] = [
        Self::Square,
        Self::Landscape16x9,
        Self::Portrait9x16,
        Self::Landscape4x3,
        Self::Portrait3x4,
        Self::Landscape3x2,
        Self::Portrait2x3,
        Self::Cinema21x9,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape16x9 => "16:9",
            Self::Portrait9x16 => "9:16",
            Self::Landscape4x3 => "4:3",
            Self::Portrait3x4 => "3:4",
            Self::Landscape3x2 => "3:2",
            Self::Portrait2x3 => "2:3",
            Self::Cinema21x9 => "21:9",
        }
    }

    /// Parse a `w:h` ratio. `"auto"` and unknown ratios map to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    #[serde(alias = "jpeg")]
    Jpg,
    Webp,
    Mp3,
    Wav,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [Self::Png, Self::Jpg, Self::Webp, Self::Mp3, Self::Wav];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Webp => "webp",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "jpeg" => Some(Self::Jpg),
            other => Self::ALL.into_iter().find(|f| f.as_str() == other),
        }
    }
}

/// Caller-facing request vocabulary shared by every model.
/// Which fields are required depends on the target model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UnifiedOptions {
    /// Text prompt describing the desired media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Things the output should avoid (models without support ignore it).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    /// Output aspect ratio, e.g. "16:9". Omit to let the model decide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    /// Output duration in seconds (video/audio models).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    /// Input image URLs, in order. Edit and image-to-video models use the first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
    /// Output file format: png, jpg, webp, mp3, wav.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    /// Random seed for reproducible generations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Number of outputs to generate (image models).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_outputs: Option<u32>,
}

/// The unified field a model needs but the request lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingField(pub &'static str);

/// Enumerated key selecting a model's mapper function pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    MinimaxVideo01,
    FluxSchnell,
    FluxKontextPro,
    MusicGen,
    KlingV2Master,
    RunwayGen4Turbo,
}

impl ModelKind {
    pub const ALL: [ModelKind; 6] = [
        Self::MinimaxVideo01,
        Self::FluxSchnell,
        Self::FluxKontextPro,
        Self::MusicGen,
        Self::KlingV2Master,
        Self::RunwayGen4Turbo,
    ];

    pub fn map_forward(self, unified: &UnifiedOptions) -> Result<RawOptions, MissingField> {
        match self {
            Self::MinimaxVideo01 => replicate::minimax_to_raw(unified),
            Self::FluxSchnell => replicate::flux_schnell_to_raw(unified),
            Self::FluxKontextPro => replicate::flux_kontext_to_raw(unified),
            Self::MusicGen => replicate::musicgen_to_raw(unified),
            Self::KlingV2Master => fal::kling_to_raw(unified),
            Self::RunwayGen4Turbo => runway::gen4_turbo_to_raw(unified),
        }
    }

    pub fn map_reverse(self, raw: &RawOptions) -> UnifiedOptions {
        match self {
            Self::MinimaxVideo01 => replicate::minimax_from_raw(raw),
            Self::FluxSchnell => replicate::flux_schnell_from_raw(raw),
            Self::FluxKontextPro => replicate::flux_kontext_from_raw(raw),
            Self::MusicGen => replicate::musicgen_from_raw(raw),
            Self::KlingV2Master => fal::kling_from_raw(raw),
            Self::RunwayGen4Turbo => runway::gen4_turbo_from_raw(raw),
        }
    }
}

pub fn to_provider_options(
    descriptor: &ModelDescriptor,
    unified: &UnifiedOptions,
) -> Result<RawOptions, MediaflowError> {
    descriptor
        .kind
        .map_forward(unified)
        .map_err(|MissingField(field)| MediaflowError::Mapping {
            model: descriptor.model_id.clone(),
            field: field.to_string(),
        })
}

pub fn from_provider_options(descriptor: &ModelDescriptor, raw: &RawOptions) -> UnifiedOptions {
    descriptor.kind.map_reverse(raw)
}

// ---------------------------------------------------------------------------
// Shared helpers for the per-provider mappers
// ---------------------------------------------------------------------------

fn require_prompt(unified: &UnifiedOptions) -> Result<&str, MissingField> {
    unified
        .prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or(MissingField("prompt"))
}

fn first_image(unified: &UnifiedOptions) -> Option<&str> {
    unified.image_urls.first().map(String::as_str)
}

fn put(raw: &mut RawOptions, key: &str, value: Option<impl Into<Value>>) {
    if let Some(v) = value {
        raw.insert(key.to_string(), v.into());
    }
}

fn get_str(raw: &RawOptions, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

fn get_u64(raw: &RawOptions, key: &str) -> Option<u64> {
    raw.get(key).and_then(Value::as_u64)
}

fn get_u32(raw: &RawOptions, key: &str) -> Option<u32> {
    get_u64(raw, key).and_then(|n| u32::try_from(n).ok())
}

fn image_list(raw: &RawOptions, key: &str) -> Vec<String> {
    get_str(raw, key).into_iter().collect()
}
