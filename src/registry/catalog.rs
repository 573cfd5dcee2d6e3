use crate::dispatch::strategy::WaitingStrategy;
use crate::mapping::ModelKind;
use crate::registry::schema::{FieldKind, FieldSpec, RawSchema};
use crate::registry::{Capabilities, MediaKind, ModelDescriptor, Provider};

pub const FLUX_ASPECT_RATIOS: &[&str] = &[
    "1:1", "16:9", "21:9", "3:2", "2:3", "4:5", "5:4", "3:4", "4:3", "9:16", "9:21",
];

pub const KONTEXT_ASPECT_RATIOS: &[&str] = &[
    "match_input_image",
    "1:1",
    "16:9",
    "9:16",
    "4:3",
    "3:4",
    "3:2",
    "2:3",
    "4:5",
    "5:4",
    "21:9",
    "9:21",
    "2:1",
    "1:2",
];

pub const KLING_ASPECT_RATIOS: &[&str] = &["16:9", "9:16", "1:1"];

pub const RUNWAY_RATIOS: &[&str] = &[
    "1280:720", "720:1280", "1104:832", "832:1104", "960:960", "1584:672",
];

// Replicate predictions: webhooks fire on start and completion, and
// GET /v1/predictions/{id} is always available.
const REPLICATE_CAPS: Capabilities = Capabilities {
    supports_webhook: true,
    supports_polling: true,
    default_strategy: WaitingStrategy::Webhook,
    reports_intermediate: true,
};

// Fal queue webhooks only fire on completion.
const FAL_CAPS: Capabilities = Capabilities {
    supports_webhook: true,
    supports_polling: true,
    default_strategy: WaitingStrategy::Polling,
    reports_intermediate: false,
};

// Runway tasks have no callback mechanism.
const RUNWAY_CAPS: Capabilities = Capabilities {
    supports_webhook: false,
    supports_polling: true,
    default_strategy: WaitingStrategy::Polling,
    reports_intermediate: true,
};

pub fn builtin_models() -> Vec<ModelDescriptor> {
    use FieldKind::{Boolean, Integer, Number, Uri};

    vec![
        ModelDescriptor {
            provider: Provider::Replicate,
            model_id: "minimax/video-01".to_string(),
            media: MediaKind::Video,
            kind: ModelKind::MinimaxVideo01,
            description: "6s 720p text/image-to-video".to_string(),
            schema: RawSchema::new(vec![
                FieldSpec::required("prompt", FieldKind::String),
                FieldSpec::optional("first_frame_image", Uri),
                FieldSpec::optional("prompt_optimizer", Boolean),
            ]),
            capabilities: REPLICATE_CAPS,
        },
        ModelDescriptor {
            provider: Provider::Replicate,
            model_id: "black-forest-labs/flux-schnell".to_string(),
            media: MediaKind::Image,
            kind: ModelKind::FluxSchnell,
            description: "fast text-to-image".to_string(),
            schema: RawSchema::new(vec![
                FieldSpec::required("prompt", FieldKind::String),
                FieldSpec::optional("aspect_ratio", FieldKind::String).one_of(FLUX_ASPECT_RATIOS),
                FieldSpec::optional("num_outputs", Integer).range(1, 4),
                FieldSpec::optional("output_format", FieldKind::String).one_of(&["webp", "jpg", "png"]),
                FieldSpec::optional("seed", Integer),
                FieldSpec::optional("go_fast", Boolean),
            ]),
            capabilities: REPLICATE_CAPS,
        },
        ModelDescriptor {
            provider: Provider::Replicate,
            model_id: "black-forest-labs/flux-kontext-pro".to_string(),
            media: MediaKind::Image,
            kind: ModelKind::FluxKontextPro,
            description: "instruction-based image editing".to_string(),
            schema: RawSchema::new(vec![
                FieldSpec::required("prompt", FieldKind::String),
                FieldSpec::required("input_image", Uri),
                FieldSpec::optional("aspect_ratio", FieldKind::String).one_of(KONTEXT_ASPECT_RATIOS),
                FieldSpec::optional("output_format", FieldKind::String).one_of(&["jpg", "png"]),
                FieldSpec::optional("seed", Integer),
                FieldSpec::optional("safety_tolerance", Integer).range(0, 6),
            ]),
            capabilities: REPLICATE_CAPS,
        },
        ModelDescriptor {
            provider: Provider::Replicate,
            model_id: "meta/musicgen".to_string(),
            media: MediaKind::Audio,
            kind: ModelKind::MusicGen,
            description: "text-to-music".to_string(),
            schema: RawSchema::new(vec![
                FieldSpec::required("prompt", FieldKind::String),
                FieldSpec::optional("duration", Integer).range(1, 30),
                FieldSpec::optional("output_format", FieldKind::String).one_of(&["mp3", "wav"]),
                FieldSpec::optional("seed", Integer),
                FieldSpec::optional("model_version", FieldKind::String).one_of(&[
                    "stereo-melody-large",
                    "stereo-large",
                    "melody-large",
                    "large",
                ]),
            ]),
            capabilities: REPLICATE_CAPS,
        },
        ModelDescriptor {
            provider: Provider::Fal,
            model_id: "fal-ai/kling-video/v2/master/text-to-video".to_string(),
            media: MediaKind::Video,
            kind: ModelKind::KlingV2Master,
            description: "Kling 2.0 master text-to-video".to_string(),
            schema: RawSchema::new(vec![
                FieldSpec::required("prompt", FieldKind::String),
                FieldSpec::optional("negative_prompt", FieldKind::String),
                FieldSpec::optional("duration", FieldKind::String).one_of(&["5", "10"]),
                FieldSpec::optional("aspect_ratio", FieldKind::String).one_of(KLING_ASPECT_RATIOS),
                FieldSpec::optional("cfg_scale", Number),
            ]),
            capabilities: FAL_CAPS,
        },
        ModelDescriptor {
            provider: Provider::Runway,
            model_id: "gen4_turbo".to_string(),
            media: MediaKind::Video,
            kind: ModelKind::RunwayGen4Turbo,
            description: "Gen-4 Turbo image-to-video".to_string(),
            schema: RawSchema::new(vec![
                FieldSpec::required("model", FieldKind::String).one_of(&["gen4_turbo"]),
                FieldSpec::required("promptImage", Uri),
                FieldSpec::optional("promptText", FieldKind::String),
                FieldSpec::optional("ratio", FieldKind::String).one_of(RUNWAY_RATIOS),
                FieldSpec::optional("duration", Integer).integer_one_of(&[5, 10]),
                FieldSpec::optional("seed", Integer).range(0, 4_294_967_295),
            ]),
            capabilities: RUNWAY_CAPS,
        },
    ]
}
