pub mod fal;
pub mod replicate;
pub mod runway;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MediaflowError;
use crate::job::FailureKind;
use crate::registry::{MediaKind, Provider};

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaOutput {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MediaKind>,
    pub url: String,
    pub mime_type: String,
}

impl MediaOutput {
    /// Build an output, inferring the mime type from the URL extension when
    /// the provider did not supply one.
    pub fn from_url(url: &str, mime_type: Option<&str>) -> Self {
        let mime_type = mime_type
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| mime_from_url(url).to_string());
        let kind = match mime_type.split('/').next() {
            Some("video") => Some(MediaKind::Video),
            Some("image") => Some(MediaKind::Image),
            Some("audio") => Some(MediaKind::Audio),
            _ => None,
        };
        Self {
            kind,
            url: url.to_string(),
            mime_type,
        }
    }
}

/// Provider-agnostic interpretation of a status payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedOutcome {
    /// In flight. `status` keeps the provider's own label for diagnostics.
    Processing { status: String },
    Completed {
        outputs: Vec<MediaOutput>,
        metadata: Map<String, Value>,
    },
    Failed { kind: FailureKind, error: String },
}

impl NormalizedOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Processing { .. } => "processing",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Interpret a raw webhook body or poll response for `provider`.
///
/// This is the only parsing entry point. Webhook delivery and polling both
/// call it, so a payload means the same thing whichever channel carried it.
pub fn normalize(provider: Provider, payload: &Value) -> NormalizedOutcome {
    if !payload.is_object() {
        return malformed(provider, "payload is not a JSON object");
    }
    match provider {
        Provider::Replicate => replicate::normalize(payload),
        Provider::Fal => fal::normalize(payload),
        Provider::Runway => runway::normalize(payload),
    }
}

/// Same as [`normalize`] for raw bytes.
pub fn normalize_bytes(provider: Provider, body: &[u8]) -> NormalizedOutcome {
    match serde_json::from_slice::<Value>(body) {
        Ok(v) => normalize(provider, &v),
        Err(e) => malformed(provider, &format!("invalid JSON: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn malformed(provider: Provider, what: &str) -> NormalizedOutcome {
    result_failure(provider, format!("malformed payload: {what}"))
}

fn unknown_status(provider: Provider, status: &str) -> NormalizedOutcome {
    result_failure(provider, format!("unknown status `{status}`"))
}

fn missing_output(provider: Provider) -> NormalizedOutcome {
    result_failure(provider, "success without an output URL".to_string())
}

/// A payload we cannot act on, as opposed to a failure the provider reported.
fn result_failure(provider: Provider, message: String) -> NormalizedOutcome {
    let err = MediaflowError::ProviderResult {
        provider: provider.to_string(),
        message,
    };
    NormalizedOutcome::Failed {
        kind: FailureKind::ProviderResult,
        error: err.to_string(),
    }
}

fn provider_failure(provider: Provider, message: Option<String>) -> NormalizedOutcome {
    NormalizedOutcome::Failed {
        kind: FailureKind::Provider,
        error: message.unwrap_or_else(|| fallback_error(provider)),
    }
}

pub fn fallback_error(provider: Provider) -> String {
    format!("{provider} reported failure without details")
}

fn completed(url: String, mime: Option<String>, metadata: Map<String, Value>) -> NormalizedOutcome {
    NormalizedOutcome::Completed {
        outputs: vec![MediaOutput::from_url(&url, mime.as_deref())],
        metadata,
    }
}

/// First output file in a field that may be a URL string, a `{url}` file
/// object, or an ordered list of either. Returns (url, content type).
fn first_file(value: &Value) -> Option<(String, Option<String>)> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some((s.trim().to_string(), None)),
        Value::Object(obj) => {
            let url = obj.get("url")?.as_str().filter(|s| !s.trim().is_empty())?;
            let mime = obj
                .get("content_type")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some((url.trim().to_string(), mime))
        }
        Value::Array(items) => items.first().and_then(first_file),
        _ => None,
    }
}

/// Provider-supplied error text: a string, or an object with a message.
fn error_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => ["message", "msg", "detail"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str)),
        _ => None,
    }?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Copy `pointer` from `payload` into `metadata[name]` when present.
fn copy_meta(metadata: &mut Map<String, Value>, payload: &Value, pointer: &str, name: &str) {
    if let Some(v) = payload.pointer(pointer).filter(|v| !v.is_null()) {
        metadata.insert(name.to_string(), v.clone());
    }
}

fn mime_from_url(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}
