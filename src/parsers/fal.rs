use serde_json::{Map, Value};

use crate::parsers::{
    NormalizedOutcome, completed, copy_meta, error_text, first_file, malformed, missing_output,
    provider_failure, unknown_status,
};
use crate::registry::Provider;

/// Single-file result keys, checked in order before the list keys.
const FILE_KEYS: &[&str] = &["video", "image", "audio", "audio_file", "audio_url"];
const LIST_KEYS: &[&str] = &["images", "videos", "audios"];

/// Parses a fal queue status response or webhook body.
///
/// Queue status: `{"status": "IN_QUEUE" | "IN_PROGRESS" | "COMPLETED", ...}`;
/// the transport merges the fetched result under `payload` on completion.
/// Webhook: `{"request_id": "...", "status": "OK" | "ERROR", "payload": {...}, "error": ...}`
pub fn normalize(payload: &Value) -> NormalizedOutcome {
    const P: Provider = Provider::Fal;

    let Some(status) = payload["status"].as_str() else {
        return malformed(P, "missing `status`");
    };

    match status {
        "IN_QUEUE" | "IN_PROGRESS" => NormalizedOutcome::Processing {
            status: status.to_string(),
        },
        "COMPLETED" | "OK" => {
            // A queue entry can complete in error.
            if let Some(msg) = error_text(&payload["error"]) {
                return provider_failure(P, Some(msg));
            }
            let body = result_body(payload);
            match find_file(body) {
                Some((url, mime)) => completed(url, mime, metadata(payload, body)),
                None => missing_output(P),
            }
        }
        "ERROR" | "FAILED" => {
            let detail = payload
                .pointer("/payload/detail/0/msg")
                .and_then(Value::as_str)
                .map(str::to_string);
            provider_failure(P, error_text(&payload["error"]).or(detail))
        }
        other => unknown_status(P, other),
    }
}

fn result_body(payload: &Value) -> &Value {
    match &payload["payload"] {
        Value::Object(_) => &payload["payload"],
        _ => &payload["response"],
    }
}

fn find_file(body: &Value) -> Option<(String, Option<String>)> {
    FILE_KEYS
        .iter()
        .chain(LIST_KEYS)
        .find_map(|k| first_file(&body[*k]))
}

fn metadata(payload: &Value, body: &Value) -> Map<String, Value> {
    let mut meta = Map::new();
    copy_meta(&mut meta, payload, "/request_id", "request_id");
    copy_meta(&mut meta, body, "/seed", "seed");
    meta
}
