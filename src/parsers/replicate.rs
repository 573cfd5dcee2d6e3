use serde_json::{Map, Value};

use crate::parsers::{
    NormalizedOutcome, completed, copy_meta, error_text, first_file, malformed, missing_output,
    provider_failure, unknown_status,
};
use crate::registry::Provider;

/// Parses a Replicate prediction object.
/// Expected shape: `{"id": "...", "status": "...", "output": ..., "error": ...}`
pub fn normalize(payload: &Value) -> NormalizedOutcome {
    const P: Provider = Provider::Replicate;

    let Some(status) = payload["status"].as_str() else {
        return malformed(P, "missing `status`");
    };

    match status {
        "starting" | "processing" | "queued" => NormalizedOutcome::Processing {
            status: status.to_string(),
        },
        "succeeded" => match first_file(&payload["output"]) {
            Some((url, mime)) => completed(url, mime, metadata(payload)),
            None => missing_output(P),
        },
        "failed" => provider_failure(P, error_text(&payload["error"])),
        "canceled" | "cancelled" | "aborted" => provider_failure(
            P,
            error_text(&payload["error"]).or_else(|| Some("cancelled".to_string())),
        ),
        other => unknown_status(P, other),
    }
}

fn metadata(payload: &Value) -> Map<String, Value> {
    let mut meta = Map::new();
    copy_meta(&mut meta, payload, "/id", "prediction_id");
    copy_meta(&mut meta, payload, "/version", "version");
    copy_meta(&mut meta, payload, "/model", "model");
    copy_meta(&mut meta, payload, "/metrics/predict_time", "predict_time");
    copy_meta(&mut meta, payload, "/completed_at", "completed_at");
    if let Some(items) = payload["output"].as_array() {
        meta.insert("output_count".to_string(), items.len().into());
    }
    meta
}
