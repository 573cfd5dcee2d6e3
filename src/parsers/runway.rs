use serde_json::{Map, Value};

use crate::parsers::{
    NormalizedOutcome, completed, copy_meta, error_text, first_file, malformed, missing_output,
    provider_failure, unknown_status,
};
use crate::registry::Provider;

/// Parses a Runway task object.
/// Expected shape: `{"id": "...", "status": "...", "output": ["url"], "failure": "...", "failureCode": "..."}`
pub fn normalize(payload: &Value) -> NormalizedOutcome {
    const P: Provider = Provider::Runway;

    let Some(status) = payload["status"].as_str() else {
        return malformed(P, "missing `status`");
    };

    match status {
        "PENDING" | "THROTTLED" | "RUNNING" => NormalizedOutcome::Processing {
            status: status.to_string(),
        },
        "SUCCEEDED" => match first_file(&payload["output"]) {
            Some((url, mime)) => completed(url, mime, metadata(payload)),
            None => missing_output(P),
        },
        "FAILED" => {
            let failure = error_text(&payload["failure"]);
            let code = payload["failureCode"].as_str();
            let message = match (failure, code) {
                (Some(f), Some(c)) => Some(format!("{f} ({c})")),
                (Some(f), None) => Some(f),
                (None, Some(c)) => Some(c.to_string()),
                (None, None) => None,
            };
            provider_failure(P, message)
        }
        "CANCELLED" => provider_failure(P, Some("cancelled".to_string())),
        other => unknown_status(P, other),
    }
}

fn metadata(payload: &Value) -> Map<String, Value> {
    let mut meta = Map::new();
    copy_meta(&mut meta, payload, "/id", "task_id");
    copy_meta(&mut meta, payload, "/createdAt", "created_at");
    meta
}
