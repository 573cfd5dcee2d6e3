//! Smoke tests for the outer surface: tool envelopes, request types,
//! configuration and server wiring.

mod common;

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Value, json};

use mediaflow::config::{Config, api_key_var};
use mediaflow::dispatch::poll::PollDelay;
use mediaflow::dispatch::strategy::WaitingStrategy;
use mediaflow::mapping::AspectRatio;
use mediaflow::reconciler::SubmitJob;
use mediaflow::registry::{Provider, Registry};
use mediaflow::response::{ToolMetadata, ToolResponse};
use mediaflow::server::MediaflowServer;
use mediaflow::store::DEFAULT_STORE_DIR;
use mediaflow::tools::jobs::{WebhookRequest, WebhookTarget};
use mediaflow::tools::listmodels::{ListModelsResponse, ModelInfo};
use mediaflow::tools::submit::SubmitJobRequest;

use common::{Harness, minimax_job, runway_job};

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

#[test]
fn tool_response_serializes_with_job_metadata() {
    let metadata = ToolMetadata::new("get_job", 0.25).with_job("job_1", Provider::Fal);
    let resp = ToolResponse::success("{}".to_string(), "json", metadata);
    let v: Value = serde_json::to_value(&resp).unwrap();

    assert_eq!(v["status"], "success");
    assert_eq!(v["content_type"], "json");
    assert_eq!(v["metadata"]["tool_name"], "get_job");
    assert_eq!(v["metadata"]["job_id"], "job_1");
    assert_eq!(v["metadata"]["provider"], "fal");
    assert_eq!(v["metadata"]["duration_seconds"], 0.25);
}

#[test]
fn tool_response_error_omits_job_and_clamps_duration() {
    let resp = ToolResponse::error("boom".to_string(), ToolMetadata::new("submit_job", f64::NAN));
    let v: Value = serde_json::to_value(&resp).unwrap();

    assert_eq!(v["status"], "error");
    assert_eq!(v["content"], "boom");
    assert_eq!(v["content_type"], "text");
    assert!(v["metadata"].get("job_id").is_none());
    assert_eq!(v["metadata"]["duration_seconds"], 0.0);
}

#[test]
fn tool_response_is_always_transport_success() {
    let result = ToolResponse::error("boom".to_string(), ToolMetadata::new("get_job", 0.0))
        .into_call_tool_result();
    assert_ne!(result.is_error, Some(true));
}

// ---------------------------------------------------------------------------
// Tool request and listing types
// ---------------------------------------------------------------------------

#[test]
fn submit_request_converts_to_reconciler_request() {
    let req: SubmitJobRequest = serde_json::from_value(json!({
        "provider": "runway",
        "model": "gen4_turbo",
        "options": {"prompt": "waves", "aspect_ratio": "16:9", "image_urls": ["https://x/a.png"]},
        "job_id": "  ",
        "strategy": "polling"
    }))
    .unwrap();
    let job: SubmitJob = req.into();

    assert_eq!(job.provider, "runway");
    assert_eq!(job.model_id, "gen4_turbo");
    assert_eq!(job.options.aspect_ratio, Some(AspectRatio::Landscape16x9));
    assert_eq!(job.job_id, None);
    assert_eq!(job.strategy, Some(WaitingStrategy::Polling));
}

#[test]
fn submit_request_options_default_to_empty() {
    let req: SubmitJobRequest =
        serde_json::from_value(json!({"provider": "replicate", "model": "meta/musicgen"})).unwrap();
    assert!(req.options.prompt.is_none());
    assert!(req.job_id.is_none());
}

#[test]
fn webhook_request_routes_by_either_id() {
    let parse = |v: Value| -> WebhookRequest { serde_json::from_value(v).unwrap() };

    let by_job = parse(json!({"provider": "replicate", "job_id": "job_1", "payload": {}}));
    assert_eq!(by_job.target(), Some(WebhookTarget::Job("job_1".to_string())));

    let by_provider = parse(json!({
        "provider": "fal", "job_id": " ", "provider_job_id": "req-9", "payload": {}
    }));
    assert_eq!(by_provider.target(), Some(WebhookTarget::ProviderJob("req-9".to_string())));

    let both = parse(json!({
        "provider": "fal", "job_id": "job_1", "provider_job_id": "req-9", "payload": {}
    }));
    assert_eq!(both.target(), Some(WebhookTarget::Job("job_1".to_string())));

    assert_eq!(parse(json!({"provider": "fal", "payload": {}})).target(), None);
}

#[test]
fn model_info_lists_strategies_and_fields() {
    let registry = Registry::builtin();
    let models: Vec<ModelInfo> = registry
        .list_models(Some(Provider::Runway))
        .into_iter()
        .map(ModelInfo::from)
        .collect();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].strategies, vec!["polling"]);
    assert!(models[0].fields.iter().any(|f| f.name == "promptImage" && f.required));

    let v = serde_json::to_value(ListModelsResponse { models }).unwrap();
    assert_eq!(v["models"][0]["provider"], "runway");
    assert_eq!(v["models"][0]["default_strategy"], "polling");
    assert_eq!(v["models"][0]["media"], "video");
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn config_defaults() {
    let config = Config::default();
    assert_eq!(config.polling.interval_secs, 5);
    assert_eq!(config.polling.max_attempts, 100);
    assert_eq!(config.webhook.base_url, None);
    assert_eq!(config.store.dir, PathBuf::from(DEFAULT_STORE_DIR));
    assert_eq!(config.polling.delay().delay(3), Duration::from_secs(5));
}

#[test]
fn config_parses_partial_toml() {
    let config = Config::from_toml_str(
        r#"
        [polling]
        interval_secs = 2
        backoff = true
        max_interval_secs = 10

        [webhook]
        base_url = "https://hooks.example.com"
        "#,
    )
    .unwrap();
    assert_eq!(config.polling.interval_secs, 2);
    assert_eq!(config.polling.max_attempts, 100);
    assert_eq!(config.webhook.base_url.as_deref(), Some("https://hooks.example.com"));

    let delay = config.polling.delay();
    assert_eq!(delay.delay(0), Duration::from_secs(2));
    assert_eq!(delay.delay(50), Duration::from_secs(10));

    assert!(Config::from_toml_str("[polling]\ninterval_secs = \"fast\"").is_err());
}

#[test]
fn config_env_overrides_and_keys() {
    let env = |key: &str| -> Option<String> {
        match key {
            "MEDIAFLOW_POLL_INTERVAL_SECS" => Some("7".to_string()),
            "MEDIAFLOW_WEBHOOK_BASE_URL" => Some("".to_string()),
            "MEDIAFLOW_STORE_DIR" => Some("/var/lib/mediaflow".to_string()),
            "FAL_KEY" => Some("fal_key".to_string()),
            "REPLICATE_API_TOKEN" => Some("  ".to_string()),
            _ => None,
        }
    };
    let mut config = Config::from_toml_str("[webhook]\nbase_url = \"https://h\"").unwrap();
    config.apply_env(env).unwrap();

    assert_eq!(config.polling.interval_secs, 7);
    assert_eq!(config.webhook.base_url, None);
    assert_eq!(config.store.dir, PathBuf::from("/var/lib/mediaflow"));
    assert_eq!(config.api_keys.get(&Provider::Fal).map(String::as_str), Some("fal_key"));
    assert!(!config.api_keys.contains_key(&Provider::Replicate));
    assert!(!config.api_keys.contains_key(&Provider::Runway));
}

#[test]
fn config_env_rejects_bad_numbers() {
    let mut config = Config::default();
    let err = config
        .apply_env(|key| (key == "MEDIAFLOW_POLL_MAX_ATTEMPTS").then(|| "lots".to_string()))
        .unwrap_err();
    assert!(err.to_string().contains("MEDIAFLOW_POLL_MAX_ATTEMPTS"));
}

#[test]
fn api_key_vars_per_provider() {
    assert_eq!(api_key_var(Provider::Replicate), "REPLICATE_API_TOKEN");
    assert_eq!(api_key_var(Provider::Fal), "FAL_KEY");
    assert_eq!(api_key_var(Provider::Runway), "RUNWAYML_API_SECRET");
}

// ---------------------------------------------------------------------------
// Server wiring
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_builds_from_config() {
    let mut config = Config::default();
    config.store.dir = std::env::temp_dir().join(format!("mediaflow-smoke-{}", std::process::id()));
    let server = MediaflowServer::new(config).unwrap();
    assert_eq!(server.reconciler().registry().len(), Registry::builtin().len());
    assert_eq!(server.active_pollers(), 0);
}

#[tokio::test]
async fn server_resumes_live_polling_jobs_once() {
    let h = Harness::new();
    h.reconciler.submit(runway_job()).await.unwrap();
    h.reconciler.submit(minimax_job()).await.unwrap();

    let server = MediaflowServer::from_reconciler(h.reconciler.clone());
    assert_eq!(server.resume_polling().await.unwrap(), 1);
    assert_eq!(server.active_pollers(), 1);

    server.resume_polling().await.unwrap();
    assert_eq!(server.active_pollers(), 1);
}
