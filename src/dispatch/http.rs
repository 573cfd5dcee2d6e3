use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use crate::dispatch::{StatusFetcher, SubmitRequest, Submitter};
use crate::error::MediaflowError;
use crate::registry::Provider;

/// Max response body size for submit and status responses.
pub const MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

/// Per-request timeout for provider calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub type Headers = Vec<(String, String)>;

/// Provider-specific request/response handling.
pub trait ProviderHttpApi: Send + Sync {
    /// Build the submit request. Returns (url, headers, body).
    fn build_submit_request(
        &self,
        req: &SubmitRequest,
        api_key: &str,
    ) -> Result<(String, Headers, Value), MediaflowError>;

    /// Build the status request. Returns (url, headers).
    fn build_status_request(&self, model_id: &str, job_id: &str, api_key: &str)
    -> (String, Headers);

    /// Extract the provider job id from a submit response body.
    fn parse_submit_response(&self, body: &[u8]) -> Result<String, MediaflowError>;

    /// Follow-up request for the result when a status body says the job is
    /// done but carries no outputs itself. Returns (url, headers).
    fn build_result_request(
        &self,
        _model_id: &str,
        _job_id: &str,
        _api_key: &str,
        _status_body: &Value,
    ) -> Option<(String, Headers)> {
        None
    }
}

fn parse_id(provider: Provider, body: &[u8], key: &str) -> Result<String, MediaflowError> {
    let v: Value = serde_json::from_slice(body)
        .map_err(|e| MediaflowError::SchemaParse(format!("{provider} submit response: {e}")))?;
    v[key]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            MediaflowError::SchemaParse(format!("{provider} submit response missing '{key}'"))
        })
}

// ---------------------------------------------------------------------------
// Replicate predictions API
// ---------------------------------------------------------------------------

pub struct ReplicateApi;

impl ProviderHttpApi for ReplicateApi {
    fn build_submit_request(
        &self,
        req: &SubmitRequest,
        api_key: &str,
    ) -> Result<(String, Headers, Value), MediaflowError> {
        let url = format!(
            "https://api.replicate.com/v1/models/{}/predictions",
            req.model_id
        );
        let headers = vec![
            ("Authorization".to_string(), format!("Bearer {api_key}")),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];

        let mut body = serde_json::json!({ "input": req.options });
        if let Some(hook) = &req.webhook_url {
            body["webhook"] = Value::String(hook.clone());
            body["webhook_events_filter"] = serde_json::json!(["start", "completed"]);
        }

        Ok((url, headers, body))
    }

    fn build_status_request(
        &self,
        _model_id: &str,
        job_id: &str,
        api_key: &str,
    ) -> (String, Headers) {
        let url = format!("https://api.replicate.com/v1/predictions/{job_id}");
        let headers = vec![("Authorization".to_string(), format!("Bearer {api_key}"))];
        (url, headers)
    }

    fn parse_submit_response(&self, body: &[u8]) -> Result<String, MediaflowError> {
        parse_id(Provider::Replicate, body, "id")
    }
}

// ---------------------------------------------------------------------------
// fal queue API
// ---------------------------------------------------------------------------

pub struct FalQueueApi;

impl FalQueueApi {
    /// Queue status lives under the app id (`owner/app`), not the full
    /// endpoint path: `fal-ai/kling-video/v2/...` polls `fal-ai/kling-video`.
    pub fn app_path(model_id: &str) -> String {
        model_id.split('/').take(2).collect::<Vec<_>>().join("/")
    }
}

impl ProviderHttpApi for FalQueueApi {
    fn build_submit_request(
        &self,
        req: &SubmitRequest,
        api_key: &str,
    ) -> Result<(String, Headers, Value), MediaflowError> {
        let mut url = Url::parse(&format!("https://queue.fal.run/{}", req.model_id))
            .map_err(|e| MediaflowError::Other(format!("invalid fal endpoint: {e}")))?;
        if let Some(hook) = &req.webhook_url {
            url.query_pairs_mut().append_pair("fal_webhook", hook);
        }
        let headers = vec![
            ("Authorization".to_string(), format!("Key {api_key}")),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        Ok((url.to_string(), headers, Value::Object(req.options.clone())))
    }

    fn build_status_request(&self, model_id: &str, job_id: &str, api_key: &str) -> (String, Headers) {
        let url = format!(
            "https://queue.fal.run/{}/requests/{job_id}/status",
            Self::app_path(model_id)
        );
        let headers = vec![("Authorization".to_string(), format!("Key {api_key}"))];
        (url, headers)
    }

    fn parse_submit_response(&self, body: &[u8]) -> Result<String, MediaflowError> {
        parse_id(Provider::Fal, body, "request_id")
    }

    fn build_result_request(
        &self,
        model_id: &str,
        job_id: &str,
        api_key: &str,
        status_body: &Value,
    ) -> Option<(String, Headers)> {
        if status_body["status"].as_str() != Some("COMPLETED") {
            return None;
        }
        let url = format!(
            "https://queue.fal.run/{}/requests/{job_id}",
            Self::app_path(model_id)
        );
        let headers = vec![("Authorization".to_string(), format!("Key {api_key}"))];
        Some((url, headers))
    }
}

// ---------------------------------------------------------------------------
// Runway tasks API
// ---------------------------------------------------------------------------

pub const RUNWAY_API_VERSION: &str = "2024-11-06";

pub struct RunwayApi;

impl ProviderHttpApi for RunwayApi {
    fn build_submit_request(
        &self,
        req: &SubmitRequest,
        api_key: &str,
    ) -> Result<(String, Headers, Value), MediaflowError> {
        let url = "https://api.dev.runwayml.com/v1/image_to_video".to_string();
        let headers = vec![
            ("Authorization".to_string(), format!("Bearer {api_key}")),
            ("X-Runway-Version".to_string(), RUNWAY_API_VERSION.to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        Ok((url, headers, Value::Object(req.options.clone())))
    }

    fn build_status_request(&self, _model_id: &str, job_id: &str, api_key: &str) -> (String, Headers) {
        let url = format!("https://api.dev.runwayml.com/v1/tasks/{job_id}");
        let headers = vec![
            ("Authorization".to_string(), format!("Bearer {api_key}")),
            ("X-Runway-Version".to_string(), RUNWAY_API_VERSION.to_string()),
        ];
        (url, headers)
    }

    fn parse_submit_response(&self, body: &[u8]) -> Result<String, MediaflowError> {
        parse_id(Provider::Runway, body, "id")
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// reqwest-backed [`Submitter`] and [`StatusFetcher`] for every provider.
pub struct HttpTransport {
    client: Client,
    api_keys: HashMap<Provider, String>,
}

impl HttpTransport {
    pub fn new(api_keys: HashMap<Provider, String>) -> Result<Self, MediaflowError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, api_keys })
    }

    pub fn api_for(provider: Provider) -> Box<dyn ProviderHttpApi> {
        match provider {
            Provider::Replicate => Box::new(ReplicateApi),
            Provider::Fal => Box::new(FalQueueApi),
            Provider::Runway => Box::new(RunwayApi),
        }
    }

    fn api_key(&self, provider: Provider) -> Result<&str, MediaflowError> {
        self.api_keys
            .get(&provider)
            .map(String::as_str)
            .ok_or_else(|| MediaflowError::AuthFailed {
                provider: provider.to_string(),
                message: "no API key configured".to_string(),
            })
    }

    /// Send a request and return the body of a 2xx response.
    async fn send(
        &self,
        provider: Provider,
        mut builder: reqwest::RequestBuilder,
        headers: &Headers,
    ) -> Result<Vec<u8>, MediaflowError> {
        for (k, v) in headers {
            builder = builder.header(k, v);
        }
        let resp = builder.send().await?;
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(MediaflowError::AuthFailed {
                provider: provider.to_string(),
                message: format!("HTTP {status}"),
            });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MediaflowError::RateLimited {
                provider: provider.to_string(),
            });
        }
        if resp
            .content_length()
            .is_some_and(|len| len > MAX_RESPONSE_BYTES as u64)
        {
            return Err(MediaflowError::Upstream {
                provider: provider.to_string(),
                message: "response too large".to_string(),
                status: Some(status.as_u16()),
            });
        }

        let body = resp.bytes().await?;
        if body.len() > MAX_RESPONSE_BYTES {
            return Err(MediaflowError::Upstream {
                provider: provider.to_string(),
                message: format!("response too large: {} bytes", body.len()),
                status: Some(status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(MediaflowError::Upstream {
                provider: provider.to_string(),
                message: upstream_detail(&body).unwrap_or_else(|| format!("HTTP {status}")),
                status: Some(status.as_u16()),
            });
        }
        Ok(body.to_vec())
    }
}

/// Short human-readable detail from an error body, if it has one.
fn upstream_detail(body: &[u8]) -> Option<String> {
    let v: Value = serde_json::from_slice(body).ok()?;
    let detail = ["detail", "error", "message"]
        .iter()
        .find_map(|k| v[*k].as_str())?;
    Some(detail.chars().take(200).collect())
}

/// A 4xx on submit means the provider refused this input. Retrying the
/// same request cannot succeed.
pub fn submission_error(err: MediaflowError) -> MediaflowError {
    match err {
        MediaflowError::Upstream {
            provider,
            message,
            status: Some(status),
        } if (400..500).contains(&status) => MediaflowError::ProviderSubmission {
            provider,
            message: format!("{message} (HTTP {status})"),
        },
        other => other,
    }
}

#[async_trait]
impl Submitter for HttpTransport {
    async fn submit(&self, req: &SubmitRequest) -> Result<String, MediaflowError> {
        let api = Self::api_for(req.provider);
        let key = self.api_key(req.provider)?;
        let (url, headers, body) = api.build_submit_request(req, key)?;

        let bytes = self
            .send(req.provider, self.client.post(&url).json(&body), &headers)
            .await
            .map_err(submission_error)?;
        let id = api.parse_submit_response(&bytes)?;

        tracing::info!(
            provider = %req.provider,
            model = %req.model_id,
            job_id = %req.job_id,
            provider_job_id = %id,
            "provider accepted job"
        );
        Ok(id)
    }
}

#[async_trait]
impl StatusFetcher for HttpTransport {
    async fn fetch_status(
        &self,
        provider: Provider,
        model_id: &str,
        provider_job_id: &str,
    ) -> Result<Value, MediaflowError> {
        let api = Self::api_for(provider);
        let key = self.api_key(provider)?;
        let (url, headers) = api.build_status_request(model_id, provider_job_id, key);

        let bytes = self.send(provider, self.client.get(&url), &headers).await?;
        let mut status: Value = serde_json::from_slice(&bytes)
            .map_err(|e| MediaflowError::SchemaParse(format!("{provider} status response: {e}")))?;

        if let Some((url, headers)) =
            api.build_result_request(model_id, provider_job_id, key, &status)
        {
            let bytes = self.send(provider, self.client.get(&url), &headers).await?;
            let result: Value = serde_json::from_slice(&bytes).map_err(|e| {
                MediaflowError::SchemaParse(format!("{provider} result response: {e}"))
            })?;
            if let Some(obj) = status.as_object_mut() {
                obj.insert("payload".to_string(), result);
            }
        }

        Ok(status)
    }
}
