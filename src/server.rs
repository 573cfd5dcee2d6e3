use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::dispatch::http::HttpTransport;
use crate::dispatch::poll::PollingScheduler;
use crate::dispatch::strategy::WaitingStrategy;
use crate::error::MediaflowError;
use crate::job::Job;
use crate::reconciler::Reconciler;
use crate::registry::Registry;
use crate::response::{ToolMetadata, ToolResponse};
use crate::store::FileJobStore;
use crate::tools::jobs::{JobRequest, WebhookRequest, WebhookTarget};
use crate::tools::listmodels::{ListModelsRequest, ListModelsResponse, ModelInfo};
use crate::tools::submit::SubmitJobRequest;

type Pollers = Arc<Mutex<HashMap<String, CancellationToken>>>;

#[derive(Clone)]
pub struct MediaflowServer {
    reconciler: Arc<Reconciler>,
    /// Cancellation handles of running poll drivers, by job id.
    pollers: Pollers,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl MediaflowServer {
    pub fn new(config: Config) -> Result<Self, MediaflowError> {
        let transport = Arc::new(HttpTransport::new(config.api_keys.clone())?);
        let scheduler = PollingScheduler::new(transport.clone())
            .with_boxed_delay(config.polling.delay())
            .with_max_attempts(config.polling.max_attempts);
        let store = Arc::new(FileJobStore::new(config.store.dir.clone()));

        let mut reconciler =
            Reconciler::new(Arc::new(Registry::builtin()), transport, scheduler, store);
        if let Some(base_url) = config.webhook.base_url {
            reconciler = reconciler.with_webhook_base_url(base_url);
        }
        Ok(Self::from_reconciler(Arc::new(reconciler)))
    }

    pub fn from_reconciler(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            pollers: Arc::new(Mutex::new(HashMap::new())),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "submit_job",
        description = "Start a media generation job (video, image or audio). Options use one vocabulary for every provider; `list_models` shows each model's fields. Returns the job snapshot; poll it with `get_job`."
    )]
    async fn submit_job(
        &self,
        Parameters(req): Parameters<SubmitJobRequest>,
    ) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        match self.reconciler.submit(req.into()).await {
            Ok(job) => {
                if job.waiting_strategy() == WaitingStrategy::Polling && !job.is_terminal() {
                    self.spawn_poller(job.job_id());
                }
                Ok(job_response("submit_job", &job, start))
            }
            Err(e) => error_response("submit_job", e, start),
        }
    }

    #[tool(
        name = "get_job",
        description = "Current snapshot of a job: status, outputs when completed, error when failed.",
        annotations(read_only_hint = true)
    )]
    async fn get_job(
        &self,
        Parameters(req): Parameters<JobRequest>,
    ) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        match self.reconciler.get_job(&req.job_id).await {
            Ok(job) => Ok(job_response("get_job", &job, start)),
            Err(e) => error_response("get_job", e, start),
        }
    }

    #[tool(
        name = "cancel_job",
        description = "Cancel a job that has not finished. The job ends as failed with error \"cancelled\"; finished jobs are returned unchanged."
    )]
    async fn cancel_job(
        &self,
        Parameters(req): Parameters<JobRequest>,
    ) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        self.stop_poller(&req.job_id);
        match self.reconciler.cancel(&req.job_id).await {
            Ok(job) => Ok(job_response("cancel_job", &job, start)),
            Err(e) => error_response("cancel_job", e, start),
        }
    }

    #[tool(
        name = "list_models",
        description = "List available models with their provider, media type, completion channels and accepted fields.",
        annotations(read_only_hint = true)
    )]
    async fn list_models(
        &self,
        Parameters(req): Parameters<ListModelsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        let models: Vec<ModelInfo> = self
            .reconciler
            .list_models(req.provider)
            .into_iter()
            .map(ModelInfo::from)
            .collect();

        let metadata = ToolMetadata::new("list_models", start.elapsed().as_secs_f64());
        let response = match serde_json::to_string_pretty(&ListModelsResponse { models }) {
            Ok(json) => ToolResponse::success(json, "json", metadata),
            Err(e) => ToolResponse::error(format!("serialization failed: {e}"), metadata),
        };
        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "deliver_webhook",
        description = "Deliver a provider status callback: the raw body plus our job id (last callback URL segment) or the provider's job id. Used by the webhook receiver; duplicate deliveries are harmless."
    )]
    async fn deliver_webhook(
        &self,
        Parameters(req): Parameters<WebhookRequest>,
    ) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        let result = match req.target() {
            Some(WebhookTarget::Job(job_id)) => {
                self.reconciler
                    .on_callback(&req.provider, &job_id, &req.payload)
                    .await
            }
            Some(WebhookTarget::ProviderJob(pid)) => {
                self.reconciler
                    .on_webhook(&req.provider, &pid, &req.payload)
                    .await
            }
            None => {
                return Err(McpError::invalid_params(
                    "one of `job_id` or `provider_job_id` is required",
                    None,
                ));
            }
        };
        match result {
            Ok(job) => {
                if job.is_terminal() {
                    self.stop_poller(job.job_id());
                }
                Ok(job_response("deliver_webhook", &job, start))
            }
            Err(e) => error_response("deliver_webhook", e, start),
        }
    }
}

impl MediaflowServer {
    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Restart poll drivers for live polling jobs left in the store.
    pub async fn resume_polling(&self) -> Result<usize, MediaflowError> {
        let jobs = self.reconciler.resumable_polls().await?;
        for job in &jobs {
            self.spawn_poller(job.job_id());
        }
        if !jobs.is_empty() {
            tracing::info!(count = jobs.len(), "resumed polling jobs");
        }
        Ok(jobs.len())
    }

    pub fn active_pollers(&self) -> usize {
        self.pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn spawn_poller(&self, job_id: &str) {
        let token = CancellationToken::new();
        {
            let mut pollers = self.pollers.lock().unwrap_or_else(PoisonError::into_inner);
            if pollers.contains_key(job_id) {
                return;
            }
            pollers.insert(job_id.to_string(), token.clone());
        }

        let reconciler = self.reconciler.clone();
        let pollers = self.pollers.clone();
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            match reconciler.drive_polling(&job_id, token).await {
                Ok(job) => tracing::debug!(
                    job_id = %job_id,
                    status = job.status().as_str(),
                    "poll driver finished"
                ),
                Err(e) => tracing::warn!(job_id = %job_id, "poll driver failed: {e}"),
            }
            pollers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&job_id);
        });
    }

    fn stop_poller(&self, job_id: &str) {
        let token = self
            .pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id);
        if let Some(token) = token {
            token.cancel();
        }
    }
}

fn job_response(tool: &str, job: &Job, start: Instant) -> CallToolResult {
    let metadata = ToolMetadata::new(tool, start.elapsed().as_secs_f64())
        .with_job(job.job_id(), job.provider());
    let response = match serde_json::to_string_pretty(job) {
        Ok(json) => ToolResponse::success(json, "json", metadata),
        Err(e) => ToolResponse::error(format!("serialization failed: {e}"), metadata),
    };
    response.into_call_tool_result()
}

/// Caller mistakes become MCP invalid-params errors. Everything else is
/// reported in the response envelope.
fn error_response(
    tool: &str,
    e: MediaflowError,
    start: Instant,
) -> Result<CallToolResult, McpError> {
    if e.is_caller_error() || matches!(e, MediaflowError::UnknownJob(_)) {
        return Err(McpError::invalid_params(e.user_message(), None));
    }
    tracing::warn!(tool, "tool failed: {e}");
    let metadata = ToolMetadata::new(tool, start.elapsed().as_secs_f64());
    Ok(ToolResponse::error(e.user_message(), metadata).into_call_tool_result())
}

#[tool_handler]
impl ServerHandler for MediaflowServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mediaflow".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Mediaflow: one job interface over Replicate, fal and Runway media models.\n\n\
                 Workflow:\n\
                 1. Call `list_models` for exact provider/model names and accepted fields.\n\
                 2. Call `submit_job` with unified options (prompt, image_urls, aspect_ratio, ...).\n\
                 3. Call `get_job` until status is `completed` (outputs) or `failed` (error).\n\
                 4. `cancel_job` stops a job you no longer need.\n\n\
                 Polling jobs are checked in the background. Webhook jobs finish when the \
                 receiver calls `deliver_webhook`."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
