//! Scripted fakes shared by the integration suites.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use mediaflow::dispatch::poll::{FixedInterval, PollingScheduler};
use mediaflow::dispatch::{StatusFetcher, SubmitRequest, Submitter};
use mediaflow::error::MediaflowError;
use mediaflow::mapping::{AspectRatio, UnifiedOptions};
use mediaflow::reconciler::{Clock, Reconciler, SubmitJob};
use mediaflow::registry::{Provider, Registry};
use mediaflow::store::InMemoryJobStore;

pub const POLL_INTERVAL_MS: u64 = 5_000;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Returns scripted submit results, then `pj_<n>` ids once the script runs out.
#[derive(Default)]
pub struct FakeSubmitter {
    script: Mutex<VecDeque<Result<String, MediaflowError>>>,
    requests: Mutex<Vec<SubmitRequest>>,
    issued: AtomicU64,
}

impl FakeSubmitter {
    pub fn push(&self, result: Result<String, MediaflowError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn requests(&self) -> Vec<SubmitRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Submitter for FakeSubmitter {
    async fn submit(&self, req: &SubmitRequest) -> Result<String, MediaflowError> {
        self.requests.lock().unwrap().push(req.clone());
        if let Some(result) = self.script.lock().unwrap().pop_front() {
            return result;
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(format!("pj_{n}"))
    }
}

/// Returns scripted status bodies in order, then `fallback` forever.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<Value, MediaflowError>>>,
    fallback: Mutex<Value>,
    calls: AtomicU32,
}

impl ScriptedFetcher {
    pub fn new(fallback: Value) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: AtomicU32::new(0),
        }
    }

    pub fn push(&self, body: Value) {
        self.script.lock().unwrap().push_back(Ok(body));
    }

    pub fn push_err(&self, err: MediaflowError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    pub fn set_fallback(&self, body: Value) {
        *self.fallback.lock().unwrap() = body;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusFetcher for ScriptedFetcher {
    async fn fetch_status(
        &self,
        _provider: Provider,
        _model_id: &str,
        _provider_job_id: &str,
    ) -> Result<Value, MediaflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.script.lock().unwrap().pop_front() {
            return result;
        }
        Ok(self.fallback.lock().unwrap().clone())
    }
}

/// Clock that only moves when told to.
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self(AtomicU64::new(start_ms))
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub reconciler: Arc<Reconciler>,
    pub submitter: Arc<FakeSubmitter>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub store: Arc<InMemoryJobStore>,
    pub clock: Arc<ManualClock>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::with_max_attempts(100)
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::build(Arc::new(Registry::builtin()), max_attempts)
    }

    pub fn build(registry: Arc<Registry>, max_attempts: u32) -> Self {
        Self::assemble(registry, max_attempts, Some("https://hooks.example.com/mediaflow/"))
    }

    /// No callback receiver configured.
    pub fn without_webhooks() -> Self {
        Self::assemble(Arc::new(Registry::builtin()), 100, None)
    }

    fn assemble(registry: Arc<Registry>, max_attempts: u32, webhook_base_url: Option<&str>) -> Self {
        let submitter = Arc::new(FakeSubmitter::default());
        let fetcher = Arc::new(ScriptedFetcher::new(runway_status("RUNNING")));
        let store = Arc::new(InMemoryJobStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let scheduler = PollingScheduler::new(fetcher.clone())
            .with_delay(FixedInterval(Duration::from_millis(POLL_INTERVAL_MS)))
            .with_max_attempts(max_attempts);
        let mut reconciler = Reconciler::new(registry, submitter.clone(), scheduler, store.clone())
            .with_clock(clock.clone());
        if let Some(base) = webhook_base_url {
            reconciler = reconciler.with_webhook_base_url(base);
        }
        Self {
            reconciler: Arc::new(reconciler),
            submitter,
            fetcher,
            store,
            clock,
        }
    }

    /// Advance past the next poll and tick once.
    pub async fn tick(&self, job_id: &str) -> mediaflow::job::Job {
        self.clock.advance(POLL_INTERVAL_MS);
        self.reconciler.on_poll_tick(job_id).await.unwrap()
    }
}

// ---------------------------------------------------------------------------
// Requests and payloads
// ---------------------------------------------------------------------------

pub fn prompt(text: &str) -> UnifiedOptions {
    UnifiedOptions {
        prompt: Some(text.to_string()),
        ..Default::default()
    }
}

/// Webhook-default Replicate video job.
pub fn minimax_job() -> SubmitJob {
    SubmitJob {
        provider: "replicate".to_string(),
        model_id: "minimax/video-01".to_string(),
        options: prompt("a fox running through snow"),
        ..Default::default()
    }
}

/// Polling-only Runway job.
pub fn runway_job() -> SubmitJob {
    SubmitJob {
        provider: "runway".to_string(),
        model_id: "gen4_turbo".to_string(),
        options: UnifiedOptions {
            prompt: Some("slow dolly zoom".to_string()),
            image_urls: vec!["https://x/still.png".to_string()],
            aspect_ratio: Some(AspectRatio::Landscape16x9),
            duration_secs: Some(5),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn replicate_status(status: &str) -> Value {
    json!({ "id": "pj_0", "status": status })
}

pub fn replicate_succeeded(url: &str) -> Value {
    json!({ "id": "pj_0", "status": "succeeded", "output": url })
}

pub fn runway_status(status: &str) -> Value {
    json!({ "id": "task", "status": status })
}

pub fn runway_succeeded(url: &str) -> Value {
    json!({ "id": "task", "status": "SUCCEEDED", "output": [url] })
}
