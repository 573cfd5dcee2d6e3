use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::MediaflowError;
use crate::job::Job;
use crate::registry::Provider;

/// Record store keyed by job id. Saves are whole-record overwrites, so
/// repeating a save of the same state is harmless.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn load(&self, job_id: &str) -> Result<Option<Job>, MediaflowError>;

    async fn save(&self, job: &Job) -> Result<(), MediaflowError>;

    /// Resolve a provider's job id back to ours (webhook routing).
    async fn find_by_provider_job(
        &self,
        provider: Provider,
        provider_job_id: &str,
    ) -> Result<Option<String>, MediaflowError>;

    /// Every job not yet completed or failed (poll resumption after restart).
    async fn active_jobs(&self) -> Result<Vec<Job>, MediaflowError>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryInner {
    jobs: HashMap<String, Job>,
    by_provider_job: HashMap<(Provider, String), String>,
}

/// Process-local store, used by tests and ephemeral deployments.
#[derive(Default)]
pub struct InMemoryJobStore {
    inner: Mutex<MemoryInner>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn load(&self, job_id: &str) -> Result<Option<Job>, MediaflowError> {
        Ok(self.inner.lock().await.jobs.get(job_id).cloned())
    }

    async fn save(&self, job: &Job) -> Result<(), MediaflowError> {
        let mut inner = self.inner.lock().await;
        if let Some(pid) = job.provider_job_id() {
            inner
                .by_provider_job
                .insert((job.provider(), pid.to_string()), job.job_id().to_string());
        }
        inner.jobs.insert(job.job_id().to_string(), job.clone());
        Ok(())
    }

    async fn find_by_provider_job(
        &self,
        provider: Provider,
        provider_job_id: &str,
    ) -> Result<Option<String>, MediaflowError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .by_provider_job
            .get(&(provider, provider_job_id.to_string()))
            .cloned())
    }

    async fn active_jobs(&self) -> Result<Vec<Job>, MediaflowError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .jobs
            .values()
            .filter(|j| !j.is_terminal())
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// File-backed
// ---------------------------------------------------------------------------

/// Default base directory for job records.
pub const DEFAULT_STORE_DIR: &str = ".mediaflow/jobs";

/// One pretty-printed JSON file per job under `dir`, plus a
/// `by-provider/<provider>_<id>` index file holding our job id.
pub struct FileJobStore {
    dir: PathBuf,
}

impl FileJobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn job_path(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_file_component(job_id)))
    }

    fn index_path(&self, provider: Provider, provider_job_id: &str) -> PathBuf {
        self.dir.join("by-provider").join(format!(
            "{provider}_{}",
            sanitize_file_component(provider_job_id)
        ))
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn load(&self, job_id: &str) -> Result<Option<Job>, MediaflowError> {
        read_job(&self.job_path(job_id)).await
    }

    async fn save(&self, job: &Job) -> Result<(), MediaflowError> {
        let json = serde_json::to_string_pretty(job)
            .map_err(|e| MediaflowError::Store(format!("serialize job: {e}")))?;
        write_atomic(&self.job_path(job.job_id()), json.as_bytes()).await?;

        if let Some(pid) = job.provider_job_id() {
            let index = self.index_path(job.provider(), pid);
            if tokio::fs::metadata(&index).await.is_err() {
                write_atomic(&index, job.job_id().as_bytes()).await?;
            }
        }
        Ok(())
    }

    async fn find_by_provider_job(
        &self,
        provider: Provider,
        provider_job_id: &str,
    ) -> Result<Option<String>, MediaflowError> {
        match tokio::fs::read_to_string(self.index_path(provider, provider_job_id)).await {
            Ok(id) => Ok(Some(id.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MediaflowError::Store(format!("read index: {e}"))),
        }
    }

    async fn active_jobs(&self) -> Result<Vec<Job>, MediaflowError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(MediaflowError::Store(format!("list jobs: {e}"))),
        };

        let mut jobs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MediaflowError::Store(format!("list jobs: {e}")))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match read_job(&path).await {
                Ok(Some(job)) if !job.is_terminal() => jobs.push(job),
                Ok(_) => {}
                Err(e) => tracing::warn!(path = %path.display(), "skipping unreadable job record: {e}"),
            }
        }
        Ok(jobs)
    }
}

async fn read_job(path: &Path) -> Result<Option<Job>, MediaflowError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MediaflowError::Store(format!("read {}: {e}", path.display()))),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| MediaflowError::Store(format!("parse {}: {e}", path.display())))
}

/// Temp file + rename, so readers never see a partial record.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), MediaflowError> {
    let store_err = |e: std::io::Error| MediaflowError::Store(format!("write {}: {e}", path.display()));

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(store_err)?;
    }
    let tmp_path = tmp_path(path);
    tokio::fs::write(&tmp_path, bytes).await.map_err(store_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(store_err(e));
    }
    Ok(())
}

/// `<file name>.tmp` beside `path`. Appending keeps `a.b` and `a` from
/// sharing a temp file.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Sanitize an id for use in filenames. Only allows alphanumeric, `-`, `_`, `.`.
pub fn sanitize_file_component(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_files_are_distinct_per_target() {
        let dotted = tmp_path(Path::new("jobs/by-provider/replicate_abc.def"));
        let plain = tmp_path(Path::new("jobs/by-provider/replicate_abc"));
        assert_ne!(dotted, plain);
        assert_eq!(dotted, Path::new("jobs/by-provider/replicate_abc.def.tmp"));
        assert_eq!(tmp_path(Path::new("jobs/job_1.json")), Path::new("jobs/job_1.json.tmp"));
    }
}
