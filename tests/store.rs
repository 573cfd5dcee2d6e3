//! Tests for the in-memory and file-backed job stores.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use mediaflow::job::Job;
use mediaflow::registry::Provider;
use mediaflow::store::{FileJobStore, InMemoryJobStore, JobStore, sanitize_file_component};

use common::{Harness, minimax_job, replicate_succeeded, runway_job};

/// Fresh directory under the system temp dir, unique per test.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mediaflow-store-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// One live polling job, one live webhook job, one finished webhook job.
async fn sample_jobs() -> (Job, Job, Job) {
    let h = Harness::new();
    let polling = h.reconciler.submit(runway_job()).await.unwrap();
    let webhook = h.reconciler.submit(minimax_job()).await.unwrap();
    let finished = h.reconciler.submit(minimax_job()).await.unwrap();
    let finished = h
        .reconciler
        .on_webhook(
            "replicate",
            finished.provider_job_id().unwrap(),
            &replicate_succeeded("https://x/video.mp4"),
        )
        .await
        .unwrap();
    (polling, webhook, finished)
}

async fn exercise(store: Arc<dyn JobStore>) {
    let (polling, webhook, finished) = sample_jobs().await;
    for job in [&polling, &webhook, &finished] {
        store.save(job).await.unwrap();
    }

    assert_eq!(store.load(polling.job_id()).await.unwrap().as_ref(), Some(&polling));
    assert_eq!(store.load("missing").await.unwrap(), None);

    assert_eq!(
        store
            .find_by_provider_job(Provider::Replicate, webhook.provider_job_id().unwrap())
            .await
            .unwrap()
            .as_deref(),
        Some(webhook.job_id())
    );
    assert_eq!(
        store.find_by_provider_job(Provider::Fal, "pj_1").await.unwrap(),
        None
    );

    let mut active: Vec<String> = store
        .active_jobs()
        .await
        .unwrap()
        .iter()
        .map(|j| j.job_id().to_string())
        .collect();
    active.sort();
    let mut expected = vec![polling.job_id().to_string(), webhook.job_id().to_string()];
    expected.sort();
    assert_eq!(active, expected);

    // Re-saving the same record is harmless.
    store.save(&finished).await.unwrap();
    assert_eq!(store.load(finished.job_id()).await.unwrap(), Some(finished));
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[tokio::test]
async fn in_memory_store_round_trips_jobs() {
    exercise(Arc::new(InMemoryJobStore::new())).await;
}

#[tokio::test]
async fn in_memory_store_counts_jobs() {
    let store = InMemoryJobStore::new();
    assert!(store.is_empty().await);
    let (polling, _, _) = sample_jobs().await;
    store.save(&polling).await.unwrap();
    store.save(&polling).await.unwrap();
    assert_eq!(store.len().await, 1);
}

// ---------------------------------------------------------------------------
// File-backed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn file_store_round_trips_jobs() {
    let dir = scratch_dir("round-trip");
    exercise(Arc::new(FileJobStore::new(&dir))).await;
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let dir = scratch_dir("reopen");
    let (polling, _, _) = sample_jobs().await;
    FileJobStore::new(&dir).save(&polling).await.unwrap();

    let reopened = FileJobStore::new(&dir);
    assert_eq!(reopened.dir(), dir.as_path());
    assert_eq!(reopened.load(polling.job_id()).await.unwrap(), Some(polling.clone()));
    assert_eq!(reopened.active_jobs().await.unwrap(), vec![polling.clone()]);

    // No temp files left behind.
    let leftovers: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn file_store_missing_directory_is_empty() {
    let store = FileJobStore::new(scratch_dir("missing"));
    tokio_test::block_on(async {
        assert!(store.active_jobs().await.unwrap().is_empty());
        assert_eq!(store.load("job_1").await.unwrap(), None);
        assert_eq!(
            store.find_by_provider_job(Provider::Runway, "task").await.unwrap(),
            None
        );
    });
}

#[tokio::test]
async fn file_store_skips_foreign_and_corrupt_files() {
    let dir = scratch_dir("corrupt");
    let (polling, _, _) = sample_jobs().await;
    let store = FileJobStore::new(&dir);
    store.save(&polling).await.unwrap();

    std::fs::write(dir.join("notes.txt"), "not a job").unwrap();
    std::fs::write(dir.join("broken.json"), "{ nope").unwrap();

    assert_eq!(store.active_jobs().await.unwrap(), vec![polling]);
    assert!(store.load("broken").await.is_err());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn file_store_keeps_dotted_provider_ids_apart() {
    let dir = scratch_dir("dotted");
    let h = Harness::new();
    h.submitter.push(Ok("abc.def".to_string()));
    h.submitter.push(Ok("abc".to_string()));
    let dotted = h.reconciler.submit(minimax_job()).await.unwrap();
    let plain = h.reconciler.submit(minimax_job()).await.unwrap();

    let store = FileJobStore::new(&dir);
    let (a, b) = tokio::join!(store.save(&dotted), store.save(&plain));
    a.unwrap();
    b.unwrap();

    for job in [&dotted, &plain] {
        let found = store
            .find_by_provider_job(Provider::Replicate, job.provider_job_id().unwrap())
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some(job.job_id()));
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn sanitize_replaces_path_characters() {
    assert_eq!(sanitize_file_component("job_1.a-b"), "job_1.a-b");
    assert_eq!(sanitize_file_component("../etc/passwd"), ".._etc_passwd");
    assert_eq!(sanitize_file_component("a b:c"), "a_b_c");
}
