//! Tests for the polling scheduler and delay policies.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mediaflow::dispatch::poll::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, ExponentialBackoff, FixedInterval, PollDelay,
    PollProgress, PollingScheduler,
};
use mediaflow::error::MediaflowError;
use mediaflow::parsers::NormalizedOutcome;

use common::{Harness, ScriptedFetcher, runway_job, runway_status, runway_succeeded};

// ---------------------------------------------------------------------------
// Delay policies
// ---------------------------------------------------------------------------

#[test]
fn defaults_are_five_seconds_and_a_hundred_attempts() {
    let scheduler = PollingScheduler::new(Arc::new(ScriptedFetcher::new(runway_status("RUNNING"))));
    assert_eq!(scheduler.max_attempts(), DEFAULT_MAX_ATTEMPTS);
    assert_eq!(DEFAULT_MAX_ATTEMPTS, 100);
    assert_eq!(scheduler.next_delay(0), DEFAULT_POLL_INTERVAL);
    assert_eq!(scheduler.next_delay(50), Duration::from_secs(5));
}

#[test]
fn fixed_interval_ignores_attempt() {
    let d = FixedInterval(Duration::from_millis(250));
    assert_eq!(d.delay(0), d.delay(9));
}

#[test]
fn exponential_backoff_grows_and_caps() {
    let d = ExponentialBackoff {
        base: Duration::from_secs(2),
        factor: 1.5,
        max: Duration::from_secs(10),
    };
    assert_eq!(d.delay(0), Duration::from_secs(2));
    assert_eq!(d.delay(1), Duration::from_secs(3));
    assert_eq!(d.delay(2), Duration::from_millis(4_500));
    assert_eq!(d.delay(10), Duration::from_secs(10));
    assert_eq!(d.delay(u32::MAX), Duration::from_secs(10));
}

#[test]
fn backoff_factor_below_one_is_treated_as_fixed() {
    for factor in [-2.0, 0.0, 0.5, f64::NAN] {
        let d = ExponentialBackoff {
            base: Duration::from_secs(2),
            factor,
            max: Duration::from_secs(10),
        };
        for attempt in [0, 1, 2, 7] {
            assert_eq!(d.delay(attempt), Duration::from_secs(2), "factor {factor}, attempt {attempt}");
        }
    }
}

#[test]
fn max_attempts_is_at_least_one() {
    let scheduler = PollingScheduler::new(Arc::new(ScriptedFetcher::new(runway_status("RUNNING"))))
        .with_max_attempts(0);
    assert_eq!(scheduler.max_attempts(), 1);
}

// ---------------------------------------------------------------------------
// Single poll
// ---------------------------------------------------------------------------

#[tokio::test]
async fn poll_normalizes_fetched_body() {
    let h = Harness::new();
    let job = h.reconciler.submit(runway_job()).await.unwrap();

    let fetcher = Arc::new(ScriptedFetcher::new(runway_succeeded("https://r/out.mp4")));
    let scheduler = PollingScheduler::new(fetcher.clone());
    match scheduler.poll(&job).await.unwrap() {
        NormalizedOutcome::Completed { outputs, .. } => assert_eq!(outputs[0].url, "https://r/out.mp4"),
        other => panic!("expected Completed, got {other:?}"),
    }
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn poll_propagates_fetch_errors() {
    let h = Harness::new();
    let job = h.reconciler.submit(runway_job()).await.unwrap();

    let fetcher = Arc::new(ScriptedFetcher::new(runway_status("RUNNING")));
    fetcher.push_err(MediaflowError::RateLimited {
        provider: "runway".to_string(),
    });
    let scheduler = PollingScheduler::new(fetcher);
    let err = scheduler.poll(&job).await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn progress_callback_sees_non_terminal_polls_only() {
    let h = Harness::new();
    let job = h.reconciler.submit(runway_job()).await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let count = Arc::new(AtomicU32::new(0));
    let fetcher = Arc::new(ScriptedFetcher::new(runway_succeeded("https://r/out.mp4")));
    fetcher.push(runway_status("PENDING"));
    fetcher.push(runway_status("RUNNING"));

    let seen_cb = seen.clone();
    let count_cb = count.clone();
    let scheduler = PollingScheduler::new(fetcher).with_progress(Arc::new(move |p: &PollProgress<'_>| {
        count_cb.fetch_add(1, Ordering::SeqCst);
        seen_cb.lock().unwrap().push((p.attempt, p.status.to_string()));
    }));

    for _ in 0..3 {
        scheduler.poll(&job).await.unwrap();
    }
    assert_eq!(count.load(Ordering::SeqCst), 2);
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].1, "PENDING");
    assert_eq!(seen[1].1, "RUNNING");
    // The job itself was never advanced, so every report is attempt 1.
    assert!(seen.iter().all(|(attempt, _)| *attempt == 1));
}

#[tokio::test]
async fn progress_callback_does_not_change_the_job() {
    let h = Harness::new();
    let job = h.reconciler.submit(runway_job()).await.unwrap();
    let before = h.reconciler.get_job(job.job_id()).await.unwrap();

    let scheduler = PollingScheduler::new(Arc::new(ScriptedFetcher::new(runway_status("RUNNING"))))
        .with_progress(Arc::new(|_: &PollProgress<'_>| {}));
    scheduler.poll(&job).await.unwrap();

    assert_eq!(h.reconciler.get_job(job.job_id()).await.unwrap(), before);
}
