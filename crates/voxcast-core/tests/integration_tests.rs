//! Integration tests for voxcast-core crate

use std::sync::Arc;
use std::time::Duration;

use voxcast_core::{
    AccountId, AccountStore, BackendKind, BackendRegistry, FailureKind, MemoryAccountStore,
    PlanTier, ServiceConfig, StubBackend, SynthesisService, VoiceParams, VoxcastError,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn stub_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(StubBackend::new(BackendKind::Fast)));
    registry.register(Arc::new(StubBackend::new(BackendKind::Mid)));
    registry.register(Arc::new(StubBackend::new(BackendKind::Premium)));
    registry
}

fn accounts_with(plans: &[(&str, PlanTier)]) -> Arc<MemoryAccountStore> {
    let store = MemoryAccountStore::new();
    for (id, plan) in plans {
        store.insert(*id, *plan);
    }
    Arc::new(store)
}

#[tokio::test]
async fn test_full_synthesis_pipeline() {
    init_tracing();
    let accounts = accounts_with(&[("alice", PlanTier::Pro)]);
    let service = SynthesisService::new(Arc::clone(&accounts) as _, stub_registry())
        .expect("Should create service");
    let alice = AccountId::from("alice");

    let handle = service
        .submit(&alice, BackendKind::Fast, "Hello, world!", VoiceParams::default())
        .await
        .expect("Should accept submission");
    assert_eq!(handle.backend, BackendKind::Fast);

    let finished = service
        .await_completion(&handle.job_id, Duration::from_secs(5))
        .await
        .expect("Should complete");
    assert!(finished.status.is_succeeded());

    // The synthesized audio carries the input text through the stub payload.
    let audio = finished.audio().expect("Succeeded job should carry audio");
    assert!(!audio.is_empty());
    assert!(audio.as_bytes().ends_with("Hello, world!".as_bytes()));

    // One successful job means exactly one unit of usage, on both meters.
    assert_eq!(service.usage_today(&alice)[&BackendKind::Fast], 1);
    assert_eq!(accounts.usage(&alice, BackendKind::Fast), Some(1));
}

#[tokio::test]
async fn test_free_plan_daily_quota_exhausts() {
    init_tracing();
    let service = SynthesisService::new(
        accounts_with(&[("casual", PlanTier::Free)]) as _,
        stub_registry(),
    )
    .expect("Should create service");
    let casual = AccountId::from("casual");

    // The free plan allows three fast jobs per day.
    for i in 0..3 {
        let handle = service
            .submit(&casual, BackendKind::Fast, "namaste", VoiceParams::default())
            .await
            .unwrap_or_else(|e| panic!("submission {i} should be accepted: {e}"));
        let finished = service
            .await_completion(&handle.job_id, Duration::from_secs(5))
            .await
            .expect("Should complete");
        assert!(finished.status.is_succeeded());
    }
    assert_eq!(service.usage_today(&casual)[&BackendKind::Fast], 3);

    // The fourth submission is turned away before any job is created.
    let err = service
        .submit(&casual, BackendKind::Fast, "namaste", VoiceParams::default())
        .await
        .expect_err("Fourth submission should be rejected");
    assert!(matches!(
        err,
        VoxcastError::QuotaExceeded { backend: BackendKind::Fast, limit: 3 }
    ));
    assert_eq!(err.category(), "quota");
    assert!(!err.is_retriable());
    assert_eq!(service.usage_today(&casual)[&BackendKind::Fast], 3);
    assert_eq!(service.get_stats().job_count, 3);
}

#[tokio::test]
async fn test_basic_plan_cannot_use_premium_backend() {
    let service = SynthesisService::new(
        accounts_with(&[("bob", PlanTier::Basic)]) as _,
        stub_registry(),
    )
    .expect("Should create service");
    let bob = AccountId::from("bob");

    let err = service
        .submit(&bob, BackendKind::Premium, "Hello", VoiceParams::default())
        .await
        .expect_err("Premium should be rejected for the basic plan");
    assert!(matches!(
        err,
        VoxcastError::BackendNotEntitled { backend: BackendKind::Premium, plan: PlanTier::Basic }
    ));
    assert_eq!(
        err.to_string(),
        "The basic plan does not include the premium backend"
    );

    // The rejection never reached the store or the ledger.
    assert_eq!(service.get_stats().job_count, 0);
    assert_eq!(service.usage_today(&bob)[&BackendKind::Premium], 0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_window_recovers() {
    let service = SynthesisService::new(
        accounts_with(&[("alice", PlanTier::Pro)]) as _,
        stub_registry(),
    )
    .expect("Should create service");
    let alice = AccountId::from("alice");

    // Five back-to-back submissions fill the default window.
    for i in 0..5 {
        service
            .submit(&alice, BackendKind::Fast, "burst", VoiceParams::default())
            .await
            .unwrap_or_else(|e| panic!("submission {i} should be accepted: {e}"));
    }

    let err = service
        .submit(&alice, BackendKind::Fast, "burst", VoiceParams::default())
        .await
        .expect_err("Sixth submission should be rate limited");
    assert!(matches!(err, VoxcastError::RateLimited { .. }));
    assert!(err.is_retriable());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));

    // Once the window has passed, submissions flow again.
    tokio::time::advance(Duration::from_secs(61)).await;
    service
        .submit(&alice, BackendKind::Fast, "burst", VoiceParams::default())
        .await
        .expect("Submission after the window should be accepted");
}

#[tokio::test(start_paused = true)]
async fn test_synthesis_timeout_fails_job_without_usage() {
    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(
        StubBackend::new(BackendKind::Fast).with_latency(Duration::from_secs(10)),
    ));
    let config = ServiceConfig {
        synthesis_timeout_secs: 1,
        ..Default::default()
    };
    let service = SynthesisService::with_config(
        config,
        accounts_with(&[("alice", PlanTier::Pro)]) as _,
        registry,
    )
    .expect("Should create service");
    let alice = AccountId::from("alice");

    let handle = service
        .submit(&alice, BackendKind::Fast, "slow text", VoiceParams::default())
        .await
        .expect("Should accept submission");

    // The job settles as failed; waiting on it is not an error.
    let finished = service
        .await_completion(&handle.job_id, Duration::from_secs(60))
        .await
        .expect("Wait should resolve once the job fails");
    assert!(finished.status.is_failed());
    match finished.failure() {
        Some(FailureKind::SynthesisTimeout { deadline }) => {
            assert_eq!(*deadline, Duration::from_secs(1));
        }
        other => panic!("expected a synthesis timeout, got {other:?}"),
    }

    // A timed-out job consumes no quota.
    assert_eq!(service.usage_today(&alice)[&BackendKind::Fast], 0);
}

#[tokio::test]
async fn test_concurrent_accounts_meter_independently() {
    let accounts = accounts_with(&[("alice", PlanTier::Pro), ("bob", PlanTier::Basic)]);
    let service = SynthesisService::new(Arc::clone(&accounts) as _, stub_registry())
        .expect("Should create service");
    let alice = AccountId::from("alice");
    let bob = AccountId::from("bob");

    let (first, second) = tokio::join!(
        service.submit(&alice, BackendKind::Fast, "from alice", VoiceParams::default()),
        service.submit(&bob, BackendKind::Fast, "from bob", VoiceParams::default()),
    );
    let first = first.expect("Alice's submission should be accepted");
    let second = second.expect("Bob's submission should be accepted");

    let (done_a, done_b) = tokio::join!(
        service.await_completion(&first.job_id, Duration::from_secs(5)),
        service.await_completion(&second.job_id, Duration::from_secs(5)),
    );
    assert!(done_a.expect("Should complete").status.is_succeeded());
    assert!(done_b.expect("Should complete").status.is_succeeded());

    // Each account is charged for exactly its own job.
    assert_eq!(service.usage_today(&alice)[&BackendKind::Fast], 1);
    assert_eq!(service.usage_today(&bob)[&BackendKind::Fast], 1);
    assert_eq!(accounts.usage(&alice, BackendKind::Fast), Some(1));
    assert_eq!(accounts.usage(&bob, BackendKind::Fast), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_fast_job_finishes_before_earlier_slow_job() {
    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(
        StubBackend::new(BackendKind::Premium).with_latency(Duration::from_secs(2)),
    ));
    registry.register(Arc::new(StubBackend::new(BackendKind::Fast)));
    let service = SynthesisService::with_config(
        ServiceConfig::default(),
        accounts_with(&[("alice", PlanTier::Pro)]) as _,
        registry,
    )
    .expect("Should create service");
    let alice = AccountId::from("alice");

    let slow = service
        .submit(&alice, BackendKind::Premium, "slow", VoiceParams::default())
        .await
        .expect("Should accept slow submission");
    let fast = service
        .submit(&alice, BackendKind::Fast, "fast", VoiceParams::default())
        .await
        .expect("Should accept fast submission");

    // The fast job overtakes the premium job that was submitted first.
    let fast_done = service
        .await_completion(&fast.job_id, Duration::from_secs(1))
        .await
        .expect("Fast job should complete first");
    assert!(fast_done.status.is_succeeded());
    assert!(!service.poll(&slow.job_id).expect("Should poll").is_terminal());

    let slow_done = service
        .await_completion(&slow.job_id, Duration::from_secs(10))
        .await
        .expect("Slow job should complete eventually");
    assert!(slow_done.status.is_succeeded());
}

#[tokio::test(start_paused = true)]
async fn test_queue_saturation_rejects_new_jobs() {
    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(
        StubBackend::new(BackendKind::Fast).with_latency(Duration::from_secs(300)),
    ));
    let config = ServiceConfig {
        worker_count: 1,
        queue_capacity: 1,
        synthesis_timeout_secs: 600,
        ..Default::default()
    };
    let service = SynthesisService::with_config(
        config,
        accounts_with(&[("alice", PlanTier::Pro)]) as _,
        registry,
    )
    .expect("Should create service");
    let alice = AccountId::from("alice");

    // First job occupies the only worker.
    service
        .submit(&alice, BackendKind::Fast, "one", VoiceParams::default())
        .await
        .expect("Should accept first submission");
    tokio::time::sleep(Duration::from_millis(5)).await;

    // Second job fills the only queue slot.
    service
        .submit(&alice, BackendKind::Fast, "two", VoiceParams::default())
        .await
        .expect("Should accept second submission");
    assert_eq!(service.queue_depth(), 1);

    let err = service
        .submit(&alice, BackendKind::Fast, "three", VoiceParams::default())
        .await
        .expect_err("Third submission should be rejected");
    assert!(matches!(err, VoxcastError::QueueSaturated { capacity: 1 }));
    assert!(err.is_retriable());
    assert_eq!(service.get_stats().job_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_queued_job() {
    let stub = Arc::new(
        StubBackend::new(BackendKind::Fast).with_latency(Duration::from_secs(300)),
    );
    let mut registry = BackendRegistry::new();
    registry.register(Arc::clone(&stub) as _);
    let config = ServiceConfig {
        worker_count: 1,
        synthesis_timeout_secs: 600,
        ..Default::default()
    };
    let service = SynthesisService::with_config(
        config,
        accounts_with(&[("alice", PlanTier::Pro)]) as _,
        registry,
    )
    .expect("Should create service");
    let alice = AccountId::from("alice");

    let running = service
        .submit(&alice, BackendKind::Fast, "claimed", VoiceParams::default())
        .await
        .expect("Should accept first submission");
    tokio::time::sleep(Duration::from_millis(5)).await;
    let queued = service
        .submit(&alice, BackendKind::Fast, "waiting", VoiceParams::default())
        .await
        .expect("Should accept second submission");

    // Only the queued job can be cancelled.
    assert!(service.cancel(&queued.job_id).expect("Should cancel"));
    let snapshot = service.poll(&queued.job_id).expect("Should poll");
    assert!(matches!(snapshot.failure(), Some(FailureKind::Cancelled)));
    assert!(snapshot.completed_at.is_some());

    // A second cancel is a no-op, as is cancelling the claimed job.
    assert!(!service.cancel(&queued.job_id).expect("Should report no-op"));
    assert!(!service.cancel(&running.job_id).expect("Should report no-op"));

    // The worker never saw the cancelled job.
    assert_eq!(stub.call_count(), 1);
    assert_eq!(service.usage_today(&alice)[&BackendKind::Fast], 0);
}

#[tokio::test(start_paused = true)]
async fn test_await_completion_times_out_on_pending_job() {
    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(
        StubBackend::new(BackendKind::Fast).with_latency(Duration::from_secs(300)),
    ));
    let config = ServiceConfig {
        synthesis_timeout_secs: 600,
        ..Default::default()
    };
    let service = SynthesisService::with_config(
        config,
        accounts_with(&[("alice", PlanTier::Pro)]) as _,
        registry,
    )
    .expect("Should create service");
    let alice = AccountId::from("alice");

    let handle = service
        .submit(&alice, BackendKind::Fast, "very slow", VoiceParams::default())
        .await
        .expect("Should accept submission");

    let err = service
        .await_completion(&handle.job_id, Duration::from_secs(1))
        .await
        .expect_err("Wait should time out");
    assert!(matches!(err, VoxcastError::Timeout { .. }));
    assert!(err.is_retriable());

    // The job itself is untouched by the caller giving up.
    assert!(!service.poll(&handle.job_id).expect("Should poll").is_terminal());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_accepted_jobs() {
    init_tracing();
    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(
        StubBackend::new(BackendKind::Fast).with_latency(Duration::from_millis(50)),
    ));
    let config = ServiceConfig {
        worker_count: 1,
        ..Default::default()
    };
    let service = SynthesisService::with_config(
        config,
        accounts_with(&[("alice", PlanTier::Pro)]) as _,
        registry,
    )
    .expect("Should create service");
    let alice = AccountId::from("alice");

    let mut handles = Vec::new();
    for _ in 0..3 {
        let handle = service
            .submit(&alice, BackendKind::Fast, "drain me", VoiceParams::default())
            .await
            .expect("Should accept submission");
        handles.push(handle);
    }

    service
        .shutdown(Duration::from_secs(60))
        .await
        .expect("Shutdown should drain the queue");
    assert!(!service.is_running());
    assert_eq!(service.queue_depth(), 0);

    // Everything accepted before the shutdown ran to completion.
    for handle in &handles {
        let snapshot = service.poll(&handle.job_id).expect("Should poll");
        assert!(snapshot.status.is_succeeded());
    }
    assert_eq!(service.usage_today(&alice)[&BackendKind::Fast], 3);

    let err = service
        .submit(&alice, BackendKind::Fast, "too late", VoiceParams::default())
        .await
        .expect_err("Submission after shutdown should be rejected");
    assert!(matches!(err, VoxcastError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_plan_upgrade_unlocks_backend() {
    let accounts = accounts_with(&[("carol", PlanTier::Free)]);
    let service = SynthesisService::new(Arc::clone(&accounts) as _, stub_registry())
        .expect("Should create service");
    let carol = AccountId::from("carol");

    let err = service
        .submit(&carol, BackendKind::Premium, "Hello", VoiceParams::default())
        .await
        .expect_err("Premium should be rejected for the free plan");
    assert!(matches!(err, VoxcastError::BackendNotEntitled { .. }));

    // After an upgrade the same submission goes through.
    service
        .account_store()
        .set_plan(&carol, PlanTier::Pro)
        .await
        .expect("Should change plan");
    let handle = service
        .submit(&carol, BackendKind::Premium, "Hello", VoiceParams::default())
        .await
        .expect("Premium should be accepted for the pro plan");
    let finished = service
        .await_completion(&handle.job_id, Duration::from_secs(5))
        .await
        .expect("Should complete");
    assert!(finished.status.is_succeeded());
    assert_eq!(service.usage_today(&carol)[&BackendKind::Premium], 1);
}

#[tokio::test]
async fn test_poll_is_idempotent_after_completion() {
    let service = SynthesisService::new(
        accounts_with(&[("alice", PlanTier::Pro)]) as _,
        stub_registry(),
    )
    .expect("Should create service");
    let alice = AccountId::from("alice");

    let handle = service
        .submit(&alice, BackendKind::Fast, "repeat me", VoiceParams::default())
        .await
        .expect("Should accept submission");
    service
        .await_completion(&handle.job_id, Duration::from_secs(5))
        .await
        .expect("Should complete");

    let first = service.poll(&handle.job_id).expect("Should poll");
    let second = service.poll(&handle.job_id).expect("Should poll again");
    assert_eq!(first, second);
    assert_eq!(
        first.audio().map(voxcast_core::AudioHandle::as_bytes),
        second.audio().map(voxcast_core::AudioHandle::as_bytes),
    );
}

#[tokio::test]
async fn test_voice_params_reach_the_backend() {
    let service = SynthesisService::new(
        accounts_with(&[("alice", PlanTier::Pro)]) as _,
        stub_registry(),
    )
    .expect("Should create service");
    let alice = AccountId::from("alice");

    let params = VoiceParams::from_sliders("hi-IN-SwaraNeural", 1.5, 5)
        .expect("Sliders should be in range");
    let handle = service
        .submit(&alice, BackendKind::Fast, "tuned", params)
        .await
        .expect("Should accept submission");
    let finished = service
        .await_completion(&handle.job_id, Duration::from_secs(5))
        .await
        .expect("Should complete");

    // The stub payload records the voice settings it was called with.
    let audio = finished.audio().expect("Should carry audio");
    let payload = String::from_utf8_lossy(audio.as_bytes());
    assert!(payload.contains("hi-IN-SwaraNeural"));
    assert!(payload.contains("|50%|"));
    assert!(payload.contains("|5Hz|"));
}

#[test]
fn test_constants() {
    assert_eq!(voxcast_core::DEFAULT_VOICE_ID, "hi-IN-MadhurNeural");
    assert_eq!(voxcast_core::MAX_TEXT_LENGTH, 10_000);
    assert_eq!(voxcast_core::DEFAULT_WORKER_COUNT, 2);
    assert_eq!(voxcast_core::DEFAULT_QUEUE_CAPACITY, 256);
    assert_eq!(voxcast_core::DEFAULT_RATE_LIMIT_WINDOW_SECS, 60);
    assert_eq!(voxcast_core::DEFAULT_RATE_LIMIT_MAX, 5);
    assert_eq!(voxcast_core::DEFAULT_SYNTHESIS_TIMEOUT_SECS, 30);
    assert!(!voxcast_core::VERSION.is_empty());
}
