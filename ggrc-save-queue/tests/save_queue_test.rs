//! Save queue scheduling integration tests
//!
//! Runs the queue against the mock transport on a paused clock:
//! - batching of creates per type within the quiet period
//! - foreground/background batch sizes
//! - one batch in flight per bucket, greedy follow-up cycles
//! - global request throttle
//! - positional response redistribution and failure isolation

use ggrc_save_queue::{
    MockObject, MockTransport, ModelMeta, SaveError, SaveOutcome, SaveQueue, SaveQueueConfig,
    Saveable, Tracker, TrackerTimer, UserAction, UserJourney,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok, assert_pending, assert_ready};

fn controls(count: usize) -> Vec<Arc<MockObject>> {
    (0..count)
        .map(|i| Arc::new(MockObject::control(json!({ "title": format!("Control {}", i) }))))
        .collect()
}

fn queue_with(config: SaveQueueConfig, transport: &Arc<MockTransport>) -> SaveQueue {
    SaveQueue::new(config, transport.clone())
}

// =============================================================================
// Batching
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_creates_within_quiet_period_share_one_post() {
    let transport = Arc::new(MockTransport::new());
    let queue = queue_with(SaveQueueConfig::default(), &transport);
    let objects = controls(5);

    let handles: Vec<_> = objects.iter().map(|o| queue.enqueue(o.clone())).collect();
    assert_eq!(queue.pending_jobs(), 1);

    tokio::time::sleep(Duration::from_millis(99)).await;
    assert_eq!(transport.call_count(), 0);

    for handle in handles {
        assert_ok!(handle.await);
    }

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].plural, "controls");
    assert!(!requests[0].background);
    let expected: Vec<Value> = (0..5)
        .map(|i| json!({ "control": { "title": format!("Control {}", i) } }))
        .collect();
    assert_eq!(requests[0].body, expected);

    for (i, object) in objects.iter().enumerate() {
        assert_eq!(
            object.created_payload(),
            Some(json!({ "title": format!("Control {}", i) }))
        );
    }
    assert!(!queue.is_in_flight("control", false));
}

#[tokio::test(start_paused = true)]
async fn test_every_enqueue_restarts_the_timer() {
    let transport = Arc::new(MockTransport::new());
    let queue = queue_with(SaveQueueConfig::default(), &transport);
    let created = Arc::new(MockObject::control(json!({"title": "new"})));
    let existing = Arc::new(MockObject::control(json!({"title": "old"})).persisted());

    let create = queue.enqueue(created.clone());
    tokio::time::sleep(Duration::from_millis(60)).await;
    let update = queue.enqueue(existing.clone());
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(transport.call_count(), 0);
    assert_eq!(existing.update_count(), 0);
    assert_eq!(queue.pending_jobs(), 2);

    assert_ok!(create.await);
    assert_ok!(update.await);
    assert_eq!(transport.call_count(), 1);
    assert_eq!(existing.update_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_foreground_batches_are_capped_and_sequential() {
    let transport = Arc::new(MockTransport::new().with_latency(Duration::from_millis(10)));
    let queue = queue_with(SaveQueueConfig::default().with_batch_size(2), &transport);

    let handles: Vec<_> = controls(5).into_iter().map(|o| queue.enqueue(o)).collect();
    for handle in handles {
        assert_ok!(handle.await);
    }

    let sizes: Vec<usize> = transport.requests().iter().map(|r| r.body.len()).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(transport.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_background_bucket_sends_everything_at_once() {
    let transport = Arc::new(MockTransport::new());
    let queue = queue_with(SaveQueueConfig::default().with_batch_size(2), &transport);

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let object = MockObject::control(json!({ "i": i })).with_background(true);
            queue.enqueue(Arc::new(object))
        })
        .collect();
    assert!(queue.is_in_flight("control", true));
    assert!(!queue.is_in_flight("control", false));

    for handle in handles {
        assert_ok!(handle.await);
    }

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body.len(), 5);
    assert!(requests[0].background);
}

#[tokio::test(start_paused = true)]
async fn test_background_and_foreground_use_separate_buckets() {
    let transport = Arc::new(MockTransport::new());
    let queue = queue_with(SaveQueueConfig::default(), &transport);

    let fg = queue.enqueue(Arc::new(MockObject::control(json!({"fg": true}))));
    let bg = queue.enqueue(Arc::new(
        MockObject::control(json!({"bg": true})).with_background(true),
    ));
    assert_eq!(queue.pending_jobs(), 2);

    assert_ok!(fg.await);
    assert_ok!(bg.await);

    let mut flags: Vec<bool> = transport.requests().iter().map(|r| r.background).collect();
    flags.sort();
    assert_eq!(flags, vec![false, true]);
}

// =============================================================================
// Bucket cycles
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_objects_arriving_in_flight_join_the_next_cycle() {
    let transport = Arc::new(MockTransport::new().with_latency(Duration::from_millis(50)));
    let queue = queue_with(SaveQueueConfig::default(), &transport);
    let first = Arc::new(MockObject::control(json!({"title": "first"})));
    let second = Arc::new(MockObject::control(json!({"title": "second"})));

    let mut first_handle = queue.enqueue(first.clone());

    // Timer fires at 100ms, the request is out until 150ms
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(transport.call_count(), 1);

    let second_handle = queue.enqueue(second.clone());
    assert_eq!(queue.pending_jobs(), 0);
    assert_eq!(queue.pending_in_bucket("control", false), 1);

    // First request is done but its response waits for the bucket to drain
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_pending!(futures::poll!(&mut first_handle));
    assert!(first.created_payload().is_none());
    assert!(queue.is_in_flight("control", false));

    assert_ok!(first_handle.await);
    assert_ok!(second_handle.await);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body, vec![json!({"control": {"title": "first"}})]);
    assert_eq!(requests[1].body, vec![json!({"control": {"title": "second"}})]);
    assert!(!queue.is_in_flight("control", false));
}

#[tokio::test(start_paused = true)]
async fn test_bucket_is_reused_across_cycles() {
    let transport = Arc::new(MockTransport::new());
    let queue = queue_with(SaveQueueConfig::default(), &transport);

    assert_ok!(queue.enqueue(Arc::new(MockObject::control(json!({"n": 1})))).await);
    assert!(!queue.is_in_flight("control", false));

    assert_ok!(queue.enqueue(Arc::new(MockObject::control(json!({"n": 2})))).await);
    assert_eq!(transport.call_count(), 2);
}

// =============================================================================
// Throttling
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_at_most_max_instances_requests_in_flight() {
    let transport = Arc::new(MockTransport::new().with_latency(Duration::from_millis(50)));
    let queue = queue_with(SaveQueueConfig::default().with_max_instances(3), &transport);

    let handles: Vec<_> = (0..7)
        .map(|i| {
            let meta = ModelMeta::new(format!("type{}", i), format!("types{}", i), "Type");
            queue.enqueue(Arc::new(MockObject::new(meta, json!({ "i": i }))))
        })
        .collect();
    assert_eq!(queue.pending_jobs(), 7);

    for handle in handles {
        assert_ok!(handle.await);
    }

    assert_eq!(transport.call_count(), 7);
    assert_eq!(transport.max_in_flight(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_existing_objects_are_saved_one_job_each() {
    let transport = Arc::new(MockTransport::new());
    let queue = queue_with(SaveQueueConfig::default(), &transport);
    let objects: Vec<_> = (0..4)
        .map(|i| Arc::new(MockObject::control(json!({ "i": i })).persisted()))
        .collect();

    let handles: Vec<_> = objects.iter().map(|o| queue.enqueue(o.clone())).collect();
    assert_eq!(queue.pending_jobs(), 4);

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), SaveOutcome::Updated(json!({ "i": i })));
    }
    assert!(objects.iter().all(|o| o.update_count() == 1));
    assert_eq!(transport.call_count(), 0);
}

// =============================================================================
// Responses and failures
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_response_entries_are_matched_by_position() {
    let transport = Arc::new(MockTransport::new().with_responder(|request| {
        let entries: Vec<Value> = request
            .body
            .iter()
            .enumerate()
            .map(|(i, _)| {
                if i % 2 == 0 {
                    json!([201, { "control": { "id": 100 + i } }])
                } else {
                    json!([400, { "control": format!("bad {}", i) }])
                }
            })
            .collect();
        Ok(Value::Array(entries))
    }));
    let queue = queue_with(SaveQueueConfig::default(), &transport);
    let objects = controls(4);

    let handles: Vec<_> = objects.iter().map(|o| queue.enqueue(o.clone())).collect();
    let results: Vec<_> = futures::future::join_all(handles).await;

    assert_eq!(
        results[0].as_ref().ok(),
        Some(&SaveOutcome::Created(json!({"id": 100})))
    );
    assert_eq!(
        results[2].as_ref().ok(),
        Some(&SaveOutcome::Created(json!({"id": 102})))
    );
    for i in [1, 3] {
        let err = results[i].as_ref().unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(objects[i].created_payload().is_none());
        assert!(objects[i].is_new());
    }
}

#[tokio::test(start_paused = true)]
async fn test_background_task_settles_the_whole_batch() {
    let transport = Arc::new(
        MockTransport::new().with_responder(|_| Ok(json!({"background_task": {"id": 42}}))),
    );
    let queue = queue_with(SaveQueueConfig::default(), &transport);
    let objects: Vec<_> = (0..3)
        .map(|i| Arc::new(MockObject::control(json!({ "i": i })).with_background(true)))
        .collect();

    let handles: Vec<_> = objects.iter().map(|o| queue.enqueue(o.clone())).collect();
    for handle in handles {
        assert_eq!(
            handle.await.unwrap(),
            SaveOutcome::BackgroundTask(json!({"id": 42}))
        );
    }
    assert!(objects.iter().all(|o| o.created_payload().is_none()));
    assert!(!queue.is_in_flight("control", true));
}

#[tokio::test(start_paused = true)]
async fn test_failed_batch_rejects_its_objects_only() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_collection("controls");
    let queue = queue_with(SaveQueueConfig::default(), &transport);

    let control_handles: Vec<_> = controls(2).into_iter().map(|o| queue.enqueue(o)).collect();
    let objective = Arc::new(MockObject::new(
        ModelMeta::new("objective", "objectives", "Objective"),
        json!({"title": "o"}),
    ));
    let objective_handle = queue.enqueue(objective.clone());

    for handle in control_handles {
        let err = handle.await.unwrap_err();
        assert!(matches!(err, SaveError::Transport(_)));
    }
    assert_ok!(objective_handle.await);
    assert!(!queue.is_in_flight("control", false));
    assert!(!queue.is_in_flight("objective", false));
}

#[tokio::test(start_paused = true)]
async fn test_failed_update_is_reported() {
    let transport = Arc::new(MockTransport::new());
    let queue = queue_with(SaveQueueConfig::default(), &transport);
    let object = Arc::new(
        MockObject::control(json!({}))
            .persisted()
            .with_failing_updates(),
    );

    let result = queue.enqueue(object.clone()).await;

    assert!(matches!(assert_err!(result), SaveError::Update(_)));
    assert_eq!(object.update_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_default_foreground_batch_is_capped_at_a_thousand() {
    let transport = Arc::new(MockTransport::new());
    let queue = queue_with(SaveQueueConfig::default(), &transport);

    let handles: Vec<_> = (0..1001)
        .map(|i| queue.enqueue(Arc::new(MockObject::control(json!({ "i": i })))))
        .collect();
    for handle in futures::future::join_all(handles).await {
        assert_ok!(handle);
    }

    let sizes: Vec<usize> = transport.requests().iter().map(|r| r.body.len()).collect();
    assert_eq!(sizes, vec![1000, 1]);
    assert_eq!(transport.requests()[1].body[0], json!({"control": {"i": 1000}}));
}

#[tokio::test(start_paused = true)]
async fn test_default_background_batch_is_not_capped() {
    let transport = Arc::new(MockTransport::new());
    let queue = queue_with(SaveQueueConfig::default(), &transport);

    let handles: Vec<_> = (0..1001)
        .map(|i| {
            let object = MockObject::control(json!({ "i": i })).with_background(true);
            queue.enqueue(Arc::new(object))
        })
        .collect();
    for handle in futures::future::join_all(handles).await {
        assert_ok!(handle);
    }

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body.len(), 1001);
    assert!(requests[0].background);
}

// =============================================================================
// Misbehaving models
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_panicking_serialize_releases_the_bucket() {
    let transport = Arc::new(MockTransport::new());
    let queue = queue_with(SaveQueueConfig::default(), &transport);

    let broken = queue.enqueue(Arc::new(
        MockObject::control(json!({})).with_panic_on_serialize(),
    ));
    assert!(matches!(broken.await, Err(SaveError::Cancelled)));
    assert!(!queue.is_in_flight("control", false));

    assert_ok!(queue.enqueue(Arc::new(MockObject::control(json!({"ok": true})))).await);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_objects_behind_a_panicking_batch_still_go_out() {
    let transport = Arc::new(MockTransport::new());
    let queue = queue_with(SaveQueueConfig::default().with_batch_size(1), &transport);

    let broken = queue.enqueue(Arc::new(
        MockObject::control(json!({})).with_panic_on_serialize(),
    ));
    let good = queue.enqueue(Arc::new(MockObject::control(json!({"ok": true}))));

    assert!(matches!(broken.await, Err(SaveError::Cancelled)));
    assert_ok!(good.await);
    assert_eq!(
        transport.requests()[0].body,
        vec![json!({"control": {"ok": true}})]
    );
    assert!(!queue.is_in_flight("control", false));
}

#[tokio::test(start_paused = true)]
async fn test_panicking_post_create_hook_releases_the_bucket() {
    let transport = Arc::new(MockTransport::new());
    let queue = queue_with(SaveQueueConfig::default(), &transport);

    let broken = queue.enqueue(Arc::new(
        MockObject::control(json!({})).with_panic_on_created(),
    ));
    assert!(matches!(broken.await, Err(SaveError::Cancelled)));
    assert!(!queue.is_in_flight("control", false));

    assert_ok!(queue.enqueue(Arc::new(MockObject::control(json!({})))).await);
    assert_eq!(transport.call_count(), 2);
}

// =============================================================================
// Flush and telemetry
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_flush_fires_without_waiting() {
    let transport = Arc::new(MockTransport::new());
    let queue = queue_with(SaveQueueConfig::default(), &transport);
    let started = Instant::now();

    let mut handle = queue.enqueue(Arc::new(MockObject::control(json!({}))));
    queue.flush().await;

    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(transport.call_count(), 1);
    assert_ok!(assert_ready!(futures::poll!(&mut handle)));

    // The superseded timer does not fire anything
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(transport.call_count(), 1);
    assert_eq!(queue.pending_jobs(), 0);
}

type TrackLog = Arc<Mutex<Vec<(String, UserAction, bool)>>>;

struct RecordingTracker(TrackLog);

impl Tracker for RecordingTracker {
    fn start(&self, label: &str, journey: UserJourney, action: UserAction) -> TrackerTimer {
        assert_eq!(journey, UserJourney::Api);
        let log = self.0.clone();
        let label = label.to_string();
        TrackerTimer::new(move |is_error| log.lock().unwrap().push((label, action, is_error)))
    }
}

#[tokio::test(start_paused = true)]
async fn test_tracker_sees_creates_updates_and_failures() {
    let log: TrackLog = Arc::new(Mutex::new(Vec::new()));
    let transport = Arc::new(MockTransport::new());
    transport.fail_collection("objectives");
    let queue = SaveQueue::with_tracker(
        SaveQueueConfig::default(),
        transport.clone(),
        Arc::new(RecordingTracker(log.clone())),
    );

    let creates: Vec<_> = controls(3).into_iter().map(|o| queue.enqueue(o)).collect();
    let update = queue.enqueue(Arc::new(MockObject::control(json!({})).persisted()));
    let failing = queue.enqueue(Arc::new(MockObject::new(
        ModelMeta::new("objective", "objectives", "Objective"),
        json!({}),
    )));

    futures::future::join_all(creates).await;
    assert_ok!(update.await);
    assert_err!(failing.await);

    let mut log = log.lock().unwrap().clone();
    log.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(log.len(), 3);
    assert!(log.contains(&("Control".to_string(), UserAction::CreateObject(3), false)));
    assert!(log.contains(&("Control".to_string(), UserAction::UpdateObject, false)));
    assert!(log.contains(&("Objective".to_string(), UserAction::CreateObject(1), true)));
}
