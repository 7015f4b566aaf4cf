//! The save queue scheduler.
//!
//! Saves enter a single debounced queue of dispatch jobs. Creates of new
//! objects are grouped into per-type buckets so one job can send many
//! objects in a single collection POST; updates of existing objects are
//! one job each.
//!
//! # Flow
//!
//! ```text
//! enqueue ──► bucket (new objects) ──┐
//!    │                               ▼
//!    └──── update job ─────────► job queue ──(quiet period)──► drain
//!                                    ▲                           │
//!                                    │             at most `max_instances`
//!                                    │                jobs running at once
//!                                    │                           │
//!                                    └──── bucket still has ◄────┘
//!                                          pending objects
//! ```
//!
//! A bucket has at most one job queued or running at a time. While its
//! request is out, newly enqueued objects of that type wait in the bucket
//! and go out with the bucket's next cycle. Batch responses are held until
//! the bucket empties and are then redistributed to their objects.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

use crate::bucket::{process_save_responses, BucketKey, SaveBucket};
use crate::config::SaveQueueConfig;
use crate::error::{SaveError, SaveOutcome};
use crate::object::Saveable;
use crate::pending::{PendingSave, SaveHandle};
use crate::tracker::{Tracker, TracingTracker, UserAction, UserJourney};
use crate::transport::Transport;

/// One unit of work in the job queue.
enum DispatchJob {
    /// Send the next batch of a bucket
    Bucket(BucketKey),
    /// Save one existing object
    Update(PendingSave),
}

#[derive(Default)]
struct QueueState {
    queue: Vec<DispatchJob>,
    /// Bumped on every push; a timer only drains if it is still current
    generation: u64,
    buckets: HashMap<BucketKey, SaveBucket>,
}

struct Inner {
    config: SaveQueueConfig,
    transport: Arc<dyn Transport>,
    tracker: Arc<dyn Tracker>,
    state: Mutex<QueueState>,
    permits: Arc<Semaphore>,
}

/// Batched, throttled saves against the collection API.
///
/// Cloning is cheap; clones share one queue. Must be used from within a
/// Tokio runtime.
///
/// # Example
///
/// ```rust,ignore
/// use ggrc_save_queue::{HttpTransport, HttpTransportConfig, SaveQueue, SaveQueueConfig};
///
/// let transport = HttpTransport::new(HttpTransportConfig {
///     base_url: "https://ggrc.example.com".into(),
///     ..Default::default()
/// })?;
/// let queue = SaveQueue::new(SaveQueueConfig::default(), Arc::new(transport));
///
/// let outcome = queue.enqueue(control).await?;
/// ```
#[derive(Clone)]
pub struct SaveQueue {
    inner: Arc<Inner>,
}

impl SaveQueue {
    /// Create a queue that reports timings through `tracing`.
    pub fn new(config: SaveQueueConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_tracker(config, transport, Arc::new(TracingTracker))
    }

    /// Create a queue with a custom telemetry tracker.
    pub fn with_tracker(
        config: SaveQueueConfig,
        transport: Arc<dyn Transport>,
        tracker: Arc<dyn Tracker>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.permits()));
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                tracker,
                state: Mutex::new(QueueState::default()),
                permits,
            }),
        }
    }

    pub fn config(&self) -> &SaveQueueConfig {
        &self.inner.config
    }

    /// Queue a save.
    ///
    /// Existing objects get a job of their own. New objects join the bucket
    /// of their type; the bucket gets a job only if it has none queued or
    /// running already.
    pub fn enqueue(&self, object: Arc<dyn Saveable>) -> SaveHandle {
        let (pending, handle) = PendingSave::new(object);
        let mut state = self.inner.lock_state();

        if !pending.object().is_new() {
            self.inner.step(&mut state, DispatchJob::Update(pending));
            return handle;
        }

        let key = BucketKey::for_object(pending.object().as_ref());
        let plural = pending.object().model().table_plural.clone();
        let bucket = state.buckets.entry(key.clone()).or_insert_with(|| {
            debug!(bucket = %key, "Creating save bucket");
            SaveBucket::new(key.type_name.clone(), plural, key.background)
        });

        bucket.push(pending);
        if bucket.in_flight {
            trace!(bucket = %key, pending = bucket.pending(), "Bucket already in flight");
            return handle;
        }
        bucket.in_flight = true;

        self.inner.step(&mut state, DispatchJob::Bucket(key));
        handle
    }

    /// Fire queued jobs now instead of waiting for the quiet period, and
    /// wait for them to settle.
    ///
    /// Follow-up cycles of buckets that received more objects meanwhile
    /// are queued again as usual.
    pub async fn flush(&self) {
        let jobs = {
            let mut state = self.inner.lock_state();
            state.generation += 1;
            std::mem::take(&mut state.queue)
        };
        self.inner.drain(jobs).await;
    }

    /// Number of jobs waiting for the timer.
    pub fn pending_jobs(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    /// Whether the bucket for this type has a cycle queued or running.
    pub fn is_in_flight(&self, type_name: &str, background: bool) -> bool {
        self.inner
            .lock_state()
            .buckets
            .get(&BucketKey::new(type_name, background))
            .is_some_and(SaveBucket::is_in_flight)
    }

    /// Number of new objects waiting in the bucket for this type.
    pub fn pending_in_bucket(&self, type_name: &str, background: bool) -> usize {
        self.inner
            .lock_state()
            .buckets
            .get(&BucketKey::new(type_name, background))
            .map_or(0, SaveBucket::pending)
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a job and restart the quiet-period timer.
    fn step(self: &Arc<Self>, state: &mut QueueState, job: DispatchJob) {
        state.queue.push(job);
        state.generation += 1;

        let generation = state.generation;
        let delay = self.config.delay();
        let inner = Arc::clone(self);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let jobs = {
                let mut state = inner.lock_state();
                if state.generation != generation {
                    return;
                }
                std::mem::take(&mut state.queue)
            };
            inner.drain(jobs).await;
        });
    }

    /// Run jobs in order, never more than the permit count at once.
    async fn drain(self: &Arc<Self>, jobs: Vec<DispatchJob>) {
        if jobs.is_empty() {
            return;
        }
        debug!(jobs = jobs.len(), "Draining save queue");

        let mut running = JoinSet::new();
        for job in jobs {
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                warn!("Save queue permits closed, dropping remaining jobs");
                break;
            };
            let inner = Arc::clone(self);
            running.spawn(async move {
                inner.run(job).await;
                drop(permit);
            });
        }

        while running.join_next().await.is_some() {}
    }

    async fn run(self: &Arc<Self>, job: DispatchJob) {
        match job {
            DispatchJob::Bucket(key) => self.dispatch_bucket(key).await,
            DispatchJob::Update(pending) => self.dispatch_update(pending).await,
        }
    }

    async fn dispatch_update(&self, pending: PendingSave) {
        let object = Arc::clone(pending.object());
        let timer = self.tracker.start(
            &object.model().model_singular,
            UserJourney::Api,
            UserAction::UpdateObject,
        );

        match object.save_existing().await {
            Ok(value) => {
                timer.stop();
                pending.resolve(SaveOutcome::Updated(value));
            }
            Err(e) => {
                timer.fail();
                pending.reject(e);
            }
        }
    }

    /// One cycle of a bucket: send a batch, then either queue the next
    /// cycle or, once the bucket is empty, redistribute every response.
    async fn dispatch_bucket(self: &Arc<Self>, key: BucketKey) {
        let taken = {
            let mut state = self.lock_state();
            let batch_size = self.config.batch_limit();
            state
                .buckets
                .get_mut(&key)
                .map(|bucket| (bucket.take_batch(batch_size), bucket.plural.clone()))
        };
        let Some((objs, plural)) = taken else {
            return;
        };
        let mut guard = CycleGuard {
            inner: self,
            key: &key,
            armed: true,
        };

        let mut pending_response = None;
        if !objs.is_empty() {
            let body: Vec<Value> = objs
                .iter()
                .map(|pending| {
                    let mut item = Map::new();
                    item.insert(key.type_name.clone(), pending.object().serialize());
                    Value::Object(item)
                })
                .collect();

            let timer = self.tracker.start(
                &objs[0].object().model().model_singular,
                UserJourney::Api,
                UserAction::CreateObject(objs.len()),
            );
            debug!(bucket = %key, size = objs.len(), plural = %plural, "Sending batch");

            match self
                .transport
                .post_collection(&plural, body, key.background)
                .await
            {
                Err(e) => {
                    timer.fail();
                    warn!(bucket = %key, error = %e, "Batch request failed");
                    let error = SaveError::from(e);
                    for pending in objs {
                        pending.reject(error.clone());
                    }
                }
                Ok(data) => match data.get("background_task") {
                    Some(task) => {
                        timer.stop();
                        debug!(bucket = %key, "Batch accepted as background task");
                        for pending in objs {
                            pending.resolve(SaveOutcome::BackgroundTask(task.clone()));
                        }
                    }
                    None => {
                        timer.stop();
                        pending_response = Some((objs, data));
                    }
                },
            }
        }

        let responses = {
            let mut state = self.lock_state();
            let Some(bucket) = state.buckets.get_mut(&key) else {
                return;
            };
            if let Some(response) = pending_response {
                bucket.save_responses.push(response);
            }

            guard.armed = false;
            if bucket.pending() > 0 {
                trace!(bucket = %key, pending = bucket.pending(), "Queueing next cycle");
                self.step(&mut state, DispatchJob::Bucket(key.clone()));
                None
            } else {
                bucket.in_flight = false;
                Some(std::mem::take(&mut bucket.save_responses))
            }
        };

        if let Some(responses) = responses {
            process_save_responses(&key.type_name, responses);
        }
    }
}

/// Releases a bucket whose cycle ended early, e.g. by a panicking model
/// hook, so later creates of that type are not stuck behind it.
///
/// Pending objects get a fresh cycle. Otherwise the bucket leaves flight;
/// responses held for it are dropped and their handles resolve to
/// [`SaveError::Cancelled`].
struct CycleGuard<'a> {
    inner: &'a Arc<Inner>,
    key: &'a BucketKey,
    armed: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(bucket = %self.key, "Bucket cycle aborted");

        let abandoned = {
            let mut state = self.inner.lock_state();
            let Some(bucket) = state.buckets.get_mut(self.key) else {
                return;
            };
            if bucket.pending() > 0 {
                self.inner
                    .step(&mut state, DispatchJob::Bucket(self.key.clone()));
                return;
            }
            bucket.in_flight = false;
            std::mem::take(&mut bucket.save_responses)
        };
        drop(abandoned);
    }
}
