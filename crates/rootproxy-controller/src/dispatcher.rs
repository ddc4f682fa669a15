//! Event-driven dispatch of child keys to reconcile workers.
//!
//! The [`Controller`] subscribes to store events, queues the key of every
//! changed `HTTPProxy` and runs a fixed pool of workers over the queue.
//! Delivery is at least once: duplicated or reordered events only cause
//! extra, idempotent reconciles.

use std::sync::Arc;
use std::time::Duration;

use rootproxy_core::ObjectKey;
use rootproxy_core::events::EventBroadcaster;
use rootproxy_core::resource::HTTP_PROXY_KIND;
use rootproxy_storage::{ObjectStore, StorageError};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::queue::WorkQueue;
use crate::reconciler::ChildReconciler;
use crate::retry::Backoff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub workers: usize,
    /// Upper bound for one reconcile; its token is cancelled on expiry.
    pub reconcile_timeout: Duration,
    pub requeue_base_delay: Duration,
    pub requeue_max_delay: Duration,
    pub resync_interval: Option<Duration>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            workers: 2,
            reconcile_timeout: Duration::from_secs(30),
            requeue_base_delay: Duration::from_millis(5),
            requeue_max_delay: Duration::from_secs(300),
            resync_interval: None,
        }
    }
}

pub struct Controller<S: ObjectStore + 'static> {
    store: Arc<S>,
    reconciler: Arc<ChildReconciler<S>>,
    broadcaster: Arc<EventBroadcaster>,
    queue: Arc<WorkQueue<ObjectKey>>,
    settings: ControllerSettings,
}

impl<S: ObjectStore + 'static> Controller<S> {
    pub fn new(
        store: Arc<S>,
        broadcaster: Arc<EventBroadcaster>,
        settings: ControllerSettings,
    ) -> Self {
        let queue = Arc::new(WorkQueue::new(
            settings.requeue_base_delay,
            settings.requeue_max_delay,
        ));
        Self {
            reconciler: Arc::new(ChildReconciler::new(store.clone())),
            store,
            broadcaster,
            queue,
            settings,
        }
    }

    /// Conflict backoff used inside each reconcile.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.reconciler = Arc::new(ChildReconciler::new(self.store.clone()).with_backoff(backoff));
        self
    }

    pub fn queue(&self) -> &Arc<WorkQueue<ObjectKey>> {
        &self.queue
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Runs until `shutdown` is cancelled, then drains the workers.
    ///
    /// # Errors
    ///
    /// Fails only if the initial listing of the store fails.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), StorageError> {
        // Subscribe before listing so no change between the two is lost
        let mut events = self.broadcaster.subscribe();
        let queued = enqueue_all(self.store.as_ref(), &self.queue).await?;
        info!(
            workers = self.settings.workers,
            queued,
            backend = self.store.backend_name(),
            "Controller started"
        );

        let mut workers = JoinSet::new();
        for id in 0..self.settings.workers.max(1) {
            workers.spawn(worker(
                id,
                self.reconciler.clone(),
                self.queue.clone(),
                self.settings.reconcile_timeout,
                shutdown.clone(),
            ));
        }

        let mut resync = self.settings.resync_interval.map(|period| {
            tokio::time::interval_at(tokio::time::Instant::now() + period, period)
        });

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick(&mut resync) => {
                    debug!("Periodic resync");
                    self.resync().await;
                }
                event = events.recv() => match event {
                    Ok(event) if event.matches_kind(HTTP_PROXY_KIND) => {
                        debug!(key = %event.key, event = %event.event_type, "Queueing");
                        self.queue.add(event.key).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event stream lagged, resyncing");
                        self.resync().await;
                    }
                    Err(RecvError::Closed) => {
                        warn!("Event stream closed");
                        break;
                    }
                },
            }
        }

        self.queue.shut_down().await;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker task failed");
            }
        }
        info!("Controller stopped");
        Ok(())
    }

    async fn resync(&self) {
        if let Err(e) = enqueue_all(self.store.as_ref(), &self.queue).await {
            error!(error = %e, category = %e.category(), "Resync failed");
        }
    }
}

async fn tick(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn enqueue_all<S: ObjectStore + ?Sized>(
    store: &S,
    queue: &WorkQueue<ObjectKey>,
) -> Result<usize, StorageError> {
    let objects = store.list(None).await?;
    let count = objects.len();
    for object in objects {
        queue.add(object.key()).await;
    }
    Ok(count)
}

async fn worker<S: ObjectStore + 'static>(
    id: usize,
    reconciler: Arc<ChildReconciler<S>>,
    queue: Arc<WorkQueue<ObjectKey>>,
    timeout: Duration,
    shutdown: CancellationToken,
) {
    loop {
        let key = tokio::select! {
            _ = shutdown.cancelled() => break,
            key = queue.get() => match key {
                Some(key) => key,
                None => break,
            },
        };

        let cancel = shutdown.child_token();
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        };
        let result = reconciler.reconcile(&key, &cancel).await;
        timer.abort();

        match result {
            Ok(outcome) => {
                queue.forget(&key).await;
                debug!(worker = id, child = %key, ?outcome, "Reconciled");
            }
            Err(e) if shutdown.is_cancelled() => {
                debug!(worker = id, child = %key, error = %e, "Dropping reconcile on shutdown");
            }
            Err(e) => {
                let requeues = queue.num_requeues(&key).await;
                let delay = queue.add_rate_limited(key.clone()).await;
                warn!(
                    worker = id,
                    child = %key,
                    error = %e,
                    category = %e.category().map(|c| c.to_string()).unwrap_or_else(|| "cancelled".into()),
                    requeues,
                    delay_ms = delay.as_millis() as u64,
                    "Reconcile failed, requeueing"
                );
            }
        }
        queue.done(&key).await;
    }
    debug!(worker = id, "Worker stopped");
}
