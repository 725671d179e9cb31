//! Concurrent fan-out of events to matching listeners.
//!
//! Each matched listener gets its own delivery job. Jobs are queued on a
//! *lane* keyed by (listener, resource): a lane delivers its jobs one at a
//! time, in the order they were queued, so a listener sees the events of
//! one resource in commit order. Different lanes run concurrently; the
//! number of attempts in flight at once is capped by a semaphore sized
//! from [`HubConfig::pool_size`].
//!
//! Failures stay inside their lane. A listener that keeps failing only
//! delays later events for that same listener and resource.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tmf720_core::types::Timestamp;

use crate::config::{HubConfig, RetryPolicy};
use crate::delivery::{DeliveryChannel, DeliveryError};
use crate::envelope::Event;
use crate::registry::{Listener, ListenerId, ListenerRegistry};
use crate::report::{AttemptRecord, DeliveryOutcome, DispatchReport, ListenerReport};

// ---------------------------------------------------------------------------
// Lanes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LaneKey {
    listener: ListenerId,
    resource: String,
}

struct LaneJob {
    listener: Arc<Listener>,
    event: Arc<Event>,
    reply: oneshot::Sender<ListenerReport>,
}

type Lanes = Mutex<HashMap<LaneKey, mpsc::UnboundedSender<LaneJob>>>;

/// State shared by the dispatcher and its lane tasks.
struct LaneContext {
    channel: Arc<dyn DeliveryChannel>,
    retry: RetryPolicy,
    delivery_timeout: Duration,
    permits: Semaphore,
    lanes: Lanes,
    cancel: CancellationToken,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Fans events out to the listeners registered at dispatch time.
pub struct Dispatcher {
    registry: Arc<ListenerRegistry>,
    ctx: Arc<LaneContext>,
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ListenerRegistry>,
        channel: Arc<dyn DeliveryChannel>,
        config: &HubConfig,
    ) -> Self {
        let ctx = LaneContext {
            channel,
            retry: config.retry.clone(),
            delivery_timeout: config.delivery_timeout,
            permits: Semaphore::new(config.pool_size.max(1)),
            lanes: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        };
        Self {
            registry,
            ctx: Arc::new(ctx),
            tracker: TaskTracker::new(),
        }
    }

    /// Tracker owning every lane task spawned by this dispatcher.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Cancelling this token abandons pending backoffs and attempts.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.ctx.cancel
    }

    /// Deliver an event to every matching listener and wait for the outcome.
    pub async fn dispatch(&self, event: Event) -> DispatchReport {
        self.begin(event).await.finish().await
    }

    /// Snapshot the registry, filter it, and queue one job per match.
    ///
    /// Returns once every job is queued; delivery proceeds in the
    /// background. Events queued by successive `begin` calls reach each
    /// lane in call order.
    pub async fn begin(&self, event: Event) -> PendingDispatch {
        let event = Arc::new(event);
        let started_at = chrono::Utc::now();
        let snapshot = self.registry.snapshot().await;
        let document = event.to_document();
        let resource = format!("{}/{}", event.resource_kind(), event.resource_id());

        let mut pending = Vec::new();
        let mut lanes = self.ctx.lanes.lock().await;
        for listener in snapshot.into_iter().filter(|l| l.accepts(&document)) {
            let (reply, receiver) = oneshot::channel();
            let key = LaneKey {
                listener: listener.id.clone(),
                resource: resource.clone(),
            };
            let job = LaneJob {
                listener: Arc::clone(&listener),
                event: Arc::clone(&event),
                reply,
            };
            self.enqueue(&mut lanes, key, job);
            pending.push((listener, receiver));
        }
        drop(lanes);

        tracing::debug!(
            event_id = event.event_id(),
            event_type = %event.event_type(),
            matched = pending.len(),
            "Event queued for fan-out"
        );

        PendingDispatch {
            event,
            started_at,
            pending,
        }
    }

    /// Hand a job to its lane, starting the lane if it is not running.
    fn enqueue(
        &self,
        lanes: &mut HashMap<LaneKey, mpsc::UnboundedSender<LaneJob>>,
        key: LaneKey,
        job: LaneJob,
    ) {
        let job = match lanes.get(&key) {
            Some(sender) => match sender.send(job) {
                Ok(()) => return,
                // Lane stopped after cancellation; start a fresh one.
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = sender.send(job);
        lanes.insert(key.clone(), sender);
        self.tracker
            .spawn(run_lane(Arc::clone(&self.ctx), key, receiver));
    }
}

// ---------------------------------------------------------------------------
// PendingDispatch
// ---------------------------------------------------------------------------

/// A fan-out whose jobs are queued but not necessarily finished.
pub struct PendingDispatch {
    event: Arc<Event>,
    started_at: Timestamp,
    pending: Vec<(Arc<Listener>, oneshot::Receiver<ListenerReport>)>,
}

impl PendingDispatch {
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Number of listeners the event was matched to.
    pub fn matched(&self) -> usize {
        self.pending.len()
    }

    /// Wait for every listener's final outcome.
    ///
    /// Jobs dropped by a cancelled lane are reported as
    /// [`DeliveryOutcome::Abandoned`].
    pub async fn finish(self) -> DispatchReport {
        let (listeners, receivers): (Vec<_>, Vec<_>) = self.pending.into_iter().unzip();
        let results = futures::future::join_all(receivers).await;

        let reports = listeners
            .into_iter()
            .zip(results)
            .map(|(listener, result)| {
                result.unwrap_or_else(|_| ListenerReport {
                    listener_id: listener.id.clone(),
                    endpoint: listener.callback.clone(),
                    outcome: DeliveryOutcome::Abandoned,
                    attempts: Vec::new(),
                })
            })
            .collect();

        DispatchReport {
            event_id: self.event.event_id().to_string(),
            event_type: self.event.event_type(),
            resource_id: self.event.resource_id().to_string(),
            started_at: self.started_at,
            finished_at: chrono::Utc::now(),
            listeners: reports,
        }
    }
}

// ---------------------------------------------------------------------------
// Lane worker
// ---------------------------------------------------------------------------

/// Drain one lane. Exits, removing itself, once the queue is empty.
async fn run_lane(ctx: Arc<LaneContext>, key: LaneKey, mut jobs: mpsc::UnboundedReceiver<LaneJob>) {
    loop {
        let job = match jobs.try_recv() {
            Ok(job) => job,
            Err(_) => {
                // Re-check under the lock: enqueuers send while holding it.
                let mut lanes = ctx.lanes.lock().await;
                match jobs.try_recv() {
                    Ok(job) => job,
                    Err(_) => {
                        lanes.remove(&key);
                        return;
                    }
                }
            }
        };

        if ctx.cancel.is_cancelled() {
            return;
        }

        let report = deliver_with_retry(&ctx, &job.listener, &job.event).await;
        // The dispatch may have been dropped by its owner; nothing to do then.
        let _ = job.reply.send(report);
    }
}

/// Deliver one event to one listener, retrying with backoff.
async fn deliver_with_retry(ctx: &LaneContext, listener: &Listener, event: &Event) -> ListenerReport {
    let max_attempts = ctx.retry.attempts();
    let mut attempts = Vec::new();
    let mut number = 1;

    let outcome = loop {
        let result = tokio::select! {
            _ = ctx.cancel.cancelled() => break DeliveryOutcome::Abandoned,
            result = attempt_once(ctx, listener, event) => result,
        };

        match result {
            (started_at, Ok(())) => {
                attempts.push(AttemptRecord {
                    number,
                    started_at,
                    error: None,
                });
                tracing::debug!(
                    listener_id = %listener.id,
                    event_id = event.event_id(),
                    attempt = number,
                    "Event delivered"
                );
                break DeliveryOutcome::Delivered;
            }
            (started_at, Err(error)) => {
                attempts.push(AttemptRecord {
                    number,
                    started_at,
                    error: Some(error.clone()),
                });

                if number >= max_attempts {
                    tracing::error!(
                        listener_id = %listener.id,
                        endpoint = %listener.callback,
                        event_id = event.event_id(),
                        attempts = number,
                        error = %error,
                        "Delivery failed after all attempts, dropping event for listener"
                    );
                    break DeliveryOutcome::Exhausted { last_error: error };
                }

                tracing::warn!(
                    listener_id = %listener.id,
                    endpoint = %listener.callback,
                    event_id = event.event_id(),
                    attempt = number,
                    max_attempts,
                    kind = error.kind(),
                    error = %error,
                    "Delivery attempt failed, retrying"
                );

                number += 1;
                let delay = ctx.retry.backoff_before(number);
                tokio::select! {
                    _ = ctx.cancel.cancelled() => break DeliveryOutcome::Abandoned,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    };

    ListenerReport {
        listener_id: listener.id.clone(),
        endpoint: listener.callback.clone(),
        outcome,
        attempts,
    }
}

/// One bounded attempt, holding a pool permit for its duration.
async fn attempt_once(
    ctx: &LaneContext,
    listener: &Listener,
    event: &Event,
) -> (Timestamp, Result<(), DeliveryError>) {
    let _permit = match ctx.permits.acquire().await {
        Ok(permit) => permit,
        Err(_) => {
            return (
                chrono::Utc::now(),
                Err(DeliveryError::Unreachable {
                    reason: "delivery pool closed".into(),
                }),
            )
        }
    };

    let started_at = chrono::Utc::now();
    let delivery = ctx.channel.deliver(&listener.callback, event);
    let result = match tokio::time::timeout(ctx.delivery_timeout, delivery).await {
        Ok(result) => result,
        Err(_) => Err(DeliveryError::timeout(ctx.delivery_timeout)),
    };
    (started_at, result)
}
