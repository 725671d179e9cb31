//! The notification hub.
//!
//! [`NotificationHub`] ties the registry and dispatcher together and is the
//! [`MutationObserver`] the resource store reports to. Committed mutations
//! are turned into events and handed to a single intake task, which queues
//! them for fan-out in commit order. The store never waits on delivery.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tmf720_core::mutation::{EventType, MutationObserver, ResourceSnapshot};

use crate::config::HubConfig;
use crate::delivery::DeliveryChannel;
use crate::dispatcher::Dispatcher;
use crate::envelope::Event;
use crate::registry::{Listener, ListenerId, ListenerRegistry, RegistryError};
use crate::report::{DeliveryOutcome, DispatchReport};

/// Capacity of the report broadcast channel. Slow subscribers lag.
const REPORT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Report sink
// ---------------------------------------------------------------------------

/// Where finished dispatch reports go: eviction bookkeeping, history and
/// live subscribers.
#[derive(Clone)]
struct ReportSink {
    registry: Arc<ListenerRegistry>,
    reports: broadcast::Sender<DispatchReport>,
    history: Arc<Mutex<VecDeque<DispatchReport>>>,
    history_len: usize,
    evict_after_failures: Option<u32>,
}

impl ReportSink {
    async fn record(&self, report: DispatchReport) {
        for listener in &report.listeners {
            match listener.outcome {
                DeliveryOutcome::Delivered => {
                    self.registry.record_success(&listener.listener_id).await;
                }
                DeliveryOutcome::Exhausted { .. } => {
                    let streak = self.registry.record_exhausted(&listener.listener_id).await;
                    self.maybe_evict(&listener.listener_id, streak).await;
                }
                DeliveryOutcome::Abandoned => {}
            }
        }

        tracing::info!(
            event_id = %report.event_id,
            event_type = %report.event_type,
            resource_id = %report.resource_id,
            matched = report.listeners.len(),
            delivered = report.delivered_count(),
            failed = report.failed_count(),
            "Dispatch finished"
        );

        if self.history_len > 0 {
            let mut history = self.history.lock().await;
            while history.len() >= self.history_len {
                history.pop_front();
            }
            history.push_back(report.clone());
        }

        // No subscribers is fine.
        let _ = self.reports.send(report);
    }

    async fn maybe_evict(&self, id: &ListenerId, streak: u32) {
        let Some(limit) = self.evict_after_failures else {
            return;
        };
        if limit == 0 || streak < limit {
            return;
        }
        if let Ok(listener) = self.registry.unregister(id).await {
            tracing::warn!(
                listener_id = %listener.id,
                callback = %listener.callback,
                consecutive_failures = streak,
                "Listener evicted after repeated failed deliveries"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// NotificationHub
// ---------------------------------------------------------------------------

/// Owns the listener registry and the dispatcher, and receives committed
/// mutations from the store.
pub struct NotificationHub {
    config: HubConfig,
    registry: Arc<ListenerRegistry>,
    dispatcher: Arc<Dispatcher>,
    intake: mpsc::UnboundedSender<Event>,
    closing: CancellationToken,
    sink: ReportSink,
}

impl NotificationHub {
    /// Build the hub and spawn its intake task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: HubConfig, channel: Arc<dyn DeliveryChannel>) -> Arc<Self> {
        let registry = Arc::new(ListenerRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry), channel, &config));
        let (intake, rx) = mpsc::unbounded_channel();
        let closing = CancellationToken::new();
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);

        let sink = ReportSink {
            registry: Arc::clone(&registry),
            reports,
            history: Arc::new(Mutex::new(VecDeque::new())),
            history_len: config.report_history,
            evict_after_failures: config.evict_after_failures,
        };

        dispatcher.tracker().spawn(run_intake(
            Arc::clone(&dispatcher),
            sink.clone(),
            rx,
            closing.clone(),
        ));

        tracing::info!(
            max_attempts = config.retry.attempts(),
            pool_size = config.pool_size,
            delivery_timeout_ms = config.delivery_timeout.as_millis() as u64,
            "Notification hub started"
        );

        Arc::new(Self {
            config,
            registry,
            dispatcher,
            intake,
            closing,
            sink,
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    /// Register a listener. See [`ListenerRegistry::register`].
    pub async fn register(
        &self,
        callback: &str,
        query: Option<&str>,
    ) -> Result<Listener, RegistryError> {
        let listener = self.registry.register(callback, query).await?;
        tracing::info!(
            listener_id = %listener.id,
            callback = %listener.callback,
            query = listener.query.as_deref().unwrap_or(""),
            "Listener registered"
        );
        Ok(listener)
    }

    pub async fn unregister(&self, id: &ListenerId) -> Result<Listener, RegistryError> {
        let listener = self.registry.unregister(id).await?;
        tracing::info!(listener_id = %listener.id, "Listener unregistered");
        Ok(listener)
    }

    /// Current listeners, in registration order.
    pub async fn listeners(&self) -> Vec<Listener> {
        self.registry
            .snapshot()
            .await
            .iter()
            .map(|l| Listener::clone(l))
            .collect()
    }

    /// Fan an event out directly, bypassing the intake queue, and wait
    /// for its report. The report is also recorded like any other.
    pub async fn dispatch(&self, event: Event) -> DispatchReport {
        let report = self.dispatcher.dispatch(event).await;
        self.sink.record(report.clone()).await;
        report
    }

    /// Live feed of finished dispatch reports.
    pub fn subscribe_reports(&self) -> broadcast::Receiver<DispatchReport> {
        self.sink.reports.subscribe()
    }

    /// The most recent dispatch reports, oldest first.
    pub async fn recent_reports(&self) -> Vec<DispatchReport> {
        self.sink.history.lock().await.iter().cloned().collect()
    }

    pub fn is_closing(&self) -> bool {
        self.closing.is_cancelled()
    }

    /// Stop accepting events and wait for in-flight deliveries.
    ///
    /// Events already accepted are still fanned out. Deliveries still
    /// running after `shutdown_grace` are abandoned; this returns shortly
    /// after the grace period at the latest.
    pub async fn shutdown(&self) {
        self.closing.cancel();
        let tracker = self.dispatcher.tracker();
        tracker.close();

        let grace = self.config.shutdown_grace;
        if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
            tracing::warn!(
                grace_secs = grace.as_secs_f64(),
                "Deliveries still in flight after grace period, abandoning"
            );
            self.dispatcher.cancel_token().cancel();
            tracker.wait().await;
        }

        tracing::info!("Notification hub shut down");
    }
}

impl MutationObserver for NotificationHub {
    fn on_mutation_committed(&self, event_type: EventType, snapshot: ResourceSnapshot) {
        let event = Event::build(event_type, snapshot);
        let event_id = event.event_id().to_string();
        let resource_id = event.resource_id().to_string();

        if self.closing.is_cancelled() || self.intake.send(event).is_err() {
            tracing::warn!(
                event_id = %event_id,
                event_type = %event_type,
                resource_id = %resource_id,
                "Notification hub is shutting down, event dropped"
            );
            return;
        }

        tracing::debug!(
            event_id = %event_id,
            event_type = %event_type,
            resource_id = %resource_id,
            "Event accepted"
        );
    }
}

// ---------------------------------------------------------------------------
// Intake
// ---------------------------------------------------------------------------

/// Queue accepted events for fan-out, one at a time, in arrival order.
///
/// On close, events already accepted are drained before the task exits.
async fn run_intake(
    dispatcher: Arc<Dispatcher>,
    sink: ReportSink,
    mut rx: mpsc::UnboundedReceiver<Event>,
    closing: CancellationToken,
) {
    let abort = dispatcher.cancel_token().clone();
    let mut draining = false;
    loop {
        let event = tokio::select! {
            biased;
            _ = abort.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = closing.cancelled(), if !draining => {
                rx.close();
                draining = true;
                continue;
            }
        };

        let pending = dispatcher.begin(event).await;
        let sink = sink.clone();
        dispatcher.tracker().spawn(async move {
            let report = pending.finish().await;
            sink.record(report).await;
        });
    }
    tracing::debug!("Event intake stopped");
}
