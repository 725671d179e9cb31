//! Shared helpers for hub and dispatcher integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tmf720_core::mutation::{EventType, ResourceSnapshot};
use tmf720_events::{DeliveryChannel, DeliveryError, Event, HubConfig, RetryPolicy};

/// One observed call to [`ScriptedChannel::deliver`].
#[derive(Debug, Clone)]
pub struct Call {
    pub endpoint: String,
    pub event_id: String,
    pub event_type: EventType,
    pub resource_id: String,
    pub at: tokio::time::Instant,
}

/// In-memory delivery channel that records every call and fails or hangs
/// on chosen endpoints.
#[derive(Default)]
pub struct ScriptedChannel {
    calls: Mutex<Vec<Call>>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    delay: Duration,
    jitter_ms: u64,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivery to `endpoint` is rejected with a 503.
    pub fn failing(mut self, endpoint: &str) -> Self {
        self.failing.insert(endpoint.to_string());
        self
    }

    /// Deliveries to `endpoint` never complete.
    pub fn hanging(mut self, endpoint: &str) -> Self {
        self.hanging.insert(endpoint.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Add a varying extra delay of up to `max_ms` to each call.
    pub fn with_jitter(mut self, max_ms: u64) -> Self {
        self.jitter_ms = max_ms;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.endpoint == endpoint)
            .collect()
    }

    /// Highest number of deliveries observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeliveryChannel for ScriptedChannel {
    async fn deliver(&self, endpoint: &str, event: &Event) -> Result<(), DeliveryError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak.fetch_max(running, Ordering::SeqCst);

        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                endpoint: endpoint.to_string(),
                event_id: event.event_id().to_string(),
                event_type: event.event_type(),
                resource_id: event.resource_id().to_string(),
                at: tokio::time::Instant::now(),
            });
            calls.len() as u64
        };

        if self.hanging.contains(endpoint) {
            std::future::pending::<()>().await;
        }

        let jitter = if self.jitter_ms > 0 {
            Duration::from_millis((call_index * 37) % self.jitter_ms)
        } else {
            Duration::ZERO
        };
        let pause = self.delay + jitter;
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        if self.failing.contains(endpoint) {
            return Err(DeliveryError::RejectedByListener { status: 503 });
        }
        Ok(())
    }
}

pub fn snapshot(id: &str, status: &str) -> ResourceSnapshot {
    ResourceSnapshot {
        kind: "digitalIdentity",
        id: id.to_string(),
        body: json!({ "id": id, "status": status }),
    }
}

pub fn event(event_type: EventType, id: &str) -> Event {
    Event::build(event_type, snapshot(id, "active"))
}

/// Config with quick, deterministic retries for tests.
pub fn fast_config(max_attempts: u32) -> HubConfig {
    HubConfig {
        retry: RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            multiplier: 2,
        },
        delivery_timeout: Duration::from_secs(2),
        shutdown_grace: Duration::from_millis(500),
        ..HubConfig::default()
    }
}

pub fn shared(channel: ScriptedChannel) -> Arc<ScriptedChannel> {
    Arc::new(channel)
}
