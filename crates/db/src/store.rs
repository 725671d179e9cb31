//! In-memory digital identity store.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tmf720_core::digital_identity::{DigitalIdentity, DigitalIdentityInput, RESOURCE_KIND};
use tmf720_core::error::CoreError;
use tmf720_core::listing::ListFilter;
use tmf720_core::mutation::{EventType, MutationObserver, ResourceSnapshot};
use tmf720_core::types::ResourceId;

/// Keyed storage for digital identities.
///
/// Records are kept in insertion order. The observer is called while the
/// write lock is still held, so it sees mutations in exactly the order
/// they were committed.
pub struct DigitalIdentityStore {
    records: RwLock<IndexMap<ResourceId, DigitalIdentity>>,
    observer: Arc<dyn MutationObserver>,
    /// Public origin used to build `href`s, without a trailing slash.
    base_url: String,
}

impl DigitalIdentityStore {
    pub fn new(base_url: impl Into<String>, observer: Arc<dyn MutationObserver>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            records: RwLock::new(IndexMap::new()),
            observer,
            base_url,
        }
    }

    /// Insert a new record built from already-validated input.
    pub async fn create(&self, input: DigitalIdentityInput) -> Result<DigitalIdentity, CoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let record = DigitalIdentity::from_input(input, id.clone(), &self.base_url, chrono::Utc::now());

        let mut records = self.records.write().await;
        records.insert(id, record.clone());
        self.notify(EventType::ResourceCreated, &record);

        tracing::debug!(id = %record.id, "Digital identity created");
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Option<DigitalIdentity> {
        self.records.read().await.get(id).cloned()
    }

    /// All records matching `filter`, in insertion order.
    pub async fn list(&self, filter: &ListFilter) -> Vec<DigitalIdentity> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Merge top-level attributes into an existing record.
    ///
    /// `changes` must already have passed patch validation. `lastUpdate`
    /// is always bumped, so an empty patch still counts as a change.
    pub async fn patch(
        &self,
        id: &str,
        changes: &Map<String, Value>,
    ) -> Result<DigitalIdentity, CoreError> {
        let mut records = self.records.write().await;
        let current = records.get(id).ok_or_else(|| not_found(id))?;

        let mut merged = match serde_json::to_value(current) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(CoreError::Internal(
                    "Digital identity did not serialize to an object".into(),
                ))
            }
            Err(e) => return Err(CoreError::Internal(e.to_string())),
        };
        for (key, value) in changes {
            merged.insert(key.clone(), value.clone());
        }

        let mut updated: DigitalIdentity = serde_json::from_value(Value::Object(merged))
            .map_err(|e| CoreError::Validation(format!("Invalid patch body: {e}")))?;
        updated.id = current.id.clone();
        updated.href = current.href.clone();
        updated.last_update = chrono::Utc::now();

        records.insert(id.to_string(), updated.clone());
        self.notify(EventType::ResourceAttributeChanged, &updated);

        tracing::debug!(id, fields = changes.len(), "Digital identity patched");
        Ok(updated)
    }

    /// Remove a record, returning its last state.
    pub async fn delete(&self, id: &str) -> Result<DigitalIdentity, CoreError> {
        let mut records = self.records.write().await;
        let removed = records.shift_remove(id).ok_or_else(|| not_found(id))?;
        self.notify(EventType::ResourceDeleted, &removed);

        tracing::debug!(id, "Digital identity deleted");
        Ok(removed)
    }

    fn notify(&self, event_type: EventType, record: &DigitalIdentity) {
        match ResourceSnapshot::of(record) {
            Ok(snapshot) => self.observer.on_mutation_committed(event_type, snapshot),
            Err(e) => tracing::error!(
                error = %e,
                id = %record.id,
                %event_type,
                "Failed to snapshot committed mutation"
            ),
        }
    }
}

fn not_found(id: &str) -> CoreError {
    CoreError::NotFound {
        entity: RESOURCE_KIND,
        id: id.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::sync::Mutex;
    use tmf720_core::digital_identity::IdentityStatus;

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<(EventType, ResourceSnapshot)>>,
    }

    impl MutationObserver for RecordingObserver {
        fn on_mutation_committed(&self, event_type: EventType, snapshot: ResourceSnapshot) {
            self.seen.lock().unwrap().push((event_type, snapshot));
        }
    }

    fn input() -> DigitalIdentityInput {
        serde_json::from_value(json!({
            "nickname": "jdoe",
            "credential": [{ "id": "c-1", "@type": "TokenCredential", "trustLevel": "high" }],
            "individualIdentified": { "id": "i-1" }
        }))
        .unwrap()
    }

    fn changes(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn store() -> (DigitalIdentityStore, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::default());
        let store = DigitalIdentityStore::new("http://localhost:3000/", observer.clone());
        (store, observer)
    }

    #[tokio::test]
    async fn create_assigns_identity_and_notifies() {
        let (store, observer) = store();
        let record = store.create(input()).await.unwrap();

        assert!(record.href.starts_with("http://localhost:3000/tmf-api/"));
        assert!(record.href.ends_with(&record.id));
        assert_eq!(store.get(&record.id).await, Some(record.clone()));

        let seen = observer.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, EventType::ResourceCreated);
        assert_eq!(seen[0].1.kind, "digitalIdentity");
        assert_eq!(seen[0].1.id, record.id);
        assert_eq!(seen[0].1.body["nickname"], "jdoe");
    }

    #[tokio::test]
    async fn patch_merges_and_bumps_last_update() {
        let (store, observer) = store();
        let record = store.create(input()).await.unwrap();

        let updated = store
            .patch(&record.id, &changes(json!({ "status": "active" })))
            .await
            .unwrap();

        assert_eq!(updated.status, IdentityStatus::Active);
        assert_eq!(updated.nickname.as_deref(), Some("jdoe"));
        assert_eq!(updated.creation_date, record.creation_date);
        assert!(updated.last_update >= record.last_update);

        let seen = observer.seen.lock().unwrap();
        assert_eq!(seen[1].0, EventType::ResourceAttributeChanged);
        assert_eq!(seen[1].1.body["status"], "active");
    }

    #[tokio::test]
    async fn empty_patch_still_notifies() {
        let (store, observer) = store();
        let record = store.create(input()).await.unwrap();
        store.patch(&record.id, &Map::new()).await.unwrap();

        assert_eq!(observer.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn patch_missing_record_is_not_found_and_silent() {
        let (store, observer) = store();
        let result = store.patch("nope", &changes(json!({ "nickname": "x" }))).await;

        assert_matches!(result, Err(CoreError::NotFound { entity: "digitalIdentity", .. }));
        assert!(observer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn badly_typed_patch_leaves_record_untouched() {
        let (store, observer) = store();
        let record = store.create(input()).await.unwrap();

        let result = store
            .patch(&record.id, &changes(json!({ "credential": "not-a-list" })))
            .await;

        assert_matches!(result, Err(CoreError::Validation(_)));
        assert_eq!(store.get(&record.id).await, Some(record));
        assert_eq!(observer.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_last_known_state() {
        let (store, observer) = store();
        let record = store.create(input()).await.unwrap();

        let removed = store.delete(&record.id).await.unwrap();
        assert_eq!(removed, record);
        assert_eq!(store.count().await, 0);

        let seen = observer.seen.lock().unwrap();
        assert_eq!(seen[1].0, EventType::ResourceDeleted);
        assert_eq!(seen[1].1.body["id"], record.id.as_str());

        drop(seen);
        assert_matches!(store.delete(&record.id).await, Err(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_applies_filter_in_insertion_order() {
        let (store, _) = store();
        let first = store.create(input()).await.unwrap();
        let second = store.create(input()).await.unwrap();
        store
            .patch(&second.id, &changes(json!({ "status": "active" })))
            .await
            .unwrap();

        let all = store.list(&ListFilter::default()).await;
        assert_eq!(
            all.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec![first.id.as_str(), second.id.as_str()]
        );

        let active = store
            .list(&ListFilter::parse(Some("active"), None).unwrap())
            .await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);
    }
}
