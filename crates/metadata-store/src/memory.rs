use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use metadata_domain::{MetadataRecord, MonitoredResource};
use tokio::sync::RwLock;
use tracing::debug;

use crate::callback::{ChangeCallback, ChangeEvent};
use crate::error::StoreError;
use crate::store::{MetadataSnapshot, MetadataStore};

#[derive(Default)]
struct Inner {
    resource_map: HashMap<String, MonitoredResource>,
    metadata_map: HashMap<MonitoredResource, MetadataRecord>,
    last_collection_time: HashMap<MonitoredResource, DateTime<Utc>>,
}

/// In-memory, concurrency-safe implementation of [`MetadataStore`].
///
/// A single [`RwLock`] guards both maps together so a snapshot can never
/// observe one map mid-update relative to the other (invariant 2). Change
/// callbacks run after the guard is dropped, so they may safely call any
/// read-only method on this store.
pub struct InMemoryMetadataStore {
    inner: RwLock<Inner>,
    callbacks: Vec<ChangeCallback>,
    expire_after: Duration,
}

impl InMemoryMetadataStore {
    pub fn new(expire_after: Duration) -> Self {
        Self::with_callbacks(expire_after, Vec::new())
    }

    pub fn with_callbacks(expire_after: Duration, callbacks: Vec<ChangeCallback>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            callbacks,
            expire_after,
        }
    }

    fn notify(&self, event: ChangeEvent) {
        for cb in &self.callbacks {
            cb(event.clone());
        }
    }

    /// Spawn the internal expiry sweeper, running [`Self::purge_deleted_entries`]
    /// every `interval` until `shutdown` fires. Returns the task handle so the
    /// caller can await it during graceful shutdown.
    pub fn spawn_expiry_sweeper(
        self: Arc<Self>,
        interval: StdDuration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = self.purge_deleted_entries().await;
                        if purged > 0 {
                            debug!(purged, "expiry sweep purged stale resources");
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn update_resource(
        &self,
        aliases: &[String],
        resource: MonitoredResource,
    ) -> Result<(), StoreError> {
        let mut events = Vec::new();
        {
            let mut guard = self.inner.write().await;
            for alias in aliases {
                if alias.is_empty() {
                    continue;
                }
                let previous = guard.resource_map.insert(alias.clone(), resource.clone());
                if previous.as_ref() != Some(&resource) {
                    events.push(ChangeEvent::ResourceRebound {
                        alias: alias.clone(),
                        previous,
                        current: resource.clone(),
                    });
                }
            }
        }
        for event in events {
            self.notify(event);
        }

        if aliases.len() == 1 && aliases[0].is_empty() {
            return Err(StoreError::EmptyAlias);
        }
        Ok(())
    }

    async fn update_metadata(&self, resource: MonitoredResource, record: MetadataRecord) {
        let now = Utc::now();
        let installed;
        {
            let mut guard = self.inner.write().await;
            installed = match guard.metadata_map.get(&resource) {
                Some(existing) => record.supersedes(existing),
                None => true,
            };
            if installed {
                guard.metadata_map.insert(resource.clone(), record);
            }
            guard.last_collection_time.insert(resource.clone(), now);
        }
        if installed {
            self.notify(ChangeEvent::MetadataUpdated { resource });
        }
    }

    async fn lookup_resource(&self, alias: &str) -> Result<MonitoredResource, StoreError> {
        let guard = self.inner.read().await;
        guard
            .resource_map
            .get(alias)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(alias.to_string()))
    }

    async fn get_metadata_map(&self) -> MetadataSnapshot {
        let guard = self.inner.read().await;
        guard.metadata_map.clone()
    }

    async fn purge_deleted_entries(&self) -> usize {
        let now = Utc::now();
        let purged;
        {
            let mut guard = self.inner.write().await;
            let stale: Vec<MonitoredResource> = guard
                .metadata_map
                .iter()
                .filter(|(resource, record)| {
                    let last_seen = guard
                        .last_collection_time
                        .get(*resource)
                        .copied()
                        .unwrap_or(now);
                    record.eligible_for_purge(now, last_seen, self.expire_after)
                })
                .map(|(resource, _)| resource.clone())
                .collect();

            for resource in &stale {
                guard.metadata_map.remove(resource);
                guard.last_collection_time.remove(resource);
                guard.resource_map.retain(|_, bound| bound != resource);
            }
            purged = stale;
        }
        let count = purged.len();
        for resource in purged {
            self.notify(ChangeEvent::Purged { resource });
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn resource(id: &str) -> MonitoredResource {
        MonitoredResource::new("gce_instance", [("instance_id".to_string(), id.to_string())]).unwrap()
    }

    fn record(collected_at_secs: i64, is_deleted: bool) -> MetadataRecord {
        use chrono::TimeZone;
        let t = Utc.timestamp_opt(collected_at_secs, 0).unwrap();
        let mut r = MetadataRecord::new("v1", t, t, Value::Null);
        r.is_deleted = is_deleted;
        r
    }

    #[tokio::test]
    async fn lookup_returns_bound_resource() {
        let store = InMemoryMetadataStore::new(Duration::seconds(3600));
        let r = resource("42");
        store.update_resource(&["i-42".to_string()], r.clone()).await.unwrap();
        assert_eq!(store.lookup_resource("i-42").await.unwrap(), r);
    }

    #[tokio::test]
    async fn unknown_alias_not_found() {
        let store = InMemoryMetadataStore::new(Duration::seconds(3600));
        assert!(matches!(
            store.lookup_resource("nope").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn multiple_aliases_map_to_one_resource() {
        let store = InMemoryMetadataStore::new(Duration::seconds(3600));
        let r = resource("42");
        store
            .update_resource(&["i-42".to_string(), "host.local".to_string()], r.clone())
            .await
            .unwrap();
        assert_eq!(store.lookup_resource("i-42").await.unwrap(), r);
        assert_eq!(store.lookup_resource("host.local").await.unwrap(), r);
    }

    #[tokio::test]
    async fn empty_alias_in_single_item_batch_rejected() {
        let store = InMemoryMetadataStore::new(Duration::seconds(3600));
        let r = resource("42");
        let err = store.update_resource(&["".to_string()], r).await;
        assert!(matches!(err, Err(StoreError::EmptyAlias)));
    }

    #[tokio::test]
    async fn empty_alias_does_not_block_other_aliases_in_batch() {
        let store = InMemoryMetadataStore::new(Duration::seconds(3600));
        let r = resource("42");
        store
            .update_resource(&["".to_string(), "i-42".to_string()], r.clone())
            .await
            .ok();
        assert_eq!(store.lookup_resource("i-42").await.unwrap(), r);
    }

    #[tokio::test]
    async fn tombstone_supersedes_live_at_same_collected_at() {
        let store = InMemoryMetadataStore::new(Duration::seconds(3600));
        let r = resource("42");
        store.update_metadata(r.clone(), record(10, false)).await;
        store.update_metadata(r.clone(), record(10, true)).await;
        let snapshot = store.get_metadata_map().await;
        assert!(snapshot.get(&r).unwrap().is_deleted);
    }

    #[tokio::test]
    async fn stale_record_is_dropped() {
        let store = InMemoryMetadataStore::new(Duration::seconds(3600));
        let r = resource("42");
        store.update_metadata(r.clone(), record(10, false)).await;
        store.update_metadata(r.clone(), record(9, true)).await;
        let snapshot = store.get_metadata_map().await;
        assert!(!snapshot.get(&r).unwrap().is_deleted);
    }

    #[tokio::test]
    async fn update_resource_twice_is_idempotent() {
        let store = InMemoryMetadataStore::new(Duration::seconds(3600));
        let r = resource("42");
        store.update_resource(&["i-42".to_string()], r.clone()).await.unwrap();
        store.update_resource(&["i-42".to_string()], r.clone()).await.unwrap();
        assert_eq!(store.lookup_resource("i-42").await.unwrap(), r);
    }

    #[tokio::test]
    async fn rebinding_alias_fires_callback_with_shadowed_resource() {
        let calls: Arc<std::sync::Mutex<Vec<ChangeEvent>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let calls_clone = calls.clone();
        let cb: ChangeCallback = Arc::new(move |event| calls_clone.lock().unwrap().push(event));
        let store = InMemoryMetadataStore::with_callbacks(Duration::seconds(3600), vec![cb]);

        let a = resource("a");
        let b = resource("b");
        store.update_resource(&["alias".to_string()], a.clone()).await.unwrap();
        store.update_resource(&["alias".to_string()], b.clone()).await.unwrap();

        let events = calls.lock().unwrap();
        assert_eq!(events.len(), 2);
        match &events[1] {
            ChangeEvent::ResourceRebound { previous, current, .. } => {
                assert_eq!(previous.as_ref(), Some(&a));
                assert_eq!(current, &b);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn purge_removes_resource_and_all_its_aliases() {
        use chrono::TimeZone;
        let store = InMemoryMetadataStore::new(Duration::seconds(60));
        let r = resource("42");
        store
            .update_resource(&["i-42".to_string(), "host.local".to_string()], r.clone())
            .await
            .unwrap();
        let old = Utc.timestamp_opt(0, 0).unwrap();
        let mut rec = MetadataRecord::new("v1", old, old, Value::Null);
        rec.is_deleted = true;
        store.update_metadata(r.clone(), rec).await;

        let purged = store.purge_deleted_entries().await;
        assert_eq!(purged, 1);
        assert!(store.lookup_resource("i-42").await.is_err());
        assert!(store.lookup_resource("host.local").await.is_err());
        assert!(store.get_metadata_map().await.get(&r).is_none());
    }

    #[tokio::test]
    async fn concurrent_writers_converge_on_newest_record() {
        let store = Arc::new(InMemoryMetadataStore::new(Duration::seconds(3600)));
        let r = resource("concurrent");
        let total = AtomicUsize::new(0);
        let mut handles = Vec::new();
        for i in 0..50i64 {
            let store = store.clone();
            let r = r.clone();
            handles.push(tokio::spawn(async move {
                store.update_metadata(r, record(i, false)).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
            total.fetch_add(1, Ordering::SeqCst);
        }
        assert_eq!(total.load(Ordering::SeqCst), 50);
        let snapshot = store.get_metadata_map().await;
        assert_eq!(snapshot.get(&r).unwrap().collected_at, record(49, false).collected_at);
    }
}
