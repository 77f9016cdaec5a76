//! Polling informer cache backed by the shared client

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr, eyre};
use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Cache, FieldIndexer};
use crate::client::{Client, ClientError, ListOptions, Reader};
use crate::scheme::{GroupVersionKind, Object, ObjectKey};

/// Store per kind; `None` means requested but not yet listed
type Stores = HashMap<GroupVersionKind, Option<BTreeMap<ObjectKey, Object>>>;

struct CacheInner {
    client: Arc<dyn Client>,
    indexer: Arc<FieldIndexer>,
    namespace: Option<String>,
    resync_period: Duration,
    started: RwLock<bool>,
    stores: RwLock<Stores>,
}

impl CacheInner {
    fn is_started(&self) -> bool {
        *self.started.read().unwrap_or_else(|e| e.into_inner())
    }

    fn requested_kinds(&self) -> Vec<GroupVersionKind> {
        self.stores
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    fn is_synced(&self, gvk: &GroupVersionKind) -> bool {
        matches!(
            self.stores.read().unwrap_or_else(|e| e.into_inner()).get(gvk),
            Some(Some(_))
        )
    }

    /// List one kind through the client and replace its store
    async fn sync_kind(&self, gvk: GroupVersionKind) -> Result<(), ClientError> {
        let opts = ListOptions {
            namespace: self.namespace.clone(),
            ..Default::default()
        };
        let objects = self.client.list(&gvk, &opts).await?;
        debug!(%gvk, count = objects.len(), "CacheInner::sync_kind: listed");
        let store = objects.into_iter().map(|obj| (obj.key(), obj)).collect();
        self.stores
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(gvk, Some(store));
        Ok(())
    }

    /// Make sure `gvk` has completed its initial list
    async fn ensure_synced(&self, gvk: &GroupVersionKind) -> Result<(), ClientError> {
        if !self.is_started() {
            return Err(ClientError::CacheNotStarted);
        }
        if self.is_synced(gvk) {
            return Ok(());
        }
        debug!(%gvk, "CacheInner::ensure_synced: starting informer lazily");
        self.sync_kind(gvk.clone()).await
    }

    async fn resync_all(&self) {
        for gvk in self.requested_kinds() {
            if let Err(e) = self.sync_kind(gvk.clone()).await {
                warn!(%gvk, error = %e, "Resync failed, keeping previous contents");
            }
        }
    }
}

/// Default [`Cache`]: lists each requested kind through the shared client and
/// re-lists every resync period until stopped
///
/// Kinds requested before [`Cache::start`] are listed as part of the initial
/// sync; kinds first read afterwards are listed on first access.
#[derive(Clone)]
pub struct InformerCache {
    inner: Arc<CacheInner>,
}

impl InformerCache {
    pub fn new(
        client: Arc<dyn Client>,
        indexer: Arc<FieldIndexer>,
        namespace: Option<String>,
        resync_period: Duration,
    ) -> Self {
        debug!(?namespace, ?resync_period, "InformerCache::new: called");
        Self {
            inner: Arc::new(CacheInner {
                client,
                indexer,
                namespace,
                resync_period,
                started: RwLock::new(false),
                stores: RwLock::new(HashMap::new()),
            }),
        }
    }

    fn store_snapshot(&self, gvk: &GroupVersionKind) -> Vec<Object> {
        self.inner
            .stores
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(gvk)
            .and_then(|s| s.as_ref())
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Reader for InformerCache {
    async fn get(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<Object, ClientError> {
        self.inner.ensure_synced(gvk).await?;
        self.inner
            .stores
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(gvk)
            .and_then(|s| s.as_ref())
            .and_then(|s| s.get(key))
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                kind: gvk.kind.clone(),
                key: key.to_string(),
            })
    }

    async fn list(&self, gvk: &GroupVersionKind, opts: &ListOptions) -> Result<Vec<Object>, ClientError> {
        self.inner.ensure_synced(gvk).await?;
        let extract = match &opts.field {
            Some((field, value)) => {
                let extract = self
                    .inner
                    .indexer
                    .extractor(gvk, field)
                    .ok_or_else(|| ClientError::MissingIndex {
                        kind: gvk.kind.clone(),
                        field: field.clone(),
                    })?;
                Some((extract, value))
            }
            None => None,
        };

        Ok(self
            .store_snapshot(gvk)
            .into_iter()
            .filter(|obj| opts.matches(obj))
            .filter(|obj| match &extract {
                Some((extract, value)) => extract(obj).iter().any(|v| v == *value),
                None => true,
            })
            .collect())
    }
}

#[async_trait]
impl Cache for InformerCache {
    async fn start(&self, stop: CancellationToken) -> Result<()> {
        {
            let mut started = self.inner.started.write().unwrap_or_else(|e| e.into_inner());
            if *started {
                return Err(eyre!("informer cache already started"));
            }
            *started = true;
        }

        let kinds = self.inner.requested_kinds();
        info!(kinds = kinds.len(), "Informer cache starting initial sync");
        try_join_all(kinds.into_iter().map(|gvk| self.inner.sync_kind(gvk)))
            .await
            .wrap_err("failed to wait for caches to sync")?;

        if self.inner.resync_period.is_zero() {
            debug!("InformerCache::start: resync disabled");
        } else {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(inner.resync_period);
                // First tick completes immediately; the initial sync already ran
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        _ = ticker.tick() => inner.resync_all().await,
                    }
                }
                debug!("Informer cache resync loop stopped");
            });
        }

        info!("Informer cache synced");
        Ok(())
    }

    async fn informer_for(&self, gvk: &GroupVersionKind) -> Result<(), ClientError> {
        debug!(%gvk, "InformerCache::informer_for: called");
        self.inner
            .stores
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(gvk.clone())
            .or_insert(None);
        if self.inner.is_started() {
            self.inner.ensure_synced(gvk).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryClient;
    use serde_json::json;

    fn pods() -> GroupVersionKind {
        GroupVersionKind::core("v1", "Pod")
    }

    fn pod(ns: &str, name: &str, node: &str) -> Object {
        Object::new(pods(), Some(ns), name).with_data(json!({"spec": {"nodeName": node}}))
    }

    fn cache_over(client: Arc<MemoryClient>, namespace: Option<&str>, resync: Duration) -> InformerCache {
        InformerCache::new(
            client,
            Arc::new(FieldIndexer::new()),
            namespace.map(str::to_string),
            resync,
        )
    }

    #[tokio::test]
    async fn test_reads_before_start_fail() {
        let cache = cache_over(Arc::new(MemoryClient::new()), None, Duration::ZERO);
        let err = cache.list(&pods(), &ListOptions::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::CacheNotStarted));
    }

    #[tokio::test]
    async fn test_initial_sync_and_reads() {
        let client = Arc::new(MemoryClient::with_objects([
            pod("default", "web-0", "node-a"),
            pod("default", "web-1", "node-b"),
        ]));
        let cache = cache_over(client.clone(), None, Duration::ZERO);
        cache.informer_for(&pods()).await.unwrap();
        assert_eq!(client.list_calls(), 0);

        let stop = CancellationToken::new();
        cache.start(stop.clone()).await.unwrap();
        assert_eq!(client.list_calls(), 1);

        let obj = cache.get(&pods(), &ObjectKey::namespaced("default", "web-0")).await.unwrap();
        assert_eq!(obj.field("spec.nodeName").as_deref(), Some("node-a"));
        assert_eq!(cache.list(&pods(), &ListOptions::default()).await.unwrap().len(), 2);
        // Served from the store, no extra list
        assert_eq!(client.list_calls(), 1);

        let err = cache
            .get(&pods(), &ObjectKey::namespaced("default", "missing"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        stop.cancel();
    }

    #[tokio::test]
    async fn test_double_start_fails() {
        let cache = cache_over(Arc::new(MemoryClient::new()), None, Duration::ZERO);
        let stop = CancellationToken::new();
        cache.start(stop.clone()).await.unwrap();
        assert!(cache.start(stop).await.is_err());
    }

    #[tokio::test]
    async fn test_lazy_informer_after_start() {
        let client = Arc::new(MemoryClient::with_objects([pod("default", "web-0", "node-a")]));
        let cache = cache_over(client.clone(), None, Duration::ZERO);
        cache.start(CancellationToken::new()).await.unwrap();
        assert_eq!(client.list_calls(), 0);

        assert_eq!(cache.list(&pods(), &ListOptions::default()).await.unwrap().len(), 1);
        assert_eq!(client.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_namespace_scope() {
        let client = Arc::new(MemoryClient::with_objects([
            pod("default", "web-0", "node-a"),
            pod("kube-system", "dns-0", "node-a"),
        ]));
        let cache = cache_over(client, Some("kube-system"), Duration::ZERO);
        cache.start(CancellationToken::new()).await.unwrap();

        let all = cache.list(&pods(), &ListOptions::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].metadata.name, "dns-0");
    }

    #[tokio::test]
    async fn test_field_index_registered_after_start() {
        let client = Arc::new(MemoryClient::with_objects([
            pod("default", "web-0", "node-a"),
            pod("default", "web-1", "node-b"),
        ]));
        let indexer = Arc::new(FieldIndexer::new());
        let cache = InformerCache::new(client, indexer.clone(), None, Duration::ZERO);
        cache.start(CancellationToken::new()).await.unwrap();

        let opts = ListOptions::default().with_field("spec.nodeName", "node-b");
        let err = cache.list(&pods(), &opts).await.unwrap_err();
        assert!(matches!(err, ClientError::MissingIndex { .. }));

        indexer
            .index_field(&pods(), "spec.nodeName", |obj| obj.field("spec.nodeName").into_iter().collect())
            .unwrap();
        let on_b = cache.list(&pods(), &opts).await.unwrap();
        assert_eq!(on_b.len(), 1);
        assert_eq!(on_b[0].metadata.name, "web-1");
    }

    #[tokio::test]
    async fn test_resync_picks_up_changes_until_stopped() {
        let client = Arc::new(MemoryClient::new());
        let cache = cache_over(client.clone(), None, Duration::from_millis(20));
        cache.informer_for(&pods()).await.unwrap();

        let stop = CancellationToken::new();
        cache.start(stop.clone()).await.unwrap();
        assert!(cache.list(&pods(), &ListOptions::default()).await.unwrap().is_empty());

        client.create(&pod("default", "web-0", "node-a")).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while cache.list(&pods(), &ListOptions::default()).await.unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("resync should pick up the new pod");

        stop.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let calls = client.list_calls();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(client.list_calls(), calls, "no resync after stop");
    }
}
