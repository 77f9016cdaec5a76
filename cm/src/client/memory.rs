//! In-process object store implementing [`Client`]

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::{Client, ClientError, ListOptions, Reader};
use crate::scheme::{GroupVersionKind, Object, ObjectKey};

/// Object store kept entirely in memory
///
/// Writes bump a store-wide resource version. An update carrying a
/// resource version is rejected with a conflict when it is stale; an update
/// without one always wins.
#[derive(Default)]
pub struct MemoryClient {
    objects: RwLock<HashMap<GroupVersionKind, BTreeMap<ObjectKey, Object>>>,
    resource_version: AtomicU64,
    list_calls: AtomicUsize,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `objects`
    pub fn with_objects(objects: impl IntoIterator<Item = Object>) -> Self {
        let client = Self::new();
        {
            let mut store = client.objects.write().unwrap_or_else(|e| e.into_inner());
            for mut obj in objects {
                obj.metadata.resource_version = Some(client.next_version());
                store.entry(obj.gvk.clone()).or_default().insert(obj.key(), obj);
            }
        }
        client
    }

    /// Number of `list` calls served so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn next_version(&self) -> String {
        (self.resource_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }
}

#[async_trait]
impl Reader for MemoryClient {
    async fn get(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<Object, ClientError> {
        debug!(%gvk, %key, "MemoryClient::get: called");
        let store = self.objects.read().unwrap_or_else(|e| e.into_inner());
        store
            .get(gvk)
            .and_then(|objs| objs.get(key))
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                kind: gvk.kind.clone(),
                key: key.to_string(),
            })
    }

    async fn list(&self, gvk: &GroupVersionKind, opts: &ListOptions) -> Result<Vec<Object>, ClientError> {
        debug!(%gvk, ?opts, "MemoryClient::list: called");
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let store = self.objects.read().unwrap_or_else(|e| e.into_inner());
        let Some(objs) = store.get(gvk) else {
            return Ok(Vec::new());
        };
        Ok(objs
            .values()
            .filter(|obj| opts.matches(obj))
            .filter(|obj| match &opts.field {
                Some((field, value)) => obj.field(field).as_deref() == Some(value.as_str()),
                None => true,
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Client for MemoryClient {
    async fn create(&self, obj: &Object) -> Result<Object, ClientError> {
        debug!(gvk = %obj.gvk, key = %obj.key(), "MemoryClient::create: called");
        let mut store = self.objects.write().unwrap_or_else(|e| e.into_inner());
        let objs = store.entry(obj.gvk.clone()).or_default();
        let key = obj.key();
        if objs.contains_key(&key) {
            return Err(ClientError::AlreadyExists {
                kind: obj.gvk.kind.clone(),
                key: key.to_string(),
            });
        }
        let mut stored = obj.clone();
        stored.metadata.resource_version = Some(self.next_version());
        objs.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update(&self, obj: &Object) -> Result<Object, ClientError> {
        debug!(gvk = %obj.gvk, key = %obj.key(), "MemoryClient::update: called");
        let mut store = self.objects.write().unwrap_or_else(|e| e.into_inner());
        let key = obj.key();
        let Some(existing) = store.get_mut(&obj.gvk).and_then(|objs| objs.get_mut(&key)) else {
            return Err(ClientError::NotFound {
                kind: obj.gvk.kind.clone(),
                key: key.to_string(),
            });
        };
        if let Some(expected) = &obj.metadata.resource_version
            && existing.metadata.resource_version.as_ref() != Some(expected)
        {
            return Err(ClientError::Conflict {
                kind: obj.gvk.kind.clone(),
                key: key.to_string(),
                message: "the object has been modified; please apply your changes to the latest version".to_string(),
            });
        }
        let mut stored = obj.clone();
        stored.metadata.resource_version = Some(self.next_version());
        *existing = stored.clone();
        Ok(stored)
    }

    async fn delete(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<(), ClientError> {
        debug!(%gvk, %key, "MemoryClient::delete: called");
        let mut store = self.objects.write().unwrap_or_else(|e| e.into_inner());
        store
            .get_mut(gvk)
            .and_then(|objs| objs.remove(key))
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound {
                kind: gvk.kind.clone(),
                key: key.to_string(),
            })
    }
}
