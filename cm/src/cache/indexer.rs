//! Secondary field indexes applied by the cache

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::debug;

use crate::scheme::{GroupVersionKind, Object};

/// Extracts the indexed values of one field from an object
pub type IndexerFn = Arc<dyn Fn(&Object) -> Vec<String> + Send + Sync>;

/// Errors from index registration
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("indexer conflict: field {field} is already indexed for {gvk}")]
    Conflict { gvk: GroupVersionKind, field: String },
}

/// Accumulates field index definitions
///
/// Safe to call from any task at any time. Caches read the definitions at
/// query time, so an index registered after the cache started is honoured
/// by the next list that selects on it.
#[derive(Default)]
pub struct FieldIndexer {
    indexes: RwLock<HashMap<(GroupVersionKind, String), IndexerFn>>,
}

impl FieldIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extractor for `field` on objects of kind `gvk`
    pub fn index_field<F>(&self, gvk: &GroupVersionKind, field: &str, extract: F) -> Result<(), IndexError>
    where
        F: Fn(&Object) -> Vec<String> + Send + Sync + 'static,
    {
        debug!(%gvk, %field, "FieldIndexer::index_field: called");
        let mut indexes = self.indexes.write().unwrap_or_else(|e| e.into_inner());
        let key = (gvk.clone(), field.to_string());
        if indexes.contains_key(&key) {
            return Err(IndexError::Conflict {
                gvk: gvk.clone(),
                field: field.to_string(),
            });
        }
        indexes.insert(key, Arc::new(extract));
        Ok(())
    }

    pub fn extractor(&self, gvk: &GroupVersionKind, field: &str) -> Option<IndexerFn> {
        self.indexes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(gvk.clone(), field.to_string()))
            .cloned()
    }

    /// Indexed fields for a kind, sorted
    pub fn indexed_fields(&self, gvk: &GroupVersionKind) -> Vec<String> {
        let indexes = self.indexes.read().unwrap_or_else(|e| e.into_inner());
        let mut fields: Vec<String> = indexes
            .keys()
            .filter(|(g, _)| g == gvk)
            .map(|(_, f)| f.clone())
            .collect();
        fields.sort();
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pods() -> GroupVersionKind {
        GroupVersionKind::core("v1", "Pod")
    }

    #[test]
    fn test_index_and_extract() {
        let indexer = FieldIndexer::new();
        indexer
            .index_field(&pods(), "spec.nodeName", |obj| obj.field("spec.nodeName").into_iter().collect())
            .unwrap();

        let obj = Object::new(pods(), Some("default"), "web-0").with_data(json!({"spec": {"nodeName": "node-a"}}));
        let extract = indexer.extractor(&pods(), "spec.nodeName").unwrap();
        assert_eq!(extract(&obj), vec!["node-a".to_string()]);
        assert!(indexer.extractor(&pods(), "spec.other").is_none());
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let indexer = FieldIndexer::new();
        indexer.index_field(&pods(), "spec.nodeName", |_| Vec::new()).unwrap();
        let err = indexer.index_field(&pods(), "spec.nodeName", |_| Vec::new()).unwrap_err();
        assert!(err.to_string().contains("already indexed"));

        // Same field on another kind is independent
        let deployments = GroupVersionKind::new("apps", "v1", "Deployment");
        indexer.index_field(&deployments, "spec.nodeName", |_| Vec::new()).unwrap();
        assert_eq!(indexer.indexed_fields(&pods()), vec!["spec.nodeName".to_string()]);
    }

    #[test]
    fn test_concurrent_registration() {
        let indexer = Arc::new(FieldIndexer::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let indexer = indexer.clone();
                std::thread::spawn(move || {
                    indexer
                        .index_field(&pods(), &format!("field{}", i), |_| Vec::new())
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(indexer.indexed_fields(&pods()).len(), 8);
    }
}
