//! Typed access to API objects
//!
//! [`Reader`] is the read half shared by the live [`Client`] and the
//! [`crate::cache::Cache`]; writes always go through a `Client`.

use std::collections::BTreeMap;

use async_trait::async_trait;

mod error;
mod http;
mod memory;

pub use error::ClientError;
pub use http::HttpClient;
pub use memory::MemoryClient;

use crate::scheme::{GroupVersionKind, Object, ObjectKey};

/// Filters for list calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    /// Restrict to one namespace; `None` lists everything visible
    pub namespace: Option<String>,

    /// Equality label selector; every pair must match
    pub labels: BTreeMap<String, String>,

    /// Field selector `(field path, value)`
    pub field: Option<(String, String)>,
}

impl ListOptions {
    pub fn in_namespace(namespace: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_field(mut self, field: &str, value: &str) -> Self {
        self.field = Some((field.to_string(), value.to_string()));
        self
    }

    /// Namespace and label match; the field selector is left to the caller
    pub fn matches(&self, obj: &Object) -> bool {
        if let Some(ns) = &self.namespace
            && obj.metadata.namespace.as_deref() != Some(ns.as_str())
        {
            return false;
        }
        self.labels
            .iter()
            .all(|(k, v)| obj.metadata.labels.get(k) == Some(v))
    }

    /// `k1=v1,k2=v2` selector string, `None` when empty
    pub(crate) fn label_selector(&self) -> Option<String> {
        if self.labels.is_empty() {
            return None;
        }
        Some(
            self.labels
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

/// Read access to objects
#[async_trait]
pub trait Reader: Send + Sync {
    async fn get(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<Object, ClientError>;

    async fn list(&self, gvk: &GroupVersionKind, opts: &ListOptions) -> Result<Vec<Object>, ClientError>;
}

/// Read/write access to the API, safe to share across tasks
#[async_trait]
pub trait Client: Reader {
    /// Create an object; returns the stored copy
    async fn create(&self, obj: &Object) -> Result<Object, ClientError>;

    /// Replace an object; returns the stored copy
    async fn update(&self, obj: &Object) -> Result<Object, ClientError>;

    async fn delete(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<(), ClientError>;
}
