//! Dynamic API objects

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::gvk::GroupVersionKind;

/// Standard object metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// Namespace/name pair addressing a single object of a known kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Key for a cluster-scoped object
    pub fn cluster(name: &str) -> Self {
        Self::new(None, name)
    }

    pub fn namespaced(namespace: &str, name: &str) -> Self {
        Self::new(Some(namespace), name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// An object whose schema is not known at compile time
///
/// `data` holds everything except `apiVersion`, `kind` and `metadata`
/// (typically `spec` and `status`).
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub gvk: GroupVersionKind,
    pub metadata: ObjectMeta,
    pub data: Value,
}

impl Object {
    pub fn new(gvk: GroupVersionKind, namespace: Option<&str>, name: &str) -> Self {
        Self {
            gvk,
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: namespace.map(str::to_string),
                ..Default::default()
            },
            data: Value::Object(Default::default()),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.metadata.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.metadata.namespace.as_deref(), &self.metadata.name)
    }

    /// Look up a dotted field path such as `spec.nodeName` or `metadata.name`
    ///
    /// Scalars are rendered as strings; objects, arrays and nulls yield `None`.
    pub fn field(&self, path: &str) -> Option<String> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = if first == "metadata" {
            serde_json::to_value(&self.metadata).ok()?
        } else {
            self.data.get(first)?.clone()
        };
        for part in parts {
            current = current.get(part)?.clone();
        }
        match current {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Wire representation with `apiVersion`/`kind`/`metadata` at the top level
    pub fn to_json(&self) -> Value {
        let mut map = match &self.data {
            Value::Object(m) => m.clone(),
            _ => serde_json::Map::new(),
        };
        map.insert("apiVersion".to_string(), Value::String(self.gvk.api_version()));
        map.insert("kind".to_string(), Value::String(self.gvk.kind.clone()));
        map.insert(
            "metadata".to_string(),
            serde_json::to_value(&self.metadata).unwrap_or(Value::Null),
        );
        Value::Object(map)
    }

    /// Parse the wire representation for an expected kind
    pub fn from_json(gvk: &GroupVersionKind, value: Value) -> Result<Self, serde_json::Error> {
        let Value::Object(mut map) = value else {
            return Err(serde::de::Error::custom("object body is not a JSON map"));
        };
        map.remove("apiVersion");
        map.remove("kind");
        let metadata = match map.remove("metadata") {
            Some(m) => serde_json::from_value(m)?,
            None => ObjectMeta::default(),
        };
        Ok(Self {
            gvk: gvk.clone(),
            metadata,
            data: Value::Object(map),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod() -> Object {
        Object::new(GroupVersionKind::core("v1", "Pod"), Some("default"), "web-0")
            .with_label("app", "web")
            .with_data(json!({"spec": {"nodeName": "node-a", "replicas": 3, "paused": false}}))
    }

    #[test]
    fn test_field_lookup() {
        let obj = pod();
        assert_eq!(obj.field("spec.nodeName").as_deref(), Some("node-a"));
        assert_eq!(obj.field("spec.replicas").as_deref(), Some("3"));
        assert_eq!(obj.field("spec.paused").as_deref(), Some("false"));
        assert_eq!(obj.field("metadata.name").as_deref(), Some("web-0"));
        assert_eq!(obj.field("metadata.namespace").as_deref(), Some("default"));
        assert_eq!(obj.field("spec"), None);
        assert_eq!(obj.field("status.phase"), None);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(pod().key().to_string(), "default/web-0");
        assert_eq!(ObjectKey::cluster("node-a").to_string(), "node-a");
    }

    #[test]
    fn test_json_wire_format() {
        let obj = pod();
        let wire = obj.to_json();
        assert_eq!(wire["apiVersion"], "v1");
        assert_eq!(wire["kind"], "Pod");
        assert_eq!(wire["metadata"]["labels"]["app"], "web");

        let parsed = Object::from_json(&obj.gvk, wire).unwrap();
        assert_eq!(parsed, obj);
    }

    #[test]
    fn test_from_json_rejects_non_map() {
        let gvk = GroupVersionKind::core("v1", "Pod");
        assert!(Object::from_json(&gvk, json!([1, 2])).is_err());
    }
}
