//! Mapping kinds to REST resources

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::scheme::{GroupVersionKind, Scheme};

/// Errors from REST mapping
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapperError {
    #[error("no matches for kind \"{0}\"")]
    NoMatch(GroupVersionKind),
}

/// Where a kind is served and how it is scoped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestMapping {
    pub gvk: GroupVersionKind,
    /// Plural lowercase resource name, e.g. `deployments`
    pub resource: String,
    pub namespaced: bool,
}

impl RestMapping {
    fn prefix(&self) -> String {
        if self.gvk.group.is_empty() {
            format!("/api/{}", self.gvk.version)
        } else {
            format!("/apis/{}/{}", self.gvk.group, self.gvk.version)
        }
    }

    /// Path of the resource collection; `None` namespace lists across all namespaces
    pub fn collection_path(&self, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) if self.namespaced => format!("{}/namespaces/{}/{}", self.prefix(), ns, self.resource),
            _ => format!("{}/{}", self.prefix(), self.resource),
        }
    }

    pub fn object_path(&self, namespace: Option<&str>, name: &str) -> String {
        format!("{}/{}", self.collection_path(namespace), name)
    }
}

/// Resolves kinds to resources
pub trait RestMapper: Send + Sync {
    fn rest_mapping(&self, gvk: &GroupVersionKind) -> Result<RestMapping, MapperError>;
}

/// Mapper derived from a [`Scheme`] snapshot, without server discovery
#[derive(Debug, Default)]
pub struct StaticRestMapper {
    mappings: HashMap<GroupVersionKind, RestMapping>,
}

impl StaticRestMapper {
    pub fn from_scheme(scheme: &Scheme) -> Self {
        let kinds = scheme.kinds();
        debug!(kinds = kinds.len(), "StaticRestMapper::from_scheme: called");
        let mappings = kinds
            .into_iter()
            .map(|gvk| {
                let mapping = RestMapping {
                    resource: pluralize(&gvk.kind),
                    namespaced: scheme.is_namespaced(&gvk).unwrap_or(true),
                    gvk: gvk.clone(),
                };
                (gvk, mapping)
            })
            .collect();
        Self { mappings }
    }
}

impl RestMapper for StaticRestMapper {
    fn rest_mapping(&self, gvk: &GroupVersionKind) -> Result<RestMapping, MapperError> {
        self.mappings
            .get(gvk)
            .cloned()
            .ok_or_else(|| MapperError::NoMatch(gvk.clone()))
    }
}

/// Lowercase plural resource name for a kind
fn pluralize(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') {
        lower
    } else if let Some(stem) = lower.strip_suffix('y')
        && !stem.ends_with(|c: char| "aeiou".contains(c))
    {
        format!("{}ies", stem)
    } else {
        format!("{}s", lower)
    }
}
