//! Type scheme: the registry of kinds the manager knows how to handle

mod gvk;
mod object;

use std::collections::BTreeMap;
use std::sync::RwLock;

use thiserror::Error;
use tracing::debug;

pub use gvk::GroupVersionKind;
pub use object::{Object, ObjectKey, ObjectMeta};

/// Errors from scheme registration
#[derive(Debug, Error)]
pub enum SchemeError {
    #[error("kind already registered: {0}")]
    AlreadyRegistered(GroupVersionKind),
}

/// Registry of known kinds and whether each is namespace-scoped
///
/// Registration takes `&self` so a scheme shared behind an `Arc` can still be
/// extended during setup.
#[derive(Debug, Default)]
pub struct Scheme {
    kinds: RwLock<BTreeMap<GroupVersionKind, bool>>,
}

impl Scheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheme pre-populated with the built-in kinds
    pub fn with_core_kinds() -> Self {
        debug!("Scheme::with_core_kinds: called");
        let scheme = Self::new();
        let builtin = [
            (GroupVersionKind::core("v1", "Pod"), true),
            (GroupVersionKind::core("v1", "Service"), true),
            (GroupVersionKind::core("v1", "ConfigMap"), true),
            (GroupVersionKind::core("v1", "Secret"), true),
            (GroupVersionKind::core("v1", "Namespace"), false),
            (GroupVersionKind::core("v1", "Node"), false),
            (GroupVersionKind::new("apps", "v1", "Deployment"), true),
        ];
        {
            let mut kinds = scheme.kinds.write().unwrap_or_else(|e| e.into_inner());
            kinds.extend(builtin);
        }
        scheme
    }

    /// Register a kind
    pub fn add_known_kind(&self, gvk: GroupVersionKind, namespaced: bool) -> Result<(), SchemeError> {
        debug!(%gvk, namespaced, "Scheme::add_known_kind: called");
        let mut kinds = self.kinds.write().unwrap_or_else(|e| e.into_inner());
        if kinds.contains_key(&gvk) {
            return Err(SchemeError::AlreadyRegistered(gvk));
        }
        kinds.insert(gvk, namespaced);
        Ok(())
    }

    pub fn recognizes(&self, gvk: &GroupVersionKind) -> bool {
        self.kinds.read().unwrap_or_else(|e| e.into_inner()).contains_key(gvk)
    }

    /// `None` if the kind is unknown
    pub fn is_namespaced(&self, gvk: &GroupVersionKind) -> Option<bool> {
        self.kinds.read().unwrap_or_else(|e| e.into_inner()).get(gvk).copied()
    }

    /// All registered kinds in sorted order
    pub fn kinds(&self) -> Vec<GroupVersionKind> {
        self.kinds
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}
