//! Capability dispatch over the shared handles

use std::fmt;
use std::sync::Arc;

use eyre::Result;
use tracing::debug;

use super::{InjectFn, Injectable};
use crate::cache::Cache;
use crate::client::Client;
use crate::rest::RestConfig;
use crate::scheme::Scheme;

/// Hands the manager's shared handles to objects that ask for them
///
/// Cloning is cheap; every clone injects the same handles.
#[derive(Clone)]
pub struct Injector {
    config: Arc<RestConfig>,
    scheme: Arc<Scheme>,
    client: Arc<dyn Client>,
    cache: Arc<dyn Cache>,
}

impl Injector {
    pub fn new(config: Arc<RestConfig>, scheme: Arc<Scheme>, client: Arc<dyn Client>, cache: Arc<dyn Cache>) -> Self {
        Self {
            config,
            scheme,
            client,
            cache,
        }
    }

    /// Call every setter `target` declares: client, scheme, config, cache, then inject fn
    ///
    /// Stops at the first setter that fails and returns its error unchanged.
    pub fn inject<T: Injectable + ?Sized>(&self, target: &T) -> Result<()> {
        debug!("Injector::inject: called");
        if let Some(t) = target.as_client_target() {
            t.inject_client(self.client.clone())?;
        }
        if let Some(t) = target.as_scheme_target() {
            t.inject_scheme(self.scheme.clone())?;
        }
        if let Some(t) = target.as_config_target() {
            t.inject_config(self.config.clone())?;
        }
        if let Some(t) = target.as_cache_target() {
            t.inject_cache(self.cache.clone())?;
        }
        if let Some(t) = target.as_injector_target() {
            t.inject_func(self.inject_fn())?;
        }
        Ok(())
    }

    /// A callable that runs this same injection against another object
    pub fn inject_fn(&self) -> InjectFn {
        let injector = self.clone();
        Arc::new(move |target: &dyn Injectable| injector.inject(target))
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector").field("host", &self.config.host).finish()
    }
}
