//! Dependency injection of the manager's shared handles
//!
//! An object opts into injection by implementing one or more of the
//! capability traits below and advertising them through [`Injectable`].
//! Setters take `&self`, so targets hold their handles behind interior
//! mutability (typically a `OnceLock`).

use std::sync::Arc;

use eyre::Result;

mod injector;

pub use injector::Injector;

use crate::cache::Cache;
use crate::client::Client;
use crate::rest::RestConfig;
use crate::scheme::Scheme;

/// Re-runs injection against another object
pub type InjectFn = Arc<dyn Fn(&dyn Injectable) -> Result<()> + Send + Sync>;

pub trait InjectClient {
    fn inject_client(&self, client: Arc<dyn Client>) -> Result<()>;
}

pub trait InjectScheme {
    fn inject_scheme(&self, scheme: Arc<Scheme>) -> Result<()>;
}

pub trait InjectConfig {
    fn inject_config(&self, config: Arc<RestConfig>) -> Result<()>;
}

pub trait InjectCache {
    fn inject_cache(&self, cache: Arc<dyn Cache>) -> Result<()>;
}

/// Receives a function that injects into objects the target owns
pub trait InjectInjector {
    fn inject_func(&self, f: InjectFn) -> Result<()>;
}

/// Capability probe: which setters an object wants called
///
/// Every method defaults to `None`, so `impl Injectable for T {}` declares
/// no dependencies.
pub trait Injectable: Send + Sync {
    fn as_client_target(&self) -> Option<&dyn InjectClient> {
        None
    }

    fn as_scheme_target(&self) -> Option<&dyn InjectScheme> {
        None
    }

    fn as_config_target(&self) -> Option<&dyn InjectConfig> {
        None
    }

    fn as_cache_target(&self) -> Option<&dyn InjectCache> {
        None
    }

    fn as_injector_target(&self) -> Option<&dyn InjectInjector> {
        None
    }
}
