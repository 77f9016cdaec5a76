//! Manager construction options and default factories

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use eyre::Result;
use tracing::debug;

use crate::cache::{Cache, FieldIndexer, InformerCache};
use crate::client::{Client, HttpClient};
use crate::rest::{RestConfig, RestMapper, StaticRestMapper};
use crate::scheme::Scheme;

/// Default interval at which the cache re-lists everything it watches
pub const DEFAULT_SYNC_PERIOD: Duration = Duration::from_secs(10 * 60 * 60);

/// Default bound on how long `start` waits for runnables to exit
pub const DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the REST mapper
pub type MapperProvider = Arc<dyn Fn(&RestConfig, &Scheme) -> Result<Arc<dyn RestMapper>> + Send + Sync>;

/// Builds the shared client
pub type NewClientFn = Arc<dyn Fn(&RestConfig, ClientOptions) -> Result<Arc<dyn Client>> + Send + Sync>;

/// Builds the shared cache
pub type NewCacheFn = Arc<dyn Fn(&RestConfig, CacheOptions) -> Result<Arc<dyn Cache>> + Send + Sync>;

/// Inputs handed to the client factory
#[derive(Clone)]
pub struct ClientOptions {
    pub scheme: Arc<Scheme>,
    pub mapper: Arc<dyn RestMapper>,
}

/// Inputs handed to the cache factory
#[derive(Clone)]
pub struct CacheOptions {
    pub scheme: Arc<Scheme>,
    pub mapper: Arc<dyn RestMapper>,
    /// The already-built shared client
    pub client: Arc<dyn Client>,
    pub field_indexer: Arc<FieldIndexer>,
    pub namespace: Option<String>,
    pub resync_period: Duration,
}

/// Manager options; every `None` selects the production default
#[derive(Clone, Default)]
pub struct Options {
    /// Kinds the manager works with (default: built-in kinds)
    pub scheme: Option<Arc<Scheme>>,

    pub mapper_provider: Option<MapperProvider>,

    pub new_client: Option<NewClientFn>,

    pub new_cache: Option<NewCacheFn>,

    /// Restrict the cache to a single namespace
    pub namespace: Option<String>,

    /// Cache resync period (default 10h)
    pub sync_period: Option<Duration>,

    /// How long `start` waits for runnables after deciding to stop (default 30s)
    pub graceful_shutdown_timeout: Option<Duration>,
}

impl Options {
    pub fn with_scheme(mut self, scheme: Arc<Scheme>) -> Self {
        self.scheme = Some(scheme);
        self
    }

    pub fn with_mapper_provider<F>(mut self, f: F) -> Self
    where
        F: Fn(&RestConfig, &Scheme) -> Result<Arc<dyn RestMapper>> + Send + Sync + 'static,
    {
        self.mapper_provider = Some(Arc::new(f));
        self
    }

    pub fn with_client_factory<F>(mut self, f: F) -> Self
    where
        F: Fn(&RestConfig, ClientOptions) -> Result<Arc<dyn Client>> + Send + Sync + 'static,
    {
        self.new_client = Some(Arc::new(f));
        self
    }

    pub fn with_cache_factory<F>(mut self, f: F) -> Self
    where
        F: Fn(&RestConfig, CacheOptions) -> Result<Arc<dyn Cache>> + Send + Sync + 'static,
    {
        self.new_cache = Some(Arc::new(f));
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_sync_period(mut self, period: Duration) -> Self {
        self.sync_period = Some(period);
        self
    }

    pub fn with_graceful_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_shutdown_timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("custom_scheme", &self.scheme.is_some())
            .field("custom_mapper_provider", &self.mapper_provider.is_some())
            .field("custom_client", &self.new_client.is_some())
            .field("custom_cache", &self.new_cache.is_some())
            .field("namespace", &self.namespace)
            .field("sync_period", &self.sync_period)
            .field("graceful_shutdown_timeout", &self.graceful_shutdown_timeout)
            .finish()
    }
}

/// Mapper built from the scheme's registered kinds
pub fn default_mapper_provider() -> MapperProvider {
    Arc::new(|_config: &RestConfig, scheme: &Scheme| -> Result<Arc<dyn RestMapper>> {
        debug!("default_mapper_provider: building static mapper");
        Ok(Arc::new(StaticRestMapper::from_scheme(scheme)) as Arc<dyn RestMapper>)
    })
}

/// HTTP client against `config.host`
pub fn default_new_client() -> NewClientFn {
    Arc::new(|config: &RestConfig, opts: ClientOptions| -> Result<Arc<dyn Client>> {
        debug!(host = %config.host, "default_new_client: building HTTP client");
        Ok(Arc::new(HttpClient::from_config(config, opts.mapper)?) as Arc<dyn Client>)
    })
}

/// Informer cache reading through the shared client
pub fn default_new_cache() -> NewCacheFn {
    Arc::new(|_config: &RestConfig, opts: CacheOptions| -> Result<Arc<dyn Cache>> {
        debug!(namespace = ?opts.namespace, "default_new_cache: building informer cache");
        Ok(Arc::new(InformerCache::new(
            opts.client,
            opts.field_indexer,
            opts.namespace,
            opts.resync_period,
        )) as Arc<dyn Cache>)
    })
}
