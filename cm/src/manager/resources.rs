//! The bundle of handles every runnable shares

use std::sync::Arc;

use tracing::{debug, info};

use super::error::ManagerError;
use super::options::{
    CacheOptions, ClientOptions, DEFAULT_SYNC_PERIOD, Options, default_mapper_provider, default_new_cache,
    default_new_client,
};
use crate::cache::{Cache, FieldIndexer};
use crate::client::Client;
use crate::inject::Injector;
use crate::rest::{RestConfig, RestMapper};
use crate::scheme::Scheme;

/// Handles built once by [`super::Manager::new`]; immutable afterwards except
/// for the field indexer, which accepts registrations at any time
#[derive(Clone)]
pub struct SharedResources {
    pub config: Arc<RestConfig>,
    pub scheme: Arc<Scheme>,
    pub mapper: Arc<dyn RestMapper>,
    pub client: Arc<dyn Client>,
    pub cache: Arc<dyn Cache>,
    pub field_indexer: Arc<FieldIndexer>,
}

impl SharedResources {
    /// Build the bundle: config check, scheme, mapper, client, indexer, cache
    ///
    /// Nothing is started. Factory errors are returned as-is inside the
    /// matching [`ManagerError`] variant.
    pub fn build(config: Option<RestConfig>, options: &Options) -> Result<Self, ManagerError> {
        debug!(?options, "SharedResources::build: called");
        let config = Arc::new(config.ok_or(ManagerError::ConfigMissing)?);

        let scheme = options
            .scheme
            .clone()
            .unwrap_or_else(|| Arc::new(Scheme::with_core_kinds()));

        let provide_mapper = options.mapper_provider.clone().unwrap_or_else(default_mapper_provider);
        let mapper = provide_mapper(config.as_ref(), scheme.as_ref()).map_err(ManagerError::MapperCreationFailed)?;

        let new_client = options.new_client.clone().unwrap_or_else(default_new_client);
        let client = new_client(
            config.as_ref(),
            ClientOptions {
                scheme: scheme.clone(),
                mapper: mapper.clone(),
            },
        )
        .map_err(ManagerError::ClientCreationFailed)?;

        let field_indexer = Arc::new(FieldIndexer::new());

        let new_cache = options.new_cache.clone().unwrap_or_else(default_new_cache);
        let cache = new_cache(
            config.as_ref(),
            CacheOptions {
                scheme: scheme.clone(),
                mapper: mapper.clone(),
                client: client.clone(),
                field_indexer: field_indexer.clone(),
                namespace: options.namespace.clone(),
                resync_period: options.sync_period.unwrap_or(DEFAULT_SYNC_PERIOD),
            },
        )
        .map_err(ManagerError::CacheCreationFailed)?;

        info!(host = %config.host, namespace = ?options.namespace, "Shared resources built");
        Ok(Self {
            config,
            scheme,
            mapper,
            client,
            cache,
            field_indexer,
        })
    }

    pub fn injector(&self) -> Injector {
        Injector::new(
            self.config.clone(),
            self.scheme.clone(),
            self.client.clone(),
            self.cache.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryClient;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory_options() -> Options {
        Options::default().with_client_factory(|_, _| Ok(Arc::new(MemoryClient::new()) as Arc<dyn Client>))
    }

    #[test]
    fn test_config_checked_before_factories() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let options = Options::default().with_mapper_provider(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(eyre::eyre!("should not be called"))
        });
        let err = SharedResources::build(None, &options).err().unwrap();
        assert!(matches!(err, ManagerError::ConfigMissing));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_client_failure_skips_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let options = Options::default()
            .with_client_factory(|_, _| Err(eyre::eyre!("expected error")))
            .with_cache_factory(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(eyre::eyre!("should not be called"))
            });
        let err = SharedResources::build(Some(RestConfig::default()), &options).err().unwrap();
        assert!(matches!(err, ManagerError::ClientCreationFailed(_)));
        assert_eq!(err.to_string(), "expected error");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cache_receives_shared_client_and_indexer() {
        let seen: Arc<std::sync::Mutex<Option<CacheOptions>>> = Arc::default();
        let sink = seen.clone();
        let options = memory_options().with_namespace("team-a").with_cache_factory(move |config, opts| {
            *sink.lock().unwrap() = Some(opts.clone());
            default_new_cache()(config, opts)
        });
        let resources = SharedResources::build(Some(RestConfig::default()), &options).unwrap();

        let seen = seen.lock().unwrap().take().unwrap();
        assert!(Arc::ptr_eq(&seen.client, &resources.client));
        assert!(Arc::ptr_eq(&seen.field_indexer, &resources.field_indexer));
        assert!(Arc::ptr_eq(&seen.scheme, &resources.scheme));
        assert_eq!(seen.namespace.as_deref(), Some("team-a"));
        assert_eq!(seen.resync_period, DEFAULT_SYNC_PERIOD);
    }

    #[test]
    fn test_custom_scheme_is_kept() {
        let scheme = Arc::new(Scheme::new());
        let options = memory_options().with_scheme(scheme.clone());
        let resources = SharedResources::build(Some(RestConfig::default()), &options).unwrap();
        assert!(Arc::ptr_eq(&resources.scheme, &scheme));
    }
}
