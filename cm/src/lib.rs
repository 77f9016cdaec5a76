//! ctrlmgr - lifecycle coordinator for API-server controllers
//!
//! A [`Manager`] builds one set of shared handles (client, cache, scheme,
//! field indexer, connection config), injects them into every registered
//! [`Runnable`], starts the cache, and then runs all runnables under a single
//! stop signal until it fires or one of them fails.
//!
//! # Modules
//!
//! - [`manager`] - the coordinator, its options and run state
//! - [`inject`] - capability traits for dependency injection
//! - [`client`] - typed client trait with HTTP and in-memory implementations
//! - [`cache`] - informer cache and field indexer
//! - [`rest`] - connection config and kind-to-resource mapping
//! - [`scheme`] - known kinds and the dynamic object model
//! - [`config`] - configuration file loading
//! - [`logging`] - tracing subscriber setup

pub mod cache;
pub mod client;
pub mod config;
pub mod inject;
pub mod logging;
pub mod manager;
pub mod rest;
pub mod scheme;

// Re-export commonly used types
pub use cache::{Cache, FieldIndexer, InformerCache};
pub use client::{Client, ClientError, HttpClient, ListOptions, MemoryClient, Reader};
pub use config::ManagerConfig;
pub use inject::{InjectCache, InjectClient, InjectConfig, InjectFn, InjectInjector, InjectScheme, Injectable, Injector};
pub use manager::{Manager, ManagerError, ManagerState, Options, Runnable, runnable_fn};
pub use rest::{RestConfig, RestMapper, StaticRestMapper};
pub use scheme::{GroupVersionKind, Object, ObjectKey, Scheme};

/// Re-exported so callers can build the stop signal without naming tokio-util
pub use tokio_util::sync::CancellationToken;
