//! Lifecycle coordination of shared resources and runnables

mod core;
mod error;
mod options;
mod resources;
mod runnable;
mod state;

pub use self::core::Manager;
pub use error::ManagerError;
pub use options::{
    CacheOptions, ClientOptions, DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT, DEFAULT_SYNC_PERIOD, MapperProvider, NewCacheFn,
    NewClientFn, Options, default_mapper_provider, default_new_cache, default_new_client,
};
pub use resources::SharedResources;
pub use runnable::{Runnable, RunnableFn, runnable_fn};
pub use state::ManagerState;
