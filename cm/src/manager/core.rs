//! Manager - owns the shared resources and runs every registered runnable

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use eyre::eyre;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::error::ManagerError;
use super::options::{DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT, Options};
use super::resources::SharedResources;
use super::runnable::Runnable;
use super::state::ManagerState;
use crate::cache::{Cache, FieldIndexer};
use crate::client::Client;
use crate::inject::{Injectable, Injector};
use crate::rest::{RestConfig, RestMapper};
use crate::scheme::Scheme;

/// Everything a runnable spawned while the manager is running needs
struct RunContext {
    /// Child of the caller's stop signal; also cancelled when a runnable fails
    stop: CancellationToken,
    errors: mpsc::UnboundedSender<eyre::Report>,
    tracker: TaskTracker,
    runtime: Handle,
}

impl RunContext {
    fn spawn(&self, runnable: Arc<dyn Runnable>) {
        let stop = self.stop.clone();
        let errors = self.errors.clone();
        self.tracker.spawn_on(
            async move {
                let result = match AssertUnwindSafe(runnable.start(stop)).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => Err(eyre!("runnable panicked")),
                };
                match result {
                    Ok(()) => debug!("Runnable exited cleanly"),
                    Err(e) => {
                        error!(error = %e, "Runnable failed");
                        // Receiver is gone once start has returned
                        let _ = errors.send(e);
                    }
                }
            },
            &self.runtime,
        );
    }
}

/// Cancels the run and marks the manager stopped however `start` exits,
/// including when its future is dropped
struct StopOnExit<'a> {
    manager: &'a Manager,
    run_stop: CancellationToken,
}

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        self.run_stop.cancel();
        self.manager.finish();
    }
}

struct Registry {
    runnables: Vec<Arc<dyn Runnable>>,
    state: ManagerState,
    /// Present exactly while the state is `Running`
    run: Option<RunContext>,
}

struct ManagerInner {
    resources: SharedResources,
    injector: Injector,
    graceful_shutdown_timeout: Duration,
    registry: Mutex<Registry>,
    state_tx: watch::Sender<ManagerState>,
}

/// Coordinates the shared client, cache and scheme with a set of runnables
///
/// `Manager` is a cheap handle; clones share the same registry and
/// resources, so runnables may hold one and call [`Manager::add`] while the
/// manager is running.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

impl Manager {
    /// Build the shared resources; nothing is started until [`Manager::start`]
    pub fn new(config: Option<RestConfig>, options: Options) -> Result<Self, ManagerError> {
        debug!("Manager::new: called");
        let resources = SharedResources::build(config, &options)?;
        let injector = resources.injector();
        let (state_tx, _) = watch::channel(ManagerState::Created);

        Ok(Self {
            inner: Arc::new(ManagerInner {
                resources,
                injector,
                graceful_shutdown_timeout: options
                    .graceful_shutdown_timeout
                    .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT),
                registry: Mutex::new(Registry {
                    runnables: Vec::new(),
                    state: ManagerState::Created,
                    run: None,
                }),
                state_tx,
            }),
        })
    }

    /// Inject dependencies into `runnable` and register it
    ///
    /// If the manager is already running the runnable starts right away under
    /// the shared stop signal; otherwise it starts with the next `start`.
    pub fn add(&self, runnable: Arc<dyn Runnable>) -> Result<(), ManagerError> {
        debug!("Manager::add: called");
        self.set_fields(runnable.as_ref())?;

        let mut registry = self.registry();
        if registry.state == ManagerState::Stopped {
            return Err(ManagerError::Stopped);
        }
        registry.runnables.push(runnable.clone());
        match &registry.run {
            Some(run) => {
                info!(count = registry.runnables.len(), "Starting runnable added while running");
                run.spawn(runnable);
            }
            None => debug!(state = %registry.state, "Manager::add: deferred until start"),
        }
        Ok(())
    }

    /// Inject the manager's shared handles into any object
    pub fn set_fields<T: Injectable + ?Sized>(&self, target: &T) -> Result<(), ManagerError> {
        self.inner.injector.inject(target).map_err(ManagerError::InjectionFailed)
    }

    /// Start the cache and every runnable, then block until shutdown
    ///
    /// Returns `Ok(())` once `stop` fires, or the first runnable error. Either
    /// way every runnable is signalled and given `graceful_shutdown_timeout`
    /// to return. A manager can be started only once.
    pub async fn start(&self, stop: CancellationToken) -> Result<(), ManagerError> {
        debug!("Manager::start: called");
        {
            let mut registry = self.registry();
            if registry.state != ManagerState::Created {
                warn!(state = %registry.state, "Manager::start: called more than once");
                return Err(ManagerError::AlreadyStarted);
            }
            self.transition(&mut registry, ManagerState::Starting);
        }

        let run_stop = stop.child_token();
        let _stop_on_exit = StopOnExit {
            manager: self,
            run_stop: run_stop.clone(),
        };

        info!("Manager starting cache");
        let synced = tokio::select! {
            biased;
            _ = stop.cancelled() => None,
            result = self.inner.resources.cache.start(run_stop.clone()) => Some(result),
        };
        match synced {
            None => {
                info!("Manager stopped before cache sync completed");
                self.finish();
                return Ok(());
            }
            Some(Err(e)) => {
                error!(error = %e, "Manager failed to start cache");
                self.finish();
                return Err(ManagerError::CacheStartFailed(e));
            }
            Some(Ok(())) => {}
        }

        let (errors_tx, mut errors_rx) = mpsc::unbounded_channel();
        let tracker = TaskTracker::new();
        {
            let mut registry = self.registry();
            let run = RunContext {
                stop: run_stop.clone(),
                errors: errors_tx,
                tracker: tracker.clone(),
                runtime: Handle::current(),
            };
            for runnable in &registry.runnables {
                run.spawn(runnable.clone());
            }
            info!(count = registry.runnables.len(), "Manager running");
            registry.run = Some(run);
            self.transition(&mut registry, ManagerState::Running);
        }

        let outcome = tokio::select! {
            biased;
            _ = stop.cancelled() => {
                info!("Manager stop signal received");
                Ok(())
            }
            Some(e) = errors_rx.recv() => Err(e),
        };

        run_stop.cancel();
        self.finish();
        tracker.close();
        if tokio::time::timeout(self.inner.graceful_shutdown_timeout, tracker.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = tracker.len(),
                timeout = ?self.inner.graceful_shutdown_timeout,
                "Runnables still running after graceful shutdown timeout"
            );
        }
        while let Ok(e) = errors_rx.try_recv() {
            warn!(error = %e, "Discarding runnable error after the first");
        }

        info!("Manager stopped");
        outcome.map_err(ManagerError::RunnableFailed)
    }

    /// Snapshot of the run state
    pub fn state(&self) -> ManagerState {
        self.registry().state
    }

    /// Resolve once the manager is running or has stopped
    pub async fn wait_for_running(&self) -> ManagerState {
        let mut rx = self.inner.state_tx.subscribe();
        match rx.wait_for(|state| state.is_settled()).await {
            Ok(state) => *state,
            Err(_) => ManagerState::Stopped,
        }
    }

    pub fn config(&self) -> Arc<RestConfig> {
        self.inner.resources.config.clone()
    }

    pub fn client(&self) -> Arc<dyn Client> {
        self.inner.resources.client.clone()
    }

    pub fn scheme(&self) -> Arc<Scheme> {
        self.inner.resources.scheme.clone()
    }

    pub fn cache(&self) -> Arc<dyn Cache> {
        self.inner.resources.cache.clone()
    }

    pub fn field_indexer(&self) -> Arc<FieldIndexer> {
        self.inner.resources.field_indexer.clone()
    }

    pub fn rest_mapper(&self) -> Arc<dyn RestMapper> {
        self.inner.resources.mapper.clone()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, registry: &mut Registry, next: ManagerState) {
        debug_assert!(registry.state.can_transition_to(next));
        debug!(from = %registry.state, to = %next, "Manager state transition");
        registry.state = next;
        self.inner.state_tx.send_replace(next);
    }

    /// Move to `Stopped`; runnables added from now on are rejected
    fn finish(&self) {
        let mut registry = self.registry();
        if registry.state == ManagerState::Stopped {
            return;
        }
        registry.run = None;
        self.transition(&mut registry, ManagerState::Stopped);
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry();
        f.debug_struct("Manager")
            .field("host", &self.inner.resources.config.host)
            .field("state", &registry.state)
            .field("runnables", &registry.runnables.len())
            .finish()
    }
}
