//! Long-running components started by the manager

use std::future::Future;

use async_trait::async_trait;
use eyre::Result;
use tokio_util::sync::CancellationToken;

use crate::inject::Injectable;

/// A unit of work that runs until `stop` is cancelled
///
/// Returning `Ok(())` is a clean exit. Returning an error stops the whole
/// manager. Implementations must return promptly once `stop` fires.
#[async_trait]
pub trait Runnable: Injectable {
    async fn start(&self, stop: CancellationToken) -> Result<()>;
}

/// Adapts an async closure into a [`Runnable`] with no injected dependencies
pub struct RunnableFn<F> {
    f: F,
}

pub fn runnable_fn<F, Fut>(f: F) -> RunnableFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    RunnableFn { f }
}

impl<F: Send + Sync> Injectable for RunnableFn<F> {}

#[async_trait]
impl<F, Fut> Runnable for RunnableFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn start(&self, stop: CancellationToken) -> Result<()> {
        (self.f)(stop).await
    }
}
