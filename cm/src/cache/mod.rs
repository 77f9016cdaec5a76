//! Local object cache
//!
//! A [`Cache`] serves reads from memory once its initial sync completes. The
//! manager starts it exactly once, before any runnable runs.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

mod indexer;
mod informer;

pub use indexer::{FieldIndexer, IndexError, IndexerFn};
pub use informer::InformerCache;

use crate::client::{ClientError, Reader};
use crate::scheme::GroupVersionKind;

/// Read-only view of API objects kept warm by background watches
#[async_trait]
pub trait Cache: Reader {
    /// Start watching and wait for the initial sync of every requested kind
    ///
    /// Watches keep running after this returns until `stop` is cancelled.
    async fn start(&self, stop: CancellationToken) -> eyre::Result<()>;

    /// Request that a kind be watched
    ///
    /// Before `start` this only records the request; afterwards it performs
    /// the initial list immediately.
    async fn informer_for(&self, gvk: &GroupVersionKind) -> Result<(), ClientError>;
}
