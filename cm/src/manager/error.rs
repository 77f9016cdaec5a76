//! Manager error types

use thiserror::Error;

/// Errors returned by [`super::Manager`]
///
/// Variants that carry an `eyre::Report` display exactly the collaborator's
/// message. The report itself is available through [`ManagerError::cause`],
/// where `downcast_ref` recovers the original error type.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("must specify Config")]
    ConfigMissing,

    #[error("{0}")]
    MapperCreationFailed(eyre::Report),

    #[error("{0}")]
    ClientCreationFailed(eyre::Report),

    #[error("{0}")]
    CacheCreationFailed(eyre::Report),

    #[error("{0}")]
    InjectionFailed(eyre::Report),

    #[error("{0}")]
    CacheStartFailed(eyre::Report),

    #[error("{0}")]
    RunnableFailed(eyre::Report),

    #[error("manager already started; it cannot be started twice")]
    AlreadyStarted,

    #[error("manager has stopped; runnables can no longer be added")]
    Stopped,
}

impl ManagerError {
    /// The underlying collaborator error, if any
    pub fn cause(&self) -> Option<&eyre::Report> {
        match self {
            ManagerError::MapperCreationFailed(e)
            | ManagerError::ClientCreationFailed(e)
            | ManagerError::CacheCreationFailed(e)
            | ManagerError::InjectionFailed(e)
            | ManagerError::CacheStartFailed(e)
            | ManagerError::RunnableFailed(e) => Some(e),
            ManagerError::ConfigMissing | ManagerError::AlreadyStarted | ManagerError::Stopped => None,
        }
    }
}
