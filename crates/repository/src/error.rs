//! Errors returned to callers of the repository.

use query_engine_execution::error as execution;
use query_engine_translation::translation;

/// What went wrong while serving a request.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The request asked for something that does not exist or is not supported.
    #[error("bad request: {0}")]
    BadRequest(translation::Error),
    /// A defect in the compiler, or a failure reading from the database.
    #[error("internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A write was rolled back.
    #[error("{0}")]
    DataStoreUpdateFailed(execution::Error),
}

impl From<translation::Error> for RepositoryError {
    fn from(err: translation::Error) -> Self {
        if err.is_internal() {
            RepositoryError::Internal(err.into())
        } else {
            RepositoryError::BadRequest(err)
        }
    }
}

impl From<execution::Error> for RepositoryError {
    fn from(err: execution::Error) -> Self {
        match err {
            execution::Error::DataStoreUpdateFailed { .. } => {
                RepositoryError::DataStoreUpdateFailed(err)
            }
            execution::Error::RowCountMismatch { .. } => {
                RepositoryError::DataStoreUpdateFailed(err.data_store_update_failed())
            }
            execution::Error::Query(_) | execution::Error::DB(_) => {
                RepositoryError::Internal(err.into())
            }
        }
    }
}

impl RepositoryError {
    fn kind(&self) -> &'static str {
        match self {
            RepositoryError::BadRequest(_) => "Bad request",
            RepositoryError::Internal(_) => "Internal error",
            RepositoryError::DataStoreUpdateFailed(_) => "Data-store update failed",
        }
    }

    /// Log the error as a structured event.
    pub fn log(&self, operation: &str) {
        tracing::error!(
            meta.signal_type = "log",
            event.domain = "resource-sql",
            event.name = self.kind(),
            name = operation,
            body = %self,
            error = true,
        );
    }
}
