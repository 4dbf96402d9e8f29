//! Errors for execution.

use query_engine_sql::sql::execution_plan::RowCountExpectation;

/// A type for execution errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A mutation statement failed or affected an unexpected number of rows. The
    /// transaction it ran in has been rolled back.
    #[error("data-store update failed: {source}")]
    DataStoreUpdateFailed { source: Box<Error> },
    #[error("statement affected {affected} rows, expected {expected:?}")]
    RowCountMismatch {
        expected: RowCountExpectation,
        affected: u64,
    },
    #[error("{0}")]
    Query(QueryError),
    #[error("{0}")]
    DB(#[from] sqlx::Error),
}

impl Error {
    /// Wrap a failure inside a mutation transaction.
    pub fn data_store_update_failed(self) -> Error {
        match self {
            already @ Error::DataStoreUpdateFailed { .. } => already,
            other => Error::DataStoreUpdateFailed {
                source: Box::new(other),
            },
        }
    }
}

/// An error from the query that was run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("parameter '{0}' occurs in the statement but has no value")]
    UnboundParameter(String),
    #[error("column '{column}' has type '{type_name}', which cannot be read")]
    UnsupportedColumnType { column: String, type_name: String },
    #[error("expected a single count, got {0} rows")]
    UnexpectedCountResult(usize),
    #[error("the insert did not return an identifier")]
    MissingReturnedId,
}
