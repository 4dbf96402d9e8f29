//! The boundary to the database: run one rendered statement and await its result.

use async_trait::async_trait;

use query_engine_sql::sql;

use crate::error::Error;

/// The values of one row, in select list order.
pub type Row = Vec<serde_json::Value>;

/// A database that statements can be run against.
#[async_trait]
pub trait Store: Send + Sync {
    /// Run a SELECT and return its rows.
    async fn fetch_rows(&self, sql: &sql::string::SQL) -> Result<Vec<Row>, Error>;

    /// Run a SELECT returning a single `COUNT(*)`.
    async fn fetch_count(&self, sql: &sql::string::SQL) -> Result<u64, Error>;

    /// Open a transaction. Dropping it without committing rolls it back.
    async fn begin(&self) -> Result<Box<dyn Transaction + '_>, Error>;
}

/// An open transaction. Statements run one at a time, in the order they are submitted.
#[async_trait]
pub trait Transaction: Send {
    /// Run an INSERT, UPDATE or DELETE and return the number of affected rows.
    async fn execute(&mut self, sql: &sql::string::SQL) -> Result<u64, Error>;

    /// Run an INSERT ... RETURNING and return the identifier of the new row.
    async fn fetch_id(&mut self, sql: &sql::string::SQL) -> Result<sql::ast::ParameterValue, Error>;

    async fn commit(self: Box<Self>) -> Result<(), Error>;

    async fn rollback(self: Box<Self>) -> Result<(), Error>;
}
