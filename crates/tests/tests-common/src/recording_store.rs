//! A store that records the statements it is given and answers from a script.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use query_engine_execution::error::Error;
use query_engine_execution::store::{Row, Store, Transaction};
use query_engine_sql::sql::ast::ParameterValue;
use query_engine_sql::sql::string::SQL;

#[derive(Debug, Default)]
struct Script {
    rows: Vec<Row>,
    count: u64,
    /// Affected row counts for `execute`, in order. One row once exhausted.
    affected: VecDeque<u64>,
    returned_ids: VecDeque<ParameterValue>,
}

/// What happened while the store was used.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Recording {
    pub statements: Vec<SQL>,
    pub committed: bool,
    pub rolled_back: bool,
}

impl Recording {
    /// The statement texts, in the order they ran.
    pub fn texts(&self) -> Vec<&str> {
        self.statements
            .iter()
            .map(|statement| statement.sql.as_str())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct RecordingStore {
    script: Mutex<Script>,
    recording: Mutex<Recording>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingStore {
    pub fn new() -> Self {
        RecordingStore::default()
    }

    #[must_use]
    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        lock(&self.script).rows = rows;
        self
    }

    #[must_use]
    pub fn with_count(self, count: u64) -> Self {
        lock(&self.script).count = count;
        self
    }

    #[must_use]
    pub fn with_affected_rows(self, affected: impl IntoIterator<Item = u64>) -> Self {
        lock(&self.script).affected = affected.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_returned_ids(self, ids: impl IntoIterator<Item = ParameterValue>) -> Self {
        lock(&self.script).returned_ids = ids.into_iter().collect();
        self
    }

    pub fn recording(&self) -> Recording {
        lock(&self.recording).clone()
    }

    fn record(&self, sql: &SQL) {
        lock(&self.recording).statements.push(sql.clone());
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn fetch_rows(&self, sql: &SQL) -> Result<Vec<Row>, Error> {
        self.record(sql);
        Ok(lock(&self.script).rows.clone())
    }

    async fn fetch_count(&self, sql: &SQL) -> Result<u64, Error> {
        self.record(sql);
        Ok(lock(&self.script).count)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction + '_>, Error> {
        Ok(Box::new(RecordingTransaction { store: self }))
    }
}

struct RecordingTransaction<'a> {
    store: &'a RecordingStore,
}

#[async_trait]
impl Transaction for RecordingTransaction<'_> {
    async fn execute(&mut self, sql: &SQL) -> Result<u64, Error> {
        self.store.record(sql);
        Ok(lock(&self.store.script).affected.pop_front().unwrap_or(1))
    }

    async fn fetch_id(&mut self, sql: &SQL) -> Result<ParameterValue, Error> {
        self.store.record(sql);
        Ok(lock(&self.store.script)
            .returned_ids
            .pop_front()
            .unwrap_or(ParameterValue::Int(1)))
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        lock(&self.store.recording).committed = true;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), Error> {
        lock(&self.store.recording).rolled_back = true;
        Ok(())
    }
}
