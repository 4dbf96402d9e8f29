//! Run mutation steps inside a single transaction.

use tracing::{info_span, Instrument};

use query_engine_sql::sql::ast::ParameterValue;
use query_engine_sql::sql::execution_plan::{MutationStep, RowCountExpectation};

use crate::error::Error;
use crate::metrics;
use crate::store::{Store, Transaction};

/// An open transaction that checks the row count of every step it runs.
/// Every error it returns is a `DataStoreUpdateFailed`.
pub struct MutationTransaction<'a> {
    transaction: Box<dyn Transaction + 'a>,
    metrics: &'a metrics::Metrics,
}

impl<'a> MutationTransaction<'a> {
    pub async fn begin(
        store: &'a dyn Store,
        metrics: &'a metrics::Metrics,
    ) -> Result<MutationTransaction<'a>, Error> {
        let transaction = store.begin().await.map_err(Error::data_store_update_failed)?;
        Ok(MutationTransaction {
            transaction,
            metrics,
        })
    }

    /// Run one step. Returns the new identifier for a step that expects one.
    pub async fn run(&mut self, step: &MutationStep) -> Result<Option<ParameterValue>, Error> {
        self.run_step(step)
            .await
            .map_err(Error::data_store_update_failed)
    }

    async fn run_step(&mut self, step: &MutationStep) -> Result<Option<ParameterValue>, Error> {
        let sql = step.sql();
        tracing::info!(
            "Mutation statement: {}\nParameters: {:?}\nExpecting: {:?}",
            sql.sql,
            sql.params,
            step.expectation
        );
        self.metrics.statement_total.inc();

        match step.expectation {
            RowCountExpectation::ReturnsId => {
                let id = self.transaction.fetch_id(&sql).await?;
                Ok(Some(id))
            }
            expected => {
                let affected = self.transaction.execute(&sql).await?;
                if expected.is_met_by(affected) {
                    Ok(None)
                } else {
                    Err(Error::RowCountMismatch { expected, affected })
                }
            }
        }
    }

    /// Run steps in order, stopping at the first failure.
    pub async fn run_all(&mut self, steps: &[MutationStep]) -> Result<(), Error> {
        for step in steps {
            self.run(step).await?;
        }
        Ok(())
    }

    pub async fn commit(self) -> Result<(), Error> {
        self.transaction
            .commit()
            .await
            .map_err(Error::data_store_update_failed)?;
        self.metrics.mutation_total.inc();
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), Error> {
        self.metrics.mutation_failure_total.inc();
        self.transaction
            .rollback()
            .await
            .map_err(Error::data_store_update_failed)
    }
}

/// Run all steps in one transaction. Commits when every step succeeds, and rolls
/// back otherwise.
pub async fn execute(
    store: &dyn Store,
    metrics: &metrics::Metrics,
    steps: &[MutationStep],
) -> Result<(), Error> {
    async {
        let mut transaction = MutationTransaction::begin(store, metrics).await?;
        match transaction.run_all(steps).await {
            Ok(()) => transaction.commit().await,
            Err(err) => {
                if let Err(rollback_err) = transaction.rollback().await {
                    tracing::error!("Rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }
    .instrument(info_span!("Execute mutation"))
    .await
}
