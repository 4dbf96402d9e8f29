//! Execute a query plan against the database.

use tracing::{info_span, Instrument};

use query_engine_sql::sql;

use crate::error::Error;
use crate::metrics;
use crate::store::{Row, Store};

/// The rows of the requested page, and the total number of matching resources
/// when it was asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub total_count: Option<u64>,
    pub rows: Vec<Row>,
}

/// Run the count statement of a plan (if any), then its data statement.
pub async fn execute(
    store: &dyn Store,
    metrics: &metrics::Metrics,
    plan: &sql::execution_plan::QueryPlan,
) -> Result<QueryResult, Error> {
    let total_count = match plan.count_sql() {
        None => None,
        Some(count_sql) => {
            tracing::info!(
                resource_type = %plan.resource_type,
                "Count query: {}\nParameters: {:?}",
                count_sql.sql,
                count_sql.params
            );
            metrics.statement_total.inc();
            let count = store
                .fetch_count(&count_sql)
                .instrument(info_span!("Database count"))
                .await?;
            Some(count)
        }
    };

    let data_sql = plan.data_sql();
    tracing::info!(
        resource_type = %plan.resource_type,
        "Data query: {}\nParameters: {:?}",
        data_sql.sql,
        data_sql.params
    );
    metrics.statement_total.inc();
    let rows = store
        .fetch_rows(&data_sql)
        .instrument(info_span!("Database request"))
        .await?;

    metrics.query_total.inc();
    Ok(QueryResult { total_count, rows })
}
