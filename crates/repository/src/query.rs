//! Read resources.

use tracing::{info_span, Instrument};

use query_engine_execution::query::{self, QueryResult};
use query_engine_translation::translation;
use query_engine_translation::translation::helpers::Env;
use query_engine_translation::translation::query::request::QueryRequest;
use resource_sql_configuration::Configuration;

use crate::error::RepositoryError;
use crate::state::State;

/// Compile a query request and run it: the count statement first when total counts
/// are enabled, then the data statement.
pub async fn query(
    configuration: &Configuration,
    state: &State,
    request: &QueryRequest,
) -> Result<QueryResult, RepositoryError> {
    tracing::info!(resource_type = %request.resource_type, "{:?}", request);

    // Compile the query.
    let plan = async {
        let env = Env::new(&configuration.metadata, &configuration.query_settings);
        translation::query::translate(&env, request).map_err(RepositoryError::from)
    }
    .instrument(info_span!("Plan query"))
    .await
    .map_err(|err| {
        err.log("Plan query");
        err
    })?;

    // Execute the query.
    query::execute(state.store.as_ref(), &state.metrics, &plan)
        .instrument(info_span!("Execute query"))
        .await
        .map_err(|err| {
            let err = RepositoryError::from(err);
            err.log("Execute query");
            err
        })
}
