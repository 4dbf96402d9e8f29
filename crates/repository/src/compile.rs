//! Compile a query request without running it.

use query_engine_metadata::metadata::Metadata;
use query_engine_sql::sql;
use query_engine_translation::translation;
use query_engine_translation::translation::helpers::Env;
use query_engine_translation::translation::query::request::QueryRequest;
use resource_sql_configuration::QuerySettings;

use crate::error::RepositoryError;

/// Compile a request into the statements that would be run for it, count first.
pub fn compile(
    metadata: &Metadata,
    settings: &QuerySettings,
    request: &QueryRequest,
) -> Result<Vec<sql::string::SQL>, RepositoryError> {
    let plan = translation::query::translate(&Env::new(metadata, settings), request)?;
    Ok(plan.count_sql().into_iter().chain([plan.data_sql()]).collect())
}

/// Print statements one after another, each followed by its parameter values.
pub fn pretty_print(statements: &[sql::string::SQL]) -> String {
    statements
        .iter()
        .map(|statement| {
            let params = statement
                .params
                .iter()
                .map(|(name, value)| format!("-- {name} = {value:?}"))
                .collect::<Vec<_>>();
            if params.is_empty() {
                format!("{};", statement.sql)
            } else {
                format!("{};\n{}", statement.sql, params.join("\n"))
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
