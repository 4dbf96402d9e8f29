use std::fs;
use std::path::PathBuf;

use query_engine_sql::sql;
use query_engine_translation::translation;
use resource_sql_configuration::environment::FixedEnvironment;

/// Translate the request of a test case against the shared configuration, and render
/// the count statement (when there is one) and the data statement with their parameters.
pub async fn test_translation(testname: &str) -> anyhow::Result<String> {
    let plan = translate(testname).await?;

    let mut statements = vec![];
    if let Some(count) = plan.count_sql() {
        statements.push(render(&count));
    }
    statements.push(render(&plan.data_sql()));
    Ok(statements.join("\n\n"))
}

/// Translate the request of a test case against the shared configuration.
pub async fn translate(testname: &str) -> anyhow::Result<sql::execution_plan::QueryPlan> {
    let goldenfiles = PathBuf::from("tests/goldenfiles");

    let parsed_configuration = resource_sql_configuration::parse_configuration(&goldenfiles).await?;
    let configuration = resource_sql_configuration::make_runtime_configuration(
        parsed_configuration,
        FixedEnvironment::from([(
            "RESOURCE_SQL_CONNECTION_URI".into(),
            "the translation tests do not rely on a database connection".into(),
        )]),
    )?;

    let request = serde_json::from_str(&fs::read_to_string(
        goldenfiles.join(testname).join("request.json"),
    )?)?;

    let env = translation::helpers::Env::new(&configuration.metadata, &configuration.query_settings);
    Ok(translation::query::translate(&env, &request)?)
}

fn render(sql: &sql::string::SQL) -> String {
    format!("{}\n\n{:?}", sql.sql, sql.params)
}
