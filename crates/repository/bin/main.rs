use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use query_engine_translation::translation::query::request::QueryRequest;
use resource_sql::{compile, query, state};
use resource_sql_configuration::environment::ProcessEnvironment;
use resource_sql_configuration::{make_runtime_configuration, parse_configuration, version1};

#[derive(Parser)]
#[command(name = "resource-sql")]
#[command(about = "Compile resource queries into PostgreSQL statements")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the statements a query request compiles to, without connecting to a database.
    Compile {
        #[arg(long, value_name = "DIRECTORY")]
        configuration: PathBuf,
        #[arg(long, value_name = "FILE")]
        request: PathBuf,
    },
    /// Run a query request and print the rows it returns.
    Query {
        #[arg(long, value_name = "DIRECTORY")]
        configuration: PathBuf,
        #[arg(long, value_name = "FILE")]
        request: PathBuf,
    },
    /// Print the JSON schema of the configuration file.
    PrintSchema,
}

#[tokio::main]
pub async fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse().command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Compile {
            configuration,
            request,
        } => {
            let parsed = parse_configuration(&configuration).await?;
            let request = read_request(&request).await?;
            let statements =
                compile::compile(&parsed.metadata, &parsed.query_settings, &request)?;
            println!("{}", compile::pretty_print(&statements));
        }
        Command::Query {
            configuration,
            request,
        } => {
            let parsed = parse_configuration(&configuration).await?;
            let configuration = make_runtime_configuration(parsed, ProcessEnvironment)?;
            let request = read_request(&request).await?;
            let state =
                state::create_state(&configuration, &mut prometheus::Registry::new()).await?;
            let result = query::query(&configuration, &state, &request).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "totalCount": result.total_count,
                    "rows": result.rows,
                }))?
            );
        }
        Command::PrintSchema => {
            println!(
                "{}",
                serde_json::to_string_pretty(&version1::configuration_schema())?
            );
        }
    }
    Ok(())
}

async fn read_request(path: &Path) -> anyhow::Result<QueryRequest> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&contents)?)
}
