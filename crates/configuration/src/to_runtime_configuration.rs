//! Convert the parsed configuration metadata to internal engine metadata
//! That can be used by the connector at runtime.

use std::path::PathBuf;

use super::error::MakeRuntimeConfigurationError;
use crate::environment::Environment;
use crate::values::{ConnectionUri, Secret};
use crate::version1::{ParsedConfiguration, CONFIGURATION_FILENAME};
use crate::Configuration;

/// Convert the parsed configuration into the configuration used at runtime.
pub fn make_runtime_configuration(
    parsed_config: ParsedConfiguration,
    environment: impl Environment,
) -> Result<Configuration, MakeRuntimeConfigurationError> {
    let connection_uri = match parsed_config.connection_uri {
        ConnectionUri(Secret::Plain(uri)) => Ok(uri),
        ConnectionUri(Secret::FromEnvironment { variable }) => {
            environment.read(&variable).map_err(|error| {
                MakeRuntimeConfigurationError::MissingEnvironmentVariable {
                    file_path: PathBuf::from(CONFIGURATION_FILENAME),
                    message: error.to_string(),
                }
            })
        }
    }?;

    Ok(Configuration {
        metadata: parsed_config.metadata,
        pool_settings: parsed_config.pool_settings,
        connection_uri,
        query_settings: parsed_config.query_settings,
    })
}
