//! Configuration used at runtime.

use query_engine_metadata::metadata;

use crate::values::{PoolSettings, QuerySettings};

/// The 'Configuration' type collects all the information necessary to serve requests at runtime.
///
/// Values of this type are produced from a 'ParsedConfiguration' using
/// 'make_runtime_configuration', which resolves secrets from the environment.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub metadata: metadata::Metadata,
    pub pool_settings: PoolSettings,
    pub connection_uri: String,
    pub query_settings: QuerySettings,
}
